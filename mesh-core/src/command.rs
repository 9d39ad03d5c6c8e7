//! Positional command templates.
//!
//! Remote commands are built from a fixed template such as
//! `python3 {0} {1} {2}`; every argument is shell-quoted before it is
//! substituted, so data never becomes executable text.

use thiserror::Error;

/// Template parse or render failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` without a matching `}` or with a non-numeric index.
    #[error("malformed placeholder at byte {0}")]
    Malformed(usize),

    /// A placeholder index with no argument.
    #[error("placeholder {{{index}}} has no argument ({given} given)")]
    MissingArgument {
        /// Placeholder index.
        index: usize,
        /// Number of arguments supplied.
        given: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Arg(usize),
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    parts: Vec<Part>,
}

impl CommandTemplate {
    /// Parse a template. `{N}` is a placeholder; `{{` and `}}` are literal braces.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                            _ => return Err(TemplateError::Malformed(pos)),
                        }
                    }
                    let index = digits.parse().map_err(|_| TemplateError::Malformed(pos))?;
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(Part::Arg(index));
                }
                '}' => return Err(TemplateError::Malformed(pos)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Ok(Self { parts })
    }

    /// Substitute quoted arguments by position.
    pub fn render<S: AsRef<str>>(&self, args: &[S]) -> Result<String, TemplateError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Arg(index) => {
                    let arg = args.get(*index).ok_or(TemplateError::MissingArgument {
                        index: *index,
                        given: args.len(),
                    })?;
                    out.push_str(&shell_quote(arg.as_ref()));
                }
            }
        }
        Ok(out)
    }
}

/// Quote a string for POSIX `sh`.
///
/// Strings made only of safe characters pass through unchanged.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '=' | '+' | ','));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_positional_arguments() {
        let template = CommandTemplate::parse("python3 {0} {1} {2}").unwrap();
        let cmd = template
            .render(&["/tmp/inject_routes.py", "/tmp/routes.json", "65001"])
            .unwrap();
        assert_eq!(cmd, "python3 /tmp/inject_routes.py /tmp/routes.json 65001");
    }

    #[test]
    fn arguments_are_quoted() {
        let template = CommandTemplate::parse("cat {0}").unwrap();
        let cmd = template.render(&["/tmp/a b; rm -rf /"]).unwrap();
        assert_eq!(cmd, "cat '/tmp/a b; rm -rf /'");

        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn positions_can_repeat_and_reorder() {
        let template = CommandTemplate::parse("{1}-{0}-{1}").unwrap();
        assert_eq!(template.render(&["a", "b"]).unwrap(), "b-a-b");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let template = CommandTemplate::parse("echo {{x}} {0}").unwrap();
        assert_eq!(template.render(&["y"]).unwrap(), "echo {x} y");
    }

    #[test]
    fn missing_argument_is_an_error() {
        let template = CommandTemplate::parse("run {0} {3}").unwrap();
        assert_eq!(
            template.render(&["a"]).unwrap_err(),
            TemplateError::MissingArgument { index: 3, given: 1 }
        );
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert_eq!(CommandTemplate::parse("run {x}"), Err(TemplateError::Malformed(4)));
        assert_eq!(CommandTemplate::parse("run {0"), Err(TemplateError::Malformed(4)));
        assert_eq!(CommandTemplate::parse("run }"), Err(TemplateError::Malformed(4)));
        assert_eq!(CommandTemplate::parse("run {}"), Err(TemplateError::Malformed(4)));
    }
}
