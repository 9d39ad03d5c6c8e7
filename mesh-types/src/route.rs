//! Synthetic route definitions.

use serde::{Deserialize, Serialize};

/// One route to inject into a router.
///
/// Field names on the wire match what the injector script reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Dotted-quad prefix text.
    pub prefix: String,
    /// Mask length.
    #[serde(rename = "prefix_len")]
    pub prefix_length: u8,
    /// Advertised next hop.
    pub next_hop: String,
    /// AS-path, nearest AS first.
    pub as_path: Vec<u32>,
    /// Local preference.
    #[serde(rename = "local_pref")]
    pub local_preference: u32,
    /// Multi-exit discriminator.
    #[serde(rename = "med")]
    pub multi_exit_discriminator: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_injector_field_names() {
        let route = RouteSpec {
            prefix: "192.168.0.1".into(),
            prefix_length: 24,
            next_hop: "10.0.1.2".into(),
            as_path: vec![65002],
            local_preference: 100,
            multi_exit_discriminator: 0,
        };
        let json = serde_json::to_string(&route).unwrap();
        assert_eq!(
            json,
            r#"{"prefix":"192.168.0.1","prefix_len":24,"next_hop":"10.0.1.2","as_path":[65002],"local_pref":100,"med":0}"#
        );
    }
}
