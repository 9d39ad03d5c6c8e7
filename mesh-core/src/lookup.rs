//! Longest-prefix-match route table.
//!
//! A binary trie over IPv4 prefixes, one level per address bit. Used by the
//! lookup-latency scenario to time lookups against the injected route set.

use bgpmesh_types::RouteSpec;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Prefix length outside 0..=32.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("prefix length {0} exceeds 32")]
pub struct PrefixLengthError(pub u8);

#[derive(Debug, Clone)]
struct Node<V> {
    children: [Option<usize>; 2],
    value: Option<V>,
}

impl<V> Node<V> {
    fn empty() -> Self {
        Self {
            children: [None, None],
            value: None,
        }
    }
}

/// IPv4 routing table with longest-prefix-match lookup.
#[derive(Debug, Clone)]
pub struct RouteTable<V> {
    nodes: Vec<Node<V>>,
    prefixes: usize,
}

impl<V> Default for RouteTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RouteTable<V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty()],
            prefixes: 0,
        }
    }

    /// Insert a prefix, masking host bits. Returns the value it replaced.
    pub fn insert(&mut self, prefix: Ipv4Addr, len: u8, value: V) -> Result<Option<V>, PrefixLengthError> {
        if len > 32 {
            return Err(PrefixLengthError(len));
        }
        let bits = u32::from(prefix);
        let mut current = 0;
        for depth in 0..u32::from(len) {
            let bit = bit_at(bits, depth);
            current = match self.nodes[current].children[bit] {
                Some(next) => next,
                None => {
                    self.nodes.push(Node::empty());
                    let next = self.nodes.len() - 1;
                    self.nodes[current].children[bit] = Some(next);
                    next
                }
            };
        }
        let previous = self.nodes[current].value.replace(value);
        if previous.is_none() {
            self.prefixes += 1;
        }
        Ok(previous)
    }

    /// Value of the longest prefix containing `addr`.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&V> {
        let bits = u32::from(addr);
        let mut current = 0;
        let mut best = self.nodes[0].value.as_ref();
        for depth in 0..32 {
            match self.nodes[current].children[bit_at(bits, depth)] {
                Some(next) => {
                    current = next;
                    if let Some(value) = self.nodes[current].value.as_ref() {
                        best = Some(value);
                    }
                }
                None => break,
            }
        }
        best
    }

    /// Number of distinct prefixes.
    pub fn len(&self) -> usize {
        self.prefixes
    }

    /// True when no prefix has been inserted.
    pub fn is_empty(&self) -> bool {
        self.prefixes == 0
    }
}

impl<'a> RouteTable<&'a RouteSpec> {
    /// Build a table from a route batch.
    ///
    /// Routes whose prefix is not an IPv4 address or whose length exceeds 32
    /// are skipped; later routes for the same prefix replace earlier ones.
    pub fn from_routes(routes: &'a [RouteSpec]) -> Self {
        let mut table = Self::new();
        for route in routes {
            if let Ok(prefix) = route.prefix.parse::<Ipv4Addr>() {
                let _ = table.insert(prefix, route.prefix_length, route);
            }
        }
        table
    }
}

fn bit_at(bits: u32, depth: u32) -> usize {
    ((bits >> (31 - depth)) & 1) as usize
}
