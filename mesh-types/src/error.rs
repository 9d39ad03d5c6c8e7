//! Error types for fleet discovery.

use thiserror::Error;

/// Provisioning output could not be turned into a router inventory.
///
/// Always fatal: the pipeline stops before any router is contacted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// A required output field is absent.
    #[error("provisioning output missing field: {0}")]
    MissingOutput(String),

    /// Two per-router output lists disagree in length.
    #[error("provisioning output length mismatch: {left_name}={left} vs {right_name}={right}")]
    LengthMismatch {
        /// Name of the reference list.
        left_name: String,
        /// Length of the reference list.
        left: usize,
        /// Name of the mismatching list.
        right_name: String,
        /// Length of the mismatching list.
        right: usize,
    },

    /// An address does not parse.
    #[error("invalid address {value:?} at index {index}")]
    InvalidAddress {
        /// Position in the output list.
        index: usize,
        /// The raw value.
        value: String,
    },

    /// The raw output is not the expected structured document.
    #[error("invalid provisioning output: {0}")]
    InvalidOutput(String),
}
