//! # bgpmesh-types
//!
//! Data model for the bgp-mesh fleet orchestration harness.
//!
//! This crate provides the types shared by every bgp-mesh crate:
//! - [`RouterRecord`] - One provisioned router
//! - [`RouteSpec`] - One synthetic route for injection load
//! - [`OperationResult`], [`AggregateResult`] - Per-router and fleet-wide outcomes
//! - [`TestMetric`], [`Report`] - Performance results handed to the artifact sink
//! - [`DiscoveryError`] - Malformed provisioning output

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod metric;
mod outcome;
mod route;
mod router;

pub use error::DiscoveryError;
pub use metric::{Measurements, Report, TestMetric, TestStatus, TopologyInfo};
pub use outcome::{AggregateResult, OperationKind, OperationResult};
pub use route::RouteSpec;
pub use router::{RouterId, RouterRecord};
