//! # bgpmesh-core
//!
//! Pure logic for bgp-mesh (no I/O, instant tests).
//!
//! This crate implements the deterministic pieces of the fleet harness
//! without any network, process, or disk I/O:
//! - [`Inventory`] - router records discovered from provisioning output
//! - [`mesh`] - full-mesh routing configuration text per router
//! - [`routes`] - synthetic route batches and their injection payload
//! - [`ReadinessTracker`] - per-router UNKNOWN → READY bookkeeping
//! - [`RouteTable`] - longest-prefix-match lookup over injected routes
//! - [`Thresholds`] - PASS/FAIL evaluation of performance measurements
//!
//! The actual I/O (SSH sessions, provisioning commands, artifact upload) is
//! performed by `bgpmesh-fleet`, which drives these pieces.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod inventory;
pub mod lookup;
pub mod mesh;
pub mod readiness;
pub mod routes;
pub mod thresholds;

pub use command::{shell_quote, CommandTemplate, TemplateError};
pub use inventory::{Inventory, InventorySettings, ProvisionOutputs};
pub use lookup::{PrefixLengthError, RouteTable};
pub use readiness::{ReadinessReport, ReadinessTracker};
pub use routes::generate_routes;
pub use thresholds::{Evaluation, Scenario, Thresholds};
