//! Router identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Position of a router in the fleet, starting at 1.
pub type RouterId = u32;

/// One router discovered from provisioning output.
///
/// Created once during discovery and never mutated. `asn` is always
/// `base_asn + id`, so ASNs never collide inside a fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterRecord {
    /// Fleet-unique id (>= 1).
    pub id: RouterId,
    /// Address the harness connects to.
    pub public_address: IpAddr,
    /// Address peers use for BGP sessions; also the BGP router-id.
    pub private_address: IpAddr,
    /// Autonomous system number.
    pub asn: u32,
    /// Availability zone.
    pub zone: String,
    /// Provider instance handle (may be empty when the provider does not report it).
    pub instance_handle: String,
}

impl RouterRecord {
    /// Hostname used in the generated configuration.
    pub fn hostname(&self) -> String {
        format!("bgp-router-{}", self.id)
    }
}

impl fmt::Display for RouterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router {} (AS{}, {})", self.id, self.asn, self.public_address)
    }
}
