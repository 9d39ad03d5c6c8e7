//! Full-mesh routing configuration generator.
//!
//! Produces FRR-style configuration text for one router. Every other router
//! in the fleet becomes a neighbor, listed by ascending router id, so the
//! output depends only on the fleet's contents and never on input order.

use bgpmesh_types::{RouterId, RouterRecord};
use std::collections::BTreeMap;

const NEIGHBOR_PREFIX: &str = " neighbor ";

/// Generate the configuration text for `router` peering with the rest of `fleet`.
pub fn generate(router: &RouterRecord, fleet: &[RouterRecord]) -> String {
    let mut peers: Vec<&RouterRecord> = fleet.iter().filter(|r| r.id != router.id).collect();
    peers.sort_by_key(|r| r.id);

    let mut lines = vec![
        "!".to_string(),
        format!("! FRR configuration for router {}", router.id),
        "!".to_string(),
        format!("hostname {}", router.hostname()),
        "log file /var/log/frr/frr.log".to_string(),
        "!".to_string(),
        format!("router bgp {}", router.asn),
        format!(" bgp router-id {}", router.private_address),
        format!(" network {}", local_network(router.id)),
    ];
    lines.extend(
        peers
            .iter()
            .map(|peer| format!("{NEIGHBOR_PREFIX}{} remote-as {}", peer.private_address, peer.asn)),
    );
    lines.extend(["!", "line vty", "!"].map(String::from));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Generate every router's configuration, keyed by router id.
pub fn generate_all(fleet: &[RouterRecord]) -> BTreeMap<RouterId, String> {
    fleet.iter().map(|r| (r.id, generate(r, fleet))).collect()
}

/// The locally-originated network for a router id.
pub fn local_network(id: RouterId) -> String {
    format!("10.0.{id}.0/24")
}

/// Count neighbor statements in a generated configuration.
pub fn neighbor_count(config: &str) -> usize {
    config.lines().filter(|l| l.starts_with(NEIGHBOR_PREFIX)).count()
}
