//! Topology inventory.
//!
//! Holds the router records discovered after provisioning. The set is
//! read-only once populated; discovering again replaces it as a whole.

use bgpmesh_types::{DiscoveryError, RouterId, RouterRecord};
use std::net::IpAddr;

/// Raw per-router lists read from the provisioning tool.
///
/// Index `i` in every list describes router `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionOutputs {
    /// Public (management) addresses.
    pub public_addresses: Vec<String>,
    /// Private (peering) addresses.
    pub private_addresses: Vec<String>,
    /// Provider instance handles; empty when the provider does not report them.
    pub instance_ids: Vec<String>,
}

/// Fleet-wide values used to derive each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySettings {
    /// `asn = base_asn + id`.
    pub base_asn: u32,
    /// Region; zone letters a-f are appended round-robin.
    pub region: String,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            base_asn: 65000,
            region: "us-east-1".into(),
        }
    }
}

/// Immutable set of routers, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    routers: Vec<RouterRecord>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory straight from provisioning output.
    pub fn discover(
        outputs: &ProvisionOutputs,
        settings: &InventorySettings,
    ) -> Result<Self, DiscoveryError> {
        let mut inventory = Self::new();
        inventory.populate(outputs, settings)?;
        Ok(inventory)
    }

    /// Replace the whole router set from provisioning output.
    ///
    /// On error the previous set is left untouched.
    pub fn populate(
        &mut self,
        outputs: &ProvisionOutputs,
        settings: &InventorySettings,
    ) -> Result<&[RouterRecord], DiscoveryError> {
        let count = outputs.public_addresses.len();
        check_len("router_public_ips", count, "router_private_ips", outputs.private_addresses.len())?;
        if !outputs.instance_ids.is_empty() {
            check_len("router_public_ips", count, "router_instance_ids", outputs.instance_ids.len())?;
        }

        let mut routers = Vec::with_capacity(count);
        for (index, (public, private)) in outputs
            .public_addresses
            .iter()
            .zip(&outputs.private_addresses)
            .enumerate()
        {
            let id = RouterId::try_from(index + 1)
                .map_err(|_| DiscoveryError::InvalidOutput(format!("too many routers: {count}")))?;
            let asn = settings.base_asn.checked_add(id).ok_or_else(|| {
                DiscoveryError::InvalidOutput(format!(
                    "router {id} overflows the ASN space from base {}",
                    settings.base_asn
                ))
            })?;
            routers.push(RouterRecord {
                id,
                public_address: parse_address(index, public)?,
                private_address: parse_address(index, private)?,
                asn,
                zone: zone_for(&settings.region, index),
                instance_handle: outputs.instance_ids.get(index).cloned().unwrap_or_default(),
            });
        }

        self.routers = routers;
        Ok(&self.routers)
    }

    /// Number of routers.
    pub fn size(&self) -> usize {
        self.routers.len()
    }

    /// True when nothing has been discovered.
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// All routers, ascending by id.
    pub fn routers(&self) -> &[RouterRecord] {
        &self.routers
    }

    /// Look up one router.
    pub fn get(&self, id: RouterId) -> Option<&RouterRecord> {
        self.routers.iter().find(|r| r.id == id)
    }

    /// The routers with the given ids, in inventory order.
    pub fn subset(&self, ids: &[RouterId]) -> Vec<RouterRecord> {
        self.routers
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect()
    }
}

fn check_len(
    left_name: &str,
    left: usize,
    right_name: &str,
    right: usize,
) -> Result<(), DiscoveryError> {
    if left == right {
        return Ok(());
    }
    Err(DiscoveryError::LengthMismatch {
        left_name: left_name.into(),
        left,
        right_name: right_name.into(),
        right,
    })
}

fn parse_address(index: usize, value: &str) -> Result<IpAddr, DiscoveryError> {
    value.trim().parse().map_err(|_| DiscoveryError::InvalidAddress {
        index,
        value: value.to_string(),
    })
}

fn zone_for(region: &str, index: usize) -> String {
    let letter = char::from(b'a' + (index % 6) as u8);
    format!("{region}{letter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(n: usize) -> ProvisionOutputs {
        ProvisionOutputs {
            public_addresses: (1..=n).map(|i| format!("54.0.0.{i}")).collect(),
            private_addresses: (1..=n).map(|i| format!("10.0.0.{i}")).collect(),
            instance_ids: Vec::new(),
        }
    }

    #[test]
    fn populate_derives_ids_asns_and_zones() {
        let inventory = Inventory::discover(&outputs(7), &InventorySettings::default()).unwrap();

        assert_eq!(inventory.size(), 7);
        let first = inventory.get(1).unwrap();
        assert_eq!(first.asn, 65001);
        assert_eq!(first.zone, "us-east-1a");
        assert_eq!(first.private_address.to_string(), "10.0.0.1");
        assert_eq!(first.instance_handle, "");

        // zones wrap after f
        assert_eq!(inventory.get(6).unwrap().zone, "us-east-1f");
        assert_eq!(inventory.get(7).unwrap().zone, "us-east-1a");
        assert_eq!(inventory.get(7).unwrap().asn, 65007);
    }

    #[test]
    fn populate_rejects_length_mismatch() {
        let mut raw = outputs(3);
        raw.private_addresses.pop();

        let err = Inventory::discover(&raw, &InventorySettings::default()).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::LengthMismatch { left: 3, right: 2, .. }
        ));
    }

    #[test]
    fn populate_rejects_instance_id_mismatch() {
        let mut raw = outputs(2);
        raw.instance_ids = vec!["i-1".into()];

        let err = Inventory::discover(&raw, &InventorySettings::default()).unwrap_err();
        assert!(matches!(err, DiscoveryError::LengthMismatch { .. }));
    }

    #[test]
    fn populate_rejects_bad_address() {
        let mut raw = outputs(2);
        raw.public_addresses[1] = "not-an-ip".into();

        let err = Inventory::discover(&raw, &InventorySettings::default()).unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::InvalidAddress {
                index: 1,
                value: "not-an-ip".into()
            }
        );
    }

    #[test]
    fn populate_rejects_asn_overflow() {
        let settings = InventorySettings {
            base_asn: u32::MAX - 1,
            ..InventorySettings::default()
        };
        let err = Inventory::discover(&outputs(3), &settings).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidOutput(ref m) if m.contains("router 2")));

        let edge = InventorySettings {
            base_asn: u32::MAX - 3,
            ..InventorySettings::default()
        };
        let inventory = Inventory::discover(&outputs(3), &edge).unwrap();
        assert_eq!(inventory.routers()[2].asn, u32::MAX);
    }

    #[test]
    fn failed_populate_keeps_previous_set() {
        let settings = InventorySettings::default();
        let mut inventory = Inventory::discover(&outputs(3), &settings).unwrap();

        let mut bad = outputs(4);
        bad.private_addresses.clear();
        assert!(inventory.populate(&bad, &settings).is_err());
        assert_eq!(inventory.size(), 3);

        inventory.populate(&outputs(5), &settings).unwrap();
        assert_eq!(inventory.size(), 5);
    }

    #[test]
    fn instance_ids_are_carried() {
        let mut raw = outputs(2);
        raw.instance_ids = vec!["i-aaa".into(), "i-bbb".into()];

        let inventory = Inventory::discover(&raw, &InventorySettings::default()).unwrap();
        assert_eq!(inventory.get(2).unwrap().instance_handle, "i-bbb");
        assert_eq!(inventory.subset(&[2]).len(), 1);
    }
}
