//! Synthetic route batches.
//!
//! Route `i` is a pure function of `i` and the base ASN, so two batches of
//! the same size are byte-identical.

use bgpmesh_types::RouteSpec;

/// Mask length of every synthetic route.
pub const PREFIX_LENGTH: u8 = 24;
/// Local preference of every synthetic route.
pub const LOCAL_PREFERENCE: u32 = 100;
/// MED of every synthetic route.
pub const MULTI_EXIT_DISCRIMINATOR: u32 = 0;
/// AS-path origins cycle through `base_asn + 1 ..= base_asn + AS_PATH_SPAN`.
pub const AS_PATH_SPAN: u32 = 10;

/// Generate `count` routes.
pub fn generate_routes(count: usize, base_asn: u32) -> Vec<RouteSpec> {
    (0..count).map(|i| route_at(i, base_asn)).collect()
}

/// The route at index `i`.
///
/// Origins saturate at `u32::MAX`; callers keep `base_asn` at or below
/// `u32::MAX - AS_PATH_SPAN`.
pub fn route_at(i: usize, base_asn: u32) -> RouteSpec {
    let offset = (i % AS_PATH_SPAN as usize) as u32 + 1;
    RouteSpec {
        prefix: format!("192.168.{}.{}", i / 256, i % 256),
        prefix_length: PREFIX_LENGTH,
        next_hop: format!("10.0.1.{}", i % 254 + 1),
        as_path: vec![base_asn.saturating_add(offset)],
        local_preference: LOCAL_PREFERENCE,
        multi_exit_discriminator: MULTI_EXIT_DISCRIMINATOR,
    }
}

/// Serialize a batch as the JSON document the injector script reads.
pub fn encode_payload(routes: &[RouteSpec]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(routes)
}
