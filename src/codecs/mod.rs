//! Encoders for the PBF wire format: delta columns, the per-block string
//! table, the DenseNodes packing, primitive block assembly and the blob
//! envelope.

pub(crate) mod blob;
pub(crate) mod delta;
pub(crate) mod dense_nodes;
pub(crate) mod primitive_block;
pub(crate) mod string_table;

/// The uncompressed length of a Blob should be less than 16 MiB and must
/// be less than 32 MiB. We enforce the 16 MiB "should".
pub(crate) const MAX_UNCOMPRESSED_BLOB_SIZE: usize = 16 * 1024 * 1024;

/// Coordinate granularity in nanodegrees. This writer always uses the
/// PBF default and never emits a per-block override.
pub(crate) const LOCATION_GRANULARITY: i64 = 100;

const LONLAT_RESOLUTION: i64 = 1_000_000_000;

/// Convert a lat or lon value in degrees to the on-wire integer,
/// respecting the granularity. With the default granularity of 100 the
/// unit is 100 nanodegrees.
pub(crate) fn lonlat_to_int(lonlat: f64) -> i64 {
    (lonlat * LONLAT_RESOLUTION as f64 / LOCATION_GRANULARITY as f64).round() as i64
}
