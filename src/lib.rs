//! A streaming writer for the OpenStreetMap PBF file format.
//!
//! This crate turns a stream of OSM entities (nodes, ways, relations) into
//! the OSMPBF on-disk format: length-prefixed frames, each carrying a
//! protobuf `BlobHeader` and `Blob`. Data blobs contain primitive blocks
//! with a per-block string table, delta-encoded columns and (by default)
//! the DenseNodes packing for nodes. Block serialisation and compression
//! run on a worker pool while a dedicated output thread writes the results
//! to disk in submission order, so the file stays deterministic even though
//! compression finishes out of order.
//!
//! # Example
//!
//! ```no_run
//! use pbf_scribe::models::{Element, Node};
//! use pbf_scribe::writers::{PbfWriter, PbfWriterOptions};
//!
//! let options = PbfWriterOptions::default();
//! let mut writer = PbfWriter::from_path("output.osm.pbf", options).unwrap();
//! writer.write(Element::Node(Node::default())).unwrap();
//! writer.finish().unwrap();
//! ```
//!
//! # Modules
//!
//! * `models` - The OSM object model accepted by the writer.
//! * `writers` - The writer front-end and its configuration surface.
//! * `proto` - Generated protobuf types for the PBF wire format.

pub mod models;
pub mod writers;

mod codecs;
mod error;

pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/mod.rs"));
}

pub use error::{PbfError, Result};
