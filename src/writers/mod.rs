//! The writer front-end, its configuration surface and the serialisation
//! pipeline behind it.

pub(crate) mod options;
mod pbf_writer;
pub(crate) mod pipeline;

pub use options::{Compression, MetadataOptions, PbfWriterOptions};
pub use pbf_writer::PbfWriter;
