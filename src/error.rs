//! Error types for pbf-scribe

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, PbfError>;

/// Errors produced while configuring or running the PBF writer.
#[derive(Error, Debug)]
pub enum PbfError {
    /// A configuration option was rejected at construction.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// A compression codec was selected that is not compiled in.
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// A finalised block payload exceeds the uncompressed blob limit.
    /// The 95% fill guard makes this unreachable short of a bug.
    #[error("block payload of {size} bytes exceeds the {max} byte blob limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// A serialised blob is too large for the int32 datasize field.
    #[error("serialised blob of {0} bytes does not fit in an int32 datasize")]
    BlobTooLarge(usize),

    /// The compression library reported a failure.
    #[error("{codec} compression failed: {detail}")]
    CompressionFailed { codec: &'static str, detail: String },

    /// An internal encoding invariant did not hold.
    #[error("encoding invariant violated in {context}: {detail}")]
    EncodingInvariant { context: &'static str, detail: String },

    /// Protobuf serialisation error
    #[error("protobuf error: {0}")]
    Protobuf(#[from] protobuf::ProtobufError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker or output thread went away without delivering a result.
    #[error("serialisation pipeline disconnected before delivering a result")]
    PipelineDisconnected,
}

impl PbfError {
    pub(crate) fn invalid_option(name: &'static str, reason: impl Into<String>) -> Self {
        PbfError::InvalidOption {
            name,
            reason: reason.into(),
        }
    }
}
