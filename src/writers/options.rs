use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{PbfError, Result};

/// Which metadata columns to emit for every object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataOptions {
    version: bool,
    timestamp: bool,
    changeset: bool,
    uid: bool,
    user: bool,
}

impl MetadataOptions {
    pub fn all() -> Self {
        Self {
            version: true,
            timestamp: true,
            changeset: true,
            uid: true,
            user: true,
        }
    }

    pub fn none() -> Self {
        Self {
            version: false,
            timestamp: false,
            changeset: false,
            uid: false,
            user: false,
        }
    }

    pub fn any(&self) -> bool {
        self.version || self.timestamp || self.changeset || self.uid || self.user
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn timestamp(&self) -> bool {
        self.timestamp
    }

    pub fn changeset(&self) -> bool {
        self.changeset
    }

    pub fn uid(&self) -> bool {
        self.uid
    }

    pub fn user(&self) -> bool {
        self.user
    }
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for MetadataOptions {
    type Err = PbfError;

    /// Empty, "true", "yes" and "all" select every column; "false", "no"
    /// and "none" select none; anything else is a comma-separated subset
    /// of {version, timestamp, changeset, uid, user}.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "true" | "yes" | "all" => return Ok(Self::all()),
            "false" | "no" | "none" => return Ok(Self::none()),
            _ => {}
        }
        let mut options = Self::none();
        for part in s.split(',') {
            match part.trim() {
                "version" => options.version = true,
                "timestamp" => options.timestamp = true,
                "changeset" => options.changeset = true,
                "uid" => options.uid = true,
                "user" => options.user = true,
                other => {
                    return Err(PbfError::invalid_option(
                        "add_metadata",
                        format!("unknown metadata field: '{}'", other),
                    ))
                }
            }
        }
        Ok(options)
    }
}

/// Blob compression choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Zlib,
    Lz4,
}

impl Compression {
    fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zlib => "zlib",
            Compression::Lz4 => "lz4",
        }
    }
}

impl FromStr for Compression {
    type Err = PbfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "false" => Ok(Compression::None),
            "" | "zlib" | "true" => Ok(Compression::Zlib),
            "lz4" => Ok(Compression::Lz4),
            other => Err(PbfError::invalid_option(
                "pbf_compression",
                format!("unknown compression: '{}'", other),
            )),
        }
    }
}

const ZLIB_DEFAULT_LEVEL: u32 = 6;
const ZLIB_MAX_LEVEL: u32 = 9;
const LZ4_DEFAULT_LEVEL: u32 = 0;
const LZ4_MAX_LEVEL: u32 = 16;

/// Fixed writer configuration, read once at construction.
#[derive(Debug, Clone)]
pub struct PbfWriterOptions {
    /// Which metadata columns to emit.
    pub metadata: MetadataOptions,
    /// Blob compression choice.
    pub compression: Compression,
    /// Compression level; `None` selects the codec's default.
    pub compression_level: Option<u32>,
    /// Encode nodes with the DenseNodes packing.
    pub dense_nodes: bool,
    /// Emit the visible flag on every object. Set this when writing
    /// history files.
    pub add_visible: bool,
    /// Emit per-node-ref lat/lon columns on ways.
    pub locations_on_ways: bool,
}

impl Default for PbfWriterOptions {
    fn default() -> Self {
        Self {
            metadata: MetadataOptions::all(),
            compression: Compression::Zlib,
            compression_level: None,
            dense_nodes: true,
            add_visible: false,
            locations_on_ways: false,
        }
    }
}

impl PbfWriterOptions {
    /// Build options from a string configuration map, the surface exposed
    /// to file-format drivers. Unknown values, out-of-range levels and
    /// the deprecated `pbf_add_metadata` key are rejected.
    pub fn from_config(config: &HashMap<String, String>) -> Result<Self> {
        if config.contains_key("pbf_add_metadata") {
            return Err(PbfError::invalid_option(
                "pbf_add_metadata",
                "deprecated, use 'add_metadata' instead",
            ));
        }

        let mut options = Self::default();
        if let Some(value) = config.get("pbf_dense_nodes") {
            options.dense_nodes = is_not_false(value);
        }
        if let Some(value) = config.get("pbf_compression") {
            options.compression = value.parse()?;
        }
        if let Some(value) = config.get("add_metadata") {
            options.metadata = value.parse()?;
        }
        if let Some(value) = config.get("locations_on_ways") {
            options.locations_on_ways = is_true(value);
        }
        if let Some(value) = config.get("pbf_compression_level") {
            let level = value.parse::<u32>().map_err(|_| {
                PbfError::invalid_option("pbf_compression_level", "must be an integer")
            })?;
            options.compression_level = Some(level);
        }

        options.resolved_compression_level()?;
        Ok(options)
    }

    /// Validate the compression level against the chosen codec and
    /// resolve the codec default when no level is set.
    pub fn resolved_compression_level(&self) -> Result<u32> {
        match (self.compression, self.compression_level) {
            (Compression::None, None) => Ok(0),
            (Compression::None, Some(_)) => Err(PbfError::invalid_option(
                "pbf_compression_level",
                "does not make sense without compression",
            )),
            (Compression::Zlib, None) => Ok(ZLIB_DEFAULT_LEVEL),
            (Compression::Lz4, None) => Ok(LZ4_DEFAULT_LEVEL),
            (codec @ Compression::Zlib, Some(level)) | (codec @ Compression::Lz4, Some(level)) => {
                let max = match codec {
                    Compression::Zlib => ZLIB_MAX_LEVEL,
                    _ => LZ4_MAX_LEVEL,
                };
                if level > max {
                    return Err(PbfError::invalid_option(
                        "pbf_compression_level",
                        format!("level {} out of range 0..={} for {}", level, max, codec.name()),
                    ));
                }
                Ok(level)
            }
        }
    }
}

fn is_true(value: &str) -> bool {
    matches!(value, "true" | "yes")
}

fn is_not_false(value: &str) -> bool {
    !matches!(value, "false" | "no")
}
