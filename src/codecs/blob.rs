use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use protobuf::Message;

use crate::codecs::MAX_UNCOMPRESSED_BLOB_SIZE;
use crate::error::{PbfError, Result};
use crate::proto::fileformat;
use crate::writers::options::Compression;

/// Whether a frame carries the file header or entity data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobType {
    Header,
    Data,
}

impl BlobType {
    fn as_str(self) -> &'static str {
        match self {
            BlobType::Header => "OSMHeader",
            BlobType::Data => "OSMData",
        }
    }
}

/// One serialisation task: owns a finalised payload and produces the
/// complete on-wire frame (length prefix, BlobHeader, Blob). Tasks share
/// no state and can run on any worker thread.
pub(crate) struct SerializeBlob {
    payload: Vec<u8>,
    blob_type: BlobType,
    compression: Compression,
    compression_level: u32,
}

impl SerializeBlob {
    pub fn new(
        payload: Vec<u8>,
        blob_type: BlobType,
        compression: Compression,
        compression_level: u32,
    ) -> Self {
        Self {
            payload,
            blob_type,
            compression,
            compression_level,
        }
    }

    /// Serialise the payload into a Blob, optionally compress it, and
    /// return it framed with a BlobHeader, ready to be written to a file.
    pub fn run(self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_UNCOMPRESSED_BLOB_SIZE {
            return Err(PbfError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_UNCOMPRESSED_BLOB_SIZE,
            });
        }

        let raw_size = self.payload.len();
        let mut blob = fileformat::Blob::new();
        match self.compression {
            Compression::None => blob.set_raw(self.payload),
            Compression::Zlib => {
                blob.set_raw_size(raw_size as i32);
                blob.set_zlib_data(zlib_compress(&self.payload, self.compression_level)?);
            }
            Compression::Lz4 => {
                #[cfg(feature = "lz4")]
                {
                    blob.set_raw_size(raw_size as i32);
                    blob.set_lz4_data(lz4_compress(&self.payload, self.compression_level)?);
                }
                #[cfg(not(feature = "lz4"))]
                return Err(PbfError::UnsupportedCompression("lz4".to_string()));
            }
        }

        let blob_bytes = blob.write_to_bytes()?;
        // zlib never grows deflated output beyond the input plus a few
        // header bytes, but a stream compressor could in principle, so the
        // int32 datasize is verified rather than assumed.
        if blob_bytes.len() > i32::MAX as usize {
            return Err(PbfError::BlobTooLarge(blob_bytes.len()));
        }

        let mut header = fileformat::BlobHeader::new();
        header.set_field_type(self.blob_type.as_str().to_owned());
        header.set_datasize(blob_bytes.len() as i32);
        let header_bytes = header.write_to_bytes()?;

        let mut frame = Vec::with_capacity(4 + header_bytes.len() + blob_bytes.len());
        frame.write_u32::<BigEndian>(header_bytes.len() as u32)?;
        frame.extend_from_slice(&header_bytes);
        frame.extend_from_slice(&blob_bytes);
        Ok(frame)
    }
}

fn zlib_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PbfError::CompressionFailed {
            codec: "zlib",
            detail: e.to_string(),
        })
}

#[cfg(feature = "lz4")]
fn lz4_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    // Level 0 selects the fast path; 1..=16 select the HC compressor.
    // The raw_size field replaces lz4's own size prefix.
    let mode = if level == 0 {
        None
    } else {
        Some(lz4::block::CompressionMode::HIGHCOMPRESSION(level as i32))
    };
    lz4::block::compress(data, mode, false).map_err(|e| PbfError::CompressionFailed {
        codec: "lz4",
        detail: e.to_string(),
    })
}
