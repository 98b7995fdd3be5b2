//! Decode helpers for inspecting writer output in tests. This is a
//! deliberately minimal frame reader; reading PBF is otherwise out of
//! scope for the crate.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use protobuf::Message;

use pbf_scribe::proto::{fileformat, osmformat};

pub struct Frame {
    pub blob_type: String,
    /// Decompressed blob payload.
    pub payload: Vec<u8>,
}

/// Split a PBF byte stream into frames, checking the envelope invariants
/// along the way: the 4-byte big-endian length prefix matches the
/// BlobHeader, datasize matches the Blob, and raw_size matches the
/// decompressed payload.
pub fn read_frames(bytes: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let header_len = {
            let mut prefix = &rest[..4];
            prefix.read_u32::<BigEndian>().unwrap() as usize
        };
        let header: fileformat::BlobHeader =
            Message::parse_from_bytes(&rest[4..4 + header_len]).unwrap();

        let datasize = header.get_datasize() as usize;
        let blob_bytes = &rest[4 + header_len..4 + header_len + datasize];
        let blob: fileformat::Blob = Message::parse_from_bytes(blob_bytes).unwrap();

        let payload = if blob.has_raw() {
            blob.get_raw().to_vec()
        } else if blob.has_zlib_data() {
            let mut decoder = ZlibDecoder::new(blob.get_zlib_data());
            let mut payload = Vec::new();
            decoder.read_to_end(&mut payload).unwrap();
            assert_eq!(payload.len(), blob.get_raw_size() as usize);
            payload
        } else {
            panic!("blob carries no supported data field");
        };

        frames.push(Frame {
            blob_type: header.get_field_type().to_string(),
            payload,
        });
        rest = &rest[4 + header_len + datasize..];
    }
    frames
}

pub fn decode_header(frame: &Frame) -> osmformat::HeaderBlock {
    assert_eq!(frame.blob_type, "OSMHeader");
    Message::parse_from_bytes(&frame.payload).unwrap()
}

pub fn decode_block(frame: &Frame) -> osmformat::PrimitiveBlock {
    assert_eq!(frame.blob_type, "OSMData");
    Message::parse_from_bytes(&frame.payload).unwrap()
}

/// Data frames of a stream, decoded.
pub fn data_blocks(bytes: &[u8]) -> Vec<osmformat::PrimitiveBlock> {
    read_frames(bytes)
        .iter()
        .filter(|f| f.blob_type == "OSMData")
        .map(decode_block)
        .collect()
}

/// Reverse a delta stream into absolute values.
pub fn undelta(deltas: &[i64]) -> Vec<i64> {
    let mut absolute = 0i64;
    deltas
        .iter()
        .map(|d| {
            absolute += d;
            absolute
        })
        .collect()
}

/// Look up a string-table entry as UTF-8.
pub fn table_entry(block: &osmformat::PrimitiveBlock, index: usize) -> String {
    String::from_utf8(block.get_stringtable().get_s()[index].clone()).unwrap()
}
