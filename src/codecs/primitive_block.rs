use protobuf::{CodedOutputStream, Message};

use crate::codecs::dense_nodes::DenseNodesBuilder;
use crate::codecs::string_table::StringTable;
use crate::codecs::MAX_UNCOMPRESSED_BLOB_SIZE;
use crate::error::Result;
use crate::models::Node;
use crate::proto::osmformat;
use crate::writers::options::PbfWriterOptions;

/// Maximum number of entities in a primitive block. Osmosis and other
/// established writers use at most 8k entities per block, and readers are
/// tuned for it.
pub(crate) const MAX_ENTITIES_PER_BLOCK: usize = 8000;

/// The block is filled to about 95% and then written out. This leaves
/// more than enough space for the string table, which typically needs
/// about 0.1 to 0.3% of the block size.
const MAX_USED_BLOB_SIZE: usize = MAX_UNCOMPRESSED_BLOB_SIZE / 100 * 95;

/// The kind of content a PrimitiveGroup carries. A group holds exactly
/// one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupType {
    Unknown,
    DenseNodes,
    Nodes,
    Ways,
    Relations,
}

impl GroupType {
    /// PrimitiveGroup field number for entity submessages of this kind.
    fn entity_field(self) -> u32 {
        match self {
            GroupType::Nodes => 1,
            GroupType::Ways => 3,
            GroupType::Relations => 4,
            GroupType::Unknown | GroupType::DenseNodes => {
                unreachable!("no per-entity submessage for this group type")
            }
        }
    }
}

const DENSE_FIELD: u32 = 2;

/// Accumulates entities of one group type into a serialised
/// PrimitiveGroup buffer, together with the block's string table and, for
/// dense nodes, the column packer. Tracks fullness against both the
/// entity cap and the blob size limit.
pub(crate) struct PrimitiveBlockEncoder {
    group_buf: Vec<u8>,
    strings: StringTable,
    dense_nodes: Option<DenseNodesBuilder>,
    group_type: GroupType,
    count: usize,
}

impl PrimitiveBlockEncoder {
    pub fn new() -> Self {
        Self {
            group_buf: Vec::new(),
            strings: StringTable::new(),
            dense_nodes: None,
            group_type: GroupType::Unknown,
            count: 0,
        }
    }

    pub fn group_type(&self) -> GroupType {
        self.group_type
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn size(&self) -> usize {
        self.group_buf.len()
            + self.strings.size()
            + self.dense_nodes.as_ref().map(|d| d.size()).unwrap_or(0)
    }

    pub fn can_add(&self, group_type: GroupType) -> bool {
        if group_type != self.group_type {
            return false;
        }
        if self.count >= MAX_ENTITIES_PER_BLOCK {
            return false;
        }
        self.size() < MAX_USED_BLOB_SIZE
    }

    pub fn reset(&mut self, group_type: GroupType) {
        self.group_buf.clear();
        self.strings.clear();
        self.dense_nodes = None;
        self.group_type = group_type;
        self.count = 0;
    }

    pub fn store_in_stringtable(&mut self, s: &str) -> i32 {
        self.strings.add(s)
    }

    pub fn store_in_stringtable_unsigned(&mut self, s: &str) -> u32 {
        self.strings.add_unsigned(s)
    }

    /// Serialise one Node/Way/Relation submessage into the group buffer.
    pub fn append_entity<M: Message>(&mut self, entity: &M) -> Result<()> {
        let bytes = entity.write_to_bytes()?;
        let field = self.group_type.entity_field();
        append_length_delimited(&mut self.group_buf, field, &bytes)?;
        self.count += 1;
        Ok(())
    }

    pub fn add_dense_node(&mut self, node: &Node, options: &PbfWriterOptions) {
        let dense = self.dense_nodes.get_or_insert_with(DenseNodesBuilder::new);
        dense.add_node(node, &mut self.strings, options);
        self.count += 1;
    }

    /// Finalise the group: flush the dense-nodes packer (if any) into the
    /// buffer and hand the assembled PrimitiveGroup bytes over. The
    /// encoder is left empty; `reset` must run before further use.
    pub fn take_group_data(&mut self, options: &PbfWriterOptions) -> Result<Vec<u8>> {
        if self.group_type == GroupType::DenseNodes {
            if let Some(dense) = self.dense_nodes.take() {
                let bytes = dense.into_message(options)?.write_to_bytes()?;
                append_length_delimited(&mut self.group_buf, DENSE_FIELD, &bytes)?;
            }
        }
        Ok(std::mem::take(&mut self.group_buf))
    }

    pub fn stringtable_message(&self) -> osmformat::StringTable {
        self.strings.to_message()
    }
}

fn append_length_delimited(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) -> Result<()> {
    let mut os = CodedOutputStream::vec(buf);
    os.write_bytes(field, bytes)?;
    os.flush()?;
    Ok(())
}
