use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;

use protobuf::{CodedOutputStream, Message};
use tracing::{debug, trace};

use crate::codecs::blob::{BlobType, SerializeBlob};
use crate::codecs::delta::DeltaEncoder;
use crate::codecs::dense_nodes::timestamp_seconds;
use crate::codecs::lonlat_to_int;
use crate::codecs::primitive_block::{GroupType, PrimitiveBlockEncoder};
use crate::error::{PbfError, Result};
use crate::models::{Element, ElementMeta, ElementType, FileHeader, Node, Relation, Tag, Way};
use crate::proto::osmformat;
use crate::writers::options::PbfWriterOptions;
use crate::writers::pipeline::{OutputQueue, SerializePool};

const NANODEGREE_RESOLUTION: f64 = 1e9;

const STRINGTABLE_FIELD: u32 = 1;
const PRIMITIVEGROUP_FIELD: u32 = 2;

/// A writer for creating PBF files.
///
/// Entities are buffered into primitive blocks; a full block is finalised
/// on the calling thread and handed to the serialisation pipeline, which
/// compresses blocks in parallel while preserving their order on disk.
///
/// Please note: according to the PBF specification you should write the
/// elements in the order node, way, relation, with ascending ids within
/// each type. `PbfWriter` emits elements in the order `write` is called
/// (modulo block boundaries), so ordering is up to the caller.
///
/// # Example
///
/// ```no_run
/// use pbf_scribe::models::{Element, Node};
/// use pbf_scribe::writers::{PbfWriter, PbfWriterOptions};
///
/// let mut writer =
///     PbfWriter::from_path("resources/output.pbf", PbfWriterOptions::default()).unwrap();
/// writer.write(Element::Node(Node::default())).unwrap();
/// writer.finish().unwrap();
/// ```
pub struct PbfWriter<W: Write + Send + 'static> {
    options: PbfWriterOptions,
    compression_level: u32,
    block: PrimitiveBlockEncoder,
    pool: SerializePool,
    queue: OutputQueue<W>,
    has_written_header: bool,
}

impl PbfWriter<BufWriter<File>> {
    /// Creates a new `PbfWriter` writing to a file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P, options: PbfWriterOptions) -> Result<Self> {
        let f = File::create(path)?;
        Self::new(BufWriter::new(f), options)
    }
}

impl<W: Write + Send + 'static> PbfWriter<W> {
    /// Creates a new `PbfWriter` from an existing writer. The options are
    /// validated here; an invalid compression level or codec mismatch
    /// aborts construction.
    pub fn new(writer: W, options: PbfWriterOptions) -> Result<Self> {
        let compression_level = options.resolved_compression_level()?;

        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .min(6);
        let pool = SerializePool::new(threads)?;
        let queue = OutputQueue::new(writer, threads * 4)?;

        Ok(Self {
            options,
            compression_level,
            block: PrimitiveBlockEncoder::new(),
            pool,
            queue,
            has_written_header: false,
        })
    }

    /// Writes the file header. Must happen before the first entity and at
    /// most once; writing an entity first emits a default header.
    pub fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        if self.has_written_header {
            return Err(PbfError::EncodingInvariant {
                context: "header",
                detail: "header already written".to_string(),
            });
        }

        let mut header_block = osmformat::HeaderBlock::new();

        if let Some(bbox) = header.joined_box() {
            let mut header_bbox = osmformat::HeaderBBox::new();
            header_bbox.set_left((bbox.left * NANODEGREE_RESOLUTION) as i64);
            header_bbox.set_right((bbox.right * NANODEGREE_RESOLUTION) as i64);
            header_bbox.set_top((bbox.top * NANODEGREE_RESOLUTION) as i64);
            header_bbox.set_bottom((bbox.bottom * NANODEGREE_RESOLUTION) as i64);
            header_block.set_bbox(header_bbox);
        }

        header_block
            .required_features
            .push("OsmSchema-V0.6".to_string());
        if self.options.dense_nodes {
            header_block
                .required_features
                .push("DenseNodes".to_string());
        }
        if header.multiple_object_versions {
            header_block
                .required_features
                .push("HistoricalInformation".to_string());
        }
        if self.options.locations_on_ways {
            header_block
                .optional_features
                .push("LocationsOnWays".to_string());
        }
        if header.sorting.as_deref() == Some("Type_then_ID") {
            header_block
                .optional_features
                .push("Sort.Type_then_ID".to_string());
        }

        header_block.set_writingprogram(header.generator.clone());

        if let Some(timestamp) = header.replication_timestamp {
            header_block
                .set_osmosis_replication_timestamp(timestamp.timestamp() as u32 as i64);
        }
        if let Some(sequence_number) = header.replication_sequence_number {
            header_block.set_osmosis_replication_sequence_number(sequence_number);
        }
        if let Some(base_url) = &header.replication_base_url {
            header_block.set_osmosis_replication_base_url(base_url.clone());
        }

        self.submit(header_block.write_to_bytes()?, BlobType::Header)?;
        self.has_written_header = true;
        Ok(())
    }

    /// Writes one entity. Elements are routed to the per-kind encoding
    /// paths; a kind switch or a full block flushes the current block
    /// first.
    pub fn write(&mut self, element: Element) -> Result<()> {
        self.ensure_header()?;
        match &element {
            Element::Node(node) => self.node(node),
            Element::Way(way) => self.way(way),
            Element::Relation(relation) => self.relation(relation),
        }
    }

    /// Writes a batch of elements in order.
    pub fn write_all<I>(&mut self, elements: I) -> Result<()>
    where
        I: IntoIterator<Item = Element>,
    {
        for element in elements {
            self.write(element)?;
        }
        Ok(())
    }

    /// Flushes the last block, drains the pipeline and hands back the
    /// underlying writer. Returns the first error the pipeline hit, at
    /// the position where it would have produced bytes.
    pub fn finish(mut self) -> Result<W> {
        self.ensure_header()?;
        self.store_primitive_block()?;
        debug!("finishing PBF stream");

        let Self {
            mut pool, queue, ..
        } = self;
        pool.shutdown();
        queue.finish()
    }

    fn ensure_header(&mut self) -> Result<()> {
        if !self.has_written_header {
            self.write_header(&FileHeader::default())?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        if self.options.dense_nodes {
            self.switch_primitive_block_type(GroupType::DenseNodes)?;
            self.block.add_dense_node(node, &self.options);
            return Ok(());
        }

        self.switch_primitive_block_type(GroupType::Nodes)?;

        let mut pbf_node = osmformat::Node::new();
        pbf_node.set_id(node.id);
        let (keys, vals) = self.encode_tags(node.tags());
        pbf_node.set_keys(keys);
        pbf_node.set_vals(vals);
        if let Some(info) = self.encode_info(node) {
            pbf_node.set_info(info);
        }
        pbf_node.set_lat(lonlat_to_int(node.lat));
        pbf_node.set_lon(lonlat_to_int(node.lon));

        self.block.append_entity(&pbf_node)
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        self.switch_primitive_block_type(GroupType::Ways)?;

        let mut pbf_way = osmformat::Way::new();
        pbf_way.set_id(way.id);
        let (keys, vals) = self.encode_tags(way.tags());
        pbf_way.set_keys(keys);
        pbf_way.set_vals(vals);
        if let Some(info) = self.encode_info(way) {
            pbf_way.set_info(info);
        }

        let mut delta_ref = DeltaEncoder::new();
        pbf_way.set_refs(
            way.nodes
                .iter()
                .map(|node_ref| delta_ref.update(node_ref.id))
                .collect(),
        );

        if self.options.locations_on_ways {
            let mut delta_lon = DeltaEncoder::new();
            pbf_way.set_lon(
                way.nodes
                    .iter()
                    .map(|n| delta_lon.update(lonlat_to_int(n.lon.unwrap_or(0.0))))
                    .collect(),
            );
            let mut delta_lat = DeltaEncoder::new();
            pbf_way.set_lat(
                way.nodes
                    .iter()
                    .map(|n| delta_lat.update(lonlat_to_int(n.lat.unwrap_or(0.0))))
                    .collect(),
            );
        }

        self.block.append_entity(&pbf_way)
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        self.switch_primitive_block_type(GroupType::Relations)?;

        let mut pbf_relation = osmformat::Relation::new();
        pbf_relation.set_id(relation.id);
        let (keys, vals) = self.encode_tags(relation.tags());
        pbf_relation.set_keys(keys);
        pbf_relation.set_vals(vals);
        if let Some(info) = self.encode_info(relation) {
            pbf_relation.set_info(info);
        }

        for member in &relation.members {
            pbf_relation
                .roles_sid
                .push(self.block.store_in_stringtable(&member.role));
        }

        let mut delta_memid = DeltaEncoder::new();
        for member in &relation.members {
            pbf_relation.memids.push(delta_memid.update(member.member_id));
        }

        for member in &relation.members {
            let member_type = match member.member_type {
                ElementType::Node => osmformat::Relation_MemberType::NODE,
                ElementType::Way => osmformat::Relation_MemberType::WAY,
                ElementType::Relation => osmformat::Relation_MemberType::RELATION,
            };
            pbf_relation.types.push(member_type);
        }

        self.block.append_entity(&pbf_relation)
    }

    /// Intern all tag keys and values, in tag order.
    fn encode_tags(&mut self, tags: &[Tag]) -> (Vec<u32>, Vec<u32>) {
        let mut keys = Vec::with_capacity(tags.len());
        let mut vals = Vec::with_capacity(tags.len());
        for tag in tags {
            keys.push(self.block.store_in_stringtable_unsigned(&tag.key));
            vals.push(self.block.store_in_stringtable_unsigned(&tag.value));
        }
        (keys, vals)
    }

    /// Build the Info submessage with the configured columns, or nothing
    /// when neither metadata nor the visible flag is requested.
    fn encode_info(&mut self, object: &impl ElementMeta) -> Option<osmformat::Info> {
        if !self.options.metadata.any() && !self.options.add_visible {
            return None;
        }

        let mut info = osmformat::Info::new();
        if self.options.metadata.version() {
            info.set_version(object.version());
        }
        if self.options.metadata.timestamp() {
            info.set_timestamp(timestamp_seconds(object.timestamp()));
        }
        if self.options.metadata.changeset() {
            info.set_changeset(object.changeset());
        }
        if self.options.metadata.uid() {
            info.set_uid(object.user().map(|u| u.id).unwrap_or(0));
        }
        if self.options.metadata.user() {
            let name = object.user().map(|u| u.name.as_str()).unwrap_or("");
            info.set_user_sid(self.block.store_in_stringtable_unsigned(name));
        }
        if self.options.add_visible {
            info.set_visible(object.visible());
        }
        Some(info)
    }

    fn switch_primitive_block_type(&mut self, group_type: GroupType) -> Result<()> {
        if !self.block.can_add(group_type) {
            self.store_primitive_block()?;
            self.block.reset(group_type);
        }
        Ok(())
    }

    /// Finalise the current block into a PrimitiveBlock payload and hand
    /// it to the pipeline. A no-op on an empty block.
    fn store_primitive_block(&mut self) -> Result<()> {
        if self.block.count() == 0 {
            return Ok(());
        }
        trace!(
            entities = self.block.count(),
            bytes = self.block.size(),
            "flushing primitive block"
        );

        let stringtable = self.block.stringtable_message().write_to_bytes()?;
        let group = self.block.take_group_data(&self.options)?;

        let mut payload = Vec::with_capacity(stringtable.len() + group.len() + 16);
        {
            let mut os = CodedOutputStream::vec(&mut payload);
            os.write_bytes(STRINGTABLE_FIELD, &stringtable)?;
            os.write_bytes(PRIMITIVEGROUP_FIELD, &group)?;
            os.flush()?;
        }
        self.submit(payload, BlobType::Data)
    }

    fn submit(&mut self, payload: Vec<u8>, blob_type: BlobType) -> Result<()> {
        let task = SerializeBlob::new(
            payload,
            blob_type,
            self.options.compression,
            self.compression_level,
        );
        let future = self.pool.submit(task)?;
        self.queue.push(future)
    }
}
