use crate::codecs::delta::DeltaEncoder;
use crate::codecs::lonlat_to_int;
use crate::codecs::string_table::StringTable;
use crate::error::{PbfError, Result};
use crate::models::Node;
use crate::proto::osmformat;
use crate::writers::options::PbfWriterOptions;

/// Packs any number of nodes into one DenseNodes message: parallel
/// delta-encoded columns plus the flat keys_vals stream. Only the columns
/// selected by the writer options are accumulated; versions are absolute
/// and visibles are plain bools, everything else is a delta stream with
/// its own encoder.
pub(crate) struct DenseNodesBuilder {
    ids: Vec<i64>,

    versions: Vec<i32>,
    timestamps: Vec<i64>,
    changesets: Vec<i64>,
    uids: Vec<i32>,
    user_sids: Vec<i32>,
    visibles: Vec<bool>,

    lats: Vec<i64>,
    lons: Vec<i64>,
    keys_vals: Vec<i32>,

    delta_id: DeltaEncoder,
    delta_timestamp: DeltaEncoder,
    delta_changeset: DeltaEncoder,
    delta_uid: DeltaEncoder,
    delta_user_sid: DeltaEncoder,
    delta_lat: DeltaEncoder,
    delta_lon: DeltaEncoder,
}

impl DenseNodesBuilder {
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            versions: Vec::new(),
            timestamps: Vec::new(),
            changesets: Vec::new(),
            uids: Vec::new(),
            user_sids: Vec::new(),
            visibles: Vec::new(),
            lats: Vec::new(),
            lons: Vec::new(),
            keys_vals: Vec::new(),
            delta_id: DeltaEncoder::new(),
            delta_timestamp: DeltaEncoder::new(),
            delta_changeset: DeltaEncoder::new(),
            delta_uid: DeltaEncoder::new(),
            delta_user_sid: DeltaEncoder::new(),
            delta_lat: DeltaEncoder::new(),
            delta_lon: DeltaEncoder::new(),
        }
    }

    /// Conservative lower bound on the serialised size, used for the
    /// block-full check.
    pub fn size(&self) -> usize {
        self.ids.len() * 3 * std::mem::size_of::<i64>()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn add_node(
        &mut self,
        node: &Node,
        strings: &mut StringTable,
        options: &PbfWriterOptions,
    ) {
        self.ids.push(self.delta_id.update(node.id));

        if options.metadata.version() {
            self.versions.push(node.version);
        }
        if options.metadata.timestamp() {
            let seconds = timestamp_seconds(node.timestamp);
            self.timestamps.push(self.delta_timestamp.update(seconds));
        }
        if options.metadata.changeset() {
            self.changesets.push(self.delta_changeset.update(node.changeset));
        }
        if options.metadata.uid() {
            let uid = node.user.as_ref().map(|u| u.id).unwrap_or(0);
            self.uids.push(self.delta_uid.update(uid as i64) as i32);
        }
        if options.metadata.user() {
            let name = node.user.as_ref().map(|u| u.name.as_str()).unwrap_or("");
            let sid = strings.add(name);
            self.user_sids.push(self.delta_user_sid.update(sid as i64) as i32);
        }
        if options.add_visible {
            self.visibles.push(node.visible);
        }

        self.lats.push(self.delta_lat.update(lonlat_to_int(node.lat)));
        self.lons.push(self.delta_lon.update(lonlat_to_int(node.lon)));

        for tag in &node.tags {
            self.keys_vals.push(strings.add(&tag.key));
            self.keys_vals.push(strings.add(&tag.value));
        }
        self.keys_vals.push(0);
    }

    /// Assemble the DenseNodes message, with a DenseInfo sub-message iff
    /// any metadata column or the visible flag is configured.
    pub fn into_message(self, options: &PbfWriterOptions) -> Result<osmformat::DenseNodes> {
        let count = self.ids.len();
        self.check_arity(count)?;

        let mut dense = osmformat::DenseNodes::new();
        dense.id = self.ids;

        if options.metadata.any() || options.add_visible {
            let mut info = osmformat::DenseInfo::new();
            info.version = self.versions;
            info.timestamp = self.timestamps;
            info.changeset = self.changesets;
            info.uid = self.uids;
            info.user_sid = self.user_sids;
            info.visible = self.visibles;
            dense.set_denseinfo(info);
        }

        dense.lat = self.lats;
        dense.lon = self.lons;
        dense.keys_vals = self.keys_vals;
        Ok(dense)
    }

    fn check_arity(&self, count: usize) -> Result<()> {
        let columns = [
            ("lat", self.lats.len()),
            ("lon", self.lons.len()),
            ("version", self.versions.len()),
            ("timestamp", self.timestamps.len()),
            ("changeset", self.changesets.len()),
            ("uid", self.uids.len()),
            ("user_sid", self.user_sids.len()),
            ("visible", self.visibles.len()),
        ];
        for (name, len) in columns {
            if len != 0 && len != count {
                return Err(PbfError::EncodingInvariant {
                    context: "DenseNodes",
                    detail: format!("column {} has {} entries for {} nodes", name, len, count),
                });
            }
        }
        Ok(())
    }
}

/// Timestamps go through a u32 cast before widening to i64, matching the
/// established on-disk behaviour of other writers (which wraps in 2038).
pub(crate) fn timestamp_seconds(timestamp: Option<chrono::DateTime<chrono::Utc>>) -> i64 {
    timestamp.map(|t| t.timestamp() as u32 as i64).unwrap_or(0)
}
