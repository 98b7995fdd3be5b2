//! The OSM object model accepted by the writer.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PbfError;

/// A single key/value tag on an OSM object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsmUser {
    pub id: i32,
    pub name: String,
}

/// An OSM entity. The writer dispatches on this with an exhaustive match;
/// each variant has its own encoding path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl FromStr for ElementType {
    type Err = PbfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementType::Node),
            "way" => Ok(ElementType::Way),
            "relation" => Ok(ElementType::Relation),
            _ => Err(PbfError::invalid_option(
                "element_type",
                format!("unknown element type: {}", s),
            )),
        }
    }
}

/// A node with its location in degrees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset: i64,
    pub visible: bool,
    pub tags: Vec<Tag>,
    pub lat: f64,
    pub lon: f64,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            id: 0,
            version: 0,
            timestamp: None,
            user: None,
            changeset: 0,
            visible: true,
            tags: Vec::new(),
            lat: 0.0,
            lon: 0.0,
        }
    }
}

/// A node reference on a way. Coordinates are present only when the
/// producer supplies locations, which the `locations_on_ways` output
/// option requires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct WayNode {
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl WayNode {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            lat: None,
            lon: None,
        }
    }

    pub fn with_location(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat: Some(lat),
            lon: Some(lon),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Way {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset: i64,
    pub visible: bool,
    pub tags: Vec<Tag>,
    pub nodes: Vec<WayNode>,
}

impl Default for Way {
    fn default() -> Self {
        Self {
            id: 0,
            version: 0,
            timestamp: None,
            user: None,
            changeset: 0,
            visible: true,
            tags: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationMember {
    pub member_id: i64,
    pub member_type: ElementType,
    pub role: String,
}

impl RelationMember {
    pub fn new(member_type: ElementType, member_id: i64, role: impl Into<String>) -> Self {
        Self {
            member_id,
            member_type,
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub version: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub user: Option<OsmUser>,
    pub changeset: i64,
    pub visible: bool,
    pub tags: Vec<Tag>,
    pub members: Vec<RelationMember>,
}

impl Default for Relation {
    fn default() -> Self {
        Self {
            id: 0,
            version: 0,
            timestamp: None,
            user: None,
            changeset: 0,
            visible: true,
            tags: Vec::new(),
            members: Vec::new(),
        }
    }
}

/// Uniform access to the fields shared by all OSM entities. The metadata
/// encoder is written against this trait so nodes, ways and relations all
/// go through the same code path.
pub trait ElementMeta {
    fn id(&self) -> i64;
    fn version(&self) -> i32;
    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn changeset(&self) -> i64;
    fn user(&self) -> Option<&OsmUser>;
    fn visible(&self) -> bool;
    fn tags(&self) -> &[Tag];
}

impl ElementMeta for Node {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn changeset(&self) -> i64 {
        self.changeset
    }

    fn user(&self) -> Option<&OsmUser> {
        self.user.as_ref()
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl ElementMeta for Way {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn changeset(&self) -> i64 {
        self.changeset
    }

    fn user(&self) -> Option<&OsmUser> {
        self.user.as_ref()
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl ElementMeta for Relation {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn changeset(&self) -> i64 {
        self.changeset
    }

    fn user(&self) -> Option<&OsmUser> {
        self.user.as_ref()
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

/// A bounding box in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl BoundingBox {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// The smallest box containing both `self` and `other`.
    pub fn join(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }
}

/// File-level metadata emitted in the OSMHeader blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub boxes: Vec<BoundingBox>,
    pub generator: String,
    /// Value of the "sorting" property, e.g. "Type_then_ID".
    pub sorting: Option<String>,
    /// True when the input contains multiple versions of the same object,
    /// i.e. a history file.
    pub multiple_object_versions: bool,
    pub replication_timestamp: Option<DateTime<Utc>>,
    pub replication_sequence_number: Option<i64>,
    pub replication_base_url: Option<String>,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            boxes: Vec::new(),
            generator: concat!("pbf-scribe/", env!("CARGO_PKG_VERSION")).to_string(),
            sorting: None,
            multiple_object_versions: false,
            replication_timestamp: None,
            replication_sequence_number: None,
            replication_base_url: None,
        }
    }
}

impl FileHeader {
    /// The joined envelope of all bounding boxes, if any.
    pub fn joined_box(&self) -> Option<BoundingBox> {
        let mut iter = self.boxes.iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, b| acc.join(b)))
    }
}
