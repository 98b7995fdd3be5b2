//! End-to-end tests: drive the writer, decode the emitted byte stream and
//! check it against the input.

mod common;

use chrono::DateTime;

use common::*;
use pbf_scribe::models::{
    BoundingBox, Element, ElementType, FileHeader, Node, OsmUser, Relation, RelationMember, Tag,
    Way, WayNode,
};
use pbf_scribe::writers::{Compression, MetadataOptions, PbfWriter, PbfWriterOptions};

fn write_all(options: PbfWriterOptions, elements: Vec<Element>) -> Vec<u8> {
    let mut writer = PbfWriter::new(Vec::new(), options).unwrap();
    writer.write_all(elements).unwrap();
    writer.finish().unwrap()
}

fn plain_options() -> PbfWriterOptions {
    PbfWriterOptions {
        metadata: MetadataOptions::none(),
        compression: Compression::None,
        ..Default::default()
    }
}

fn node(id: i64, lat: f64, lon: f64) -> Node {
    Node {
        id,
        lat,
        lon,
        ..Default::default()
    }
}

#[test]
fn header_only_stream() {
    let header = FileHeader {
        generator: "t".to_string(),
        ..Default::default()
    };
    let mut writer = PbfWriter::new(Vec::new(), PbfWriterOptions::default()).unwrap();
    writer.write_header(&header).unwrap();
    let bytes = writer.finish().unwrap();

    let frames = read_frames(&bytes);
    assert_eq!(frames.len(), 1);
    let header_block = decode_header(&frames[0]);
    assert_eq!(
        header_block.get_required_features().to_vec(),
        vec!["OsmSchema-V0.6".to_string(), "DenseNodes".to_string()]
    );
    assert_eq!(header_block.get_writingprogram(), "t");
    assert!(!header_block.has_bbox());
}

#[test]
fn empty_input_emits_default_header_and_no_data() {
    let writer = PbfWriter::new(Vec::new(), PbfWriterOptions::default()).unwrap();
    let bytes = writer.finish().unwrap();

    let frames = read_frames(&bytes);
    assert_eq!(frames.len(), 1);
    let header_block = decode_header(&frames[0]);
    assert!(header_block.get_writingprogram().starts_with("pbf-scribe/"));
}

#[test]
fn header_carries_bbox_features_and_replication_info() {
    let header = FileHeader {
        boxes: vec![
            BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            BoundingBox::new(0.5, 2.5, 2.0, 5.0),
        ],
        generator: "gen".to_string(),
        sorting: Some("Type_then_ID".to_string()),
        multiple_object_versions: true,
        replication_timestamp: DateTime::from_timestamp(1_640_995_200, 0),
        replication_sequence_number: Some(4_711),
        replication_base_url: Some("https://planet.example/replication".to_string()),
    };

    let options = PbfWriterOptions {
        locations_on_ways: true,
        ..plain_options()
    };
    let mut writer = PbfWriter::new(Vec::new(), options).unwrap();
    writer.write_header(&header).unwrap();
    let bytes = writer.finish().unwrap();

    let header_block = decode_header(&read_frames(&bytes)[0]);
    assert_eq!(
        header_block.get_required_features().to_vec(),
        vec![
            "OsmSchema-V0.6".to_string(),
            "DenseNodes".to_string(),
            "HistoricalInformation".to_string()
        ]
    );
    assert_eq!(
        header_block.get_optional_features().to_vec(),
        vec![
            "LocationsOnWays".to_string(),
            "Sort.Type_then_ID".to_string()
        ]
    );

    // Joined envelope of both boxes, in nanodegrees.
    let bbox = header_block.get_bbox();
    assert_eq!(bbox.get_left(), 500_000_000);
    assert_eq!(bbox.get_bottom(), 2_000_000_000);
    assert_eq!(bbox.get_right(), 3_000_000_000);
    assert_eq!(bbox.get_top(), 5_000_000_000);

    assert_eq!(header_block.get_osmosis_replication_timestamp(), 1_640_995_200);
    assert_eq!(header_block.get_osmosis_replication_sequence_number(), 4_711);
    assert_eq!(
        header_block.get_osmosis_replication_base_url(),
        "https://planet.example/replication"
    );
}

#[test]
fn single_untagged_dense_node() {
    let bytes = write_all(plain_options(), vec![Element::Node(node(1, 0.0, 0.0))]);

    let blocks = data_blocks(&bytes);
    assert_eq!(blocks.len(), 1);
    let groups = blocks[0].get_primitivegroup();
    assert_eq!(groups.len(), 1);

    let dense = groups[0].get_dense();
    assert_eq!(dense.id, vec![1]);
    assert_eq!(dense.lat, vec![0]);
    assert_eq!(dense.lon, vec![0]);
    assert_eq!(dense.keys_vals, vec![0]);
    // String table still decodes index 0 to the empty string.
    assert_eq!(table_entry(&blocks[0], 0), "");
}

#[test]
fn dense_columns_are_delta_encoded() {
    let bytes = write_all(
        plain_options(),
        vec![
            Element::Node(node(10, 1.0, 2.0)),
            Element::Node(node(12, 1.0000002, 2.0000002)),
        ],
    );

    let blocks = data_blocks(&bytes);
    let dense = blocks[0].get_primitivegroup()[0].get_dense();
    assert_eq!(dense.id, vec![10, 2]);
    assert_eq!(dense.lat, vec![10_000_000, 2]);
    assert_eq!(dense.lon, vec![20_000_000, 2]);
    assert_eq!(dense.keys_vals, vec![0, 0]);
    assert_eq!(undelta(&dense.id), vec![10, 12]);
}

#[test]
fn way_refs_are_delta_encoded() {
    let way = Way {
        id: 5,
        nodes: vec![WayNode::new(10), WayNode::new(12), WayNode::new(10)],
        ..Default::default()
    };
    let bytes = write_all(plain_options(), vec![Element::Way(way)]);

    let blocks = data_blocks(&bytes);
    let ways = blocks[0].get_primitivegroup()[0].get_ways();
    assert_eq!(ways.len(), 1);
    assert_eq!(ways[0].get_id(), 5);
    assert_eq!(ways[0].refs, vec![10, 2, -2]);
    assert_eq!(undelta(&ways[0].refs), vec![10, 12, 10]);
    // No locations on ways unless configured.
    assert!(ways[0].lat.is_empty());
    assert!(ways[0].lon.is_empty());
}

#[test]
fn relation_members_roles_and_types() {
    let relation = Relation {
        id: 7,
        members: vec![
            RelationMember::new(ElementType::Way, 42, "outer"),
            RelationMember::new(ElementType::Node, 3, "via"),
        ],
        ..Default::default()
    };
    let bytes = write_all(plain_options(), vec![Element::Relation(relation)]);

    let blocks = data_blocks(&bytes);
    let relations = blocks[0].get_primitivegroup()[0].get_relations();
    assert_eq!(relations.len(), 1);
    let encoded = &relations[0];
    assert_eq!(encoded.get_id(), 7);

    let roles: Vec<String> = encoded
        .roles_sid
        .iter()
        .map(|&sid| table_entry(&blocks[0], sid as usize))
        .collect();
    assert_eq!(roles, vec!["outer".to_string(), "via".to_string()]);

    assert_eq!(encoded.memids, vec![42, -39]);
    assert_eq!(undelta(&encoded.memids), vec![42, 3]);
    assert_eq!(
        encoded.types,
        vec![
            pbf_scribe::proto::osmformat::Relation_MemberType::WAY,
            pbf_scribe::proto::osmformat::Relation_MemberType::NODE
        ]
    );
}

#[test]
fn block_splits_at_entity_cap() {
    let elements: Vec<Element> = (0..8001)
        .map(|i| Element::Node(node(i, 0.0, 0.0)))
        .collect();
    let bytes = write_all(plain_options(), elements);

    let blocks = data_blocks(&bytes);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].get_primitivegroup()[0].get_dense().id.len(), 8000);
    assert_eq!(blocks[1].get_primitivegroup()[0].get_dense().id.len(), 1);

    // The second block's delta chain restarts from zero.
    assert_eq!(blocks[1].get_primitivegroup()[0].get_dense().id, vec![8000]);
}

#[test]
fn switching_entity_kind_flushes_the_block() {
    let bytes = write_all(
        plain_options(),
        vec![
            Element::Node(node(1, 0.0, 0.0)),
            Element::Way(Way {
                id: 2,
                ..Default::default()
            }),
            Element::Node(node(3, 0.0, 0.0)),
        ],
    );

    let blocks = data_blocks(&bytes);
    assert_eq!(blocks.len(), 3);
    for block in &blocks {
        assert_eq!(block.get_primitivegroup().len(), 1);
    }
    assert!(blocks[0].get_primitivegroup()[0].has_dense());
    assert_eq!(blocks[1].get_primitivegroup()[0].get_ways().len(), 1);
    assert!(blocks[2].get_primitivegroup()[0].has_dense());
    // A way with no nodes still decodes to an empty refs column.
    assert!(blocks[1].get_primitivegroup()[0].get_ways()[0].refs.is_empty());
}

#[test]
fn metadata_round_trips_through_dense_info() {
    let options = PbfWriterOptions {
        compression: Compression::None,
        add_visible: true,
        ..Default::default()
    };

    let mut first = node(100, 51.5, -0.1);
    first.version = 3;
    first.changeset = 7_000_000;
    first.timestamp = DateTime::from_timestamp(1_577_836_800, 0);
    first.user = Some(OsmUser {
        id: 42,
        name: "alice".to_string(),
    });
    first.tags.push(Tag::new("amenity", "pub"));

    let mut second = node(101, 51.6, -0.2);
    second.version = 1;
    second.changeset = 7_000_100;
    second.timestamp = DateTime::from_timestamp(1_577_840_400, 0);
    second.user = Some(OsmUser {
        id: 43,
        name: "bob".to_string(),
    });
    second.visible = false;

    let bytes = write_all(
        options,
        vec![Element::Node(first), Element::Node(second)],
    );

    let blocks = data_blocks(&bytes);
    let block = &blocks[0];
    let dense = block.get_primitivegroup()[0].get_dense();
    let info = dense.get_denseinfo();

    assert_eq!(info.version, vec![3, 1]);
    assert_eq!(undelta(&info.timestamp), vec![1_577_836_800, 1_577_840_400]);
    assert_eq!(
        undelta(&info.changeset),
        vec![7_000_000, 7_000_100]
    );
    let uids: Vec<i64> = info.uid.iter().map(|&v| v as i64).collect();
    assert_eq!(undelta(&uids), vec![42, 43]);

    let user_sids: Vec<i64> = info.user_sid.iter().map(|&v| v as i64).collect();
    let users: Vec<String> = undelta(&user_sids)
        .iter()
        .map(|&sid| table_entry(block, sid as usize))
        .collect();
    assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(info.visible, vec![true, false]);

    // Tag indices resolve through the string table.
    assert_eq!(dense.keys_vals.len(), 4);
    assert_eq!(table_entry(block, dense.keys_vals[0] as usize), "amenity");
    assert_eq!(table_entry(block, dense.keys_vals[1] as usize), "pub");
    assert_eq!(dense.keys_vals[2], 0);
    assert_eq!(dense.keys_vals[3], 0);
}

#[test]
fn non_dense_nodes_carry_absolute_values() {
    let options = PbfWriterOptions {
        dense_nodes: false,
        ..plain_options()
    };
    let mut tagged = node(9, 52.5170365, 13.3888599);
    tagged.tags.push(Tag::new("name", "Berlin"));

    let bytes = write_all(options, vec![Element::Node(tagged)]);

    let blocks = data_blocks(&bytes);
    let nodes = blocks[0].get_primitivegroup()[0].get_nodes();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].get_id(), 9);
    assert_eq!(nodes[0].get_lat(), 525_170_365);
    assert_eq!(nodes[0].get_lon(), 133_888_599);
    assert_eq!(
        table_entry(&blocks[0], nodes[0].keys[0] as usize),
        "name"
    );
    assert_eq!(
        table_entry(&blocks[0], nodes[0].vals[0] as usize),
        "Berlin"
    );
}

#[test]
fn dense_on_and_off_are_reader_equal() {
    let elements = vec![
        Element::Node(node(1, 10.0, 20.0)),
        Element::Node(node(5, 10.5, 20.5)),
    ];

    let dense_bytes = write_all(plain_options(), elements.clone());
    let plain_bytes = write_all(
        PbfWriterOptions {
            dense_nodes: false,
            ..plain_options()
        },
        elements,
    );
    assert_ne!(dense_bytes, plain_bytes);

    let dense_blocks = data_blocks(&dense_bytes);
    let dense = dense_blocks[0].get_primitivegroup()[0].get_dense();
    let dense_ids = undelta(&dense.id);
    let dense_lats = undelta(&dense.lat);

    let plain_blocks = data_blocks(&plain_bytes);
    let nodes = plain_blocks[0].get_primitivegroup()[0].get_nodes();
    let plain_ids: Vec<i64> = nodes.iter().map(|n| n.get_id()).collect();
    let plain_lats: Vec<i64> = nodes.iter().map(|n| n.get_lat()).collect();

    assert_eq!(dense_ids, plain_ids);
    assert_eq!(dense_lats, plain_lats);
}

#[test]
fn locations_on_ways_emit_delta_encoded_columns() {
    let options = PbfWriterOptions {
        locations_on_ways: true,
        ..plain_options()
    };
    let way = Way {
        id: 8,
        nodes: vec![
            WayNode::with_location(1, 10.0, 20.0),
            WayNode::with_location(2, 10.0000001, 20.0000002),
        ],
        ..Default::default()
    };
    let bytes = write_all(options, vec![Element::Way(way)]);

    let blocks = data_blocks(&bytes);
    let ways = blocks[0].get_primitivegroup()[0].get_ways();
    assert_eq!(undelta(&ways[0].lat), vec![100_000_000, 100_000_001]);
    assert_eq!(undelta(&ways[0].lon), vec![200_000_000, 200_000_002]);
    assert_eq!(undelta(&ways[0].refs), vec![1, 2]);
}

#[test]
fn recompression_is_stable() {
    let elements: Vec<Element> = (0..500)
        .map(|i| {
            let mut n = node(i, i as f64 * 0.001, -(i as f64) * 0.002);
            n.tags.push(Tag::new("ref", i.to_string()));
            Element::Node(n)
        })
        .collect();

    let raw_bytes = write_all(plain_options(), elements.clone());
    let zlib_bytes = write_all(
        PbfWriterOptions {
            compression: Compression::Zlib,
            ..plain_options()
        },
        elements,
    );

    // Frame for frame, the decompressed payloads are identical to the
    // uncompressed encoding.
    let raw_frames = read_frames(&raw_bytes);
    let zlib_frames = read_frames(&zlib_bytes);
    assert_eq!(raw_frames.len(), zlib_frames.len());
    for (raw, zlib) in raw_frames.iter().zip(zlib_frames.iter()) {
        assert_eq!(raw.blob_type, zlib.blob_type);
        assert_eq!(raw.payload, zlib.payload);
    }
}

#[test]
fn blocks_preserve_input_order_across_the_pipeline() {
    // Enough kind switches to keep several compression tasks in flight.
    let mut elements = Vec::new();
    for i in 0..50i64 {
        elements.push(Element::Node(node(i, 0.0, 0.0)));
        elements.push(Element::Way(Way {
            id: i,
            ..Default::default()
        }));
    }
    let bytes = write_all(
        PbfWriterOptions {
            compression: Compression::Zlib,
            ..plain_options()
        },
        elements,
    );

    let blocks = data_blocks(&bytes);
    assert_eq!(blocks.len(), 100);
    for (i, pair) in blocks.chunks(2).enumerate() {
        assert_eq!(undelta(&pair[0].get_primitivegroup()[0].get_dense().id), vec![i as i64]);
        assert_eq!(pair[1].get_primitivegroup()[0].get_ways()[0].get_id(), i as i64);
    }
}
