//! Tests for writing perf.data files and reading them back

mod common;

use byteorder::{BigEndian, LittleEndian};
use common::*;
use perf_data_codec::features::*;
use perf_data_codec::proto::*;
use perf_data_codec::{
    Endianness, PerfFileReader, PerfFileSection, PerfFileWriter, PerfHeader,
};

#[test]
fn test_round_trip() {
    let original = PerfFileReader::read_from_bytes(&sample_flat_file::<LittleEndian>()).unwrap();
    let written = original.write_to_vec().unwrap();
    let reread = PerfFileReader::read_from_bytes(&written).unwrap();

    assert_eq!(reread.attrs(), original.attrs());
    assert_eq!(reread.events(), original.events());
    assert_eq!(reread.event_types(), original.event_types());
    assert_eq!(reread.build_ids(), original.build_ids());
    assert_eq!(reread.string_metadata(), original.string_metadata());
    assert_eq!(reread.uint32_metadata(), original.uint32_metadata());
    assert_eq!(reread.stats().num_events_read, original.stats().num_events_read);
    assert_eq!(reread.stats().num_size_mismatches, 0);

    // The build id of the mmap2 is written as a build id feature.
    assert!(!original.metadata_mask().has_feature(HEADER_BUILD_ID));
    assert!(reread.metadata_mask().has_feature(HEADER_BUILD_ID));
}

#[test]
fn test_writing_is_stable() {
    let original = PerfFileReader::read_from_bytes(&sample_flat_file::<LittleEndian>()).unwrap();
    let first = original.write_to_vec().unwrap();
    let second = PerfFileReader::read_from_bytes(&first)
        .unwrap()
        .write_to_vec()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_layout_of_written_file() {
    let original = PerfFileReader::read_from_bytes(&sample_flat_file::<LittleEndian>()).unwrap();
    let written = original.write_to_vec().unwrap();
    let header = PerfHeader::parse(&written[..]).unwrap();
    header.validate(written.len() as u64).unwrap();

    assert_eq!(header.attr_size, 152);
    assert_eq!(header.attr_section.size, 152);
    assert_eq!(header.event_types_section, PerfFileSection::default());
    // The ids of the single attr come first.
    assert_eq!(header.attr_section.offset, PerfHeader::STRUCT_SIZE + 8);

    let features: Vec<u32> = header.features.iter().collect();
    assert_eq!(
        features,
        vec![
            HEADER_BUILD_ID,
            HEADER_HOSTNAME,
            HEADER_NRCPUS,
            HEADER_CMDLINE,
            HEADER_EVENT_DESC,
            HEADER_BRANCH_STACK
        ]
    );

    let index_start = header.data_section.end().unwrap() as usize;
    let mut index = &written[index_start..];
    let mut sections = Vec::new();
    for _ in &features {
        sections.push(PerfFileSection::parse::<_, LittleEndian>(&mut index).unwrap());
    }
    let branch_stack = sections[features.len() - 1];
    assert_eq!(branch_stack.size, 0);
    for pair in sections.windows(2) {
        assert_eq!(pair[0].end(), Some(pair[1].offset));
    }
    assert_eq!(sections[features.len() - 2].end(), Some(written.len() as u64));
}

#[test]
fn test_big_endian_is_written_big_endian() {
    let original = PerfFileReader::read_from_bytes(&sample_flat_file::<BigEndian>()).unwrap();
    assert_eq!(original.endian(), Endianness::BigEndian);
    let written = original.write_to_vec().unwrap();
    assert_eq!(&written[..8], b"2ELIFREP");

    let reread = PerfFileReader::read_from_bytes(&written).unwrap();
    assert_eq!(reread.endian(), Endianness::BigEndian);
    assert_eq!(reread.events(), original.events());
    assert_eq!(reread.attrs(), original.attrs());

    let little = PerfFileWriter::new(Endianness::LittleEndian)
        .write(original.proto())
        .unwrap();
    let reread_little = PerfFileReader::read_from_bytes(&little).unwrap();
    assert_eq!(reread_little.events(), original.events());
}

#[test]
fn test_protobuf_encoding() {
    let original = PerfFileReader::read_from_bytes(&sample_flat_file::<LittleEndian>()).unwrap();
    let encoded = original.to_proto_bytes();
    let decoded = PerfFileReader::from_proto_bytes(&encoded).unwrap();
    assert_eq!(decoded.proto(), original.proto());
    assert_eq!(decoded.write_to_vec().unwrap(), original.write_to_vec().unwrap());
    assert!(PerfFileReader::from_proto_bytes(&[0xff, 0xff, 0xff]).is_err());
}

#[test]
fn test_write_from_proto() {
    let proto = PerfDataProto {
        file_attrs: vec![PerfFileAttr {
            attr: Some(attr(0)),
            ids: vec![9],
        }],
        events: vec![PerfEvent {
            header: Some(EventHeader {
                r#type: perf_data_codec::constants::PERF_RECORD_EXIT,
                misc: 0,
                size: 0,
            }),
            event: Some(PerfEventPayload::Exit(ForkEvent {
                pid: 5,
                ppid: 1,
                tid: 5,
                ptid: 1,
                fork_time_ns: 77,
                sample_info: Some(SampleInfo {
                    pid: Some(5),
                    tid: Some(5),
                    sample_time_ns: Some(77),
                    id: Some(9),
                    stream_id: None,
                    cpu: Some(2),
                }),
            })),
            timestamp: Some(77),
        }],
        numa_topology: vec![NumaNode {
            id: 0,
            total_memory: 1 << 20,
            free_memory: 1 << 19,
            cpu_list: "0-7".to_string(),
        }],
        ..Default::default()
    };
    let written = PerfFileReader::from_proto(proto.clone()).write_to_vec().unwrap();
    assert_eq!(&written[..8], b"PERFILE2");

    let reread = PerfFileReader::read_from_bytes(&written).unwrap();
    assert_eq!(reread.numa_topology(), proto.numa_topology.as_slice());
    assert_eq!(reread.stats().num_exit_events, 1);
    let event = &reread.events()[0];
    // The header size is recomputed from the contents.
    assert_eq!(event.header.unwrap().size, 8 + 24 + 32);
    assert_eq!(event.event, proto.events[0].event);
}

#[test]
fn test_write_to_file() {
    let original = PerfFileReader::read_from_bytes(&sample_flat_file::<LittleEndian>()).unwrap();
    let path = std::env::temp_dir().join(format!("perf-data-codec-{}.data", std::process::id()));
    original.write_file(&path).unwrap();
    let reread = PerfFileReader::read_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(reread.events(), original.events());
}
