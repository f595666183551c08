//! Tests for the reader options: skipped record types and the sample callback

mod common;

use byteorder::LittleEndian;
use common::*;
use perf_data_codec::constants::*;
use perf_data_codec::proto::PerfEventPayload;
use perf_data_codec::{PerfFileReader, ReaderOptions};

#[test]
fn test_sample_callback() {
    let data = sample_flat_file::<LittleEndian>();
    let mut ips = Vec::new();
    let options = ReaderOptions::new().on_sample(|event| {
        if let Some(PerfEventPayload::Sample(sample)) = &event.event {
            ips.push(sample.ip);
        }
    });
    let reader = PerfFileReader::read_from_bytes_with_options(&data, options).unwrap();
    assert_eq!(ips, vec![Some(0x7f00_0000_1234), Some(0x7f00_0000_1300)]);
    assert_eq!(reader.stats().num_sample_events, 2);
}

#[test]
fn test_skipped_samples_reach_the_callback() {
    let data = sample_flat_file::<LittleEndian>();
    let mut count = 0;
    let options = ReaderOptions::new()
        .skip_record_type(PERF_RECORD_SAMPLE)
        .on_sample(|_| count += 1);
    let reader = PerfFileReader::read_from_bytes_with_options(&data, options).unwrap();
    assert_eq!(count, 2);

    assert_eq!(reader.events().len(), 3);
    assert!(reader
        .events()
        .iter()
        .all(|event| !matches!(event.event, Some(PerfEventPayload::Sample(_)))));
    let stats = reader.stats();
    assert_eq!(stats.num_filtered_events, 2);
    assert_eq!(stats.num_sample_events, 0);
    assert_eq!(stats.num_events_read, 5);
}

#[test]
fn test_skip_several_types() {
    let data = sample_flat_file::<LittleEndian>();
    let options =
        ReaderOptions::new().skip_record_types([PERF_RECORD_COMM, PERF_RECORD_FINISHED_ROUND]);
    assert!(options.skips(PERF_RECORD_COMM));
    assert!(!options.skips(PERF_RECORD_SAMPLE));
    let reader = PerfFileReader::read_from_bytes_with_options(&data, options).unwrap();

    let types: Vec<u32> = reader
        .events()
        .iter()
        .map(|event| event.header.unwrap().r#type)
        .collect();
    assert_eq!(
        types,
        vec![PERF_RECORD_MMAP2, PERF_RECORD_SAMPLE, PERF_RECORD_SAMPLE]
    );
    assert_eq!(reader.stats().num_filtered_events, 2);
    assert_eq!(reader.stats().num_comm_events, 0);
}

#[test]
fn test_skipped_mmap2_still_provides_build_id() {
    let data = sample_flat_file::<LittleEndian>();
    let options = ReaderOptions::new().skip_record_type(PERF_RECORD_MMAP2);
    let reader = PerfFileReader::read_from_bytes_with_options(&data, options).unwrap();
    assert_eq!(reader.stats().num_mmap_events, 0);
    assert_eq!(reader.build_ids().len(), 1);
    assert_eq!(reader.build_ids()[0].filename, "/usr/lib/libc.so.6");
}
