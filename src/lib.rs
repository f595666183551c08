//! A reader and writer for the perf.data file format.
//!
//! Files of this format consist of a header, a table of event attributes, a
//! data section, and a few supplemental "feature" sections. The data section
//! contains the main content of the file: a sequence of records. Some records
//! come from the kernel (samples, mmaps, forks, ...), others are synthesized
//! by perf itself (auxtrace, thread maps, stat records, ...).
//!
//! [`PerfFileReader`] parses a complete file, flat or piped, in either byte
//! order, into a [`PerfDataProto`](proto::PerfDataProto): a structured
//! representation which can be encoded as protobuf with [`prost`]. The same
//! representation can be written back to a flat perf.data file with
//! [`PerfFileWriter`], and reading that file again gives the same events and
//! metadata.
//!
//! # Example
//!
//! ```no_run
//! use perf_data_codec::proto::PerfEventPayload;
//! use perf_data_codec::{PerfFileReader, ReaderOptions};
//!
//! # fn wrapper() -> Result<(), perf_data_codec::Error> {
//! let data = std::fs::read("perf.data")?;
//! let mut sample_count = 0;
//! let options = ReaderOptions::new().on_sample(|_| sample_count += 1);
//! let reader = PerfFileReader::read_from_bytes_with_options(&data, options)?;
//!
//! for event in reader.events() {
//!     if let Some(PerfEventPayload::Comm(comm)) = &event.event {
//!         println!("pid {} is called {}", comm.pid, comm.comm);
//!     }
//! }
//! println!("{sample_count} samples, stats: {:?}", reader.stats());
//!
//! // Converting back gives a flat perf.data file.
//! std::fs::write("perf.data.copy", reader.write_to_vec()?)?;
//! # Ok(())
//! # }
//! ```

mod attr;
mod build_id;
pub mod codec;
pub mod constants;
#[cfg(feature = "zstd")]
mod decompression;
mod error;
mod feature_sections;
pub mod features;
mod file_reader;
mod file_writer;
mod header;
pub mod proto;
pub mod sample_info;
mod section;
mod serializer;
mod stats;

/// This is a re-export of the linux-perf-event-reader crate. We use its types
/// in our public API.
pub use linux_perf_event_reader;

pub use linux_perf_event_reader::Endianness;

pub use attr::{parse_perf_event_attr, write_perf_event_attr, PERF_EVENT_ATTR_SIZE};
pub use build_id::BuildIdEvent;
pub use codec::{ByteCursor, ByteWriter};
pub use error::{Error, ReadError};
pub use feature_sections::{expand_cpu_list, AttributeDescription};
pub use features::{Feature, FeatureSet, FeatureSetIterAll};
pub use file_reader::{PerfFileReader, ReaderOptions};
pub use file_writer::PerfFileWriter;
pub use header::{PerfHeader, PerfPipeHeader};
pub use sample_info::SampleInfoReader;
pub use section::PerfFileSection;
pub use serializer::{EventSerializer, RecordClass};
