use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use linear_map::LinearMap;
use linux_perf_event_reader::{Endianness, PerfEventHeader, RecordType};
use prost::Message;

use super::attr::{parse_perf_event_attr, peek_attr_size};
use super::build_id::BuildIdEvent;
use super::codec::ByteCursor;
use super::constants::*;
#[cfg(feature = "zstd")]
use super::decompression::ZstdDecompressor;
use super::error::{Error, ReadError};
use super::feature_sections::{
    parse_u32_values, parse_u64_values, AttributeDescription, CpuTopologySection,
    GroupDescSection, HeaderString, HeaderStringList, HybridTopologySection,
    NumaTopologySection, PmuMappings,
};
use super::features::{Feature, FeatureSet};
use super::file_writer::PerfFileWriter;
use super::header::{PerfHeader, PerfPipeHeader};
use super::proto::*;
use super::section::PerfFileSection;
use super::serializer::EventSerializer;
use super::stats;

type SampleCallback<'a> = Box<dyn FnMut(&PerfEvent) + 'a>;

/// Options for reading a perf.data file.
///
/// ```
/// use perf_data_codec::{constants::PERF_RECORD_SAMPLE, ReaderOptions};
///
/// let mut sample_count = 0;
/// let options = ReaderOptions::new()
///     .skip_record_type(PERF_RECORD_SAMPLE)
///     .on_sample(|_sample| sample_count += 1);
/// # drop(options);
/// ```
#[derive(Default)]
pub struct ReaderOptions<'a> {
    skip_types: HashSet<u32>,
    sample_callback: Option<SampleCallback<'a>>,
}

impl<'a> ReaderOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves records of `record_type` out of the retained events. They are
    /// still parsed, and samples are still passed to the sample callback.
    pub fn skip_record_type(mut self, record_type: u32) -> Self {
        self.skip_types.insert(record_type);
        self
    }

    pub fn skip_record_types(mut self, record_types: impl IntoIterator<Item = u32>) -> Self {
        self.skip_types.extend(record_types);
        self
    }

    /// Registers a callback which is invoked once for every decoded sample,
    /// in file order.
    pub fn on_sample(mut self, callback: impl FnMut(&PerfEvent) + 'a) -> Self {
        self.sample_callback = Some(Box::new(callback));
        self
    }

    pub fn skips(&self, record_type: u32) -> bool {
        self.skip_types.contains(&record_type)
    }
}

impl fmt::Debug for ReaderOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("skip_types", &self.skip_types)
            .field("has_sample_callback", &self.sample_callback.is_some())
            .finish()
    }
}

/// A perf.data file, parsed into its structured representation.
///
/// Both the flat format written by `perf record -o file` and the piped format
/// written by `perf record -o -` are supported, in either byte order.
/// Writing always produces a flat file.
///
/// # Example
///
/// ```no_run
/// use perf_data_codec::PerfFileReader;
///
/// # fn wrapper() -> Result<(), perf_data_codec::Error> {
/// let reader = PerfFileReader::read_file("perf.data")?;
/// println!(
///     "{} attributes, {} events, hostname {:?}",
///     reader.attrs().len(),
///     reader.events().len(),
///     reader.string_metadata().and_then(|m| m.hostname.as_deref())
/// );
/// reader.write_file("perf.data.rewritten")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PerfFileReader {
    proto: PerfDataProto,
    endian: Endianness,
    is_piped_input: bool,
}

impl PerfFileReader {
    pub fn read_from_bytes(data: &[u8]) -> Result<Self, Error> {
        Self::read_from_bytes_with_options(data, ReaderOptions::default())
    }

    pub fn read_from_bytes_with_options(
        data: &[u8],
        options: ReaderOptions<'_>,
    ) -> Result<Self, Error> {
        let pipe_header = PerfPipeHeader::parse(data)?;
        let endian = pipe_header.endian;
        if pipe_header.is_pipe() {
            log::debug!("Reading {} bytes of piped perf data, {endian:?}", data.len());
            let proto = match endian {
                Endianness::LittleEndian => read_piped::<LittleEndian>(data, endian, options),
                Endianness::BigEndian => read_piped::<BigEndian>(data, endian, options),
            }?;
            return Ok(Self {
                proto,
                endian,
                is_piped_input: true,
            });
        }

        let header = PerfHeader::parse(data)?;
        log::debug!(
            "Reading {} bytes of flat perf data, {endian:?}, attrs at {:?}, data at {:?}, features {:?}",
            data.len(),
            header.attr_section,
            header.data_section,
            header.features
        );
        let proto = match endian {
            Endianness::LittleEndian => read_flat::<LittleEndian>(data, &header, options),
            Endianness::BigEndian => read_flat::<BigEndian>(data, &header, options),
        }?;
        Ok(Self {
            proto,
            endian,
            is_piped_input: false,
        })
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::read_from_bytes(&std::fs::read(path)?)
    }

    /// Reads the whole input from `reader`, e.g. a pipe.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::read_from_bytes(&data)
    }

    /// Wraps a structured representation, for example one that was decoded
    /// from protobuf bytes, so that it can be written as a perf.data file.
    /// The file is written in little-endian byte order.
    pub fn from_proto(proto: PerfDataProto) -> Self {
        Self {
            proto,
            endian: Endianness::LittleEndian,
            is_piped_input: false,
        }
    }

    pub fn from_proto_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::from_proto(PerfDataProto::decode(bytes)?))
    }

    pub fn proto(&self) -> &PerfDataProto {
        &self.proto
    }

    pub fn into_proto(self) -> PerfDataProto {
        self.proto
    }

    /// Encodes the structured representation in the protobuf wire format.
    pub fn to_proto_bytes(&self) -> Vec<u8> {
        self.proto.encode_to_vec()
    }

    /// Writes a flat perf.data file in the byte order of the input.
    pub fn write_to_vec(&self) -> Result<Vec<u8>, Error> {
        PerfFileWriter::new(self.endian).write(&self.proto)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), Error> {
        PerfFileWriter::new(self.endian).write_to(&self.proto, writer)
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        std::fs::write(path, self.write_to_vec()?)?;
        Ok(())
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    /// Whether the input's byte order differs from the host's.
    pub fn is_cross_endian(&self) -> bool {
        let native = if cfg!(target_endian = "little") {
            Endianness::LittleEndian
        } else {
            Endianness::BigEndian
        };
        self.endian != native
    }

    pub fn is_piped_input(&self) -> bool {
        self.is_piped_input
    }

    pub fn attrs(&self) -> &[PerfFileAttr] {
        &self.proto.file_attrs
    }

    pub fn events(&self) -> &[PerfEvent] {
        &self.proto.events
    }

    pub fn event_types(&self) -> &[PerfEventType] {
        &self.proto.event_types
    }

    pub fn build_ids(&self) -> &[BuildIdEntry] {
        &self.proto.build_ids
    }

    pub fn tracing_data(&self) -> Option<&[u8]> {
        self.proto.tracing_data.as_deref()
    }

    pub fn string_metadata(&self) -> Option<&StringMetadata> {
        self.proto.string_metadata.as_ref()
    }

    pub fn uint32_metadata(&self) -> &[Uint32Metadata] {
        &self.proto.uint32_metadata
    }

    pub fn uint64_metadata(&self) -> &[Uint64Metadata] {
        &self.proto.uint64_metadata
    }

    pub fn cpu_topology(&self) -> Option<&CpuTopology> {
        self.proto.cpu_topology.as_ref()
    }

    pub fn numa_topology(&self) -> &[NumaNode] {
        &self.proto.numa_topology
    }

    pub fn pmu_mappings(&self) -> &[PmuMapping] {
        &self.proto.pmu_mappings
    }

    pub fn group_desc(&self) -> &[GroupDesc] {
        &self.proto.group_desc
    }

    pub fn hybrid_topology(&self) -> &[HybridTopologyPmu] {
        &self.proto.hybrid_topology
    }

    pub fn opaque_features(&self) -> &[OpaqueFeature] {
        &self.proto.opaque_features
    }

    /// The feature sections which were present in the input, except for
    /// unknown ones and `HEADER_COMPRESSED`.
    pub fn metadata_mask(&self) -> FeatureSet {
        feature_set_from_words(&self.proto.metadata_mask)
    }

    pub fn stats(&self) -> PerfEventStats {
        self.proto.stats.unwrap_or_default()
    }
}

pub(crate) fn feature_set_from_words(words: &[u64]) -> FeatureSet {
    let mut set = FeatureSet::default();
    for (slot, word) in set.0.iter_mut().zip(words) {
        *slot = *word;
    }
    set
}

fn read_flat<T: ByteOrder>(
    data: &[u8],
    header: &PerfHeader,
    options: ReaderOptions<'_>,
) -> Result<PerfDataProto, Error> {
    header.validate(data.len() as u64)?;
    let mut state = ParseState::new(header.endian, options)?;
    state.add_attrs(read_attr_section::<T>(data, header)?)?;

    if header.event_types_section.size != 0 {
        let section = header
            .event_types_section
            .slice(data)?
            .ok_or(ReadError::PerfHeader)?;
        for entry in section.chunks_exact(8 + MAX_EVENT_NAME) {
            let mut cursor = ByteCursor::new(entry, ReadError::PerfHeader);
            let id = cursor.read_u64::<T>()?;
            let name = cursor.read_fixed_string(MAX_EVENT_NAME)?;
            state.add_event_type(PerfEventType { id, name });
        }
    }

    // The feature index starts just after the data section.
    let index_start = header
        .data_section
        .end()
        .and_then(|end| usize::try_from(end).ok())
        .ok_or(Error::MalformedHeader("data section end out of range"))?;
    let mut index = data.get(index_start..).unwrap_or_default();
    let mut feature_sections = LinearMap::new();
    for feature in header.features.iter() {
        let section = PerfFileSection::parse::<_, T>(&mut index)
            .map_err(|_| ReadError::FeatureSection)?;
        let section_data = section.slice(data)?.ok_or(ReadError::FeatureSection)?;
        log::trace!("Feature {feature} at {section:?}");
        feature_sections.insert(feature, section_data);
    }
    for (feature, section_data) in feature_sections {
        state.apply_feature::<T>(u64::from(feature), section_data)?;
    }

    let records = header
        .data_section
        .slice(data)?
        .ok_or(Error::MalformedHeader("data section reaches beyond the file"))?;
    state.process_records::<T>(records, false)?;
    state.finish()
}

/// Reads the attribute table and the id sections it points to.
fn read_attr_section<T: ByteOrder>(
    data: &[u8],
    header: &PerfHeader,
) -> Result<Vec<PerfFileAttr>, Error> {
    if header.attr_section.size == 0 {
        return Ok(Vec::new());
    }
    let attr_size = usize::try_from(header.attr_size).map_err(|_| Error::SectionSizeTooBig)?;
    let section = header
        .attr_section
        .slice(data)?
        .ok_or(ReadError::AttrsSection)?;
    if attr_size > section.len() || section.len() % attr_size != 0 {
        return Err(Error::UnsupportedAttributeSize(header.attr_size));
    }

    // Each entry is the attr struct followed by the section of its ids.
    let struct_size = attr_size - PerfFileSection::STRUCT_SIZE as usize;
    section
        .chunks_exact(attr_size)
        .map(|entry| {
            let attr = parse_perf_event_attr::<T>(&entry[..struct_size])?;
            let ids_section = PerfFileSection::parse::<_, T>(&entry[struct_size..])
                .map_err(|_| ReadError::AttrsSection)?;
            let ids_data = ids_section.slice(data)?.ok_or(ReadError::EventIds)?;
            Ok(PerfFileAttr {
                attr: Some(attr),
                ids: ids_data.chunks_exact(8).map(T::read_u64).collect(),
            })
        })
        .collect()
}

fn read_piped<T: ByteOrder>(
    data: &[u8],
    endian: Endianness,
    options: ReaderOptions<'_>,
) -> Result<PerfDataProto, Error> {
    let mut state = ParseState::new(endian, options)?;
    let records = data
        .get(PerfPipeHeader::STRUCT_SIZE as usize..)
        .ok_or(ReadError::PerfPipeHeader)?;
    state.process_records::<T>(records, false)?;
    state.finish()
}

/// The number of bytes which follow a record without being counted in its
/// `header.size`.
fn trailing_data_len<T: ByteOrder>(record_type: u32, body: &[u8]) -> Result<usize, Error> {
    let len = match record_type {
        PERF_RECORD_AUXTRACE => body.get(..8).map(T::read_u64),
        PERF_RECORD_HEADER_TRACING_DATA => body.get(..4).map(|size| u64::from(T::read_u32(size))),
        _ => return Ok(0),
    };
    let len = len.ok_or(ReadError::PerfEventData)?;
    usize::try_from(len).map_err(|_| Error::SectionSizeTooBig)
}

/// The state of one read pass.
struct ParseState<'a> {
    options: ReaderOptions<'a>,
    endian: Endianness,
    proto: PerfDataProto,
    stats: PerfEventStats,
    metadata_mask: FeatureSet,
    serializer: EventSerializer,
    /// Build ids found in MMAP2 records, added once the read is done.
    mmap_build_ids: Vec<BuildIdEntry>,
    #[cfg(feature = "zstd")]
    decompressor: ZstdDecompressor,
    /// Decompressed bytes which don't make up a complete record yet.
    #[cfg(feature = "zstd")]
    pending_decompressed: Vec<u8>,
}

impl<'a> ParseState<'a> {
    fn new(endian: Endianness, options: ReaderOptions<'a>) -> Result<Self, Error> {
        Ok(Self {
            options,
            endian,
            proto: PerfDataProto::default(),
            stats: PerfEventStats::default(),
            metadata_mask: FeatureSet::default(),
            serializer: EventSerializer::new(&[], endian)?,
            mmap_build_ids: Vec::new(),
            #[cfg(feature = "zstd")]
            decompressor: ZstdDecompressor::new(),
            #[cfg(feature = "zstd")]
            pending_decompressed: Vec::new(),
        })
    }

    fn add_attrs(&mut self, attrs: Vec<PerfFileAttr>) -> Result<(), Error> {
        if attrs.is_empty() {
            return Ok(());
        }
        self.proto.file_attrs.extend(attrs);
        let serializer = EventSerializer::new(&self.proto.file_attrs, self.endian)?;
        let previous = std::mem::replace(&mut self.serializer, serializer);
        stats::merge(&mut self.stats, previous.stats());
        Ok(())
    }

    fn add_event_type(&mut self, event_type: PerfEventType) {
        self.proto.event_types.push(event_type);
    }

    /// Adds a build id unless there already is one for the same file.
    fn add_build_id(&mut self, entry: BuildIdEntry) {
        if self
            .proto
            .build_ids
            .iter()
            .any(|existing| existing.filename == entry.filename)
        {
            log::debug!("Ignoring duplicate build id for {:?}", entry.filename);
            return;
        }
        self.proto.build_ids.push(entry);
    }

    /// Walks a sequence of records. Returns the number of bytes consumed,
    /// which is less than `data.len()` only if `allow_partial_tail` is set
    /// and the last record is incomplete.
    fn process_records<T: ByteOrder>(
        &mut self,
        data: &[u8],
        allow_partial_tail: bool,
    ) -> Result<usize, Error> {
        let mut pos = 0;
        while pos < data.len() {
            let rest = &data[pos..];
            let header = match PerfEventHeader::parse::<_, T>(rest) {
                Ok(header) => header,
                Err(_) if allow_partial_tail => break,
                Err(_) => return Err(ReadError::PerfEventHeader.into()),
            };
            let size = usize::from(header.size);
            if size < PerfEventHeader::STRUCT_SIZE {
                return Err(Error::InvalidPerfEventSize);
            }
            let Some(record) = rest.get(..size) else {
                if allow_partial_tail {
                    break;
                }
                return Err(ReadError::PerfEventData.into());
            };
            let trailing_len =
                trailing_data_len::<T>(header.type_, &record[PerfEventHeader::STRUCT_SIZE..])?;
            let trailing = size
                .checked_add(trailing_len)
                .and_then(|end| rest.get(size..end));
            let Some(trailing) = trailing else {
                if allow_partial_tail {
                    break;
                }
                return Err(match header.type_ {
                    PERF_RECORD_AUXTRACE => ReadError::AuxtraceData,
                    _ => ReadError::TracingData,
                }
                .into());
            };
            self.process_record::<T>(&header, record, trailing)?;
            pos += size + trailing_len;
        }
        Ok(pos)
    }

    fn process_record<T: ByteOrder>(
        &mut self,
        header: &PerfEventHeader,
        record: &[u8],
        trailing: &[u8],
    ) -> Result<(), Error> {
        let body = &record[PerfEventHeader::STRUCT_SIZE..];
        self.stats.num_events_read += 1;
        if RecordType(header.type_).is_builtin_type() {
            return self.process_event(header, body, trailing);
        }

        match header.type_ {
            PERF_RECORD_HEADER_ATTR => {
                let attr_size = peek_attr_size::<T>(body)? as usize;
                let attr_bytes = body
                    .get(..attr_size)
                    .ok_or(Error::UnsupportedAttributeSize(attr_size as u64))?;
                let attr = parse_perf_event_attr::<T>(attr_bytes)?;
                let ids = body[attr_size..].chunks_exact(8).map(T::read_u64).collect();
                self.add_attrs(vec![PerfFileAttr {
                    attr: Some(attr),
                    ids,
                }])?;
            }
            PERF_RECORD_HEADER_EVENT_TYPE => {
                let mut cursor = ByteCursor::new(body, ReadError::PerfEventData);
                let id = cursor.read_u64::<T>()?;
                let name = cursor.read_fixed_string(MAX_EVENT_NAME)?;
                self.add_event_type(PerfEventType { id, name });
            }
            PERF_RECORD_HEADER_TRACING_DATA => {
                log::debug!("Found {} bytes of tracing data", trailing.len());
                self.proto.tracing_data = Some(trailing.to_vec());
            }
            PERF_RECORD_HEADER_BUILD_ID => {
                let entry =
                    BuildIdEvent::parse::<_, T>(record).map_err(|_| ReadError::BuildIdSection)?;
                self.add_build_id(entry);
            }
            PERF_RECORD_HEADER_FEATURE => {
                let mut cursor = ByteCursor::new(body, ReadError::FeatureSection);
                let feature = cursor.read_u64::<T>()?;
                self.apply_feature::<T>(feature, cursor.rest())?;
            }
            PERF_RECORD_COMPRESSED => self.process_compressed::<T>(body)?,
            _ => self.process_event(header, body, trailing)?,
        }
        Ok(())
    }

    fn process_event(
        &mut self,
        header: &PerfEventHeader,
        body: &[u8],
        trailing: &[u8],
    ) -> Result<(), Error> {
        let parsed = self.serializer.parse_event(header, body)?;
        let Some(mut event) = parsed else {
            return Ok(());
        };

        if let Some(PerfEventPayload::Auxtrace(auxtrace)) = &mut event.event {
            auxtrace.trace_data = trailing.to_vec();
        }
        match &event.event {
            Some(PerfEventPayload::Sample(_)) => {
                if let Some(callback) = &mut self.options.sample_callback {
                    callback(&event);
                }
            }
            Some(PerfEventPayload::Mmap(MmapEvent {
                pid,
                file_id: Some(MmapFileId::BuildId(build_id)),
                filename,
                ..
            })) => {
                self.mmap_build_ids.push(BuildIdEntry {
                    misc: u32::from(header.misc & PERF_RECORD_MISC_CPUMODE_MASK),
                    pid: *pid as i32,
                    build_id: build_id.clone(),
                    filename: filename.clone(),
                });
            }
            _ => {}
        }

        if self.options.skips(header.type_) {
            self.stats.num_filtered_events += 1;
            return Ok(());
        }
        stats::count_event(&mut self.stats, &event);
        self.proto.events.push(event);
        Ok(())
    }

    #[cfg(feature = "zstd")]
    fn process_compressed<T: ByteOrder>(&mut self, body: &[u8]) -> Result<(), Error> {
        self.stats.num_compressed_events += 1;
        let mut buffer = std::mem::take(&mut self.pending_decompressed);
        self.decompressor.decompress_into(body, &mut buffer)?;
        let consumed = self.process_records::<T>(&buffer, true)?;
        buffer.drain(..consumed);
        self.pending_decompressed = buffer;
        Ok(())
    }

    #[cfg(not(feature = "zstd"))]
    fn process_compressed<T: ByteOrder>(&mut self, _body: &[u8]) -> Result<(), Error> {
        log::warn!("Skipping compressed record, zstd support is disabled");
        self.stats.num_compressed_events += 1;
        self.stats.num_unknown_events_skipped += 1;
        Ok(())
    }

    /// Folds one feature section into the metadata.
    fn apply_feature<T: ByteOrder>(&mut self, feature_bit: u64, data: &[u8]) -> Result<(), Error> {
        let feature_id = u32::try_from(feature_bit).ok();
        let Some(feature) = feature_id.and_then(Feature::from_int) else {
            log::warn!("Skipping unknown feature section {feature_bit}");
            self.stats.num_unknown_features_skipped += 1;
            return Ok(());
        };
        let feature_id = u32::from(feature);
        log::trace!("Reading feature {feature:?}, {} bytes", data.len());

        match feature {
            Feature::Compressed => {
                // The records are stored decompressed when writing.
                log::debug!("Dropping the compressed feature flag");
                return Ok(());
            }
            Feature::TracingData => self.proto.tracing_data = Some(data.to_vec()),
            Feature::BuildId => {
                for entry in BuildIdEvent::parse_section::<T>(data)? {
                    self.add_build_id(entry);
                }
            }
            Feature::Hostname
            | Feature::OsRelease
            | Feature::Version
            | Feature::Arch
            | Feature::CpuDesc
            | Feature::CpuId => {
                let value = HeaderString::parse_section::<T>(data)?;
                let strings = self
                    .proto
                    .string_metadata
                    .get_or_insert_with(Default::default);
                let slot = match feature {
                    Feature::Hostname => &mut strings.hostname,
                    Feature::OsRelease => &mut strings.kernel_version,
                    Feature::Version => &mut strings.perf_version,
                    Feature::Arch => &mut strings.architecture,
                    Feature::CpuDesc => &mut strings.cpu_description,
                    _ => &mut strings.cpu_id,
                };
                *slot = Some(value);
            }
            Feature::NrCpus => self.proto.uint32_metadata.push(Uint32Metadata {
                r#type: feature_id,
                data: parse_u32_values::<T>(data),
            }),
            Feature::TotalMem => self.proto.uint64_metadata.push(Uint64Metadata {
                r#type: feature_id,
                data: parse_u64_values::<T>(data),
            }),
            Feature::Cmdline => {
                let tokens = HeaderStringList::parse::<T>(data)?;
                let strings = self
                    .proto
                    .string_metadata
                    .get_or_insert_with(Default::default);
                strings.perf_command_line_whole = Some(tokens.join(" "));
                strings.perf_command_line_tokens = tokens;
            }
            Feature::EventDesc => {
                let descs = AttributeDescription::parse_event_desc_section::<T>(data)?;
                let known: HashSet<(u64, String)> = self
                    .proto
                    .event_types
                    .iter()
                    .map(|event_type| (event_type.id, event_type.name.clone()))
                    .collect();
                for desc in &descs {
                    if !known.contains(&(desc.attr.config, desc.name.clone())) {
                        self.add_event_type(PerfEventType {
                            id: desc.attr.config,
                            name: desc.name.clone(),
                        });
                    }
                }
                if self.proto.file_attrs.is_empty() {
                    log::debug!("No attribute table, using the attributes of the event descriptions");
                    let attrs = descs
                        .into_iter()
                        .map(|desc| PerfFileAttr {
                            attr: Some(desc.attr),
                            ids: desc.event_ids,
                        })
                        .collect();
                    self.add_attrs(attrs)?;
                }
            }
            Feature::CpuTopology => {
                self.proto.cpu_topology = Some(CpuTopologySection::parse::<T>(data)?)
            }
            Feature::NumaTopology => {
                self.proto.numa_topology = NumaTopologySection::parse::<T>(data)?
            }
            Feature::BranchStack => {}
            Feature::PmuMappings => self.proto.pmu_mappings = PmuMappings::parse::<T>(data)?,
            Feature::GroupDesc => self.proto.group_desc = GroupDescSection::parse::<T>(data)?,
            Feature::HybridTopology => {
                self.proto.hybrid_topology = HybridTopologySection::parse::<T>(data)?
            }
            _ => self.proto.opaque_features.push(OpaqueFeature {
                feature: feature_id,
                data: data.to_vec(),
            }),
        }
        self.metadata_mask.insert(feature_id);
        Ok(())
    }

    fn finish(mut self) -> Result<PerfDataProto, Error> {
        #[cfg(feature = "zstd")]
        if !self.pending_decompressed.is_empty() {
            return Err(ReadError::PerfEventData.into());
        }
        stats::merge(&mut self.stats, self.serializer.stats());
        for entry in std::mem::take(&mut self.mmap_build_ids) {
            if !self
                .proto
                .build_ids
                .iter()
                .any(|existing| existing.filename == entry.filename)
            {
                self.proto.build_ids.push(entry);
            }
        }
        stats::log_summary(&self.stats);
        self.proto.metadata_mask = self.metadata_mask.0.to_vec();
        self.proto.stats = Some(self.stats);
        Ok(self.proto)
    }
}
