use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use linux_perf_event_reader::{Endianness, PerfEventHeader};

use crate::codec::{aligned_string_len, ByteCursor, ByteWriter};
use crate::constants::*;
use crate::error::{Error, ReadError};
use crate::proto::*;
use crate::sample_info::SampleInfoReader;

const BPF_TAG_SIZE: usize = 8;
const MAX_AUXTRACE_ERROR_MSG: usize = 64;
/// `PERF_RECORD_TIME_CONV` payload size of perf versions before 5.16.
const TIME_CONV_SHORT_SIZE: usize = 24;
const TIME_CONV_FULL_SIZE: usize = 48;

/// How a record type is handled by [`EventSerializer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    /// Emitted by the kernel. Carries a `sample_id` suffix if the attribute
    /// has `sample_id_all` set.
    Kernel,
    /// `PERF_RECORD_SAMPLE`
    Sample,
    /// Synthesized by the perf tool. No `sample_id` suffix.
    User,
    /// Not represented as an event. Metadata records are consumed by the
    /// reader; everything else is skipped.
    Unsupported,
}

impl RecordClass {
    pub fn of(record_type: u32) -> Self {
        match record_type {
            PERF_RECORD_SAMPLE => RecordClass::Sample,
            PERF_RECORD_MMAP..=PERF_RECORD_TEXT_POKE => RecordClass::Kernel,
            PERF_RECORD_FINISHED_ROUND
            | PERF_RECORD_ID_INDEX
            | PERF_RECORD_AUXTRACE_INFO
            | PERF_RECORD_AUXTRACE
            | PERF_RECORD_AUXTRACE_ERROR
            | PERF_RECORD_THREAD_MAP
            | PERF_RECORD_STAT_CONFIG
            | PERF_RECORD_STAT
            | PERF_RECORD_STAT_ROUND
            | PERF_RECORD_TIME_CONV => RecordClass::User,
            _ => RecordClass::Unsupported,
        }
    }
}

/// Where records carry the event id which selects their attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdPositions {
    /// There is only one attribute, so no lookup is needed.
    OnlyOneEvent,
    /// All attributes agree on the position.
    Same {
        /// Offset from the start of a sample's payload.
        in_sample: Option<usize>,
        /// Offset from the end of any other kernel record.
        from_end: Option<usize>,
    },
}

/// Converts records between their binary layout and [`PerfEvent`].
///
/// The layout of samples and of the `sample_id` suffix depends on the
/// attribute the record belongs to. The attribute is found by reading the
/// event id at the position which all attributes agree on, and looking it up
/// in the attributes' id lists. Records whose id can't be resolved use the
/// first attribute.
#[derive(Debug, Clone)]
pub struct EventSerializer {
    attrs: Vec<PerfEventAttr>,
    readers: Vec<SampleInfoReader>,
    id_to_attr: HashMap<u64, usize>,
    id_positions: IdPositions,
    endian: Endianness,
    stats: PerfEventStats,
}

impl EventSerializer {
    pub fn new(file_attrs: &[PerfFileAttr], endian: Endianness) -> Result<Self, Error> {
        let mut attrs: Vec<PerfEventAttr> = file_attrs
            .iter()
            .map(|file_attr| file_attr.attr.clone().unwrap_or_default())
            .collect();
        if attrs.is_empty() {
            attrs.push(PerfEventAttr::default());
        }
        let readers: Vec<SampleInfoReader> = attrs
            .iter()
            .map(|attr| SampleInfoReader::new(attr, endian))
            .collect();

        let id_positions = if readers.len() == 1 {
            IdPositions::OnlyOneEvent
        } else {
            let positions_of = |index: usize| {
                let reader = &readers[index];
                let from_end = if attrs[index].sample_id_all {
                    reader.sample_id_offset_from_end()
                } else {
                    None
                };
                (reader.sample_event_id_offset(), from_end)
            };
            let (in_sample, from_end) = positions_of(0);
            if (1..readers.len()).any(|index| positions_of(index) != (in_sample, from_end)) {
                return Err(Error::InconsistentEventIdPositions);
            }
            IdPositions::Same {
                in_sample,
                from_end,
            }
        };

        let mut id_to_attr = HashMap::new();
        for (index, file_attr) in file_attrs.iter().enumerate() {
            for id in &file_attr.ids {
                id_to_attr.entry(*id).or_insert(index);
            }
        }

        Ok(Self {
            attrs,
            readers,
            id_to_attr,
            id_positions,
            endian,
            stats: PerfEventStats::default(),
        })
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    /// The counters accumulated by [`Self::parse_event`]: size mismatches,
    /// skipped mmaps and unsupported records.
    pub fn stats(&self) -> &PerfEventStats {
        &self.stats
    }

    /// The sample layout of the attribute at `index`.
    pub fn sample_info_reader(&self, index: usize) -> Option<&SampleInfoReader> {
        self.readers.get(index)
    }

    fn attr_index_for_id(&self, id: Option<u64>) -> usize {
        id.and_then(|id| self.id_to_attr.get(&id).copied())
            .filter(|index| *index < self.readers.len())
            .unwrap_or(0)
    }

    fn attr_index_in_body<T: ByteOrder>(&self, class: RecordClass, body: &[u8]) -> usize {
        let IdPositions::Same {
            in_sample,
            from_end,
        } = self.id_positions
        else {
            return 0;
        };
        let id_bytes = match class {
            RecordClass::Sample => in_sample.and_then(|offset| body.get(offset..offset + 8)),
            _ => from_end.and_then(|offset| {
                let start = body.len().checked_sub(offset)?;
                body.get(start..start + 8)
            }),
        };
        self.attr_index_for_id(id_bytes.map(T::read_u64))
    }

    /// Parses the record with the given header. `body` is the record
    /// without its header, `header.size - 8` bytes long.
    ///
    /// Returns `None` for records which are dropped: unsupported record
    /// types, and mmaps of an incomplete `/proc` scan or of an excluded
    /// kernel.
    pub fn parse_event(
        &mut self,
        header: &PerfEventHeader,
        body: &[u8],
    ) -> Result<Option<PerfEvent>, Error> {
        match self.endian {
            Endianness::LittleEndian => self.parse_event_impl::<LittleEndian>(header, body),
            Endianness::BigEndian => self.parse_event_impl::<BigEndian>(header, body),
        }
    }

    fn parse_event_impl<T: ByteOrder>(
        &mut self,
        header: &PerfEventHeader,
        body: &[u8],
    ) -> Result<Option<PerfEvent>, Error> {
        let record_type = header.type_;
        let class = RecordClass::of(record_type);
        log::trace!(
            "Parsing record of type {record_type} with size {}",
            header.size
        );
        let (payload, expected_size) = match class {
            RecordClass::Unsupported => {
                log::warn!("Skipping record of unsupported type {record_type}");
                self.stats.num_unknown_events_skipped += 1;
                return Ok(None);
            }
            RecordClass::Sample => {
                let index = self.attr_index_in_body::<T>(class, body);
                let reader = &self.readers[index];
                let (sample, _consumed) = reader.read_sample_event_impl::<T>(body)?;
                let expected = reader.sample_event_size(&sample);
                (PerfEventPayload::Sample(sample), expected)
            }
            RecordClass::User => {
                let mut cursor = ByteCursor::new(body, ReadError::PerfEventData);
                let payload = parse_user_payload::<T>(record_type, &mut cursor)?;
                (payload, cursor.position())
            }
            RecordClass::Kernel => {
                let index = self.attr_index_in_body::<T>(class, body);
                let reader = &self.readers[index];
                let suffix_size = if self.attrs[index].sample_id_all {
                    reader.sample_id_size()
                } else {
                    0
                };
                let payload_end = body.len().checked_sub(suffix_size).ok_or(
                    Error::InvalidSampleLayout("the sample id does not fit into the record"),
                )?;
                let mut cursor = ByteCursor::new(&body[..payload_end], ReadError::PerfEventData);
                let mut payload =
                    parse_kernel_payload::<T>(record_type, header.misc, &mut cursor, reader)?;
                if !cursor.is_empty() && !self.attrs[index].sample_id_all {
                    return Err(Error::InvalidSampleLayout(
                        "trailing bytes in a record without sample_id_all",
                    ));
                }
                if self.attrs[index].sample_id_all {
                    let info = reader.read_sample_id_impl::<T>(&body[payload_end..])?;
                    set_sample_info(&mut payload, info);
                }
                (payload, cursor.position() + suffix_size)
            }
        };

        let expected_size = expected_size + PerfEventHeader::STRUCT_SIZE;
        if expected_size != usize::from(header.size) {
            log::warn!(
                "Record of type {record_type} has size {} in its header, but its contents make up {expected_size} bytes",
                header.size
            );
            self.stats.num_size_mismatches += 1;
        }

        if let PerfEventPayload::Mmap(mmap) = &payload {
            if self.should_skip_mmap(header, mmap) {
                self.stats.num_mmaps_skipped += 1;
                return Ok(None);
            }
        }

        let timestamp = timestamp_of(&payload);
        Ok(Some(PerfEvent {
            header: Some(EventHeader {
                r#type: record_type,
                misc: u32::from(header.misc),
                size: u32::from(header.size),
            }),
            event: Some(payload),
            timestamp,
        }))
    }

    fn should_skip_mmap(&self, header: &PerfEventHeader, mmap: &MmapEvent) -> bool {
        if header.misc & PERF_RECORD_MISC_PROC_MAP_PARSE_TIMEOUT != 0 {
            log::warn!("Skipping mmap of {:?} from a timed-out /proc scan", mmap.filename);
            return true;
        }
        if header.misc & PERF_RECORD_MISC_CPUMODE_MASK == PERF_RECORD_MISC_KERNEL && mmap.len == 0 {
            let index = self.attr_index_for_id(mmap.sample_info.and_then(|info| info.id));
            if self.attrs[index].exclude_kernel {
                log::warn!("Skipping empty kernel mmap of {:?}", mmap.filename);
                return true;
            }
        }
        false
    }

    /// The number of bytes [`Self::write_event`] produces for `event`, not
    /// counting the trace data which follows a `PERF_RECORD_AUXTRACE`.
    pub fn event_size(&self, event: &PerfEvent) -> Result<usize, Error> {
        let mut scratch = ByteWriter::new();
        self.write_event(event, &mut scratch)?;
        let trailing = match &event.event {
            Some(PerfEventPayload::Auxtrace(auxtrace)) => auxtrace.trace_data.len(),
            _ => 0,
        };
        Ok(scratch.len() - trailing)
    }

    /// Appends the record for `event`. The header's size is recomputed from
    /// the contents. A `PERF_RECORD_AUXTRACE` is followed by its trace data.
    pub fn write_event(&self, event: &PerfEvent, writer: &mut ByteWriter) -> Result<(), Error> {
        match self.endian {
            Endianness::LittleEndian => self.write_event_impl::<LittleEndian>(event, writer),
            Endianness::BigEndian => self.write_event_impl::<BigEndian>(event, writer),
        }
    }

    fn write_event_impl<T: ByteOrder>(
        &self,
        event: &PerfEvent,
        writer: &mut ByteWriter,
    ) -> Result<(), Error> {
        let record_type = record_type_of(event)?;
        let payload = event
            .event
            .as_ref()
            .ok_or(Error::MismatchedEventPayload(record_type))?;
        let misc = misc_for(event, payload);

        let start = writer.len();
        writer.write_u32::<T>(record_type);
        writer.write_u16::<T>(misc);
        writer.write_u16::<T>(0);

        match payload {
            PerfEventPayload::Sample(sample) => {
                let index = self.attr_index_for_id(sample.id);
                self.readers[index].write_sample_event_impl::<T>(sample, writer);
            }
            payload if RecordClass::of(record_type) == RecordClass::Kernel => {
                let index = self.attr_index_for_id(sample_info_of(payload).and_then(|info| info.id));
                let reader = &self.readers[index];
                write_kernel_payload::<T>(payload, reader, writer);
                if self.attrs[index].sample_id_all {
                    let info = sample_info_of(payload).unwrap_or_default();
                    reader.write_sample_id_impl::<T>(&info, writer);
                }
            }
            payload => write_user_payload::<T>(payload, writer),
        }

        let size = writer.len() - start;
        let size_u16 =
            u16::try_from(size).map_err(|_| Error::RecordTooLarge { record_type, size })?;
        writer.patch_u16::<T>(start + 6, size_u16);

        if let PerfEventPayload::Auxtrace(auxtrace) = payload {
            writer.write_bytes(&auxtrace.trace_data);
        }
        Ok(())
    }
}

/// Picks the record type for `event`, from its header if it has one.
fn record_type_of(event: &PerfEvent) -> Result<u32, Error> {
    let header_type = event.header.map(|header| header.r#type);
    let Some(payload) = &event.event else {
        return Err(Error::MismatchedEventPayload(header_type.unwrap_or_default()));
    };
    let (default, allowed): (u32, &[u32]) = match payload {
        PerfEventPayload::Mmap(mmap) => (
            if mmap.file_id.is_some() {
                PERF_RECORD_MMAP2
            } else {
                PERF_RECORD_MMAP
            },
            &[PERF_RECORD_MMAP, PERF_RECORD_MMAP2],
        ),
        PerfEventPayload::Sample(_) => (PERF_RECORD_SAMPLE, &[PERF_RECORD_SAMPLE]),
        PerfEventPayload::Comm(_) => (PERF_RECORD_COMM, &[PERF_RECORD_COMM]),
        PerfEventPayload::Fork(_) => (PERF_RECORD_FORK, &[PERF_RECORD_FORK]),
        PerfEventPayload::Exit(_) => (PERF_RECORD_EXIT, &[PERF_RECORD_EXIT]),
        PerfEventPayload::Lost(_) => (PERF_RECORD_LOST, &[PERF_RECORD_LOST]),
        PerfEventPayload::Throttle(_) => (
            PERF_RECORD_THROTTLE,
            &[PERF_RECORD_THROTTLE, PERF_RECORD_UNTHROTTLE],
        ),
        PerfEventPayload::Read(_) => (PERF_RECORD_READ, &[PERF_RECORD_READ]),
        PerfEventPayload::Aux(_) => (PERF_RECORD_AUX, &[PERF_RECORD_AUX]),
        PerfEventPayload::ItraceStart(_) => (PERF_RECORD_ITRACE_START, &[PERF_RECORD_ITRACE_START]),
        PerfEventPayload::LostSamples(_) => {
            (PERF_RECORD_LOST_SAMPLES, &[PERF_RECORD_LOST_SAMPLES])
        }
        PerfEventPayload::ContextSwitch(switch) => (
            if switch.next_prev_pid.is_some() {
                PERF_RECORD_SWITCH_CPU_WIDE
            } else {
                PERF_RECORD_SWITCH
            },
            &[PERF_RECORD_SWITCH, PERF_RECORD_SWITCH_CPU_WIDE],
        ),
        PerfEventPayload::Namespaces(_) => (PERF_RECORD_NAMESPACES, &[PERF_RECORD_NAMESPACES]),
        PerfEventPayload::Ksymbol(_) => (PERF_RECORD_KSYMBOL, &[PERF_RECORD_KSYMBOL]),
        PerfEventPayload::Bpf(_) => (PERF_RECORD_BPF_EVENT, &[PERF_RECORD_BPF_EVENT]),
        PerfEventPayload::Cgroup(_) => (PERF_RECORD_CGROUP, &[PERF_RECORD_CGROUP]),
        PerfEventPayload::TextPoke(_) => (PERF_RECORD_TEXT_POKE, &[PERF_RECORD_TEXT_POKE]),
        PerfEventPayload::AuxtraceInfo(_) => {
            (PERF_RECORD_AUXTRACE_INFO, &[PERF_RECORD_AUXTRACE_INFO])
        }
        PerfEventPayload::Auxtrace(_) => (PERF_RECORD_AUXTRACE, &[PERF_RECORD_AUXTRACE]),
        PerfEventPayload::AuxtraceError(_) => {
            (PERF_RECORD_AUXTRACE_ERROR, &[PERF_RECORD_AUXTRACE_ERROR])
        }
        PerfEventPayload::IdIndex(_) => (PERF_RECORD_ID_INDEX, &[PERF_RECORD_ID_INDEX]),
        PerfEventPayload::ThreadMap(_) => (PERF_RECORD_THREAD_MAP, &[PERF_RECORD_THREAD_MAP]),
        PerfEventPayload::StatConfig(_) => (PERF_RECORD_STAT_CONFIG, &[PERF_RECORD_STAT_CONFIG]),
        PerfEventPayload::Stat(_) => (PERF_RECORD_STAT, &[PERF_RECORD_STAT]),
        PerfEventPayload::StatRound(_) => (PERF_RECORD_STAT_ROUND, &[PERF_RECORD_STAT_ROUND]),
        PerfEventPayload::TimeConv(_) => (PERF_RECORD_TIME_CONV, &[PERF_RECORD_TIME_CONV]),
        PerfEventPayload::FinishedRound(_) => {
            (PERF_RECORD_FINISHED_ROUND, &[PERF_RECORD_FINISHED_ROUND])
        }
    };
    match header_type {
        None => Ok(default),
        Some(record_type) if allowed.contains(&record_type) => Ok(record_type),
        Some(record_type) => Err(Error::MismatchedEventPayload(record_type)),
    }
}

/// The `header.misc` to write. The bits which encode payload fields are
/// taken from the payload.
fn misc_for(event: &PerfEvent, payload: &PerfEventPayload) -> u16 {
    let misc = event.header.map_or(0, |header| header.misc as u16);
    match payload {
        PerfEventPayload::Mmap(MmapEvent {
            file_id: Some(MmapFileId::BuildId(_)),
            ..
        }) => misc | PERF_RECORD_MISC_MMAP_BUILD_ID,
        PerfEventPayload::Mmap(MmapEvent {
            file_id: Some(MmapFileId::Device(_)),
            ..
        }) => misc & !PERF_RECORD_MISC_MMAP_BUILD_ID,
        PerfEventPayload::ContextSwitch(switch) => {
            let mut misc = misc & !(PERF_RECORD_MISC_SWITCH_OUT | PERF_RECORD_MISC_SWITCH_OUT_PREEMPT);
            if switch.is_out {
                misc |= PERF_RECORD_MISC_SWITCH_OUT;
                if switch.is_out_preempt {
                    misc |= PERF_RECORD_MISC_SWITCH_OUT_PREEMPT;
                }
            }
            misc
        }
        _ => misc,
    }
}

fn timestamp_of(payload: &PerfEventPayload) -> Option<u64> {
    match payload {
        PerfEventPayload::Sample(sample) => sample.sample_time_ns,
        PerfEventPayload::Fork(fork) | PerfEventPayload::Exit(fork) => Some(fork.fork_time_ns),
        payload => sample_info_of(payload).and_then(|info| info.sample_time_ns),
    }
}

/// The `sample_id` suffix of a kernel record.
pub fn sample_info_of(payload: &PerfEventPayload) -> Option<SampleInfo> {
    match payload {
        PerfEventPayload::Mmap(e) => e.sample_info,
        PerfEventPayload::Comm(e) => e.sample_info,
        PerfEventPayload::Fork(e) | PerfEventPayload::Exit(e) => e.sample_info,
        PerfEventPayload::Lost(e) => e.sample_info,
        PerfEventPayload::Throttle(e) => e.sample_info,
        PerfEventPayload::Read(e) => e.sample_info,
        PerfEventPayload::Aux(e) => e.sample_info,
        PerfEventPayload::ItraceStart(e) => e.sample_info,
        PerfEventPayload::LostSamples(e) => e.sample_info,
        PerfEventPayload::ContextSwitch(e) => e.sample_info,
        PerfEventPayload::Namespaces(e) => e.sample_info,
        PerfEventPayload::Ksymbol(e) => e.sample_info,
        PerfEventPayload::Bpf(e) => e.sample_info,
        PerfEventPayload::Cgroup(e) => e.sample_info,
        PerfEventPayload::TextPoke(e) => e.sample_info,
        _ => None,
    }
}

fn set_sample_info(payload: &mut PerfEventPayload, info: SampleInfo) {
    let slot = match payload {
        PerfEventPayload::Mmap(e) => &mut e.sample_info,
        PerfEventPayload::Comm(e) => &mut e.sample_info,
        PerfEventPayload::Fork(e) | PerfEventPayload::Exit(e) => &mut e.sample_info,
        PerfEventPayload::Lost(e) => &mut e.sample_info,
        PerfEventPayload::Throttle(e) => &mut e.sample_info,
        PerfEventPayload::Read(e) => &mut e.sample_info,
        PerfEventPayload::Aux(e) => &mut e.sample_info,
        PerfEventPayload::ItraceStart(e) => &mut e.sample_info,
        PerfEventPayload::LostSamples(e) => &mut e.sample_info,
        PerfEventPayload::ContextSwitch(e) => &mut e.sample_info,
        PerfEventPayload::Namespaces(e) => &mut e.sample_info,
        PerfEventPayload::Ksymbol(e) => &mut e.sample_info,
        PerfEventPayload::Bpf(e) => &mut e.sample_info,
        PerfEventPayload::Cgroup(e) => &mut e.sample_info,
        PerfEventPayload::TextPoke(e) => &mut e.sample_info,
        _ => return,
    };
    *slot = Some(info);
}

/// Reads a NUL-terminated, 8-byte aligned string which extends at most to
/// the end of the record's payload.
fn read_record_string(cursor: &mut ByteCursor) -> Result<String, ReadError> {
    cursor.read_padded_string(cursor.remaining())
}

fn parse_kernel_payload<T: ByteOrder>(
    record_type: u32,
    misc: u16,
    cursor: &mut ByteCursor,
    reader: &SampleInfoReader,
) -> Result<PerfEventPayload, Error> {
    let payload = match record_type {
        PERF_RECORD_MMAP | PERF_RECORD_MMAP2 => {
            let pid = cursor.read_u32::<T>()?;
            let tid = cursor.read_u32::<T>()?;
            let start = cursor.read_u64::<T>()?;
            let len = cursor.read_u64::<T>()?;
            let pgoff = cursor.read_u64::<T>()?;
            let (file_id, prot, flags) = if record_type == PERF_RECORD_MMAP2 {
                let file_id = if misc & PERF_RECORD_MISC_MMAP_BUILD_ID != 0 {
                    let build_id_size = usize::from(cursor.read_u8()?);
                    let _reserved1 = cursor.read_u8()?;
                    let _reserved2 = cursor.read_u16::<T>()?;
                    let build_id = cursor.read_array::<BUILD_ID_MAX_SIZE>()?;
                    MmapFileId::BuildId(build_id[..build_id_size.min(BUILD_ID_MAX_SIZE)].to_vec())
                } else {
                    MmapFileId::Device(MmapDevice {
                        maj: cursor.read_u32::<T>()?,
                        min: cursor.read_u32::<T>()?,
                        ino: cursor.read_u64::<T>()?,
                        ino_generation: cursor.read_u64::<T>()?,
                    })
                };
                let prot = cursor.read_u32::<T>()?;
                let flags = cursor.read_u32::<T>()?;
                (Some(file_id), Some(prot), Some(flags))
            } else {
                (None, None, None)
            };
            let filename = read_record_string(cursor)?;
            PerfEventPayload::Mmap(MmapEvent {
                pid,
                tid,
                start,
                len,
                pgoff,
                file_id,
                prot,
                flags,
                filename,
                sample_info: None,
            })
        }
        PERF_RECORD_COMM => PerfEventPayload::Comm(CommEvent {
            pid: cursor.read_u32::<T>()?,
            tid: cursor.read_u32::<T>()?,
            comm: read_record_string(cursor)?,
            sample_info: None,
        }),
        PERF_RECORD_FORK | PERF_RECORD_EXIT => {
            let fork = ForkEvent {
                pid: cursor.read_u32::<T>()?,
                ppid: cursor.read_u32::<T>()?,
                tid: cursor.read_u32::<T>()?,
                ptid: cursor.read_u32::<T>()?,
                fork_time_ns: cursor.read_u64::<T>()?,
                sample_info: None,
            };
            if record_type == PERF_RECORD_FORK {
                PerfEventPayload::Fork(fork)
            } else {
                PerfEventPayload::Exit(fork)
            }
        }
        PERF_RECORD_LOST => PerfEventPayload::Lost(LostEvent {
            id: cursor.read_u64::<T>()?,
            lost: cursor.read_u64::<T>()?,
            sample_info: None,
        }),
        PERF_RECORD_THROTTLE | PERF_RECORD_UNTHROTTLE => PerfEventPayload::Throttle(ThrottleEvent {
            time_ns: cursor.read_u64::<T>()?,
            id: cursor.read_u64::<T>()?,
            stream_id: cursor.read_u64::<T>()?,
            sample_info: None,
        }),
        PERF_RECORD_READ => {
            let pid = cursor.read_u32::<T>()?;
            let tid = cursor.read_u32::<T>()?;
            let read_info = reader.read_read_info::<T>(cursor)?;
            PerfEventPayload::Read(ReadEvent {
                pid,
                tid,
                read_info: Some(read_info),
                sample_info: None,
            })
        }
        PERF_RECORD_AUX => {
            let aux_offset = cursor.read_u64::<T>()?;
            let aux_size = cursor.read_u64::<T>()?;
            let flags = cursor.read_u64::<T>()?;
            PerfEventPayload::Aux(AuxEvent {
                aux_offset,
                aux_size,
                is_truncated: flags & PERF_AUX_FLAG_TRUNCATED != 0,
                is_overwrite: flags & PERF_AUX_FLAG_OVERWRITE != 0,
                is_partial: flags & PERF_AUX_FLAG_PARTIAL != 0,
                other_flags: flags
                    & !(PERF_AUX_FLAG_TRUNCATED | PERF_AUX_FLAG_OVERWRITE | PERF_AUX_FLAG_PARTIAL),
                sample_info: None,
            })
        }
        PERF_RECORD_ITRACE_START => PerfEventPayload::ItraceStart(ItraceStartEvent {
            pid: cursor.read_u32::<T>()?,
            tid: cursor.read_u32::<T>()?,
            sample_info: None,
        }),
        PERF_RECORD_LOST_SAMPLES => PerfEventPayload::LostSamples(LostSamplesEvent {
            num_lost: cursor.read_u64::<T>()?,
            sample_info: None,
        }),
        PERF_RECORD_SWITCH | PERF_RECORD_SWITCH_CPU_WIDE => {
            let (next_prev_pid, next_prev_tid) = if record_type == PERF_RECORD_SWITCH_CPU_WIDE {
                (Some(cursor.read_u32::<T>()?), Some(cursor.read_u32::<T>()?))
            } else {
                (None, None)
            };
            let is_out = misc & PERF_RECORD_MISC_SWITCH_OUT != 0;
            PerfEventPayload::ContextSwitch(ContextSwitchEvent {
                is_out,
                is_out_preempt: is_out && misc & PERF_RECORD_MISC_SWITCH_OUT_PREEMPT != 0,
                next_prev_pid,
                next_prev_tid,
                sample_info: None,
            })
        }
        PERF_RECORD_NAMESPACES => {
            let pid = cursor.read_u32::<T>()?;
            let tid = cursor.read_u32::<T>()?;
            let nr = cursor.read_u64::<T>()?;
            let values = cursor.read_u64_vec::<T>(nr.saturating_mul(2))?;
            let link_info = values
                .chunks_exact(2)
                .map(|pair| NamespaceLinkInfo {
                    dev: pair[0],
                    ino: pair[1],
                })
                .collect();
            PerfEventPayload::Namespaces(NamespacesEvent {
                pid,
                tid,
                link_info,
                sample_info: None,
            })
        }
        PERF_RECORD_KSYMBOL => PerfEventPayload::Ksymbol(KsymbolEvent {
            addr: cursor.read_u64::<T>()?,
            len: cursor.read_u32::<T>()?,
            ksym_type: u32::from(cursor.read_u16::<T>()?),
            flags: u32::from(cursor.read_u16::<T>()?),
            name: read_record_string(cursor)?,
            sample_info: None,
        }),
        PERF_RECORD_BPF_EVENT => PerfEventPayload::Bpf(BpfEvent {
            r#type: u32::from(cursor.read_u16::<T>()?),
            flags: u32::from(cursor.read_u16::<T>()?),
            id: cursor.read_u32::<T>()?,
            tag: cursor.read_bytes(BPF_TAG_SIZE)?.to_vec(),
            sample_info: None,
        }),
        PERF_RECORD_CGROUP => PerfEventPayload::Cgroup(CgroupEvent {
            id: cursor.read_u64::<T>()?,
            path: read_record_string(cursor)?,
            sample_info: None,
        }),
        PERF_RECORD_TEXT_POKE => {
            let addr = cursor.read_u64::<T>()?;
            let old_len = cursor.read_u16::<T>()?;
            let new_len = cursor.read_u16::<T>()?;
            let byte_len = usize::from(old_len) + usize::from(new_len);
            let bytes = cursor.read_bytes(byte_len)?.to_vec();
            cursor.skip(text_poke_padding(byte_len))?;
            PerfEventPayload::TextPoke(TextPokeEvent {
                addr,
                old_len: u32::from(old_len),
                new_len: u32::from(new_len),
                bytes,
                sample_info: None,
            })
        }
        _ => return Err(Error::MismatchedEventPayload(record_type)),
    };
    Ok(payload)
}

/// The lengths and the poked bytes are padded to a multiple of 8 bytes.
fn text_poke_padding(byte_len: usize) -> usize {
    let unpadded = 4 + byte_len;
    unpadded.next_multiple_of(8) - unpadded
}

fn write_kernel_payload<T: ByteOrder>(
    payload: &PerfEventPayload,
    reader: &SampleInfoReader,
    writer: &mut ByteWriter,
) {
    match payload {
        PerfEventPayload::Mmap(mmap) => {
            writer.write_u32::<T>(mmap.pid);
            writer.write_u32::<T>(mmap.tid);
            writer.write_u64::<T>(mmap.start);
            writer.write_u64::<T>(mmap.len);
            writer.write_u64::<T>(mmap.pgoff);
            if let Some(file_id) = &mmap.file_id {
                match file_id {
                    MmapFileId::BuildId(build_id) => {
                        let len = build_id.len().min(BUILD_ID_MAX_SIZE);
                        writer.write_u8(len as u8);
                        writer.write_u8(0);
                        writer.write_u16::<T>(0);
                        writer.write_bytes(&build_id[..len]);
                        writer.write_zeros(BUILD_ID_MAX_SIZE - len);
                    }
                    MmapFileId::Device(device) => {
                        writer.write_u32::<T>(device.maj);
                        writer.write_u32::<T>(device.min);
                        writer.write_u64::<T>(device.ino);
                        writer.write_u64::<T>(device.ino_generation);
                    }
                }
                writer.write_u32::<T>(mmap.prot.unwrap_or_default());
                writer.write_u32::<T>(mmap.flags.unwrap_or_default());
            }
            writer.write_padded_string(&mmap.filename);
        }
        PerfEventPayload::Comm(comm) => {
            writer.write_u32::<T>(comm.pid);
            writer.write_u32::<T>(comm.tid);
            writer.write_padded_string(&comm.comm);
        }
        PerfEventPayload::Fork(fork) | PerfEventPayload::Exit(fork) => {
            writer.write_u32::<T>(fork.pid);
            writer.write_u32::<T>(fork.ppid);
            writer.write_u32::<T>(fork.tid);
            writer.write_u32::<T>(fork.ptid);
            writer.write_u64::<T>(fork.fork_time_ns);
        }
        PerfEventPayload::Lost(lost) => {
            writer.write_u64::<T>(lost.id);
            writer.write_u64::<T>(lost.lost);
        }
        PerfEventPayload::Throttle(throttle) => {
            writer.write_u64::<T>(throttle.time_ns);
            writer.write_u64::<T>(throttle.id);
            writer.write_u64::<T>(throttle.stream_id);
        }
        PerfEventPayload::Read(read) => {
            writer.write_u32::<T>(read.pid);
            writer.write_u32::<T>(read.tid);
            let read_info = read.read_info.clone().unwrap_or_default();
            reader.write_read_info::<T>(&read_info, writer);
        }
        PerfEventPayload::Aux(aux) => {
            let mut flags = aux.other_flags;
            if aux.is_truncated {
                flags |= PERF_AUX_FLAG_TRUNCATED;
            }
            if aux.is_overwrite {
                flags |= PERF_AUX_FLAG_OVERWRITE;
            }
            if aux.is_partial {
                flags |= PERF_AUX_FLAG_PARTIAL;
            }
            writer.write_u64::<T>(aux.aux_offset);
            writer.write_u64::<T>(aux.aux_size);
            writer.write_u64::<T>(flags);
        }
        PerfEventPayload::ItraceStart(itrace_start) => {
            writer.write_u32::<T>(itrace_start.pid);
            writer.write_u32::<T>(itrace_start.tid);
        }
        PerfEventPayload::LostSamples(lost) => writer.write_u64::<T>(lost.num_lost),
        PerfEventPayload::ContextSwitch(switch) => {
            if let Some(next_prev_pid) = switch.next_prev_pid {
                writer.write_u32::<T>(next_prev_pid);
                writer.write_u32::<T>(switch.next_prev_tid.unwrap_or_default());
            }
        }
        PerfEventPayload::Namespaces(namespaces) => {
            writer.write_u32::<T>(namespaces.pid);
            writer.write_u32::<T>(namespaces.tid);
            writer.write_u64::<T>(namespaces.link_info.len() as u64);
            for link in &namespaces.link_info {
                writer.write_u64::<T>(link.dev);
                writer.write_u64::<T>(link.ino);
            }
        }
        PerfEventPayload::Ksymbol(ksymbol) => {
            writer.write_u64::<T>(ksymbol.addr);
            writer.write_u32::<T>(ksymbol.len);
            writer.write_u16::<T>(ksymbol.ksym_type as u16);
            writer.write_u16::<T>(ksymbol.flags as u16);
            writer.write_padded_string(&ksymbol.name);
        }
        PerfEventPayload::Bpf(bpf) => {
            writer.write_u16::<T>(bpf.r#type as u16);
            writer.write_u16::<T>(bpf.flags as u16);
            writer.write_u32::<T>(bpf.id);
            let mut tag = [0; BPF_TAG_SIZE];
            let len = bpf.tag.len().min(BPF_TAG_SIZE);
            tag[..len].copy_from_slice(&bpf.tag[..len]);
            writer.write_bytes(&tag);
        }
        PerfEventPayload::Cgroup(cgroup) => {
            writer.write_u64::<T>(cgroup.id);
            writer.write_padded_string(&cgroup.path);
        }
        PerfEventPayload::TextPoke(text_poke) => {
            writer.write_u64::<T>(text_poke.addr);
            writer.write_u16::<T>(text_poke.old_len as u16);
            writer.write_u16::<T>(text_poke.new_len as u16);
            writer.write_bytes(&text_poke.bytes);
            writer.write_zeros(text_poke_padding(text_poke.bytes.len()));
        }
        _ => {}
    }
}

fn parse_user_payload<T: ByteOrder>(
    record_type: u32,
    cursor: &mut ByteCursor,
) -> Result<PerfEventPayload, Error> {
    let payload = match record_type {
        PERF_RECORD_FINISHED_ROUND => PerfEventPayload::FinishedRound(FinishedRoundEvent {}),
        PERF_RECORD_ID_INDEX => {
            let nr = cursor.read_u64::<T>()?;
            let values = cursor.read_u64_vec::<T>(nr.saturating_mul(4))?;
            let entries = values
                .chunks_exact(4)
                .map(|entry| IdIndexEntry {
                    id: entry[0],
                    idx: entry[1],
                    cpu: entry[2],
                    tid: entry[3],
                })
                .collect();
            PerfEventPayload::IdIndex(IdIndexEvent { entries })
        }
        PERF_RECORD_AUXTRACE_INFO => {
            let r#type = cursor.read_u32::<T>()?;
            let _reserved = cursor.read_u32::<T>()?;
            let count = cursor.remaining() / 8;
            let priv_data = cursor.read_u64_vec::<T>(count as u64)?;
            PerfEventPayload::AuxtraceInfo(AuxtraceInfoEvent { r#type, priv_data })
        }
        PERF_RECORD_AUXTRACE => {
            let size = cursor.read_u64::<T>()?;
            let offset = cursor.read_u64::<T>()?;
            let reference = cursor.read_u64::<T>()?;
            let idx = cursor.read_u32::<T>()?;
            let tid = cursor.read_u32::<T>()?;
            let cpu = cursor.read_u32::<T>()?;
            let _reserved = cursor.read_u32::<T>()?;
            PerfEventPayload::Auxtrace(AuxtraceEvent {
                size,
                offset,
                reference,
                idx,
                tid,
                cpu,
                trace_data: Vec::new(),
            })
        }
        PERF_RECORD_AUXTRACE_ERROR => {
            let r#type = cursor.read_u32::<T>()?;
            let code = cursor.read_u32::<T>()?;
            let cpu = cursor.read_u32::<T>()?;
            let pid = cursor.read_u32::<T>()?;
            let tid = cursor.read_u32::<T>()?;
            let _reserved = cursor.read_u32::<T>()?;
            let ip = cursor.read_u64::<T>()?;
            let msg = cursor.read_padded_string(cursor.remaining().min(MAX_AUXTRACE_ERROR_MSG))?;
            PerfEventPayload::AuxtraceError(AuxtraceErrorEvent {
                r#type,
                code,
                cpu,
                pid,
                tid,
                ip,
                msg,
            })
        }
        PERF_RECORD_THREAD_MAP => {
            let nr = cursor.read_u64::<T>()?;
            let entry_size = 8 + THREAD_MAP_COMM_SIZE as u64;
            if nr.saturating_mul(entry_size) > cursor.remaining() as u64 {
                return Err(ReadError::PerfEventData.into());
            }
            let mut entries = Vec::with_capacity(nr as usize);
            for _ in 0..nr {
                entries.push(ThreadMapEntry {
                    pid: cursor.read_u64::<T>()?,
                    comm: cursor.read_fixed_string(THREAD_MAP_COMM_SIZE)?,
                });
            }
            PerfEventPayload::ThreadMap(ThreadMapEvent { entries })
        }
        PERF_RECORD_STAT_CONFIG => {
            let nr = cursor.read_u64::<T>()?;
            let values = cursor.read_u64_vec::<T>(nr.saturating_mul(2))?;
            let entries = values
                .chunks_exact(2)
                .map(|pair| StatConfigEntry {
                    tag: pair[0],
                    val: pair[1],
                })
                .collect();
            PerfEventPayload::StatConfig(StatConfigEvent { entries })
        }
        PERF_RECORD_STAT => PerfEventPayload::Stat(StatEvent {
            id: cursor.read_u64::<T>()?,
            cpu: cursor.read_u32::<T>()?,
            thread: cursor.read_u32::<T>()?,
            value: cursor.read_u64::<T>()?,
            enabled: cursor.read_u64::<T>()?,
            running: cursor.read_u64::<T>()?,
        }),
        PERF_RECORD_STAT_ROUND => PerfEventPayload::StatRound(StatRoundEvent {
            r#type: cursor.read_u64::<T>()?,
            time: cursor.read_u64::<T>()?,
        }),
        PERF_RECORD_TIME_CONV => {
            let mut time_conv = TimeConvEvent {
                time_shift: cursor.read_u64::<T>()?,
                time_mult: cursor.read_u64::<T>()?,
                time_zero: cursor.read_u64::<T>()?,
                ..Default::default()
            };
            if cursor.remaining() >= TIME_CONV_FULL_SIZE - TIME_CONV_SHORT_SIZE {
                time_conv.time_cycles = Some(cursor.read_u64::<T>()?);
                time_conv.time_mask = Some(cursor.read_u64::<T>()?);
                time_conv.cap_user_time_zero = Some(cursor.read_u8()? != 0);
                time_conv.cap_user_time_short = Some(cursor.read_u8()? != 0);
                cursor.skip(6)?;
            }
            PerfEventPayload::TimeConv(time_conv)
        }
        _ => return Err(Error::MismatchedEventPayload(record_type)),
    };
    Ok(payload)
}

fn write_user_payload<T: ByteOrder>(payload: &PerfEventPayload, writer: &mut ByteWriter) {
    match payload {
        PerfEventPayload::IdIndex(id_index) => {
            writer.write_u64::<T>(id_index.entries.len() as u64);
            for entry in &id_index.entries {
                writer.write_u64_slice::<T>(&[entry.id, entry.idx, entry.cpu, entry.tid]);
            }
        }
        PerfEventPayload::AuxtraceInfo(info) => {
            writer.write_u32::<T>(info.r#type);
            writer.write_u32::<T>(0);
            writer.write_u64_slice::<T>(&info.priv_data);
        }
        PerfEventPayload::Auxtrace(auxtrace) => {
            writer.write_u64::<T>(auxtrace.size);
            writer.write_u64::<T>(auxtrace.offset);
            writer.write_u64::<T>(auxtrace.reference);
            writer.write_u32::<T>(auxtrace.idx);
            writer.write_u32::<T>(auxtrace.tid);
            writer.write_u32::<T>(auxtrace.cpu);
            writer.write_u32::<T>(0);
        }
        PerfEventPayload::AuxtraceError(error) => {
            writer.write_u32::<T>(error.r#type);
            writer.write_u32::<T>(error.code);
            writer.write_u32::<T>(error.cpu);
            writer.write_u32::<T>(error.pid);
            writer.write_u32::<T>(error.tid);
            writer.write_u32::<T>(0);
            writer.write_u64::<T>(error.ip);
            // The message buffer holds at most 63 characters and a NUL.
            let msg = truncate_str(&error.msg, MAX_AUXTRACE_ERROR_MSG - 1);
            writer.write_fixed_string(msg, aligned_string_len(msg.len()));
        }
        PerfEventPayload::ThreadMap(thread_map) => {
            writer.write_u64::<T>(thread_map.entries.len() as u64);
            for entry in &thread_map.entries {
                writer.write_u64::<T>(entry.pid);
                let comm = truncate_str(&entry.comm, THREAD_MAP_COMM_SIZE - 1);
                writer.write_fixed_string(comm, THREAD_MAP_COMM_SIZE);
            }
        }
        PerfEventPayload::StatConfig(config) => {
            writer.write_u64::<T>(config.entries.len() as u64);
            for entry in &config.entries {
                writer.write_u64::<T>(entry.tag);
                writer.write_u64::<T>(entry.val);
            }
        }
        PerfEventPayload::Stat(stat) => {
            writer.write_u64::<T>(stat.id);
            writer.write_u32::<T>(stat.cpu);
            writer.write_u32::<T>(stat.thread);
            writer.write_u64::<T>(stat.value);
            writer.write_u64::<T>(stat.enabled);
            writer.write_u64::<T>(stat.running);
        }
        PerfEventPayload::StatRound(round) => {
            writer.write_u64::<T>(round.r#type);
            writer.write_u64::<T>(round.time);
        }
        PerfEventPayload::TimeConv(time_conv) => {
            writer.write_u64::<T>(time_conv.time_shift);
            writer.write_u64::<T>(time_conv.time_mult);
            writer.write_u64::<T>(time_conv.time_zero);
            if let Some(time_cycles) = time_conv.time_cycles {
                writer.write_u64::<T>(time_cycles);
                writer.write_u64::<T>(time_conv.time_mask.unwrap_or_default());
                writer.write_u8(u8::from(time_conv.cap_user_time_zero.unwrap_or_default()));
                writer.write_u8(u8::from(time_conv.cap_user_time_short.unwrap_or_default()));
                writer.write_zeros(6);
            }
        }
        _ => {}
    }
}

/// Cuts `s` to at most `max_len` bytes, at a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod test {
    use super::*;

    fn attr(sample_type: u64, sample_id_all: bool) -> PerfEventAttr {
        PerfEventAttr {
            sample_type,
            sample_id_all,
            sample_period: Some(1),
            wakeup_events: Some(0),
            ..Default::default()
        }
    }

    fn file_attr(attr: PerfEventAttr, ids: &[u64]) -> PerfFileAttr {
        PerfFileAttr {
            attr: Some(attr),
            ids: ids.to_vec(),
        }
    }

    fn header(type_: u32, misc: u16, body: &[u8]) -> PerfEventHeader {
        PerfEventHeader {
            type_,
            misc,
            size: (body.len() + 8) as u16,
        }
    }

    fn mmap_body(filename: &[u8], trailing: &[u8]) -> Vec<u8> {
        let mut body = ByteWriter::new();
        body.write_u32::<LittleEndian>(100);
        body.write_u32::<LittleEndian>(101);
        body.write_u64::<LittleEndian>(0x1000);
        body.write_u64::<LittleEndian>(0x2000);
        body.write_u64::<LittleEndian>(0);
        body.write_bytes(filename);
        body.write_bytes(trailing);
        body.into_inner()
    }

    #[test]
    fn record_classes() {
        assert_eq!(RecordClass::of(PERF_RECORD_SAMPLE), RecordClass::Sample);
        assert_eq!(RecordClass::of(PERF_RECORD_TEXT_POKE), RecordClass::Kernel);
        assert_eq!(RecordClass::of(PERF_RECORD_TIME_CONV), RecordClass::User);
        assert_eq!(RecordClass::of(PERF_RECORD_AUX_OUTPUT_HW_ID), RecordClass::Unsupported);
        assert_eq!(RecordClass::of(PERF_RECORD_HEADER_ATTR), RecordClass::Unsupported);
        assert_eq!(RecordClass::of(PERF_RECORD_COMPRESSED), RecordClass::Unsupported);
    }

    #[test]
    fn mmap_with_sample_id() {
        let attrs = [file_attr(attr(PERF_SAMPLE_TID | PERF_SAMPLE_TIME, true), &[])];
        let mut serializer = EventSerializer::new(&attrs, Endianness::LittleEndian).unwrap();
        let mut suffix = ByteWriter::new();
        suffix.write_u32::<LittleEndian>(100);
        suffix.write_u32::<LittleEndian>(101);
        suffix.write_u64::<LittleEndian>(123456);
        let body = mmap_body(b"/bin/ls\0", suffix.as_slice());
        let event = serializer
            .parse_event(&header(PERF_RECORD_MMAP, PERF_RECORD_MISC_USER, &body), &body)
            .unwrap()
            .unwrap();
        assert_eq!(event.timestamp, Some(123456));
        let Some(PerfEventPayload::Mmap(mmap)) = &event.event else {
            panic!("expected an mmap, got {event:?}");
        };
        assert_eq!(mmap.filename, "/bin/ls");
        assert_eq!(mmap.file_id, None);
        assert_eq!(mmap.sample_info.and_then(|info| info.tid), Some(101));
        assert_eq!(serializer.stats().num_size_mismatches, 0);

        let mut writer = ByteWriter::new();
        serializer.write_event(&event, &mut writer).unwrap();
        assert_eq!(&writer.as_slice()[8..], &body[..]);
        assert_eq!(serializer.event_size(&event).unwrap(), body.len() + 8);
    }

    #[test]
    fn trailing_bytes_without_sample_id_all() {
        let attrs = [file_attr(attr(PERF_SAMPLE_IP, false), &[])];
        let mut serializer = EventSerializer::new(&attrs, Endianness::LittleEndian).unwrap();
        let body = mmap_body(b"/bin/ls\0", &[0; 8]);
        let result = serializer.parse_event(&header(PERF_RECORD_MMAP, 0, &body), &body);
        assert!(matches!(result, Err(Error::InvalidSampleLayout(_))));
    }

    #[test]
    fn header_only_mmap_is_truncated() {
        let mut serializer = EventSerializer::new(&[], Endianness::LittleEndian).unwrap();
        let result = serializer.parse_event(&header(PERF_RECORD_MMAP, 0, &[]), &[]);
        assert!(matches!(
            result,
            Err(Error::TruncatedRecord(ReadError::PerfEventData))
        ));
    }

    #[test]
    fn skipped_mmaps() {
        let mut excluded = attr(0, false);
        excluded.exclude_kernel = true;
        let attrs = [file_attr(excluded, &[])];
        let mut serializer = EventSerializer::new(&attrs, Endianness::LittleEndian).unwrap();

        let body = mmap_body(b"/bin/ls\0", &[]);
        let timeout = PERF_RECORD_MISC_USER | PERF_RECORD_MISC_PROC_MAP_PARSE_TIMEOUT;
        let parsed = serializer
            .parse_event(&header(PERF_RECORD_MMAP, timeout, &body), &body)
            .unwrap();
        assert_eq!(parsed, None);

        let mut body = mmap_body(b"[kernel.kallsyms]_text\0\0", &[]);
        body[16..24].copy_from_slice(&0u64.to_le_bytes());
        let parsed = serializer
            .parse_event(&header(PERF_RECORD_MMAP, PERF_RECORD_MISC_KERNEL, &body), &body)
            .unwrap();
        assert_eq!(parsed, None);
        assert_eq!(serializer.stats().num_mmaps_skipped, 2);
    }

    #[test]
    fn mmap2_with_build_id() {
        let mut serializer = EventSerializer::new(&[], Endianness::BigEndian).unwrap();
        let event = PerfEvent {
            header: Some(EventHeader {
                r#type: PERF_RECORD_MMAP2,
                misc: u32::from(PERF_RECORD_MISC_USER),
                size: 0,
            }),
            event: Some(PerfEventPayload::Mmap(MmapEvent {
                pid: 1,
                tid: 1,
                start: 0x7000,
                len: 0x1000,
                pgoff: 0,
                file_id: Some(MmapFileId::BuildId(vec![0xee; 20])),
                prot: Some(5),
                flags: Some(2),
                filename: "/lib/libc.so.6".to_string(),
                sample_info: None,
            })),
            timestamp: None,
        };
        let mut writer = ByteWriter::new();
        serializer.write_event(&event, &mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 8 + 32 + 24 + 8 + 16);

        let parsed_header = PerfEventHeader::parse::<_, BigEndian>(&bytes[..]).unwrap();
        assert_ne!(parsed_header.misc & PERF_RECORD_MISC_MMAP_BUILD_ID, 0);
        let parsed = serializer
            .parse_event(&parsed_header, &bytes[8..])
            .unwrap()
            .unwrap();
        assert_eq!(parsed.event, event.event);
    }

    #[test]
    fn attributes_are_selected_by_id() {
        let attrs = [
            file_attr(attr(PERF_SAMPLE_IDENTIFIER | PERF_SAMPLE_IP, false), &[10]),
            file_attr(
                attr(PERF_SAMPLE_IDENTIFIER | PERF_SAMPLE_IP | PERF_SAMPLE_PERIOD, false),
                &[20],
            ),
        ];
        let mut serializer = EventSerializer::new(&attrs, Endianness::LittleEndian).unwrap();
        let mut body = ByteWriter::new();
        body.write_u64_slice::<LittleEndian>(&[20, 0xffff_0000, 4000]);
        let body = body.into_inner();
        let event = serializer
            .parse_event(&header(PERF_RECORD_SAMPLE, 0, &body), &body)
            .unwrap()
            .unwrap();
        let Some(PerfEventPayload::Sample(sample)) = event.event else {
            panic!("expected a sample");
        };
        assert_eq!(sample.id, Some(20));
        assert_eq!(sample.ip, Some(0xffff_0000));
        assert_eq!(sample.period, Some(4000));
    }

    #[test]
    fn inconsistent_id_positions() {
        let attrs = [
            file_attr(attr(PERF_SAMPLE_IP | PERF_SAMPLE_ID, false), &[1]),
            file_attr(attr(PERF_SAMPLE_IP | PERF_SAMPLE_TID | PERF_SAMPLE_ID, false), &[2]),
        ];
        assert!(matches!(
            EventSerializer::new(&attrs, Endianness::LittleEndian),
            Err(Error::InconsistentEventIdPositions)
        ));
    }

    #[test]
    fn size_mismatch_is_counted() {
        let attrs = [file_attr(attr(PERF_SAMPLE_IP, false), &[])];
        let mut serializer = EventSerializer::new(&attrs, Endianness::LittleEndian).unwrap();
        let body = [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let event = serializer
            .parse_event(&header(PERF_RECORD_SAMPLE, 0, &body), &body)
            .unwrap();
        assert!(event.is_some());
        assert_eq!(serializer.stats().num_size_mismatches, 1);
    }

    #[test]
    fn unsupported_types_are_skipped() {
        let mut serializer = EventSerializer::new(&[], Endianness::LittleEndian).unwrap();
        let body = [0; 16];
        let parsed = serializer
            .parse_event(&header(PERF_RECORD_KERNEL_MAX, 0, &body), &body)
            .unwrap();
        assert_eq!(parsed, None);
        assert_eq!(serializer.stats().num_unknown_events_skipped, 1);
    }

    #[test]
    fn context_switches() {
        let attrs = [file_attr(attr(PERF_SAMPLE_TIME, true), &[])];
        let mut serializer = EventSerializer::new(&attrs, Endianness::LittleEndian).unwrap();
        let mut body = ByteWriter::new();
        body.write_u32::<LittleEndian>(42);
        body.write_u32::<LittleEndian>(43);
        body.write_u64::<LittleEndian>(999);
        let body = body.into_inner();
        let misc = PERF_RECORD_MISC_SWITCH_OUT | PERF_RECORD_MISC_SWITCH_OUT_PREEMPT;
        let event = serializer
            .parse_event(&header(PERF_RECORD_SWITCH_CPU_WIDE, misc, &body), &body)
            .unwrap()
            .unwrap();
        assert_eq!(event.timestamp, Some(999));
        let Some(PerfEventPayload::ContextSwitch(switch)) = &event.event else {
            panic!("expected a context switch");
        };
        assert!(switch.is_out && switch.is_out_preempt);
        assert_eq!(switch.next_prev_pid, Some(42));
        assert_eq!(switch.next_prev_tid, Some(43));

        let mut without_header = event.clone();
        without_header.header = None;
        let mut writer = ByteWriter::new();
        serializer.write_event(&without_header, &mut writer).unwrap();
        let written = PerfEventHeader::parse::<_, LittleEndian>(writer.as_slice()).unwrap();
        assert_eq!(written.type_, PERF_RECORD_SWITCH_CPU_WIDE);
        assert_eq!(written.misc, misc);
    }

    #[test]
    fn text_poke_is_padded() {
        let mut serializer = EventSerializer::new(&[], Endianness::LittleEndian).unwrap();
        let event = PerfEvent {
            header: None,
            event: Some(PerfEventPayload::TextPoke(TextPokeEvent {
                addr: 0xffff_ffff_8100_0000,
                old_len: 1,
                new_len: 2,
                bytes: vec![0x90, 0xeb, 0x10],
                sample_info: None,
            })),
            timestamp: None,
        };
        let mut writer = ByteWriter::new();
        serializer.write_event(&event, &mut writer).unwrap();
        assert_eq!(writer.len(), 8 + 8 + 8);
        let bytes = writer.into_inner();
        let header = PerfEventHeader::parse::<_, LittleEndian>(&bytes[..]).unwrap();
        let parsed = serializer.parse_event(&header, &bytes[8..]).unwrap().unwrap();
        assert_eq!(parsed.event, event.event);
        assert_eq!(serializer.stats().num_size_mismatches, 0);
    }

    #[test]
    fn time_conv_sizes() {
        let mut serializer = EventSerializer::new(&[], Endianness::LittleEndian).unwrap();
        let mut short = ByteWriter::new();
        short.write_u64_slice::<LittleEndian>(&[10, 20, 30]);
        let short = short.into_inner();
        let event = serializer
            .parse_event(&header(PERF_RECORD_TIME_CONV, 0, &short), &short)
            .unwrap()
            .unwrap();
        let Some(PerfEventPayload::TimeConv(time_conv)) = &event.event else {
            panic!("expected time conv");
        };
        assert_eq!(time_conv.time_zero, 30);
        assert_eq!(time_conv.time_cycles, None);
        assert_eq!(serializer.event_size(&event).unwrap(), 8 + 24);

        let mut full = ByteWriter::new();
        full.write_u64_slice::<LittleEndian>(&[10, 20, 30, 40, 50]);
        full.write_bytes(&[1, 0, 0, 0, 0, 0, 0, 0]);
        let full = full.into_inner();
        let event = serializer
            .parse_event(&header(PERF_RECORD_TIME_CONV, 0, &full), &full)
            .unwrap()
            .unwrap();
        let Some(PerfEventPayload::TimeConv(time_conv)) = &event.event else {
            panic!("expected time conv");
        };
        assert_eq!(time_conv.time_mask, Some(50));
        assert_eq!(time_conv.cap_user_time_zero, Some(true));
        assert_eq!(time_conv.cap_user_time_short, Some(false));
        assert_eq!(serializer.event_size(&event).unwrap(), 8 + 48);
    }

    #[test]
    fn auxtrace_data_follows_the_record() {
        let serializer = EventSerializer::new(&[], Endianness::LittleEndian).unwrap();
        let event = PerfEvent {
            header: None,
            event: Some(PerfEventPayload::Auxtrace(AuxtraceEvent {
                size: 4,
                offset: 0,
                reference: 7,
                idx: 0,
                tid: 12,
                cpu: 1,
                trace_data: vec![1, 2, 3, 4],
            })),
            timestamp: None,
        };
        let mut writer = ByteWriter::new();
        serializer.write_event(&event, &mut writer).unwrap();
        assert_eq!(writer.len(), 48 + 4);
        assert_eq!(serializer.event_size(&event).unwrap(), 48);
        let header = PerfEventHeader::parse::<_, LittleEndian>(writer.as_slice()).unwrap();
        assert_eq!(header.size, 48);
    }

    #[test]
    fn payload_must_match_header_type() {
        let serializer = EventSerializer::new(&[], Endianness::LittleEndian).unwrap();
        let event = PerfEvent {
            header: Some(EventHeader {
                r#type: PERF_RECORD_COMM,
                misc: 0,
                size: 0,
            }),
            event: Some(PerfEventPayload::Lost(LostEvent::default())),
            timestamp: None,
        };
        let mut writer = ByteWriter::new();
        assert!(matches!(
            serializer.write_event(&event, &mut writer),
            Err(Error::MismatchedEventPayload(PERF_RECORD_COMM))
        ));
    }
}
