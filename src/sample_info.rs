use byteorder::{BigEndian, ByteOrder, LittleEndian};
use linux_perf_event_reader::Endianness;

use crate::codec::{decode_bitfield_word, encode_bitfield_word, endianness_of};
use crate::codec::{BitField, ByteCursor, ByteWriter};
use crate::constants::*;
use crate::error::{Error, ReadError};
use crate::proto::{
    BranchStackEntry, PerfEventAttr, ReadInfo, ReadValue, RegisterDump, SampleEvent, SampleInfo,
    StackDump, WeightStruct,
};

/// The members of `perf_branch_entry`'s flags word.
pub const BRANCH_FLAGS: &[BitField] = &[
    MISPRED, PREDICTED, IN_TX, ABORT, CYCLES, BRANCH_TYPE, SPEC,
    BitField::new("reserved", 26, 38),
];

const MISPRED: BitField = BitField::new("mispred", 0, 1);
const PREDICTED: BitField = BitField::new("predicted", 1, 1);
const IN_TX: BitField = BitField::new("in_tx", 2, 1);
const ABORT: BitField = BitField::new("abort", 3, 1);
const CYCLES: BitField = BitField::new("cycles", 4, 16);
const BRANCH_TYPE: BitField = BitField::new("type", 20, 4);
const SPEC: BitField = BitField::new("spec", 24, 2);

const BRANCH_ENTRY_SIZE: usize = 24;

/// A field of the sample info, in one of the layouts below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleField {
    Identifier,
    Ip,
    Tid,
    Time,
    Addr,
    Id,
    StreamId,
    Cpu,
    Period,
    Read,
    Callchain,
    Raw,
    BranchStack,
    RegsUser,
    StackUser,
    /// `PERF_SAMPLE_WEIGHT` or `PERF_SAMPLE_WEIGHT_STRUCT`, which share a slot.
    Weight,
    DataSrc,
    Transaction,
    RegsIntr,
    PhysAddr,
    Cgroup,
    DataPageSize,
    CodePageSize,
    Aux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSize {
    Fixed(usize),
    /// Starts with a count or size which determines the rest.
    Variable,
}

/// One entry of an ordered layout: the `sample_type` bits which enable the
/// field, and how big it is.
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub mask: u64,
    pub field: SampleField,
    pub size: FieldSize,
}

const fn fixed(mask: u64, field: SampleField, size: usize) -> FieldLayout {
    FieldLayout {
        mask,
        field,
        size: FieldSize::Fixed(size),
    }
}

const fn variable(mask: u64, field: SampleField) -> FieldLayout {
    FieldLayout {
        mask,
        field,
        size: FieldSize::Variable,
    }
}

/// The payload of `PERF_RECORD_SAMPLE`, in the order the kernel writes it.
///
/// `PERF_SAMPLE_IDENTIFIER` comes first, so that the event id can be found
/// without knowing the attr, and `PERF_SAMPLE_AUX` comes last.
pub const SAMPLE_EVENT_LAYOUT: &[FieldLayout] = &[
    fixed(PERF_SAMPLE_IDENTIFIER, SampleField::Identifier, 8),
    fixed(PERF_SAMPLE_IP, SampleField::Ip, 8),
    fixed(PERF_SAMPLE_TID, SampleField::Tid, 8),
    fixed(PERF_SAMPLE_TIME, SampleField::Time, 8),
    fixed(PERF_SAMPLE_ADDR, SampleField::Addr, 8),
    fixed(PERF_SAMPLE_ID, SampleField::Id, 8),
    fixed(PERF_SAMPLE_STREAM_ID, SampleField::StreamId, 8),
    fixed(PERF_SAMPLE_CPU, SampleField::Cpu, 8),
    fixed(PERF_SAMPLE_PERIOD, SampleField::Period, 8),
    variable(PERF_SAMPLE_READ, SampleField::Read),
    variable(PERF_SAMPLE_CALLCHAIN, SampleField::Callchain),
    variable(PERF_SAMPLE_RAW, SampleField::Raw),
    variable(PERF_SAMPLE_BRANCH_STACK, SampleField::BranchStack),
    variable(PERF_SAMPLE_REGS_USER, SampleField::RegsUser),
    variable(PERF_SAMPLE_STACK_USER, SampleField::StackUser),
    fixed(
        PERF_SAMPLE_WEIGHT | PERF_SAMPLE_WEIGHT_STRUCT,
        SampleField::Weight,
        8,
    ),
    fixed(PERF_SAMPLE_DATA_SRC, SampleField::DataSrc, 8),
    fixed(PERF_SAMPLE_TRANSACTION, SampleField::Transaction, 8),
    variable(PERF_SAMPLE_REGS_INTR, SampleField::RegsIntr),
    fixed(PERF_SAMPLE_PHYS_ADDR, SampleField::PhysAddr, 8),
    fixed(PERF_SAMPLE_CGROUP, SampleField::Cgroup, 8),
    fixed(PERF_SAMPLE_DATA_PAGE_SIZE, SampleField::DataPageSize, 8),
    fixed(PERF_SAMPLE_CODE_PAGE_SIZE, SampleField::CodePageSize, 8),
    variable(PERF_SAMPLE_AUX, SampleField::Aux),
];

/// The `sample_id` suffix of other kernel records when `sample_id_all` is
/// set. `PERF_SAMPLE_IDENTIFIER` comes last here.
pub const SAMPLE_ID_LAYOUT: &[FieldLayout] = &[
    fixed(PERF_SAMPLE_TID, SampleField::Tid, 8),
    fixed(PERF_SAMPLE_TIME, SampleField::Time, 8),
    fixed(PERF_SAMPLE_ID, SampleField::Id, 8),
    fixed(PERF_SAMPLE_STREAM_ID, SampleField::StreamId, 8),
    fixed(PERF_SAMPLE_CPU, SampleField::Cpu, 8),
    fixed(PERF_SAMPLE_IDENTIFIER, SampleField::Identifier, 8),
];

/// Reads and writes the sample info of the records which belong to one
/// attr, as configured by its `sample_type` and `read_format`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInfoReader {
    sample_type: u64,
    read_format: u64,
    branch_hw_index: bool,
    regs_user_count: usize,
    regs_intr_count: usize,
    endian: Endianness,
}

impl SampleInfoReader {
    pub fn new(attr: &PerfEventAttr, endian: Endianness) -> Self {
        Self {
            sample_type: attr.sample_type,
            read_format: attr.read_format,
            branch_hw_index: attr.branch_sample_type & PERF_SAMPLE_BRANCH_HW_INDEX != 0,
            regs_user_count: attr.sample_regs_user.count_ones() as usize,
            regs_intr_count: attr.sample_regs_intr.count_ones() as usize,
            endian,
        }
    }

    pub fn sample_type(&self) -> u64 {
        self.sample_type
    }

    pub fn read_format(&self) -> u64 {
        self.read_format
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    fn enabled<'l>(&self, layout: &'l [FieldLayout]) -> impl Iterator<Item = &'l FieldLayout> {
        let sample_type = self.sample_type;
        layout
            .iter()
            .filter(move |entry| sample_type & entry.mask != 0)
    }

    /// The byte offset of the field selected by `flag` within `layout`, or
    /// `None` if the field is disabled or preceded by a variable-size field.
    pub fn field_offset(&self, layout: &[FieldLayout], flag: u64) -> Option<usize> {
        if self.sample_type & flag == 0 {
            return None;
        }
        let mut offset = 0;
        for entry in self.enabled(layout) {
            if entry.mask & flag != 0 {
                return Some(offset);
            }
            match entry.size {
                FieldSize::Fixed(size) => offset += size,
                FieldSize::Variable => return None,
            }
        }
        None
    }

    /// The size of the `sample_id` suffix.
    pub fn sample_id_size(&self) -> usize {
        self.enabled(SAMPLE_ID_LAYOUT)
            .map(|entry| match entry.size {
                FieldSize::Fixed(size) => size,
                FieldSize::Variable => 0,
            })
            .sum()
    }

    /// The offset of the event id within a sample record's payload.
    pub fn sample_event_id_offset(&self) -> Option<usize> {
        self.field_offset(SAMPLE_EVENT_LAYOUT, PERF_SAMPLE_IDENTIFIER)
            .or_else(|| self.field_offset(SAMPLE_EVENT_LAYOUT, PERF_SAMPLE_ID))
    }

    /// The distance of the event id from the end of any other record's
    /// payload, when the record carries a `sample_id` suffix.
    pub fn sample_id_offset_from_end(&self) -> Option<usize> {
        let offset = self
            .field_offset(SAMPLE_ID_LAYOUT, PERF_SAMPLE_IDENTIFIER)
            .or_else(|| self.field_offset(SAMPLE_ID_LAYOUT, PERF_SAMPLE_ID))?;
        Some(self.sample_id_size() - offset)
    }

    /// Reads the payload of a `PERF_RECORD_SAMPLE`, i.e. the record without
    /// its header. Returns the sample and the number of bytes consumed.
    pub fn read_sample_event(&self, payload: &[u8]) -> Result<(SampleEvent, usize), Error> {
        match self.endian {
            Endianness::LittleEndian => self.read_sample_event_impl::<LittleEndian>(payload),
            Endianness::BigEndian => self.read_sample_event_impl::<BigEndian>(payload),
        }
    }

    pub fn write_sample_event(&self, sample: &SampleEvent, writer: &mut ByteWriter) {
        match self.endian {
            Endianness::LittleEndian => self.write_sample_event_impl::<LittleEndian>(sample, writer),
            Endianness::BigEndian => self.write_sample_event_impl::<BigEndian>(sample, writer),
        }
    }

    pub fn read_sample_id(&self, suffix: &[u8]) -> Result<SampleInfo, Error> {
        match self.endian {
            Endianness::LittleEndian => self.read_sample_id_impl::<LittleEndian>(suffix),
            Endianness::BigEndian => self.read_sample_id_impl::<BigEndian>(suffix),
        }
    }

    pub fn write_sample_id(&self, info: &SampleInfo, writer: &mut ByteWriter) {
        match self.endian {
            Endianness::LittleEndian => self.write_sample_id_impl::<LittleEndian>(info, writer),
            Endianness::BigEndian => self.write_sample_id_impl::<BigEndian>(info, writer),
        }
    }

    pub(crate) fn read_sample_event_impl<T: ByteOrder>(
        &self,
        payload: &[u8],
    ) -> Result<(SampleEvent, usize), Error> {
        let mut cursor = ByteCursor::new(payload, ReadError::SampleInfo);
        let mut sample = SampleEvent::default();
        for entry in self.enabled(SAMPLE_EVENT_LAYOUT) {
            cursor.set_context(ReadError::SampleInfo);
            match entry.field {
                SampleField::Identifier | SampleField::Id => {
                    sample.id = Some(cursor.read_u64::<T>()?)
                }
                SampleField::Ip => sample.ip = Some(cursor.read_u64::<T>()?),
                SampleField::Tid => {
                    sample.pid = Some(cursor.read_u32::<T>()?);
                    sample.tid = Some(cursor.read_u32::<T>()?);
                }
                SampleField::Time => sample.sample_time_ns = Some(cursor.read_u64::<T>()?),
                SampleField::Addr => sample.addr = Some(cursor.read_u64::<T>()?),
                SampleField::StreamId => sample.stream_id = Some(cursor.read_u64::<T>()?),
                SampleField::Cpu => {
                    sample.cpu = Some(cursor.read_u32::<T>()?);
                    let _reserved = cursor.read_u32::<T>()?;
                }
                SampleField::Period => sample.period = Some(cursor.read_u64::<T>()?),
                SampleField::Read => {
                    cursor.set_context(ReadError::ReadValues);
                    sample.read_info = Some(self.read_read_info::<T>(&mut cursor)?);
                }
                SampleField::Callchain => {
                    cursor.set_context(ReadError::Callchain);
                    let nr = cursor.read_u64::<T>()?;
                    sample.callchain = cursor.read_u64_vec::<T>(nr)?;
                }
                SampleField::Raw => {
                    cursor.set_context(ReadError::RawData);
                    let size = cursor.read_u32::<T>()?;
                    sample.raw = Some(cursor.read_bytes(size as usize)?.to_vec());
                }
                SampleField::BranchStack => {
                    cursor.set_context(ReadError::BranchStack);
                    self.read_branch_stack::<T>(&mut cursor, &mut sample)?;
                }
                SampleField::RegsUser => {
                    cursor.set_context(ReadError::RegisterDump);
                    sample.regs_user =
                        Some(read_register_dump::<T>(&mut cursor, self.regs_user_count)?);
                }
                SampleField::StackUser => {
                    cursor.set_context(ReadError::StackDump);
                    let size = cursor.read_u64::<T>()?;
                    let size = usize::try_from(size).map_err(|_| ReadError::StackDump)?;
                    let data = cursor.read_bytes(size)?.to_vec();
                    let dyn_size = if size != 0 {
                        cursor.read_u64::<T>()?
                    } else {
                        0
                    };
                    sample.stack_user = Some(StackDump { data, dyn_size });
                }
                SampleField::Weight => {
                    let full = cursor.read_u64::<T>()?;
                    if self.sample_type & PERF_SAMPLE_WEIGHT_STRUCT != 0 {
                        // The union is laid out so that var1_dw is always the
                        // low half of the full weight.
                        sample.weight_struct = Some(WeightStruct {
                            var1_dw: full as u32,
                            var2_w: (full >> 32) as u16 as u32,
                            var3_w: (full >> 48) as u16 as u32,
                        });
                    } else {
                        sample.weight = Some(full);
                    }
                }
                SampleField::DataSrc => sample.data_src = Some(cursor.read_u64::<T>()?),
                SampleField::Transaction => sample.transaction = Some(cursor.read_u64::<T>()?),
                SampleField::RegsIntr => {
                    cursor.set_context(ReadError::RegisterDump);
                    sample.regs_intr =
                        Some(read_register_dump::<T>(&mut cursor, self.regs_intr_count)?);
                }
                SampleField::PhysAddr => sample.phys_addr = Some(cursor.read_u64::<T>()?),
                SampleField::Cgroup => sample.cgroup = Some(cursor.read_u64::<T>()?),
                SampleField::DataPageSize => sample.data_page_size = Some(cursor.read_u64::<T>()?),
                SampleField::CodePageSize => sample.code_page_size = Some(cursor.read_u64::<T>()?),
                SampleField::Aux => {
                    let size = cursor.read_u64::<T>()?;
                    let size = usize::try_from(size).map_err(|_| ReadError::SampleInfo)?;
                    sample.aux = Some(cursor.read_bytes(size)?.to_vec());
                }
            }
        }
        Ok((sample, cursor.position()))
    }

    pub(crate) fn read_read_info<T: ByteOrder>(&self, cursor: &mut ByteCursor) -> Result<ReadInfo, Error> {
        let format = self.read_format;
        let mut info = ReadInfo::default();
        if format & PERF_FORMAT_GROUP != 0 {
            let nr = cursor.read_u64::<T>()?;
            info.time_enabled = self.read_if::<T>(cursor, PERF_FORMAT_TOTAL_TIME_ENABLED)?;
            info.time_running = self.read_if::<T>(cursor, PERF_FORMAT_TOTAL_TIME_RUNNING)?;
            let entry_size = 8 * (1 + (format & (PERF_FORMAT_ID | PERF_FORMAT_LOST)).count_ones());
            if nr
                .checked_mul(u64::from(entry_size))
                .is_none_or(|len| len > cursor.remaining() as u64)
            {
                return Err(ReadError::ReadValues.into());
            }
            for _ in 0..nr {
                let value = cursor.read_u64::<T>()?;
                let id = self.read_if::<T>(cursor, PERF_FORMAT_ID)?;
                let lost = self.read_if::<T>(cursor, PERF_FORMAT_LOST)?;
                info.values.push(ReadValue { value, id, lost });
            }
        } else {
            let value = cursor.read_u64::<T>()?;
            info.time_enabled = self.read_if::<T>(cursor, PERF_FORMAT_TOTAL_TIME_ENABLED)?;
            info.time_running = self.read_if::<T>(cursor, PERF_FORMAT_TOTAL_TIME_RUNNING)?;
            let id = self.read_if::<T>(cursor, PERF_FORMAT_ID)?;
            let lost = self.read_if::<T>(cursor, PERF_FORMAT_LOST)?;
            info.values.push(ReadValue { value, id, lost });
        }
        Ok(info)
    }

    fn read_if<T: ByteOrder>(
        &self,
        cursor: &mut ByteCursor,
        format_flag: u64,
    ) -> Result<Option<u64>, ReadError> {
        if self.read_format & format_flag != 0 {
            cursor.read_u64::<T>().map(Some)
        } else {
            Ok(None)
        }
    }

    fn read_branch_stack<T: ByteOrder>(
        &self,
        cursor: &mut ByteCursor,
        sample: &mut SampleEvent,
    ) -> Result<(), Error> {
        let nr = cursor.read_u64::<T>()?;
        if self.branch_hw_index {
            sample.branch_stack_hw_idx = Some(cursor.read_u64::<T>()?);
        }
        if nr
            .checked_mul(BRANCH_ENTRY_SIZE as u64)
            .is_none_or(|len| len > cursor.remaining() as u64)
        {
            return Err(ReadError::BranchStack.into());
        }
        let endian = endianness_of::<T>();
        for _ in 0..nr {
            let from_ip = cursor.read_u64::<T>()?;
            let to_ip = cursor.read_u64::<T>()?;
            let flags = decode_bitfield_word(cursor.read_u64::<T>()?, BRANCH_FLAGS, endian);
            sample.branch_stack.push(BranchStackEntry {
                from_ip,
                to_ip,
                mispredicted: MISPRED.get(flags) != 0,
                predicted: PREDICTED.get(flags) != 0,
                in_transaction: IN_TX.get(flags) != 0,
                abort: ABORT.get(flags) != 0,
                cycles: CYCLES.get(flags) as u32,
                r#type: BRANCH_TYPE.get(flags) as u32,
                spec: SPEC.get(flags) as u32,
            });
        }
        Ok(())
    }

    pub(crate) fn write_sample_event_impl<T: ByteOrder>(
        &self,
        sample: &SampleEvent,
        writer: &mut ByteWriter,
    ) {
        for entry in self.enabled(SAMPLE_EVENT_LAYOUT) {
            match entry.field {
                SampleField::Identifier | SampleField::Id => {
                    writer.write_u64::<T>(sample.id.unwrap_or_default())
                }
                SampleField::Ip => writer.write_u64::<T>(sample.ip.unwrap_or_default()),
                SampleField::Tid => {
                    writer.write_u32::<T>(sample.pid.unwrap_or_default());
                    writer.write_u32::<T>(sample.tid.unwrap_or_default());
                }
                SampleField::Time => {
                    writer.write_u64::<T>(sample.sample_time_ns.unwrap_or_default())
                }
                SampleField::Addr => writer.write_u64::<T>(sample.addr.unwrap_or_default()),
                SampleField::StreamId => {
                    writer.write_u64::<T>(sample.stream_id.unwrap_or_default())
                }
                SampleField::Cpu => {
                    writer.write_u32::<T>(sample.cpu.unwrap_or_default());
                    writer.write_u32::<T>(0);
                }
                SampleField::Period => writer.write_u64::<T>(sample.period.unwrap_or_default()),
                SampleField::Read => {
                    let info = sample.read_info.clone().unwrap_or_default();
                    self.write_read_info::<T>(&info, writer);
                }
                SampleField::Callchain => {
                    writer.write_u64::<T>(sample.callchain.len() as u64);
                    writer.write_u64_slice::<T>(&sample.callchain);
                }
                SampleField::Raw => {
                    let raw = sample.raw.as_deref().unwrap_or_default();
                    writer.write_u32::<T>(raw.len() as u32);
                    writer.write_bytes(raw);
                }
                SampleField::BranchStack => self.write_branch_stack::<T>(sample, writer),
                SampleField::RegsUser => write_register_dump::<T>(
                    sample.regs_user.as_ref(),
                    self.regs_user_count,
                    writer,
                ),
                SampleField::StackUser => {
                    let data = sample
                        .stack_user
                        .as_ref()
                        .map(|stack| &stack.data[..])
                        .unwrap_or_default();
                    writer.write_u64::<T>(data.len() as u64);
                    writer.write_bytes(data);
                    if !data.is_empty() {
                        let dyn_size = sample.stack_user.as_ref().map_or(0, |s| s.dyn_size);
                        writer.write_u64::<T>(dyn_size);
                    }
                }
                SampleField::Weight => {
                    let full = if self.sample_type & PERF_SAMPLE_WEIGHT_STRUCT != 0 {
                        let weight = sample.weight_struct.unwrap_or_default();
                        u64::from(weight.var1_dw)
                            | u64::from(weight.var2_w as u16) << 32
                            | u64::from(weight.var3_w as u16) << 48
                    } else {
                        sample.weight.unwrap_or_default()
                    };
                    writer.write_u64::<T>(full);
                }
                SampleField::DataSrc => writer.write_u64::<T>(sample.data_src.unwrap_or_default()),
                SampleField::Transaction => {
                    writer.write_u64::<T>(sample.transaction.unwrap_or_default())
                }
                SampleField::RegsIntr => write_register_dump::<T>(
                    sample.regs_intr.as_ref(),
                    self.regs_intr_count,
                    writer,
                ),
                SampleField::PhysAddr => {
                    writer.write_u64::<T>(sample.phys_addr.unwrap_or_default())
                }
                SampleField::Cgroup => writer.write_u64::<T>(sample.cgroup.unwrap_or_default()),
                SampleField::DataPageSize => {
                    writer.write_u64::<T>(sample.data_page_size.unwrap_or_default())
                }
                SampleField::CodePageSize => {
                    writer.write_u64::<T>(sample.code_page_size.unwrap_or_default())
                }
                SampleField::Aux => {
                    let aux = sample.aux.as_deref().unwrap_or_default();
                    writer.write_u64::<T>(aux.len() as u64);
                    writer.write_bytes(aux);
                }
            }
        }
    }

    pub(crate) fn write_read_info<T: ByteOrder>(&self, info: &ReadInfo, writer: &mut ByteWriter) {
        let format = self.read_format;
        let write_if = |writer: &mut ByteWriter, flag: u64, value: Option<u64>| {
            if format & flag != 0 {
                writer.write_u64::<T>(value.unwrap_or_default());
            }
        };
        if format & PERF_FORMAT_GROUP != 0 {
            writer.write_u64::<T>(info.values.len() as u64);
            write_if(writer, PERF_FORMAT_TOTAL_TIME_ENABLED, info.time_enabled);
            write_if(writer, PERF_FORMAT_TOTAL_TIME_RUNNING, info.time_running);
            for value in &info.values {
                writer.write_u64::<T>(value.value);
                write_if(writer, PERF_FORMAT_ID, value.id);
                write_if(writer, PERF_FORMAT_LOST, value.lost);
            }
        } else {
            let value = info.values.first().cloned().unwrap_or_default();
            writer.write_u64::<T>(value.value);
            write_if(writer, PERF_FORMAT_TOTAL_TIME_ENABLED, info.time_enabled);
            write_if(writer, PERF_FORMAT_TOTAL_TIME_RUNNING, info.time_running);
            write_if(writer, PERF_FORMAT_ID, value.id);
            write_if(writer, PERF_FORMAT_LOST, value.lost);
        }
    }

    fn write_branch_stack<T: ByteOrder>(&self, sample: &SampleEvent, writer: &mut ByteWriter) {
        // An empty branch stack still has its nr.
        writer.write_u64::<T>(sample.branch_stack.len() as u64);
        if self.branch_hw_index {
            writer.write_u64::<T>(sample.branch_stack_hw_idx.unwrap_or_default());
        }
        let endian = endianness_of::<T>();
        for entry in &sample.branch_stack {
            let mut flags = 0;
            flags = MISPRED.set(flags, entry.mispredicted as u64);
            flags = PREDICTED.set(flags, entry.predicted as u64);
            flags = IN_TX.set(flags, entry.in_transaction as u64);
            flags = ABORT.set(flags, entry.abort as u64);
            flags = CYCLES.set(flags, u64::from(entry.cycles));
            flags = BRANCH_TYPE.set(flags, u64::from(entry.r#type));
            flags = SPEC.set(flags, u64::from(entry.spec));
            writer.write_u64::<T>(entry.from_ip);
            writer.write_u64::<T>(entry.to_ip);
            writer.write_u64::<T>(encode_bitfield_word(flags, BRANCH_FLAGS, endian));
        }
    }

    /// The size of the payload which [`Self::write_sample_event`] produces
    /// for `sample`.
    pub fn sample_event_size(&self, sample: &SampleEvent) -> usize {
        self.enabled(SAMPLE_EVENT_LAYOUT)
            .map(|entry| match (entry.size, entry.field) {
                (FieldSize::Fixed(size), _) => size,
                (FieldSize::Variable, SampleField::Read) => {
                    let info = sample.read_info.clone().unwrap_or_default();
                    self.read_info_size(&info)
                }
                (FieldSize::Variable, SampleField::Callchain) => 8 + 8 * sample.callchain.len(),
                (FieldSize::Variable, SampleField::Raw) => {
                    4 + sample.raw.as_ref().map_or(0, Vec::len)
                }
                (FieldSize::Variable, SampleField::BranchStack) => {
                    8 + if self.branch_hw_index { 8 } else { 0 }
                        + BRANCH_ENTRY_SIZE * sample.branch_stack.len()
                }
                (FieldSize::Variable, SampleField::RegsUser) => {
                    register_dump_size(sample.regs_user.as_ref(), self.regs_user_count)
                }
                (FieldSize::Variable, SampleField::RegsIntr) => {
                    register_dump_size(sample.regs_intr.as_ref(), self.regs_intr_count)
                }
                (FieldSize::Variable, SampleField::StackUser) => {
                    match sample.stack_user.as_ref().map_or(0, |stack| stack.data.len()) {
                        0 => 8,
                        len => 8 + len + 8,
                    }
                }
                (FieldSize::Variable, SampleField::Aux) => {
                    8 + sample.aux.as_ref().map_or(0, Vec::len)
                }
                (FieldSize::Variable, _) => 0,
            })
            .sum()
    }

    pub(crate) fn read_info_size(&self, info: &ReadInfo) -> usize {
        let format = self.read_format;
        let times = (format & (PERF_FORMAT_TOTAL_TIME_ENABLED | PERF_FORMAT_TOTAL_TIME_RUNNING))
            .count_ones() as usize;
        let per_value = 1 + (format & (PERF_FORMAT_ID | PERF_FORMAT_LOST)).count_ones() as usize;
        if format & PERF_FORMAT_GROUP != 0 {
            8 * (1 + times + per_value * info.values.len())
        } else {
            8 * (times + per_value)
        }
    }

    pub(crate) fn read_sample_id_impl<T: ByteOrder>(
        &self,
        suffix: &[u8],
    ) -> Result<SampleInfo, Error> {
        let mut cursor = ByteCursor::new(suffix, ReadError::SampleId);
        let mut info = SampleInfo::default();
        for entry in self.enabled(SAMPLE_ID_LAYOUT) {
            match entry.field {
                SampleField::Tid => {
                    info.pid = Some(cursor.read_u32::<T>()?);
                    info.tid = Some(cursor.read_u32::<T>()?);
                }
                SampleField::Time => info.sample_time_ns = Some(cursor.read_u64::<T>()?),
                SampleField::Id | SampleField::Identifier => {
                    info.id = Some(cursor.read_u64::<T>()?)
                }
                SampleField::StreamId => info.stream_id = Some(cursor.read_u64::<T>()?),
                SampleField::Cpu => {
                    info.cpu = Some(cursor.read_u32::<T>()?);
                    let _reserved = cursor.read_u32::<T>()?;
                }
                _ => {}
            }
        }
        Ok(info)
    }

    pub(crate) fn write_sample_id_impl<T: ByteOrder>(
        &self,
        info: &SampleInfo,
        writer: &mut ByteWriter,
    ) {
        for entry in self.enabled(SAMPLE_ID_LAYOUT) {
            match entry.field {
                SampleField::Tid => {
                    writer.write_u32::<T>(info.pid.unwrap_or_default());
                    writer.write_u32::<T>(info.tid.unwrap_or_default());
                }
                SampleField::Time => writer.write_u64::<T>(info.sample_time_ns.unwrap_or_default()),
                SampleField::Id | SampleField::Identifier => {
                    writer.write_u64::<T>(info.id.unwrap_or_default())
                }
                SampleField::StreamId => writer.write_u64::<T>(info.stream_id.unwrap_or_default()),
                SampleField::Cpu => {
                    writer.write_u32::<T>(info.cpu.unwrap_or_default());
                    writer.write_u32::<T>(0);
                }
                _ => {}
            }
        }
    }
}

fn read_register_dump<T: ByteOrder>(
    cursor: &mut ByteCursor,
    reg_count: usize,
) -> Result<RegisterDump, ReadError> {
    let abi = cursor.read_u64::<T>()?;
    let regs = if abi != 0 {
        cursor.read_u64_vec::<T>(reg_count as u64)?
    } else {
        Vec::new()
    };
    Ok(RegisterDump { abi, regs })
}

fn write_register_dump<T: ByteOrder>(
    dump: Option<&RegisterDump>,
    reg_count: usize,
    writer: &mut ByteWriter,
) {
    let abi = dump.map_or(0, |dump| dump.abi);
    writer.write_u64::<T>(abi);
    if abi != 0 {
        let regs = dump.map(|dump| &dump.regs[..]).unwrap_or_default();
        for i in 0..reg_count {
            writer.write_u64::<T>(regs.get(i).copied().unwrap_or_default());
        }
    }
}

fn register_dump_size(dump: Option<&RegisterDump>, reg_count: usize) -> usize {
    match dump.map_or(0, |dump| dump.abi) {
        0 => 8,
        _ => 8 + 8 * reg_count,
    }
}
