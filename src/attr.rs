use byteorder::ByteOrder;

use crate::codec::{decode_bitfield_word, encode_bitfield_word, endianness_of};
use crate::codec::{BitField, ByteCursor, ByteWriter};
use crate::constants::PERF_ATTR_SIZE_VER8;
use crate::error::{Error, ReadError};
use crate::proto::PerfEventAttr;

/// The size of the `perf_event_attr` layout which is written by this crate.
pub const PERF_EVENT_ATTR_SIZE: usize = PERF_ATTR_SIZE_VER8 as usize;

/// The smallest attr we accept: it needs to contain at least `type`, `size`
/// and `config`.
const MIN_ATTR_SIZE: usize = 16;

/// The bit-field word after `read_format`, member by member.
pub const ATTR_FLAGS: &[BitField] = &[
    BitField::new("disabled", 0, 1),
    BitField::new("inherit", 1, 1),
    BitField::new("pinned", 2, 1),
    BitField::new("exclusive", 3, 1),
    BitField::new("exclude_user", 4, 1),
    BitField::new("exclude_kernel", 5, 1),
    BitField::new("exclude_hv", 6, 1),
    BitField::new("exclude_idle", 7, 1),
    BitField::new("mmap", 8, 1),
    BitField::new("comm", 9, 1),
    BitField::new("freq", 10, 1),
    BitField::new("inherit_stat", 11, 1),
    BitField::new("enable_on_exec", 12, 1),
    BitField::new("task", 13, 1),
    BitField::new("watermark", 14, 1),
    PRECISE_IP,
    BitField::new("mmap_data", 17, 1),
    BitField::new("sample_id_all", 18, 1),
    BitField::new("exclude_host", 19, 1),
    BitField::new("exclude_guest", 20, 1),
    BitField::new("exclude_callchain_kernel", 21, 1),
    BitField::new("exclude_callchain_user", 22, 1),
    BitField::new("mmap2", 23, 1),
    BitField::new("comm_exec", 24, 1),
    BitField::new("use_clockid", 25, 1),
    BitField::new("context_switch", 26, 1),
    BitField::new("write_backward", 27, 1),
    BitField::new("namespaces", 28, 1),
    BitField::new("ksymbol", 29, 1),
    BitField::new("bpf_event", 30, 1),
    BitField::new("aux_output", 31, 1),
    BitField::new("cgroup", 32, 1),
    BitField::new("text_poke", 33, 1),
    BitField::new("build_id", 34, 1),
    BitField::new("inherit_thread", 35, 1),
    BitField::new("remove_on_exec", 36, 1),
    BitField::new("sigtrap", 37, 1),
    RESERVED_FLAGS,
];

const PRECISE_IP: BitField = BitField::new("precise_ip", 15, 2);
const RESERVED_FLAGS: BitField = BitField::new("__reserved_1", 38, 26);

/// Maps the single-bit members of [`ATTR_FLAGS`] to the fields of
/// [`PerfEventAttr`].
macro_rules! single_bit_flags {
    ($($field:ident = $bit:expr),* $(,)?) => {
        fn flags_to_word(attr: &PerfEventAttr) -> u64 {
            let mut word = 0;
            $(
                if attr.$field {
                    word |= 1 << $bit;
                }
            )*
            word
        }

        fn apply_flags_word(attr: &mut PerfEventAttr, word: u64) {
            $(
                attr.$field = word & (1 << $bit) != 0;
            )*
        }
    };
}

single_bit_flags! {
    disabled = 0,
    inherit = 1,
    pinned = 2,
    exclusive = 3,
    exclude_user = 4,
    exclude_kernel = 5,
    exclude_hv = 6,
    exclude_idle = 7,
    mmap = 8,
    comm = 9,
    freq = 10,
    inherit_stat = 11,
    enable_on_exec = 12,
    task = 13,
    watermark = 14,
    mmap_data = 17,
    sample_id_all = 18,
    exclude_host = 19,
    exclude_guest = 20,
    exclude_callchain_kernel = 21,
    exclude_callchain_user = 22,
    mmap2 = 23,
    comm_exec = 24,
    use_clockid = 25,
    context_switch = 26,
    write_backward = 27,
    namespaces = 28,
    ksymbol = 29,
    bpf_event = 30,
    aux_output = 31,
    cgroup = 32,
    text_poke = 33,
    build_id = 34,
    inherit_thread = 35,
    remove_on_exec = 36,
    sigtrap = 37,
}

/// Reads the `size` member of a `perf_event_attr` without parsing the rest.
/// A size of zero stands for `PERF_ATTR_SIZE_VER0`.
pub fn peek_attr_size<T: ByteOrder>(bytes: &[u8]) -> Result<u32, ReadError> {
    let mut cursor = ByteCursor::new(bytes, ReadError::PerfEventAttr);
    cursor.skip(4)?;
    let size = cursor.read_u32::<T>()?;
    Ok(if size == 0 {
        crate::constants::PERF_ATTR_SIZE_VER0
    } else {
        size
    })
}

/// Parses a `perf_event_attr` from `bytes`, which hold the whole struct as
/// stored in the file.
///
/// Fields past the end of `bytes` are zero, and bytes beyond the layout
/// known to this crate are ignored.
pub fn parse_perf_event_attr<T: ByteOrder>(bytes: &[u8]) -> Result<PerfEventAttr, Error> {
    if bytes.len() < MIN_ATTR_SIZE {
        return Err(Error::UnsupportedAttributeSize(bytes.len() as u64));
    }
    let mut padded = [0; PERF_EVENT_ATTR_SIZE];
    let known_len = bytes.len().min(PERF_EVENT_ATTR_SIZE);
    padded[..known_len].copy_from_slice(&bytes[..known_len]);

    let mut cursor = ByteCursor::new(&padded, ReadError::PerfEventAttr);
    let type_ = cursor.read_u32::<T>()?;
    let size = cursor.read_u32::<T>()?;
    let config = cursor.read_u64::<T>()?;
    let sample_period_or_freq = cursor.read_u64::<T>()?;
    let sample_type = cursor.read_u64::<T>()?;
    let read_format = cursor.read_u64::<T>()?;
    let flags = decode_bitfield_word(cursor.read_u64::<T>()?, ATTR_FLAGS, endianness_of::<T>());
    let wakeup_events_or_watermark = cursor.read_u32::<T>()?;
    let bp_type = cursor.read_u32::<T>()?;
    let config1 = cursor.read_u64::<T>()?;
    let config2 = cursor.read_u64::<T>()?;
    let branch_sample_type = cursor.read_u64::<T>()?;
    let sample_regs_user = cursor.read_u64::<T>()?;
    let sample_stack_user = cursor.read_u32::<T>()?;
    let clockid = cursor.read_i32::<T>()?;
    let sample_regs_intr = cursor.read_u64::<T>()?;
    let aux_watermark = cursor.read_u32::<T>()?;
    let sample_max_stack = cursor.read_u16::<T>()?;
    let _reserved_2 = cursor.read_u16::<T>()?;
    let aux_sample_size = cursor.read_u32::<T>()?;
    let _reserved_3 = cursor.read_u32::<T>()?;
    let sig_data = cursor.read_u64::<T>()?;
    let config3 = cursor.read_u64::<T>()?;

    let mut attr = PerfEventAttr {
        r#type: type_,
        size,
        config,
        sample_type,
        read_format,
        precise_ip: PRECISE_IP.get(flags) as u32,
        reserved_flag_bits: RESERVED_FLAGS.get(flags) << RESERVED_FLAGS.shift,
        bp_type,
        config1,
        config2,
        branch_sample_type,
        sample_regs_user,
        sample_stack_user,
        clockid,
        sample_regs_intr,
        aux_watermark,
        sample_max_stack: u32::from(sample_max_stack),
        aux_sample_size,
        sig_data,
        config3,
        ..Default::default()
    };
    apply_flags_word(&mut attr, flags);

    if attr.freq {
        attr.sample_freq = Some(sample_period_or_freq);
    } else {
        attr.sample_period = Some(sample_period_or_freq);
    }
    if attr.watermark {
        attr.wakeup_watermark = Some(wakeup_events_or_watermark);
    } else {
        attr.wakeup_events = Some(wakeup_events_or_watermark);
    }
    Ok(attr)
}

/// Writes `attr` using the full layout of [`PERF_EVENT_ATTR_SIZE`] bytes.
/// The `size` member is written as stored in `attr`.
pub fn write_perf_event_attr<T: ByteOrder>(attr: &PerfEventAttr, writer: &mut ByteWriter) {
    let mut flags = flags_to_word(attr);
    flags = PRECISE_IP.set(flags, u64::from(attr.precise_ip));
    flags = RESERVED_FLAGS.set(flags, attr.reserved_flag_bits >> RESERVED_FLAGS.shift);

    let sample_period_or_freq = if attr.freq {
        attr.sample_freq.unwrap_or_default()
    } else {
        attr.sample_period.unwrap_or_default()
    };
    let wakeup_events_or_watermark = if attr.watermark {
        attr.wakeup_watermark.unwrap_or_default()
    } else {
        attr.wakeup_events.unwrap_or_default()
    };

    writer.write_u32::<T>(attr.r#type);
    writer.write_u32::<T>(attr.size);
    writer.write_u64::<T>(attr.config);
    writer.write_u64::<T>(sample_period_or_freq);
    writer.write_u64::<T>(attr.sample_type);
    writer.write_u64::<T>(attr.read_format);
    writer.write_u64::<T>(encode_bitfield_word(flags, ATTR_FLAGS, endianness_of::<T>()));
    writer.write_u32::<T>(wakeup_events_or_watermark);
    writer.write_u32::<T>(attr.bp_type);
    writer.write_u64::<T>(attr.config1);
    writer.write_u64::<T>(attr.config2);
    writer.write_u64::<T>(attr.branch_sample_type);
    writer.write_u64::<T>(attr.sample_regs_user);
    writer.write_u32::<T>(attr.sample_stack_user);
    writer.write_i32::<T>(attr.clockid);
    writer.write_u64::<T>(attr.sample_regs_intr);
    writer.write_u32::<T>(attr.aux_watermark);
    writer.write_u16::<T>(attr.sample_max_stack as u16);
    writer.write_u16::<T>(0);
    writer.write_u32::<T>(attr.aux_sample_size);
    writer.write_u32::<T>(0);
    writer.write_u64::<T>(attr.sig_data);
    writer.write_u64::<T>(attr.config3);
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};

    use super::*;
    use crate::constants::*;

    fn example_attr() -> PerfEventAttr {
        PerfEventAttr {
            r#type: 0,
            size: PERF_ATTR_SIZE_VER8,
            config: 456,
            sample_period: Some(100_001),
            sample_type: PERF_SAMPLE_IP | PERF_SAMPLE_TID | PERF_SAMPLE_IDENTIFIER,
            read_format: PERF_FORMAT_ID,
            disabled: true,
            exclude_kernel: true,
            precise_ip: 2,
            sample_id_all: true,
            mmap2: true,
            sigtrap: true,
            wakeup_events: Some(1),
            sample_regs_user: 0xff0fff,
            sample_stack_user: 8192,
            clockid: 1,
            sample_max_stack: 127,
            config3: 9,
            ..Default::default()
        }
    }

    #[test]
    fn parse_written_attr() {
        let attr = example_attr();
        let mut writer = ByteWriter::new();
        write_perf_event_attr::<LittleEndian>(&attr, &mut writer);
        assert_eq!(writer.len(), PERF_EVENT_ATTR_SIZE);

        let bytes = writer.into_inner();
        // precise_ip = 2 is bit 16, sample_id_all is bit 18, mmap2 is bit 23.
        assert_eq!(bytes[42], 0b1000_0101);
        assert_eq!(parse_perf_event_attr::<LittleEndian>(&bytes).unwrap(), attr);
    }

    #[test]
    fn cross_endian_bitfields() {
        let attr = example_attr();
        let mut writer = ByteWriter::new();
        write_perf_event_attr::<BigEndian>(&attr, &mut writer);
        let bytes = writer.into_inner();

        // "disabled" is the most significant bit of the big-endian flags word.
        assert_eq!(bytes[40] & 0x80, 0x80);
        // precise_ip = 0b10 occupies bits 48 and 47, msb first.
        assert_eq!(bytes[41] & 0x01, 0x01);
        assert_eq!(bytes[42] & 0x80, 0x00);

        let parsed = parse_perf_event_attr::<BigEndian>(&bytes).unwrap();
        assert_eq!(parsed, attr);
        assert_eq!(parsed.precise_ip, 2);
        assert!(parsed.sample_id_all);
    }

    #[test]
    fn small_attr_leaves_missing_fields_zero() {
        // type, size, config, sample_period, sample_type, read_format
        let mut bytes = vec![];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&10_000_001u64.to_le_bytes());
        bytes.extend_from_slice(&(PERF_SAMPLE_IP | PERF_SAMPLE_ID).to_le_bytes());
        bytes.extend_from_slice(&PERF_FORMAT_ID.to_le_bytes());

        let attr = parse_perf_event_attr::<LittleEndian>(&bytes).unwrap();
        assert_eq!(attr.r#type, 1);
        assert_eq!(attr.size, 40);
        assert_eq!(attr.config, 2);
        assert_eq!(attr.sample_period, Some(10_000_001));
        assert_eq!(attr.sample_type, PERF_SAMPLE_IP | PERF_SAMPLE_ID);
        assert!(!attr.sample_id_all);
        assert_eq!(attr.sample_regs_user, 0);
        assert_eq!(attr.config3, 0);
    }

    #[test]
    fn large_attr_ignores_unknown_tail() {
        let attr = example_attr();
        let mut writer = ByteWriter::new();
        write_perf_event_attr::<LittleEndian>(&attr, &mut writer);
        writer.write_u64::<LittleEndian>(0xdead_beef_dead_beef);
        let bytes = writer.into_inner();
        assert_eq!(parse_perf_event_attr::<LittleEndian>(&bytes).unwrap(), attr);
    }

    #[test]
    fn implausible_size_is_rejected() {
        assert!(matches!(
            parse_perf_event_attr::<LittleEndian>(&[0; 8]),
            Err(Error::UnsupportedAttributeSize(8))
        ));
    }

    #[test]
    fn unions_follow_their_selector_flags() {
        let attr = PerfEventAttr {
            freq: true,
            sample_freq: Some(4000),
            watermark: true,
            wakeup_watermark: Some(4096),
            ..Default::default()
        };
        let mut writer = ByteWriter::new();
        write_perf_event_attr::<LittleEndian>(&attr, &mut writer);
        let parsed = parse_perf_event_attr::<LittleEndian>(writer.as_slice()).unwrap();
        assert_eq!(parsed.sample_freq, Some(4000));
        assert_eq!(parsed.sample_period, None);
        assert_eq!(parsed.wakeup_watermark, Some(4096));
        assert_eq!(parsed.wakeup_events, None);
    }

    #[test]
    fn zero_size_means_ver0() {
        let bytes = [0u8; 64];
        assert_eq!(peek_attr_size::<LittleEndian>(&bytes), Ok(PERF_ATTR_SIZE_VER0));
    }
}
