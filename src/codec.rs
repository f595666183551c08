use byteorder::ByteOrder;
use linux_perf_event_reader::Endianness;

use crate::error::ReadError;

/// Returns the [`Endianness`] that corresponds to the byte order `T`.
pub fn endianness_of<T: ByteOrder>() -> Endianness {
    if T::read_u16(&[1, 0]) == 1 {
        Endianness::LittleEndian
    } else {
        Endianness::BigEndian
    }
}

/// The number of bytes occupied by a NUL-terminated string of length `len`
/// in a record, i.e. `ceil((len + 1) / 8) * 8`.
pub fn aligned_string_len(len: usize) -> usize {
    (len + 1).div_ceil(8) * 8
}

/// Truncates `bytes` at the first NUL byte.
pub fn trim_at_nul(bytes: &[u8]) -> &[u8] {
    let len = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    &bytes[..len]
}

/// A bounds-checked reader over a byte slice.
///
/// Every failed read reports the cursor's current [`ReadError`] context,
/// so that callers can tell which structure was truncated.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    context: ReadError,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], context: ReadError) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    /// Changes the error reported by subsequent failed reads.
    pub fn set_context(&mut self, context: ReadError) {
        self.context = context;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The bytes which haven't been consumed yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self.pos.checked_add(len).ok_or(self.context)?;
        let bytes = self.data.get(self.pos..end).ok_or(self.context)?;
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut array = [0; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16<T: ByteOrder>(&mut self) -> Result<u16, ReadError> {
        Ok(T::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32<T: ByteOrder>(&mut self) -> Result<u32, ReadError> {
        Ok(T::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32<T: ByteOrder>(&mut self) -> Result<i32, ReadError> {
        Ok(T::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64<T: ByteOrder>(&mut self) -> Result<u64, ReadError> {
        Ok(T::read_u64(self.read_bytes(8)?))
    }

    /// Reads `count` u64 values. The count is checked against the remaining
    /// length before allocating.
    pub fn read_u64_vec<T: ByteOrder>(&mut self, count: u64) -> Result<Vec<u64>, ReadError> {
        let byte_len = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(8))
            .ok_or(self.context)?;
        let bytes = self.read_bytes(byte_len)?;
        Ok(bytes.chunks_exact(8).map(T::read_u64).collect())
    }

    /// Reads a string stored in a fixed-size buffer of `len` bytes, padded
    /// with NUL bytes.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String, ReadError> {
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(trim_at_nul(bytes)).into_owned())
    }

    /// Reads a NUL-terminated string padded to a multiple of 8 bytes, within
    /// the next `max_len` bytes. The cursor advances past the padding, or to
    /// the end of the window if the padding is cut short.
    pub fn read_padded_string(&mut self, max_len: usize) -> Result<String, ReadError> {
        let window = self.rest().get(..max_len).ok_or(self.context)?;
        let s = trim_at_nul(window);
        let consumed = aligned_string_len(s.len()).min(max_len);
        let string = String::from_utf8_lossy(s).into_owned();
        self.pos += consumed;
        Ok(string)
    }
}

/// An append-only writer which lays out values in the byte order `T` of the
/// file being written.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, len: usize) {
        self.buf.resize(self.buf.len() + len, 0);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16<T: ByteOrder>(&mut self, value: u16) {
        let mut bytes = [0; 2];
        T::write_u16(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_u32<T: ByteOrder>(&mut self, value: u32) {
        let mut bytes = [0; 4];
        T::write_u32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_i32<T: ByteOrder>(&mut self, value: i32) {
        let mut bytes = [0; 4];
        T::write_i32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_u64<T: ByteOrder>(&mut self, value: u64) {
        let mut bytes = [0; 8];
        T::write_u64(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_u64_slice<T: ByteOrder>(&mut self, values: &[u64]) {
        for value in values {
            self.write_u64::<T>(*value);
        }
    }

    /// Overwrites a u16 which was written earlier, e.g. a record size.
    pub fn patch_u16<T: ByteOrder>(&mut self, offset: usize, value: u16) {
        T::write_u16(&mut self.buf[offset..offset + 2], value);
    }

    pub fn patch_u64<T: ByteOrder>(&mut self, offset: usize, value: u64) {
        T::write_u64(&mut self.buf[offset..offset + 8], value);
    }

    /// Writes `s` into a buffer of exactly `len` bytes, truncating it so that
    /// at least one NUL byte remains.
    pub fn write_fixed_string(&mut self, s: &str, len: usize) {
        let bytes = s.as_bytes();
        let copy_len = bytes.len().min(len.saturating_sub(1));
        self.write_bytes(&bytes[..copy_len]);
        self.write_zeros(len - copy_len);
    }

    /// Writes a NUL-terminated string padded to [`aligned_string_len`].
    pub fn write_padded_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_zeros(aligned_string_len(s.len()) - s.len());
    }
}

/// One member of a C bit-field word, counted from the least significant bit
/// of a little-endian layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub shift: u32,
    pub width: u32,
}

impl BitField {
    pub const fn new(name: &'static str, shift: u32, width: u32) -> Self {
        Self { name, shift, width }
    }

    fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Extracts this member from a canonical (little-endian layout) word.
    pub fn get(&self, word: u64) -> u64 {
        (word >> self.shift) & self.mask()
    }

    /// Stores `value` as this member of a canonical word.
    pub fn set(&self, word: u64, value: u64) -> u64 {
        (word & !(self.mask() << self.shift)) | ((value & self.mask()) << self.shift)
    }

    fn big_endian_shift(&self) -> u32 {
        64 - self.shift - self.width
    }
}

/// Converts a bit-field word, as loaded from a file with `endian` byte order,
/// into the canonical layout in which member bits are counted from the least
/// significant bit.
///
/// Big-endian compilers allocate bit-field members starting from the most
/// significant bit, so the members' positions are mirrored while each
/// member's value keeps its own bit order. `fields` must cover all 64 bits.
pub fn decode_bitfield_word(word: u64, fields: &[BitField], endian: Endianness) -> u64 {
    match endian {
        Endianness::LittleEndian => word,
        Endianness::BigEndian => fields.iter().fold(0, |canonical, field| {
            let value = (word >> field.big_endian_shift()) & field.mask();
            field.set(canonical, value)
        }),
    }
}

/// The inverse of [`decode_bitfield_word`].
pub fn encode_bitfield_word(canonical: u64, fields: &[BitField], endian: Endianness) -> u64 {
    match endian {
        Endianness::LittleEndian => canonical,
        Endianness::BigEndian => fields.iter().fold(0, |word, field| {
            word | (field.get(canonical) << field.big_endian_shift())
        }),
    }
}
