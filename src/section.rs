use byteorder::{ByteOrder, ReadBytesExt};

use std::io::Read;

use crate::codec::ByteWriter;
use crate::error::Error;

/// `perf_file_section`
///
/// A PerfFileSection contains a pointer to another section of the perf file.
/// The header contains three such pointers: for attributes, data and event types.
/// The feature index is an array of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfFileSection {
    /// offset from start of file
    pub offset: u64,
    /// size of the section
    pub size: u64,
}

impl PerfFileSection {
    pub const STRUCT_SIZE: u64 = 8 + 8;

    pub fn parse<R: Read, T: ByteOrder>(mut reader: R) -> Result<Self, std::io::Error> {
        let offset = reader.read_u64::<T>()?;
        let size = reader.read_u64::<T>()?;
        Ok(Self { offset, size })
    }

    pub fn write<T: ByteOrder>(&self, writer: &mut ByteWriter) {
        writer.write_u64::<T>(self.offset);
        writer.write_u64::<T>(self.size);
    }

    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    /// Returns the bytes covered by this section, or `None` if the section
    /// reaches beyond the end of `data`.
    pub fn slice<'a>(&self, data: &'a [u8]) -> Result<Option<&'a [u8]>, Error> {
        let start = usize::try_from(self.offset).map_err(|_| Error::SectionSizeTooBig)?;
        let size = usize::try_from(self.size).map_err(|_| Error::SectionSizeTooBig)?;
        Ok(start
            .checked_add(size)
            .and_then(|end| data.get(start..end)))
    }
}
