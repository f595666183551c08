use std::io::Read;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use linux_perf_event_reader::Endianness;

use super::codec::ByteWriter;
use super::error::{Error, ReadError};
use super::features::FeatureSet;
use super::section::PerfFileSection;

const MAGIC_SIZE: usize = 8;

/// The magic of a file written in little-endian byte order.
pub const PERF_MAGIC: [u8; MAGIC_SIZE] = *b"PERFILE2";
/// The same u64 magic, as it appears in a big-endian file.
pub const PERF_MAGIC_SWAPPED: [u8; MAGIC_SIZE] = *b"2ELIFREP";

/// Determines the byte order of a file from its magic value.
pub fn endianness_from_magic(magic: [u8; MAGIC_SIZE]) -> Result<Endianness, Error> {
    match magic {
        PERF_MAGIC => Ok(Endianness::LittleEndian),
        PERF_MAGIC_SWAPPED => Ok(Endianness::BigEndian),
        _ => Err(Error::UnrecognizedMagicValue(magic)),
    }
}

fn map_eof(context: ReadError) -> impl Fn(std::io::Error) -> Error {
    move |e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::TruncatedRecord(context),
        _ => Error::IoError(e),
    }
}

/// `perf_header`
///
/// The magic number identifies the perf file and the version. Current perf versions
/// use PERFILE2. Old perf versions generated a version 1 format (PERFFILE). Version 1
/// is not supported. The magic number also identifies the endian. When the
/// magic value is 64bit byte swapped compared the file is in non-native
/// endian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfHeader {
    pub endian: Endianness,
    /// size of the header
    pub header_size: u64,
    /// size of an attribute in attrs, including its ids section
    pub attr_size: u64,
    pub attr_section: PerfFileSection,
    pub data_section: PerfFileSection,
    pub event_types_section: PerfFileSection,
    /// Feature flags
    pub features: FeatureSet,
}

impl PerfHeader {
    pub const STRUCT_SIZE: u64 = 8 + 8 + 8 + 3 * PerfFileSection::STRUCT_SIZE + 4 * 8;

    pub fn parse<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut magic = [0; MAGIC_SIZE];
        reader
            .read_exact(&mut magic)
            .map_err(map_eof(ReadError::PerfHeader))?;

        let header = match endianness_from_magic(magic)? {
            Endianness::LittleEndian => Self::parse_impl::<R, LittleEndian>(reader),
            Endianness::BigEndian => Self::parse_impl::<R, BigEndian>(reader),
        };
        header.map_err(map_eof(ReadError::PerfHeader))
    }

    fn parse_impl<R: Read, T: ByteOrder>(mut reader: R) -> Result<Self, std::io::Error> {
        let header_size = reader.read_u64::<T>()?;
        let attr_size = reader.read_u64::<T>()?;
        let attr_section = PerfFileSection::parse::<_, T>(&mut reader)?;
        let data_section = PerfFileSection::parse::<_, T>(&mut reader)?;
        let event_types_section = PerfFileSection::parse::<_, T>(&mut reader)?;
        let features = FeatureSet([
            reader.read_u64::<T>()?,
            reader.read_u64::<T>()?,
            reader.read_u64::<T>()?,
            reader.read_u64::<T>()?,
        ]);

        Ok(Self {
            endian: crate::codec::endianness_of::<T>(),
            header_size,
            attr_size,
            attr_section,
            data_section,
            event_types_section,
            features,
        })
    }

    /// Checks that the sections lie within a file of `file_len` bytes, and
    /// that the attrs are directly followed by the data.
    pub fn validate(&self, file_len: u64) -> Result<(), Error> {
        if self.header_size < Self::STRUCT_SIZE {
            return Err(Error::MalformedHeader("header size too small"));
        }
        for section in [
            self.attr_section,
            self.data_section,
            self.event_types_section,
        ] {
            match section.end() {
                Some(end) if end <= file_len => {}
                _ => return Err(Error::MalformedHeader("section reaches beyond the file")),
            }
        }
        if self.attr_section.size != 0 {
            if self.attr_size < PerfFileSection::STRUCT_SIZE + 8 {
                return Err(Error::UnsupportedAttributeSize(self.attr_size));
            }
            if self.attr_section.end() != Some(self.data_section.offset) {
                return Err(Error::MalformedHeader(
                    "attrs section is not followed by the data section",
                ));
            }
        }
        Ok(())
    }

    pub fn write<T: ByteOrder>(&self, writer: &mut ByteWriter) {
        // The magic is a u64 in the file's byte order.
        writer.write_u64::<T>(LittleEndian::read_u64(&PERF_MAGIC));
        writer.write_u64::<T>(self.header_size);
        writer.write_u64::<T>(self.attr_size);
        self.attr_section.write::<T>(writer);
        self.data_section.write::<T>(writer);
        self.event_types_section.write::<T>(writer);
        for word in self.features.0 {
            writer.write_u64::<T>(word);
        }
    }
}

/// `perf_pipe_file_header`
///
/// A minimal header used in pipe mode to avoid seeking.
/// In pipe mode, metadata is embedded in the stream via synthesized events
/// (PERF_RECORD_HEADER_ATTR, PERF_RECORD_HEADER_FEATURE) instead of using
/// file sections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfPipeHeader {
    pub endian: Endianness,
    /// size of the header (should be 16)
    pub size: u64,
}

impl PerfPipeHeader {
    pub const STRUCT_SIZE: u64 = 8 + 8;

    pub fn parse<R: Read>(mut reader: R) -> Result<Self, Error> {
        let mut magic = [0; MAGIC_SIZE];
        reader
            .read_exact(&mut magic)
            .map_err(map_eof(ReadError::PerfPipeHeader))?;

        let endian = endianness_from_magic(magic)?;
        let size = match endian {
            Endianness::LittleEndian => reader.read_u64::<LittleEndian>(),
            Endianness::BigEndian => reader.read_u64::<BigEndian>(),
        }
        .map_err(map_eof(ReadError::PerfPipeHeader))?;

        Ok(Self { endian, size })
    }

    /// Whether this header starts a piped stream rather than a flat file.
    pub fn is_pipe(&self) -> bool {
        self.size == Self::STRUCT_SIZE
    }
}
