use std::io::Read;

use byteorder::{ByteOrder, ReadBytesExt};
use linux_perf_event_reader::PerfEventHeader;

use crate::codec::{trim_at_nul, ByteWriter};
use crate::constants::{
    BUILD_ID_BUFFER_SIZE, BUILD_ID_MAX_SIZE, BUILD_ID_NAME_ALIGN, PERF_RECORD_HEADER_BUILD_ID,
    PERF_RECORD_MISC_BUILD_ID_SIZE,
};
use crate::error::{Error, ReadError};
use crate::proto::BuildIdEntry;

/// Old versions of perf did not write down the length of the build ID.
/// Detect the true length by removing 4-byte chunks of zeros from the end.
fn detect_build_id_len(build_id_bytes: &[u8]) -> usize {
    let mut len = build_id_bytes.len();
    const CHUNK_SIZE: usize = 4;
    for chunk in build_id_bytes.chunks(CHUNK_SIZE).rev() {
        if chunk.iter().any(|b| *b != 0) {
            break;
        }
        len -= chunk.len();
    }
    len
}

const BYTES_BEFORE_PATH: usize = PerfEventHeader::STRUCT_SIZE + 4 + BUILD_ID_BUFFER_SIZE;

fn padded_path_len(path_len: usize) -> usize {
    (path_len + 1).div_ceil(BUILD_ID_NAME_ALIGN) * BUILD_ID_NAME_ALIGN
}

/// `build_id_event`
///
/// If PERF_RECORD_MISC_KERNEL is set in header.misc, then this
/// is the build id for the vmlinux image or a kmod.
pub struct BuildIdEvent;

impl BuildIdEvent {
    /// Parses one record, header included.
    pub fn parse<R: Read, T: ByteOrder>(mut reader: R) -> Result<BuildIdEntry, std::io::Error> {
        let header = PerfEventHeader::parse::<_, T>(&mut reader)?;
        let pid = reader.read_i32::<T>()?;
        let mut build_id_bytes = [0; BUILD_ID_BUFFER_SIZE];
        reader.read_exact(&mut build_id_bytes)?;

        // Followed by file path for the remaining bytes. The total size of the record
        // is given by header.size.
        let path_len = usize::from(header.size).saturating_sub(BYTES_BEFORE_PATH);
        let mut path_bytes = vec![0; path_len];
        reader.read_exact(&mut path_bytes)?;
        let filename = String::from_utf8_lossy(trim_at_nul(&path_bytes)).into_owned();

        // If PERF_RECORD_MISC_BUILD_ID_SIZE is set in header.misc, then build_id_bytes[20]
        // is the length of the build id (<= 20), and build_id_bytes[21..24] are unused.
        // Otherwise, the length of the build ID is unknown but at most 20, and has to be
        // detected by removing trailing 4-byte groups of zero bytes.
        let build_id_len = if header.misc & PERF_RECORD_MISC_BUILD_ID_SIZE != 0 {
            usize::from(build_id_bytes[BUILD_ID_MAX_SIZE]).min(BUILD_ID_MAX_SIZE)
        } else {
            detect_build_id_len(&build_id_bytes[..BUILD_ID_MAX_SIZE])
        };

        Ok(BuildIdEntry {
            misc: u32::from(header.misc & !PERF_RECORD_MISC_BUILD_ID_SIZE),
            pid,
            build_id: build_id_bytes[..build_id_len].to_owned(),
            filename,
        })
    }

    /// Parses the `HEADER_BUILD_ID` feature section, a sequence of records.
    pub fn parse_section<T: ByteOrder>(mut data: &[u8]) -> Result<Vec<BuildIdEntry>, Error> {
        let mut entries = Vec::new();
        while !data.is_empty() {
            let size = match data.get(6..8) {
                Some(size) => usize::from(T::read_u16(size)),
                None => return Err(ReadError::BuildIdSection.into()),
            };
            if size < BYTES_BEFORE_PATH {
                return Err(Error::InvalidPerfEventSize);
            }
            let record = data.get(..size).ok_or(ReadError::BuildIdSection)?;
            let entry = Self::parse::<_, T>(record).map_err(|_| ReadError::BuildIdSection)?;
            entries.push(entry);
            data = &data[size..];
        }
        Ok(entries)
    }

    /// The size of the record which [`Self::write`] produces.
    pub fn record_size(entry: &BuildIdEntry) -> usize {
        BYTES_BEFORE_PATH + padded_path_len(entry.filename.len())
    }

    pub fn write<T: ByteOrder>(entry: &BuildIdEntry, writer: &mut ByteWriter) -> Result<(), Error> {
        let size = Self::record_size(entry);
        let size = u16::try_from(size).map_err(|_| Error::RecordTooLarge {
            record_type: PERF_RECORD_HEADER_BUILD_ID,
            size,
        })?;
        writer.write_u32::<T>(PERF_RECORD_HEADER_BUILD_ID);
        writer.write_u16::<T>(entry.misc as u16 | PERF_RECORD_MISC_BUILD_ID_SIZE);
        writer.write_u16::<T>(size);
        writer.write_i32::<T>(entry.pid);

        let build_id = &entry.build_id[..entry.build_id.len().min(BUILD_ID_MAX_SIZE)];
        let mut build_id_bytes = [0; BUILD_ID_BUFFER_SIZE];
        build_id_bytes[..build_id.len()].copy_from_slice(build_id);
        build_id_bytes[BUILD_ID_MAX_SIZE] =
            u8::try_from(build_id.len()).map_err(|_| Error::RecordTooLarge {
                record_type: PERF_RECORD_HEADER_BUILD_ID,
                size: build_id.len(),
            })?;
        writer.write_bytes(&build_id_bytes);

        writer.write_fixed_string(&entry.filename, padded_path_len(entry.filename.len()));
        Ok(())
    }
}
