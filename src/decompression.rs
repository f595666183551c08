use zstd_safe::{DCtx, InBuffer, OutBuffer};

use crate::error::Error;

const OUTPUT_CHUNK_SIZE: usize = 1024 * 1024;

/// Decompresses the payloads of `PERF_RECORD_COMPRESSED` records.
///
/// perf compresses the data section as one zstd stream which is split across
/// many records, so the context has to be kept between calls.
pub struct ZstdDecompressor {
    dctx: Option<DCtx<'static>>,
    buf: Option<Vec<u8>>,
}

impl Default for ZstdDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl ZstdDecompressor {
    pub fn new() -> Self {
        Self {
            dctx: None,
            buf: None,
        }
    }

    /// Decompresses the payload of one record and appends the output, a
    /// sequence of records, to `uncompressed_data`.
    pub fn decompress_into(
        &mut self,
        compressed_data: &[u8],
        uncompressed_data: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let dctx = self.dctx.get_or_insert_with(DCtx::create);
        let buf = self.buf.get_or_insert_with(|| vec![0; OUTPUT_CHUNK_SIZE]);

        let mut in_buffer = InBuffer::around(compressed_data);
        loop {
            let mut out_buffer = OutBuffer::around(&mut buf[..]);
            if let Err(code) = dctx.decompress_stream(&mut out_buffer, &mut in_buffer) {
                return Err(Error::Decompression(
                    zstd_safe::get_error_name(code).to_string(),
                ));
            }
            let out_len = out_buffer.pos();
            uncompressed_data.extend_from_slice(&buf[..out_len]);
            if out_len < buf.len() && in_buffer.pos() == compressed_data.len() {
                break;
            }
        }
        Ok(())
    }
}
