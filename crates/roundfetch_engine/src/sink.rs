use std::io::{Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use tempfile::SpooledTempFile;

use crate::{TransportError, TransportErrorKind};

/// Size-bounded body sink: memory up to `spill_threshold`, a temp file above it.
///
/// Dropping the sink releases the buffer or temp file.
pub(crate) struct BodySink {
    file: SpooledTempFile,
    len: u64,
    max_bytes: Option<u64>,
}

impl BodySink {
    pub(crate) fn new(spill_threshold: usize, max_bytes: Option<u64>) -> Self {
        Self {
            file: SpooledTempFile::new(spill_threshold),
            len: 0,
            max_bytes,
        }
    }

    pub(crate) fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        let next_len = self.len + chunk.len() as u64;
        if let Some(max) = self.max_bytes {
            if next_len > max {
                return Err(too_large(max, next_len));
            }
        }
        self.file.write_all(chunk).map_err(sink_error)?;
        self.len = next_len;
        Ok(())
    }

    pub(crate) fn is_spilled(&self) -> bool {
        self.file.is_rolled()
    }

    pub(crate) fn finish(mut self) -> Result<Bytes, TransportError> {
        let capacity = usize::try_from(self.len).unwrap_or(0);
        let mut body = Vec::with_capacity(capacity);
        self.file.seek(SeekFrom::Start(0)).map_err(sink_error)?;
        self.file.read_to_end(&mut body).map_err(sink_error)?;
        Ok(Bytes::from(body))
    }
}

pub(crate) fn too_large(max_bytes: u64, actual: u64) -> TransportError {
    TransportError::new(
        TransportErrorKind::TooLarge,
        format!("response too large (max {max_bytes}, actual {actual})"),
    )
}

fn sink_error(err: std::io::Error) -> TransportError {
    TransportError::new(TransportErrorKind::Sink, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_body_stays_in_memory() {
        let mut sink = BodySink::new(64, None);
        sink.write_chunk(b"hello ").unwrap();
        sink.write_chunk(b"world").unwrap();
        assert!(!sink.is_spilled());
        assert_eq!(&sink.finish().unwrap()[..], b"hello world");
    }

    #[test]
    fn large_body_spills_to_disk_and_reads_back() {
        let mut sink = BodySink::new(8, None);
        sink.write_chunk(b"0123456789").unwrap();
        sink.write_chunk(b"abcdef").unwrap();
        assert!(sink.is_spilled());
        assert_eq!(&sink.finish().unwrap()[..], b"0123456789abcdef");
    }

    #[test]
    fn max_bytes_is_enforced() {
        let mut sink = BodySink::new(64, Some(10));
        sink.write_chunk(b"012345").unwrap();
        let err = sink.write_chunk(b"6789X").unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::TooLarge);
        assert_eq!(err.message, "response too large (max 10, actual 11)");
    }
}
