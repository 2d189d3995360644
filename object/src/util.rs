//! Reader utilities for the file reading routines.

use std::io::{Read, Seek};

/// A trait for types which can both read and seek,
/// as required for deferred pixel data loading.
pub trait ReadSeek: Read + Seek {}
impl<T: ?Sized> ReadSeek for T where T: Read + Seek {}

/// A byte source with absolute position tracking and a small
/// push-back buffer, so that sniffing routines (preamble detection,
/// file meta group delimitation) can return excess bytes to the stream.
#[derive(Debug)]
pub struct SourceReader<R> {
    inner: R,
    pending: Vec<u8>,
    position: u64,
}

impl<R> SourceReader<R> {
    /// Wrap the given reader, with the position starting at zero.
    pub fn new(inner: R) -> Self {
        SourceReader {
            inner,
            pending: Vec::new(),
            position: 0,
        }
    }

    /// The number of bytes effectively consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Return the given bytes to the stream, so that the next read
    /// yields them again, and rewind the position accordingly.
    pub fn unread(&mut self, bytes: &[u8]) {
        let mut pending = bytes.to_vec();
        pending.extend_from_slice(&self.pending);
        self.pending = pending;
        self.position = self.position.saturating_sub(bytes.len() as u64);
    }

    /// Recover the inner reader. Any pending pushed-back bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> Read for SourceReader<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            self.position += n as u64;
            return Ok(n);
        }
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn push_back_rewinds_position() {
        let mut reader = SourceReader::new(Cursor::new(b"abcdef".to_vec()));
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.position(), 4);

        reader.unread(b"cd");
        assert_eq!(reader.position(), 2);
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"cdef");
        assert_eq!(reader.position(), 6);
    }
}
