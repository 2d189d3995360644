//! Pixel data payloads and load modes.
//!
//! The value of a native Pixel Data element is held behind a
//! [`PixelSource`], which either owns the sample bytes, defers their
//! loading to a seekable stream shared with the file reader, or merely
//! records where the value was in the stream. Deferred loading is
//! single-flight: across concurrent callers, the source loads at most
//! once, and once loaded the data is reachable without locking.

use crate::util::ReadSeek;
use dcm_core::header::{HasLength, Length};
use snafu::{Backtrace, ResultExt, Snafu};
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, OnceLock};

/// The stream type shared between the file reader and its
/// deferred pixel data sources.
pub type SharedStream = Arc<Mutex<Box<dyn ReadSeek + Send>>>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum PixelDataError {
    /// Data access was attempted on a skipped pixel data source.
    #[snafu(display("pixel data was skipped at read time"))]
    PixelDataSkipped { backtrace: Backtrace },

    /// The deferred source is not attached to its stream.
    #[snafu(display("pixel data source is not attached to a stream"))]
    Detached { backtrace: Backtrace },

    /// The deferred source previously failed to load
    /// and will not be retried.
    #[snafu(display("pixel data source previously failed to load"))]
    LoadFailed { backtrace: Backtrace },

    /// An I/O error occurred while loading the value bytes.
    #[snafu(display("failed to load pixel data from the source stream"))]
    LoadSource {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The frame index is out of bounds.
    #[snafu(display("frame {} is out of bounds ({} frames)", index, frames))]
    FrameOutOfRange {
        index: u32,
        frames: u32,
        backtrace: Backtrace,
    },

    /// The data set does not carry the attributes needed
    /// to compute the frame layout.
    #[snafu(display("incomplete image attributes for frame access"))]
    IncompleteContext { backtrace: Backtrace },
}

pub type Result<T, E = PixelDataError> = std::result::Result<T, E>;

/// The load state of a deferred pixel data source.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum LoadState {
    NotLoaded,
    Failed,
}

/// A pixel data value deferred to the source stream.
///
/// Holds the byte range of the value in the stream and a shared handle
/// to that stream, attached by the file reader once parsing completes.
#[derive(Clone)]
pub struct LazyPixelData {
    offset: u64,
    length: u32,
    stream: Arc<OnceLock<SharedStream>>,
    data: Arc<OnceLock<Vec<u8>>>,
    state: Arc<Mutex<LoadState>>,
}

impl fmt::Debug for LazyPixelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPixelData")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("attached", &self.stream.get().is_some())
            .field("loaded", &self.data.get().is_some())
            .field("state", &self.state.lock().unwrap_or_else(|e| e.into_inner()))
            .finish()
    }
}

impl LazyPixelData {
    /// Create a deferred source for the given byte range,
    /// not yet attached to a stream.
    pub(crate) fn detached(offset: u64, length: u32) -> Self {
        LazyPixelData {
            offset,
            length,
            stream: Arc::new(OnceLock::new()),
            data: Arc::new(OnceLock::new()),
            state: Arc::new(Mutex::new(LoadState::NotLoaded)),
        }
    }

    /// Attach the source stream. Called by the file reader
    /// when it relinquishes the stream.
    pub(crate) fn attach(&self, stream: SharedStream) {
        let _ = self.stream.set(stream);
    }

    /// The byte offset of the value in the source stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The byte length of the value.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Whether the value bytes are resident in memory.
    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    /// Obtain the value bytes, loading them from the stream
    /// on the first call.
    pub fn load(&self) -> Result<&[u8]> {
        // fast path: already loaded, no locking
        if let Some(data) = self.data.get() {
            return Ok(data);
        }

        // single-flight: at most one caller performs the load
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = self.data.get() {
            return Ok(data);
        }
        if *state == LoadState::Failed {
            return LoadFailedSnafu.fail();
        }

        let stream = self.stream.get().ok_or_else(|| DetachedSnafu.build())?;
        let mut guard = stream.lock().unwrap_or_else(|e| e.into_inner());
        let loaded = (|| -> Result<Vec<u8>> {
            guard
                .seek(SeekFrom::Start(self.offset))
                .context(LoadSourceSnafu)?;
            let mut data = vec![0; self.length as usize];
            guard.read_exact(&mut data).context(LoadSourceSnafu)?;
            Ok(data)
        })();
        drop(guard);

        match loaded {
            Ok(data) => {
                let _ = self.data.set(data);
                Ok(self.data.get().map(Vec::as_slice).unwrap_or(&[]))
            }
            Err(e) => {
                *state = LoadState::Failed;
                Err(e)
            }
        }
    }
}

impl PartialEq for LazyPixelData {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.length == other.length
    }
}

/// The payload of a native pixel data element.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelSource {
    /// The value bytes are owned in memory.
    Immediate(Vec<u8>),
    /// The value bytes reside in the source stream
    /// and are loaded on first access.
    Lazy(LazyPixelData),
    /// Only the position of the value was retained;
    /// the bytes are not accessible.
    Skipped {
        /// the byte offset of the value in the source stream
        offset: u64,
        /// the byte length of the value
        length: u32,
    },
}

impl PixelSource {
    /// Obtain the value bytes, loading them if deferred.
    /// Fails on a skipped source.
    pub fn bytes(&self) -> Result<&[u8]> {
        match self {
            PixelSource::Immediate(data) => Ok(data),
            PixelSource::Lazy(lazy) => lazy.load(),
            PixelSource::Skipped { .. } => PixelDataSkippedSnafu.fail(),
        }
    }

    /// Produce a source with independently owned bytes.
    /// Fails on a skipped source.
    pub fn to_owned(&self) -> Result<PixelSource> {
        Ok(PixelSource::Immediate(self.bytes()?.to_vec()))
    }

    /// Whether this source was skipped at read time.
    pub fn is_skipped(&self) -> bool {
        matches!(self, PixelSource::Skipped { .. })
    }
}

impl HasLength for PixelSource {
    fn length(&self) -> Length {
        match self {
            PixelSource::Immediate(data) => Length(data.len() as u32),
            PixelSource::Lazy(lazy) => Length(lazy.length()),
            PixelSource::Skipped { length, .. } => Length(*length),
        }
    }
}

/// How the reader should treat the Pixel Data element value.
#[derive(Clone)]
pub enum PixelDataHandling {
    /// Read the value bytes into memory.
    Eager,
    /// Record the value's position and defer loading.
    /// Requires a seekable source; falls back to eager otherwise.
    Lazy,
    /// Record the value's position and discard the bytes.
    Skip,
    /// Consult an arbiter with the pixel data context,
    /// which decides between the three concrete modes.
    Callback(Arc<dyn Fn(&PixelDataContext) -> PixelDataMode + Send + Sync>),
}

impl std::fmt::Debug for PixelDataHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelDataHandling::Eager => f.write_str("Eager"),
            PixelDataHandling::Lazy => f.write_str("Lazy"),
            PixelDataHandling::Skip => f.write_str("Skip"),
            PixelDataHandling::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl Default for PixelDataHandling {
    fn default() -> Self {
        PixelDataHandling::Eager
    }
}

/// A concrete pixel data load mode, as resolved from
/// [`PixelDataHandling`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelDataMode {
    /// Read the value bytes into memory.
    Eager,
    /// Record the value's position and defer loading.
    Lazy,
    /// Record the value's position and discard the bytes.
    Skip,
}

/// The information available about a Pixel Data element
/// at the time its header is read, before the value.
///
/// Assembled from the already-parsed elements of the enclosing data set
/// (which precede Pixel Data in tag order) and the active
/// transfer syntax.
#[derive(Debug, Clone)]
pub struct PixelDataContext {
    /// Number of rows, when present.
    pub rows: Option<u16>,
    /// Number of columns, when present.
    pub columns: Option<u16>,
    /// Samples per pixel, when present.
    pub samples_per_pixel: Option<u16>,
    /// Bits allocated per sample, when present.
    pub bits_allocated: Option<u16>,
    /// Number of frames, when present.
    pub number_of_frames: Option<u32>,
    /// The active transfer syntax UID.
    pub transfer_syntax_uid: String,
    /// Whether the pixel data is encapsulated.
    pub encapsulated: bool,
    /// The declared value length.
    pub declared_length: Length,
}

impl PixelDataContext {
    /// The size of a single native frame in bytes,
    /// when the attributes required to compute it are present.
    pub fn frame_size(&self) -> Option<u64> {
        let rows = u64::from(self.rows?);
        let columns = u64::from(self.columns?);
        let samples = u64::from(self.samples_per_pixel.unwrap_or(1));
        let bits = u64::from(self.bits_allocated?);
        Some(rows * columns * samples * ((bits + 7) / 8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lazy_over(data: &'static [u8], offset: u64, length: u32) -> LazyPixelData {
        let lazy = LazyPixelData::detached(offset, length);
        let stream: SharedStream =
            Arc::new(Mutex::new(Box::new(Cursor::new(data.to_vec()))));
        lazy.attach(stream);
        lazy
    }

    #[test]
    fn lazy_loads_once_and_reads_lock_free() {
        let lazy = lazy_over(b"0123456789", 2, 4);
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.load().unwrap(), b"2345");
        assert!(lazy.is_loaded());
        // a second call comes from memory
        assert_eq!(lazy.load().unwrap(), b"2345");
    }

    #[test]
    fn lazy_shares_state_across_clones() {
        let lazy = lazy_over(b"0123456789", 0, 2);
        let clone = lazy.clone();
        assert_eq!(lazy.load().unwrap(), b"01");
        assert!(clone.is_loaded());
    }

    #[test]
    fn short_stream_fails_terminally() {
        let lazy = lazy_over(b"0123", 2, 10);
        assert!(matches!(
            lazy.load(),
            Err(PixelDataError::LoadSource { .. })
        ));
        assert!(matches!(lazy.load(), Err(PixelDataError::LoadFailed { .. })));
    }

    #[test]
    fn skipped_source_denies_access() {
        let source = PixelSource::Skipped {
            offset: 100,
            length: 64,
        };
        assert!(matches!(
            source.bytes(),
            Err(PixelDataError::PixelDataSkipped { .. })
        ));
        assert!(matches!(
            source.to_owned(),
            Err(PixelDataError::PixelDataSkipped { .. })
        ));
        assert_eq!(source.length(), Length(64));
    }

    #[test]
    fn frame_size_needs_complete_context() {
        let mut ctx = PixelDataContext {
            rows: Some(4),
            columns: Some(4),
            samples_per_pixel: Some(1),
            bits_allocated: Some(16),
            number_of_frames: Some(2),
            transfer_syntax_uid: "1.2.840.10008.1.2.1".into(),
            encapsulated: false,
            declared_length: Length(64),
        };
        assert_eq!(ctx.frame_size(), Some(32));
        ctx.rows = None;
        assert_eq!(ctx.frame_size(), None);
    }
}
