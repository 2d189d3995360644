//! Stream adapters for the Deflated Explicit VR Little Endian
//! transfer syntax.
//!
//! The deflate boundary falls exactly after the last file meta element:
//! everything that follows is a raw deflate stream (no zlib header).

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Adapt a reader positioned at the start of the deflated data set region,
/// yielding the inflated data set bytes.
pub fn adapt_reader<R: Read>(reader: R) -> DeflateDecoder<R> {
    DeflateDecoder::new(reader)
}

/// Adapt a writer so that the data set written to it
/// is deflated on the way out.
///
/// The returned encoder must be finished (or dropped)
/// for the stream to be complete.
pub fn adapt_writer<W: Write>(writer: W) -> DeflateEncoder<W> {
    DeflateEncoder::new(writer, Compression::fast())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn round_trip() {
        let mut encoder = adapt_writer(Vec::new());
        encoder.write_all(b"\x08\x00\x05\x00CS\x0a\x00ISO_IR 100").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut inflated = Vec::new();
        adapt_reader(&compressed[..])
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(&inflated, b"\x08\x00\x05\x00CS\x0a\x00ISO_IR 100");
    }
}
