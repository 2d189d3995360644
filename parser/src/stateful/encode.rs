//! Stateful encoding of data elements to a byte sink.
//!
//! The stateful encoder wraps a transfer-syntax specific element encoder
//! and enforces the value padding rules: every element value is written
//! with an even number of bytes, padded once with the VR's padding byte
//! when necessary.

use dcm_core::header::{DataElementHeader, Length, Tag, VR};
use dcm_core::value::PrimitiveValue;
use dcm_encoding::transfer_syntax::{DynEncoder, TransferSyntax};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Write;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    #[snafu(display("failed to encode data"))]
    EncodeData {
        #[snafu(backtrace)]
        source: dcm_encoding::encode::Error,
    },

    #[snafu(display("failed to write value data"))]
    WriteValueData {
        backtrace: Backtrace,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A stateful encoder over a byte sink.
pub struct StatefulEncoder<'w, W> {
    to: W,
    encoder: DynEncoder<'w, W>,
    bytes_written: u64,
}

impl<'w, W> StatefulEncoder<'w, W>
where
    W: Write + 'w,
{
    /// Create a stateful encoder for the given transfer syntax.
    pub fn new_with(to: W, ts: &TransferSyntax) -> Result<Self> {
        let encoder = ts
            .encoder_for()
            .ok_or_else(|| UnsupportedTransferSyntaxSnafu { uid: ts.uid() }.build())?;
        Ok(StatefulEncoder {
            to,
            encoder,
            bytes_written: 0,
        })
    }

    /// The number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Recover the byte sink.
    pub fn into_inner(self) -> W {
        self.to
    }

    /// Encode a whole primitive data element: header and value,
    /// with the value padded to even length.
    ///
    /// The length recorded in the written header is the padded length,
    /// regardless of the length carried in `header`.
    pub fn encode_element(
        &mut self,
        header: DataElementHeader,
        value: &PrimitiveValue,
    ) -> Result<()> {
        let len = value.len() as u32;
        let padded = len + (len & 1);
        let header = DataElementHeader {
            len: Length(padded),
            ..header
        };
        let header_bytes = self
            .encoder
            .encode_element_header(&mut self.to, header)
            .context(EncodeDataSnafu)?;
        self.encoder
            .encode_primitive(&mut self.to, header.vr, value)
            .context(EncodeDataSnafu)?;
        if len & 1 == 1 {
            self.to
                .write_all(&[header.vr.padding()])
                .context(WriteValueDataSnafu)?;
        }
        self.bytes_written += header_bytes as u64 + u64::from(padded);
        Ok(())
    }

    /// Encode a bare data element header.
    pub fn encode_element_header(&mut self, header: DataElementHeader) -> Result<()> {
        let bytes = self
            .encoder
            .encode_element_header(&mut self.to, header)
            .context(EncodeDataSnafu)?;
        self.bytes_written += bytes as u64;
        Ok(())
    }

    /// Encode the header of a sequence element with the given
    /// declared length.
    pub fn encode_sequence_header(&mut self, tag: Tag, len: Length) -> Result<()> {
        self.encode_element_header(DataElementHeader::new(tag, VR::SQ, len))
    }

    /// Encode an item header with the given declared length.
    pub fn encode_item_header(&mut self, len: u32) -> Result<()> {
        self.encoder
            .encode_item_header(&mut self.to, len)
            .context(EncodeDataSnafu)?;
        self.bytes_written += 8;
        Ok(())
    }

    /// Encode an item delimitation item.
    pub fn encode_item_delimiter(&mut self) -> Result<()> {
        self.encoder
            .encode_item_delimiter(&mut self.to)
            .context(EncodeDataSnafu)?;
        self.bytes_written += 8;
        Ok(())
    }

    /// Encode a sequence delimitation item.
    pub fn encode_sequence_delimiter(&mut self) -> Result<()> {
        self.encoder
            .encode_sequence_delimiter(&mut self.to)
            .context(EncodeDataSnafu)?;
        self.bytes_written += 8;
        Ok(())
    }

    /// Write raw bytes as they are, padding to even length
    /// with the null byte.
    pub fn write_bytes_padded(&mut self, data: &[u8]) -> Result<()> {
        self.to.write_all(data).context(WriteValueDataSnafu)?;
        self.bytes_written += data.len() as u64;
        if data.len() & 1 == 1 {
            self.to.write_all(&[0]).context(WriteValueDataSnafu)?;
            self.bytes_written += 1;
        }
        Ok(())
    }

    /// Write raw bytes as they are.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.to.write_all(data).context(WriteValueDataSnafu)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_encoding::transfer_syntax::entries;

    #[test]
    fn odd_values_are_padded_once() {
        // UI "1.2.3" (5 bytes) must be padded with NUL to 6
        let mut encoder =
            StatefulEncoder::new_with(Vec::new(), &entries::EXPLICIT_VR_LITTLE_ENDIAN).unwrap();
        let header =
            DataElementHeader::new(Tag(0x0020, 0x000D), VR::UI, Length(5));
        encoder
            .encode_element(header, &PrimitiveValue::from_text("1.2.3"))
            .unwrap();
        let out = encoder.into_inner();
        assert_eq!(
            out,
            vec![
                0x20, 0x00, 0x0D, 0x00, b'U', b'I', 0x06, 0x00, b'1', b'.', b'2', b'.', b'3', 0x00,
            ]
        );
    }

    #[test]
    fn odd_text_values_are_padded_with_space() {
        let mut encoder =
            StatefulEncoder::new_with(Vec::new(), &entries::EXPLICIT_VR_LITTLE_ENDIAN).unwrap();
        let header = DataElementHeader::new(Tag(0x0008, 0x0060), VR::CS, Length(3));
        encoder
            .encode_element(header, &PrimitiveValue::from_text("NMR"))
            .unwrap();
        let out = encoder.into_inner();
        assert_eq!(&out[8..], b"NMR ");
        assert_eq!(out[6], 4); // recorded length is the padded one
    }

    #[test]
    fn bytes_written_accumulates() {
        let mut encoder =
            StatefulEncoder::new_with(Vec::new(), &entries::IMPLICIT_VR_LITTLE_ENDIAN).unwrap();
        let header = DataElementHeader::new(Tag(0x0008, 0x0060), VR::CS, Length(2));
        encoder
            .encode_element(header, &PrimitiveValue::from_text("CT"))
            .unwrap();
        assert_eq!(encoder.bytes_written(), 10);
    }
}
