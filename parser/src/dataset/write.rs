//! A mid-level abstraction for writing DICOM content sequentially.
//!
//! [`DataSetWriter`] accepts a stream of [`DataToken`]s and writes the
//! corresponding bytes through a stateful encoder. Sequences and items
//! declared with an undefined length are closed with delimitation items;
//! defined lengths are written through as declared by the token source,
//! which is responsible for their correctness.

use crate::dataset::{DataToken, SeqTokenType};
use crate::stateful::encode::{self, StatefulEncoder};
use dcm_core::header::{DataElementHeader, Length, Tag, VR};
use dcm_encoding::transfer_syntax::TransferSyntax;
use dcm_dictionary::tags;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Write;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("failed to encode data set content"))]
    EncodeElement {
        #[snafu(backtrace)]
        source: encode::Error,
    },

    #[snafu(display("unexpected token {:?} at this position", token))]
    UnexpectedToken {
        token: DataToken,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Copy, Clone)]
struct SeqToken {
    typ: SeqTokenType,
    undefined: bool,
}

/// A writer-driven data set serializer.
pub struct DataSetWriter<'w, W> {
    encoder: StatefulEncoder<'w, W>,
    seq_tokens: Vec<SeqToken>,
    last_header: Option<DataElementHeader>,
}

impl<'w, W> DataSetWriter<'w, W>
where
    W: Write + 'w,
{
    /// Create a data set writer for the given transfer syntax.
    pub fn new_with(to: W, ts: &TransferSyntax) -> Result<Self> {
        let encoder = StatefulEncoder::new_with(to, ts).context(EncodeElementSnafu)?;
        Ok(DataSetWriter {
            encoder,
            seq_tokens: Vec::new(),
            last_header: None,
        })
    }

    /// The number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.encoder.bytes_written()
    }

    /// Recover the byte sink.
    pub fn into_inner(self) -> W {
        self.encoder.into_inner()
    }

    /// Write the whole token sequence.
    pub fn write_sequence<I>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = DataToken>,
    {
        for token in tokens {
            self.write_token(token)?;
        }
        Ok(())
    }

    /// Write a single data set token.
    pub fn write_token(&mut self, token: DataToken) -> Result<()> {
        match token {
            DataToken::ElementHeader(header) => {
                if self.last_header.is_some() {
                    return UnexpectedTokenSnafu {
                        token: DataToken::ElementHeader(header),
                    }
                    .fail();
                }
                self.last_header = Some(header);
                Ok(())
            }
            DataToken::PrimitiveValue(value) => {
                let header = match self.last_header.take() {
                    Some(header) => header,
                    None => {
                        return UnexpectedTokenSnafu {
                            token: DataToken::PrimitiveValue(value),
                        }
                        .fail();
                    }
                };
                self.encoder
                    .encode_element(header, &value)
                    .context(EncodeElementSnafu)
            }
            DataToken::SequenceStart { tag, len } => {
                self.seq_tokens.push(SeqToken {
                    typ: SeqTokenType::Sequence,
                    undefined: len.is_undefined(),
                });
                self.encoder
                    .encode_sequence_header(tag, len)
                    .context(EncodeElementSnafu)
            }
            DataToken::ItemStart { len } => {
                self.seq_tokens.push(SeqToken {
                    typ: SeqTokenType::Item,
                    undefined: len.is_undefined(),
                });
                self.encoder
                    .encode_item_header(len.0)
                    .context(EncodeElementSnafu)
            }
            DataToken::ItemEnd => {
                match self.seq_tokens.pop() {
                    Some(SeqToken {
                        typ: SeqTokenType::Item,
                        undefined: true,
                    }) => self
                        .encoder
                        .encode_item_delimiter()
                        .context(EncodeElementSnafu),
                    Some(SeqToken {
                        typ: SeqTokenType::Item,
                        undefined: false,
                    }) => Ok(()),
                    _ => UnexpectedTokenSnafu {
                        token: DataToken::ItemEnd,
                    }
                    .fail(),
                }
            }
            DataToken::SequenceEnd => {
                match self.seq_tokens.pop() {
                    Some(SeqToken {
                        typ: SeqTokenType::Sequence,
                        undefined: true,
                    }) => self
                        .encoder
                        .encode_sequence_delimiter()
                        .context(EncodeElementSnafu),
                    Some(SeqToken {
                        typ: SeqTokenType::Sequence,
                        undefined: false,
                    }) => Ok(()),
                    _ => UnexpectedTokenSnafu {
                        token: DataToken::SequenceEnd,
                    }
                    .fail(),
                }
            }
            DataToken::PixelSequenceStart => {
                self.seq_tokens.push(SeqToken {
                    typ: SeqTokenType::Sequence,
                    undefined: true,
                });
                self.encoder
                    .encode_element_header(DataElementHeader::new(
                        tags::PIXEL_DATA,
                        VR::OB,
                        Length::UNDEFINED,
                    ))
                    .context(EncodeElementSnafu)
            }
            DataToken::OffsetTable(offsets) => {
                // basic offset table entries are 32-bit little endian,
                // regardless of the data set byte order
                self.encoder
                    .encode_item_header(offsets.len() as u32 * 4)
                    .context(EncodeElementSnafu)?;
                let mut data = Vec::with_capacity(offsets.len() * 4);
                for offset in &offsets {
                    data.extend_from_slice(&offset.to_le_bytes());
                }
                self.encoder.write_bytes(&data).context(EncodeElementSnafu)
            }
            DataToken::ItemValue(data) => {
                let len = data.len() as u32;
                self.encoder
                    .encode_item_header(len + (len & 1))
                    .context(EncodeElementSnafu)?;
                self.encoder
                    .write_bytes_padded(&data)
                    .context(EncodeElementSnafu)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_core::value::PrimitiveValue;
    use dcm_encoding::transfer_syntax::entries;

    #[test]
    fn undefined_sequence_wire_form() {
        // a sequence with two empty items, encoded with undefined lengths
        let mut writer =
            DataSetWriter::new_with(Vec::new(), &entries::EXPLICIT_VR_LITTLE_ENDIAN).unwrap();
        writer
            .write_sequence(vec![
                DataToken::SequenceStart {
                    tag: Tag(0x0008, 0x1140),
                    len: Length::UNDEFINED,
                },
                DataToken::ItemStart {
                    len: Length::UNDEFINED,
                },
                DataToken::ItemEnd,
                DataToken::ItemStart {
                    len: Length::UNDEFINED,
                },
                DataToken::ItemEnd,
                DataToken::SequenceEnd,
            ])
            .unwrap();
        let out = writer.into_inner();
        assert_eq!(
            out,
            vec![
                0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
                0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, //
                0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, //
                0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, //
                0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, //
                0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn defined_sequence_has_no_delimiters() {
        let mut writer =
            DataSetWriter::new_with(Vec::new(), &entries::EXPLICIT_VR_LITTLE_ENDIAN).unwrap();
        writer
            .write_sequence(vec![
                DataToken::SequenceStart {
                    tag: Tag(0x0008, 0x1140),
                    len: Length(22),
                },
                DataToken::ItemStart { len: Length(14) },
                DataToken::ElementHeader(DataElementHeader::new(
                    Tag(0x0008, 0x1155),
                    VR::UI,
                    Length(6),
                )),
                DataToken::PrimitiveValue(PrimitiveValue::from_text("1.2.3")),
                DataToken::ItemEnd,
                DataToken::SequenceEnd,
            ])
            .unwrap();
        let out = writer.into_inner();
        assert_eq!(out.len(), 12 + 8 + 8 + 6);
        assert_eq!(&out[8..12], &[22, 0, 0, 0]);
    }

    #[test]
    fn encapsulated_pixel_data_wire_form() {
        let mut writer =
            DataSetWriter::new_with(Vec::new(), &entries::EXPLICIT_VR_LITTLE_ENDIAN).unwrap();
        writer
            .write_sequence(vec![
                DataToken::PixelSequenceStart,
                DataToken::OffsetTable(vec![]),
                DataToken::ItemValue(vec![0xAA, 0xBB, 0xCC, 0xDD]),
                DataToken::SequenceEnd,
            ])
            .unwrap();
        let out = writer.into_inner();
        assert_eq!(
            out,
            vec![
                0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
                0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, //
                0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, //
                0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
            ]
        );
    }
}
