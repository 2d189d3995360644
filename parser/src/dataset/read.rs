//! A mid-level abstraction for reading DICOM content sequentially.
//!
//! [`DataSetReader`] wraps a stateful decoder and exposes the data set
//! as a flat stream of [`DataToken`]s. Sequence nesting is tracked with
//! an explicit delimiter stack rather than native recursion, bounded by
//! a configurable maximum depth, and the total number of items across
//! the whole data set is bounded as well.

use crate::dataset::{DataToken, SeqTokenType};
use crate::stateful::decode::{self, StatefulDecode};
use dcm_core::header::{DataElementHeader, HasLength, Length, SequenceItemHeader};
use dcm_core::validation::Issue;
use dcm_core::{Tag, VR};
use snafu::{Backtrace, ResultExt, Snafu};

/// The default maximum sequence nesting depth.
pub const DEFAULT_MAX_SEQUENCE_DEPTH: u32 = 128;

/// The default maximum number of items (sequence items and pixel data
/// fragments) in a single data set.
pub const DEFAULT_MAX_TOTAL_ITEMS: u32 = 100_000;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("failed to decode data set content"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: decode::Error,
    },

    #[snafu(display("sequence nesting exceeds the maximum depth of {}", max))]
    DepthExceeded { max: u32, backtrace: Backtrace },

    #[snafu(display("data set exceeds the maximum of {} items", max))]
    ItemCountExceeded { max: u32, backtrace: Backtrace },

    #[snafu(display("pixel data fragment with undefined length"))]
    UndefinedFragmentLength { backtrace: Backtrace },

    #[snafu(display("unexpected delimiter {} at this position", tag))]
    UnexpectedDelimiter { tag: Tag, backtrace: Backtrace },

    #[snafu(display("basic offset table length {} is not a multiple of 4", length))]
    InvalidOffsetTableLength { length: u32, backtrace: Backtrace },

    #[snafu(display(
        "inconsistent sequence end: expected end at {} but read {} bytes",
        eos,
        bytes_read
    ))]
    InconsistentSequenceEnd {
        eos: u64,
        bytes_read: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("value skipping requires a defined length"))]
    SkipUndefinedLength { backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Limits applied while reading a data set.
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    /// The maximum admitted sequence nesting depth.
    pub max_sequence_depth: u32,
    /// The maximum admitted number of items in the whole data set.
    pub max_total_items: u32,
}

impl Default for ReadLimits {
    fn default() -> Self {
        ReadLimits {
            max_sequence_depth: DEFAULT_MAX_SEQUENCE_DEPTH,
            max_total_items: DEFAULT_MAX_TOTAL_ITEMS,
        }
    }
}

/// A reader-specific token representing a sequence or item start.
#[derive(Debug, Copy, Clone, PartialEq)]
struct SeqToken {
    /// Whether it is the start of a sequence or the start of an item.
    typ: SeqTokenType,
    /// The length of the value, as indicated by the starting element,
    /// can be unknown.
    len: Length,
    /// The number of bytes the parser has read until it reached the
    /// beginning of the sequence or item value data.
    base_offset: u64,
}

/// A higher-level reader for retrieving structure in a DICOM data set
/// from an arbitrary data source.
#[derive(Debug)]
pub struct DataSetReader<S> {
    parser: S,
    /// whether the reader is expecting an item next (or a sequence delimiter)
    in_sequence: bool,
    /// whether the reader is inside an encapsulated pixel data element
    in_pixel_sequence: bool,
    /// whether the next pixel sequence item is the basic offset table
    offset_table_next: bool,
    /// whether a check for a sequence or item delimitation is pending
    delimiter_check_pending: bool,
    /// a stack of delimiters
    seq_delimiters: Vec<SeqToken>,
    /// the number of sequence levels currently open
    seq_depth: u32,
    /// the total number of items seen so far
    total_items: u32,
    /// fuse the iteration process if true
    hard_break: bool,
    /// last decoded header
    last_header: Option<DataElementHeader>,
    limits: ReadLimits,
}

impl<S> DataSetReader<S>
where
    S: StatefulDecode,
{
    /// Create a new data set reader with the given stateful decoder
    /// and default limits.
    pub fn new(parser: S) -> Self {
        Self::new_with_limits(parser, ReadLimits::default())
    }

    /// Create a new data set reader with the given stateful decoder
    /// and limits.
    pub fn new_with_limits(parser: S, limits: ReadLimits) -> Self {
        DataSetReader {
            parser,
            in_sequence: false,
            in_pixel_sequence: false,
            offset_table_next: false,
            delimiter_check_pending: false,
            seq_delimiters: Vec::new(),
            seq_depth: 0,
            total_items: 0,
            hard_break: false,
            last_header: None,
            limits,
        }
    }

    /// The number of bytes read from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.parser.bytes_read()
    }

    /// Drain the validation issues raised by the underlying decoder.
    pub fn take_issues(&mut self) -> Vec<Issue> {
        self.parser.take_issues()
    }

    /// The nesting depth of the position currently being read,
    /// in number of open sequences.
    pub fn seq_depth(&self) -> u32 {
        self.seq_depth
    }

    /// Skip the value of the element whose header was just returned,
    /// instead of materializing it into a value token.
    ///
    /// Returns the byte offset of the skipped value relative to the
    /// beginning of the data set, and its length. Returns `None` if
    /// there is no pending element value at this position.
    pub fn skip_pending_value(&mut self) -> Result<Option<(u64, u32)>> {
        match self.last_header.take() {
            Some(header) => {
                let len = match header.length().get() {
                    Some(len) => len,
                    None => return SkipUndefinedLengthSnafu.fail(),
                };
                let offset = self.parser.bytes_read();
                self.parser.skip_bytes(len).context(DecodeElementSnafu)?;
                self.delimiter_check_pending = true;
                Ok(Some((offset, len)))
            }
            None => Ok(None),
        }
    }

    fn count_item(&mut self) -> Result<()> {
        self.total_items += 1;
        if self.total_items > self.limits.max_total_items {
            return ItemCountExceededSnafu {
                max: self.limits.max_total_items,
            }
            .fail();
        }
        Ok(())
    }

    fn push_sequence(&mut self, len: Length) -> Result<()> {
        if self.seq_depth >= self.limits.max_sequence_depth {
            return DepthExceededSnafu {
                max: self.limits.max_sequence_depth,
            }
            .fail();
        }
        self.seq_depth += 1;
        self.seq_delimiters.push(SeqToken {
            typ: SeqTokenType::Sequence,
            len,
            base_offset: self.parser.bytes_read(),
        });
        Ok(())
    }

    fn pop_sequence(&mut self) {
        self.seq_delimiters.pop();
        self.seq_depth = self.seq_depth.saturating_sub(1);
    }

    /// Check the delimiter stack for defined-length sequences and items
    /// which end at the current offset.
    fn update_seq_delimiters(&mut self) -> Result<Option<DataToken>> {
        if let Some(sd) = self.seq_delimiters.last() {
            if let Some(len) = sd.len.get() {
                let eos = sd.base_offset + u64::from(len);
                let bytes_read = self.parser.bytes_read();
                if eos == bytes_read {
                    // end of delimiter, as indicated by the element's length
                    let token;
                    match sd.typ {
                        SeqTokenType::Sequence => {
                            self.in_sequence = false;
                            self.pop_sequence();
                            token = DataToken::SequenceEnd;
                        }
                        SeqTokenType::Item => {
                            self.in_sequence = true;
                            self.seq_delimiters.pop();
                            token = DataToken::ItemEnd;
                        }
                    }
                    return Ok(Some(token));
                } else if eos < bytes_read {
                    return InconsistentSequenceEndSnafu { eos, bytes_read }.fail();
                }
            }
        }
        self.delimiter_check_pending = false;
        Ok(None)
    }

    fn next_in_pixel_sequence(&mut self) -> Option<Result<DataToken>> {
        match self.parser.decode_item_header() {
            Ok(SequenceItemHeader::Item { len }) => {
                let len = match len.get() {
                    Some(len) => len,
                    None => {
                        self.hard_break = true;
                        return Some(UndefinedFragmentLengthSnafu.fail());
                    }
                };
                if let Err(e) = self.count_item() {
                    self.hard_break = true;
                    return Some(Err(e));
                }
                let data = match self.parser.read_value_bytes(len) {
                    Ok(data) => data,
                    Err(e) => {
                        self.hard_break = true;
                        return Some(Err(e).context(DecodeElementSnafu));
                    }
                };
                if self.offset_table_next {
                    self.offset_table_next = false;
                    if data.len() % 4 != 0 {
                        self.hard_break = true;
                        return Some(InvalidOffsetTableLengthSnafu { length: len }.fail());
                    }
                    let offsets = data
                        .chunks_exact(4)
                        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect();
                    Some(Ok(DataToken::OffsetTable(offsets)))
                } else {
                    Some(Ok(DataToken::ItemValue(data)))
                }
            }
            Ok(SequenceItemHeader::ItemDelimiter) => {
                self.hard_break = true;
                Some(
                    UnexpectedDelimiterSnafu {
                        tag: Tag(0xFFFE, 0xE00D),
                    }
                    .fail(),
                )
            }
            Ok(SequenceItemHeader::SequenceDelimiter) => {
                self.pop_sequence();
                self.in_pixel_sequence = false;
                Some(Ok(DataToken::SequenceEnd))
            }
            Err(e) => {
                self.hard_break = true;
                Some(Err(e).context(DecodeElementSnafu))
            }
        }
    }

    fn next_in_sequence(&mut self) -> Option<Result<DataToken>> {
        match self.parser.decode_item_header() {
            Ok(SequenceItemHeader::Item { len }) => {
                if let Err(e) = self.count_item() {
                    self.hard_break = true;
                    return Some(Err(e));
                }
                // entered a new item
                self.in_sequence = false;
                self.seq_delimiters.push(SeqToken {
                    typ: SeqTokenType::Item,
                    len,
                    base_offset: self.parser.bytes_read(),
                });
                // items can be empty
                if len == Length(0) {
                    self.delimiter_check_pending = true;
                }
                Some(Ok(DataToken::ItemStart { len }))
            }
            Ok(SequenceItemHeader::ItemDelimiter) => {
                // closed an item of undefined length
                self.seq_delimiters.pop();
                self.in_sequence = true;
                Some(Ok(DataToken::ItemEnd))
            }
            Ok(SequenceItemHeader::SequenceDelimiter) => {
                // closed a sequence
                self.pop_sequence();
                self.in_sequence = false;
                Some(Ok(DataToken::SequenceEnd))
            }
            Err(e) => {
                self.hard_break = true;
                Some(Err(e).context(DecodeElementSnafu))
            }
        }
    }
}

impl<S> Iterator for DataSetReader<S>
where
    S: StatefulDecode,
{
    type Item = Result<DataToken>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hard_break {
            return None;
        }

        // item or sequence delimitation logic for explicit lengths
        if self.delimiter_check_pending {
            match self.update_seq_delimiters() {
                Err(e) => {
                    self.hard_break = true;
                    return Some(Err(e));
                }
                Ok(Some(token)) => return Some(Ok(token)),
                Ok(None) => { /* no-op */ }
            }
        }

        if self.in_pixel_sequence {
            return self.next_in_pixel_sequence();
        }

        if self.in_sequence {
            return self.next_in_sequence();
        }

        if let Some(header) = self.last_header {
            // a plain element header was read, so a value is expected
            let value = match self.parser.read_value(&header) {
                Ok(v) => v,
                Err(e) => {
                    self.hard_break = true;
                    self.last_header = None;
                    return Some(Err(e).context(DecodeElementSnafu));
                }
            };

            self.last_header = None;

            // sequences can end after this token
            self.delimiter_check_pending = true;

            return Some(Ok(DataToken::PrimitiveValue(value)));
        }

        // a data element header or item delimiter is expected
        match self.parser.decode_header() {
            Ok(DataElementHeader {
                tag,
                vr: VR::SQ,
                len,
            }) => {
                if let Err(e) = self.push_sequence(len) {
                    self.hard_break = true;
                    return Some(Err(e));
                }
                self.in_sequence = true;

                // sequences can end right after they start
                if len == Length(0) {
                    self.delimiter_check_pending = true;
                }

                Some(Ok(DataToken::SequenceStart { tag, len }))
            }
            Ok(DataElementHeader {
                tag: Tag(0xFFFE, 0xE00D),
                ..
            }) => {
                // closed an item of undefined length,
                // with its body read as plain data set content
                self.seq_delimiters.pop();
                self.in_sequence = true;
                Some(Ok(DataToken::ItemEnd))
            }
            Ok(header) if header.length().is_undefined() => {
                // encapsulated pixel data
                if let Err(e) = self.push_sequence(Length::UNDEFINED) {
                    self.hard_break = true;
                    return Some(Err(e));
                }
                self.in_pixel_sequence = true;
                self.offset_table_next = true;
                Some(Ok(DataToken::PixelSequenceStart))
            }
            Ok(header) => {
                // save it for the next step
                self.last_header = Some(header);
                Some(Ok(DataToken::ElementHeader(header)))
            }
            Err(e) if is_eof(&e) && self.seq_delimiters.is_empty() && self.last_header.is_none() => {
                // the end of a DICOM object provides no extra marker;
                // the data set ends at the end of the stream
                self.hard_break = true;
                None
            }
            Err(e) => {
                self.hard_break = true;
                Some(Err(e).context(DecodeElementSnafu))
            }
        }
    }
}

/// Whether the decode error amounts to reaching the end of the stream
/// right at an element boundary.
fn is_eof(error: &decode::Error) -> bool {
    use dcm_encoding::decode::Error as DecodeError;
    match error {
        decode::Error::DecodeHeader {
            source: DecodeError::ReadHeaderTag { source, .. },
            ..
        } => source.kind() == std::io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stateful::decode::StatefulDecoder;
    use dcm_core::value::PrimitiveValue;
    use dcm_encoding::transfer_syntax::entries;
    use std::io::Cursor;

    fn reader_for(
        data: &[u8],
        ts: &dcm_encoding::TransferSyntax,
    ) -> DataSetReader<StatefulDecoder<'static, Cursor<Vec<u8>>>> {
        let parser = StatefulDecoder::new_with(Cursor::new(data.to_vec()), ts).unwrap();
        DataSetReader::new(parser)
    }

    fn reader_with_limits(
        data: &[u8],
        ts: &dcm_encoding::TransferSyntax,
        limits: ReadLimits,
    ) -> DataSetReader<StatefulDecoder<'static, Cursor<Vec<u8>>>> {
        let parser = StatefulDecoder::new_with(Cursor::new(data.to_vec()), ts).unwrap();
        DataSetReader::new_with_limits(parser, limits)
    }

    #[test]
    fn plain_elements_to_tokens() {
        // (0008,0060) CS "MR", (0010,0010) PN "DOE^JOHN"
        let raw: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'M', b'R', //
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00, b'D', b'O', b'E', b'^', b'J', b'O',
            b'H', b'N',
        ];
        let tokens: Vec<_> = reader_for(raw, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(
            tokens[1],
            DataToken::PrimitiveValue(PrimitiveValue::from_text("MR"))
        );
        assert_eq!(
            tokens[3],
            DataToken::PrimitiveValue(PrimitiveValue::from_text("DOE^JOHN"))
        );
    }

    #[test]
    fn undefined_length_sequence_with_two_empty_items() {
        // (0008,1140) SQ with undefined length,
        // two items of undefined length, each immediately delimited
        let raw: &[u8] = &[
            0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, //
            0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, //
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        let tokens: Vec<_> = reader_for(raw, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(
            tokens,
            vec![
                DataToken::SequenceStart {
                    tag: Tag(0x0008, 0x1140),
                    len: Length::UNDEFINED,
                },
                DataToken::ItemStart {
                    len: Length::UNDEFINED
                },
                DataToken::ItemEnd,
                DataToken::ItemStart {
                    len: Length::UNDEFINED
                },
                DataToken::ItemEnd,
                DataToken::SequenceEnd,
            ]
        );
    }

    #[test]
    fn defined_length_sequence_and_items() {
        // (0008,1140) SQ, defined length 22:
        // one item of defined length 14 containing (0008,1155) UI "1.2.3"
        // (padded to 6)
        let raw: &[u8] = &[
            0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 22, 0x00, 0x00, 0x00, //
            0xFE, 0xFF, 0x00, 0xE0, 14, 0x00, 0x00, 0x00, //
            0x08, 0x00, 0x55, 0x11, b'U', b'I', 0x06, 0x00, b'1', b'.', b'2', b'.', b'3', 0x00,
        ];
        let tokens: Vec<_> = reader_for(raw, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(
            tokens,
            vec![
                DataToken::SequenceStart {
                    tag: Tag(0x0008, 0x1140),
                    len: Length(22),
                },
                DataToken::ItemStart { len: Length(14) },
                DataToken::ElementHeader(DataElementHeader::new(
                    Tag(0x0008, 0x1155),
                    VR::UI,
                    Length(6)
                )),
                DataToken::PrimitiveValue(PrimitiveValue::from_text("1.2.3")),
                DataToken::ItemEnd,
                DataToken::SequenceEnd,
            ]
        );
    }

    #[test]
    fn encapsulated_pixel_data_fragments() {
        // (7FE0,0010) OB undefined length, empty BOT,
        // one fragment of 4 bytes, sequence delimiter
        let raw: &[u8] = &[
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, //
            0xFE, 0xFF, 0x00, 0xE0, 0x04, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, //
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        let tokens: Vec<_> = reader_for(raw, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(
            tokens,
            vec![
                DataToken::PixelSequenceStart,
                DataToken::OffsetTable(vec![]),
                DataToken::ItemValue(vec![0xAA, 0xBB, 0xCC, 0xDD]),
                DataToken::SequenceEnd,
            ]
        );
    }

    #[test]
    fn depth_limit_is_enforced() {
        // 3 nested sequences of undefined length under a limit of 2
        let mut raw = Vec::new();
        for _ in 0..3 {
            // (0008,1140) SQ undefined + item undefined
            raw.extend_from_slice(&[
                0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            ]);
            raw.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]);
        }
        let limits = ReadLimits {
            max_sequence_depth: 2,
            ..ReadLimits::default()
        };
        let result: Result<Vec<_>> = reader_with_limits(
            &raw,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            limits,
        )
        .collect();
        assert!(matches!(result, Err(Error::DepthExceeded { max: 2, .. })));
    }

    #[test]
    fn item_limit_is_enforced() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[
            0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        ]);
        for _ in 0..4 {
            raw.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]);
            raw.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00]);
        }
        raw.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00]);
        let limits = ReadLimits {
            max_total_items: 2,
            ..ReadLimits::default()
        };
        let result: Result<Vec<_>> = reader_with_limits(
            &raw,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            limits,
        )
        .collect();
        assert!(matches!(
            result,
            Err(Error::ItemCountExceeded { max: 2, .. })
        ));
    }

    #[test]
    fn skip_pending_value_reports_offset_and_length() {
        let raw: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'M', b'R', //
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00, b'D', b'O', b'E', b'^', b'J', b'O',
            b'H', b'N',
        ];
        let mut reader = reader_for(raw, &entries::EXPLICIT_VR_LITTLE_ENDIAN);
        // header of the first element
        let token = reader.next().unwrap().unwrap();
        assert!(matches!(token, DataToken::ElementHeader(_)));
        let (offset, len) = reader.skip_pending_value().unwrap().unwrap();
        assert_eq!((offset, len), (8, 2));
        // moves on to the second element
        let token = reader.next().unwrap().unwrap();
        assert_eq!(
            token,
            DataToken::ElementHeader(DataElementHeader::new(
                Tag(0x0010, 0x0010),
                VR::PN,
                Length(8)
            ))
        );
    }
}
