//! Stateful decoding of data elements over a byte source.
//!
//! The stateful decoder wraps a transfer-syntax specific element decoder
//! and tracks the number of bytes read, so that defined-length containers
//! can be delimited by offset. It also holds the data set context needed
//! to resolve attributes with more than one admissible VR
//! (Pixel Data and the US/SS family).

use dcm_core::dictionary::DataDictionary;
use dcm_core::header::{DataElementHeader, HasLength, SequenceItemHeader};
use dcm_core::validation::{Issue, Severity};
use dcm_core::value::PrimitiveValue;
use dcm_core::{Tag, VR};
use dcm_dictionary::tags;
use dcm_dictionary::StandardDataDictionary;
use dcm_encoding::decode::InvalidVrStrategy;
use dcm_encoding::transfer_syntax::{DynDecoder, TransferSyntax};
use dcm_encoding::Endianness;
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Read;

/// The default maximum length of a single element value, in bytes (256 MiB).
pub const DEFAULT_MAX_ELEMENT_LENGTH: u32 = 256 * 1024 * 1024;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    #[snafu(display("failed to decode data element header"))]
    DecodeHeader {
        #[snafu(backtrace)]
        source: dcm_encoding::decode::Error,
    },

    #[snafu(display("failed to decode item header"))]
    DecodeItemHeader {
        #[snafu(backtrace)]
        source: dcm_encoding::decode::Error,
    },

    #[snafu(display("failed to read value of element {}", tag))]
    ReadValue {
        tag: Tag,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("undefined length in element {} where a defined length is mandatory", tag))]
    UndefinedValueLength { tag: Tag, backtrace: Backtrace },

    #[snafu(display(
        "element {} value length {} exceeds the configured maximum of {}",
        tag,
        length,
        max
    ))]
    LengthExceedsMax {
        tag: Tag,
        length: u32,
        max: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("failed to skip {} bytes of value data", length))]
    SkipValue {
        length: u32,
        backtrace: Backtrace,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for a stateful decoder.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// What to do upon a value representation code
    /// outside the standard set.
    pub invalid_vr: InvalidVrStrategy,
    /// The maximum admitted length of a single element value.
    pub max_element_length: u32,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            invalid_vr: InvalidVrStrategy::default(),
            max_element_length: DEFAULT_MAX_ELEMENT_LENGTH,
        }
    }
}

/// Interface of a stateful decoder of data elements.
pub trait StatefulDecode {
    /// Decode the next data element header.
    fn decode_header(&mut self) -> Result<DataElementHeader>;

    /// Decode the next sequence item header or delimiter.
    fn decode_item_header(&mut self) -> Result<SequenceItemHeader>;

    /// Read the value of the given element header,
    /// in its canonical in-memory form.
    fn read_value(&mut self, header: &DataElementHeader) -> Result<PrimitiveValue>;

    /// Read exactly `length` raw bytes.
    fn read_value_bytes(&mut self, length: u32) -> Result<Vec<u8>>;

    /// Advance the source by `length` bytes without keeping the data.
    fn skip_bytes(&mut self, length: u32) -> Result<()>;

    /// The number of bytes read from the source so far.
    fn bytes_read(&self) -> u64;

    /// Drain the validation issues raised so far.
    fn take_issues(&mut self) -> Vec<Issue>;
}

/// A stateful decoder over a byte source.
pub struct StatefulDecoder<'s, S, D = StandardDataDictionary> {
    from: S,
    decoder: DynDecoder<'s, S>,
    dict: D,
    endianness: Endianness,
    explicit_vr: bool,
    bytes_read: u64,
    max_element_length: u32,
    // context for multi-VR resolution
    bits_allocated: Option<u16>,
    pixel_representation: Option<u16>,
    issues: Vec<Issue>,
}

impl<'s, S> StatefulDecoder<'s, S>
where
    S: Read + 's,
{
    /// Create a stateful decoder for the given transfer syntax,
    /// with default options.
    pub fn new_with(from: S, ts: &TransferSyntax) -> Result<Self> {
        Self::new_with_options(from, ts, DecoderOptions::default())
    }

    /// Create a stateful decoder for the given transfer syntax.
    pub fn new_with_options(from: S, ts: &TransferSyntax, options: DecoderOptions) -> Result<Self> {
        let decoder = ts
            .decoder_for_with_strategy(options.invalid_vr)
            .ok_or_else(|| {
                UnsupportedTransferSyntaxSnafu { uid: ts.uid() }.build()
            })?;
        Ok(StatefulDecoder {
            from,
            decoder,
            dict: StandardDataDictionary,
            endianness: ts.endianness(),
            explicit_vr: ts.explicit_vr(),
            bytes_read: 0,
            max_element_length: options.max_element_length,
            bits_allocated: None,
            pixel_representation: None,
            issues: Vec::new(),
        })
    }
}

impl<'s, S, D> StatefulDecoder<'s, S, D>
where
    S: Read,
    D: DataDictionary,
{
    /// Resolve the effective VR of an attribute admitting more than one,
    /// using the cached data set context.
    ///
    /// Only implicit VR data sets go through this step: in explicit VR,
    /// the value representation on the wire is authoritative.
    fn resolve_ambiguous_vr(&mut self, header: DataElementHeader) -> DataElementHeader {
        let entry = match self.dict.entry(header.tag) {
            Some(entry) if entry.is_ambiguous() => entry,
            _ => return header,
        };

        if header.tag == tags::PIXEL_DATA {
            // encapsulated pixel data is always OB;
            // in its native form, the VR follows Bits Allocated
            let vr = if header.len.is_undefined() {
                VR::OB
            } else {
                match self.bits_allocated {
                    Some(bits) if bits > 8 => VR::OW,
                    Some(_) => VR::OB,
                    None => {
                        tracing::debug!(
                            "pixel data found before bits allocated, assuming OB"
                        );
                        self.issues.push(Issue::new(
                            Severity::Warning,
                            header.tag,
                            "multi-VR attribute resolved without context",
                        ));
                        VR::OB
                    }
                }
            };
            return DataElementHeader { vr, ..header };
        }

        if entry.vrs == [VR::US, VR::SS] {
            let vr = match self.pixel_representation {
                Some(1) => VR::SS,
                Some(_) => VR::US,
                None => {
                    self.issues.push(Issue::new(
                        Severity::Warning,
                        header.tag,
                        "multi-VR attribute resolved without context",
                    ));
                    VR::US
                }
            };
            return DataElementHeader { vr, ..header };
        }

        // remaining multi-VR attributes keep the dictionary's preference
        header
    }

    /// Record data set context needed for later VR resolution.
    fn update_context(&mut self, tag: Tag, value: &PrimitiveValue) {
        match tag {
            tags::BITS_ALLOCATED => {
                self.bits_allocated = value.uint16().ok();
            }
            tags::PIXEL_REPRESENTATION => {
                self.pixel_representation = value.uint16().ok();
            }
            _ => {}
        }
    }
}

impl<'s, S, D> StatefulDecode for StatefulDecoder<'s, S, D>
where
    S: Read,
    D: DataDictionary,
{
    fn decode_header(&mut self) -> Result<DataElementHeader> {
        let (header, bytes_read) = self
            .decoder
            .decode_header(&mut self.from)
            .context(DecodeHeaderSnafu)?;
        self.bytes_read += bytes_read as u64;

        if self.explicit_vr {
            Ok(header)
        } else {
            Ok(self.resolve_ambiguous_vr(header))
        }
    }

    fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let header = self
            .decoder
            .decode_item_header(&mut self.from)
            .context(DecodeItemHeaderSnafu)?;
        self.bytes_read += 8;
        Ok(header)
    }

    fn read_value(&mut self, header: &DataElementHeader) -> Result<PrimitiveValue> {
        let len = match header.length().get() {
            Some(len) => len,
            None => return UndefinedValueLengthSnafu { tag: header.tag }.fail(),
        };
        if len > self.max_element_length {
            return LengthExceedsMaxSnafu {
                tag: header.tag,
                length: len,
                max: self.max_element_length,
            }
            .fail();
        }

        let mut data = vec![0; len as usize];
        self.from
            .read_exact(&mut data)
            .context(ReadValueSnafu { tag: header.tag })?;
        self.bytes_read += u64::from(len);

        let vr = header.vr();
        let value = if vr.is_string() {
            // trailing padding is not part of the value
            let padding = vr.padding();
            while data.last() == Some(&padding) || data.last() == Some(&0) {
                data.pop();
            }
            if data.is_empty() {
                PrimitiveValue::Empty
            } else {
                PrimitiveValue::Str(data)
            }
        } else if vr.is_numeric() {
            // canonical storage is little endian
            if self.endianness == Endianness::Big {
                if let Some(width) = vr.numeric_width() {
                    for chunk in data.chunks_exact_mut(width) {
                        chunk.reverse();
                    }
                }
            }
            if data.is_empty() {
                PrimitiveValue::Empty
            } else {
                PrimitiveValue::Num(data)
            }
        } else if data.is_empty() {
            PrimitiveValue::Empty
        } else {
            PrimitiveValue::Bin(data)
        };

        self.update_context(header.tag, &value);
        Ok(value)
    }

    fn read_value_bytes(&mut self, length: u32) -> Result<Vec<u8>> {
        let mut data = vec![0; length as usize];
        self.from
            .read_exact(&mut data)
            .context(SkipValueSnafu { length })?;
        self.bytes_read += u64::from(length);
        Ok(data)
    }

    fn skip_bytes(&mut self, length: u32) -> Result<()> {
        use snafu::IntoError;
        let copied = std::io::copy(
            &mut self.from.by_ref().take(u64::from(length)),
            &mut std::io::sink(),
        )
        .context(SkipValueSnafu { length })?;
        if copied != u64::from(length) {
            return Err(SkipValueSnafu { length }
                .into_error(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
        }
        self.bytes_read += u64::from(length);
        Ok(())
    }

    fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn take_issues(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_core::Length;
    use dcm_encoding::transfer_syntax::entries;
    use std::io::Cursor;

    #[test]
    fn reads_string_values_and_trims_padding() {
        // (0008,0060) CS "CT" followed by (0020,000D) UI "1.2.3\0"
        let raw: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T', //
            0x20, 0x00, 0x0D, 0x00, b'U', b'I', 0x06, 0x00, b'1', b'.', b'2', b'.', b'3', 0x00,
        ];
        let mut decoder =
            StatefulDecoder::new_with(Cursor::new(raw), &entries::EXPLICIT_VR_LITTLE_ENDIAN)
                .unwrap();

        let header = decoder.decode_header().unwrap();
        assert_eq!(header.tag, Tag(0x0008, 0x0060));
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value.string().unwrap(), "CT");

        let header = decoder.decode_header().unwrap();
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value.string().unwrap(), "1.2.3");
        assert_eq!(decoder.bytes_read(), raw.len() as u64);
    }

    #[test]
    fn big_endian_numerics_are_normalized() {
        // (0028,0100) US 16, big endian
        let raw: &[u8] = &[0x00, 0x28, 0x01, 0x00, b'U', b'S', 0x00, 0x02, 0x00, 0x10];
        let mut decoder =
            StatefulDecoder::new_with(Cursor::new(raw), &entries::EXPLICIT_VR_BIG_ENDIAN).unwrap();
        let header = decoder.decode_header().unwrap();
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value.uint16().unwrap(), 16);
    }

    #[test]
    fn pixel_data_vr_follows_bits_allocated_in_implicit_vr() {
        // (0028,0100) BitsAllocated = 16, then (7FE0,0010) with 4 bytes
        let raw: &[u8] = &[
            0x28, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x10, 0x00, //
            0xE0, 0x7F, 0x10, 0x00, 0x04, 0x00, 0x00, 0x00, 1, 2, 3, 4,
        ];
        let mut decoder =
            StatefulDecoder::new_with(Cursor::new(raw), &entries::IMPLICIT_VR_LITTLE_ENDIAN)
                .unwrap();
        let header = decoder.decode_header().unwrap();
        let value = decoder.read_value(&header).unwrap();
        assert_eq!(value.uint16().unwrap(), 16);

        let header = decoder.decode_header().unwrap();
        assert_eq!(header.tag, Tag(0x7FE0, 0x0010));
        assert_eq!(header.vr, VR::OW);
        assert!(decoder.take_issues().is_empty());
    }

    #[test]
    fn pixel_data_without_context_defaults_to_ob_with_issue() {
        let raw: &[u8] = &[0xE0, 0x7F, 0x10, 0x00, 0x02, 0x00, 0x00, 0x00, 1, 2];
        let mut decoder =
            StatefulDecoder::new_with(Cursor::new(raw), &entries::IMPLICIT_VR_LITTLE_ENDIAN)
                .unwrap();
        let header = decoder.decode_header().unwrap();
        assert_eq!(header.vr, VR::OB);
        let issues = decoder.take_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].tag, Some(Tag(0x7FE0, 0x0010)));
    }

    #[test]
    fn oversized_value_is_rejected() {
        let raw: &[u8] = &[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T'];
        let mut decoder = StatefulDecoder::new_with_options(
            Cursor::new(raw),
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            DecoderOptions {
                max_element_length: 1,
                ..DecoderOptions::default()
            },
        )
        .unwrap();
        let header = decoder.decode_header().unwrap();
        assert_eq!(header.len, Length(2));
        assert!(matches!(
            decoder.read_value(&header),
            Err(Error::LengthExceedsMax { .. })
        ));
    }
}
