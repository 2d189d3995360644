//! This module contains reusable components for encoding and decoding text
//! in DICOM data structures, including support for character repertoires.
//!
//! Supported specific character sets:
//!
//! | Character Set | decoding support | encoding support |
//! |---|---|---|
//! | ISO-IR 6 (default) | ✓ | ✓ |
//! | ISO-IR 100 (ISO-8859-1), Western Europe | ✓ | ✓ |
//! | ISO-IR 101 (ISO-8859-2), Central/Eastern Europe | ✓ | ✓ |
//! | ISO-IR 144 (ISO-8859-5), Latin/Cyrillic | ✓ | ✓ |
//! | ISO-IR 192, Unicode in UTF-8 | ✓ | ✓ |
//! | GB18030, Simplified Chinese | ✓ | ✓ |
//! | GBK, Simplified Chinese | ✓ | ✓ |
//!
//! Code extension techniques (ISO 2022 escapes) are not supported.
//! Note that GBK text is processed through the GB18030 codec,
//! of which GBK is a proper subset.

use encoding::all::{GB18030, ISO_8859_1, ISO_8859_2, ISO_8859_5, UTF_8};
use encoding::{DecoderTrap, EncoderTrap, Encoding};
use snafu::{Backtrace, Snafu};
use std::borrow::Cow;

/// An error type for text encoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EncodeTextError {
    /// A custom error message,
    /// for when the underlying error type does not encode error semantics
    /// into type variants.
    #[snafu(display("{}", message))]
    EncodeCustom {
        /// The error message in plain text.
        message: Cow<'static, str>,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },
}

/// An error type for text decoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecodeTextError {
    /// A custom error message,
    /// for when the underlying error type does not encode error semantics
    /// into type variants.
    #[snafu(display("{}", message))]
    DecodeCustom {
        /// The error message in plain text.
        message: Cow<'static, str>,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },
}

/// An error type for specific character set resolution.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CharsetError {
    /// The defined term is not supported by this implementation.
    #[snafu(display("unsupported specific character set `{}`", term))]
    UnsupportedTerm { term: String, backtrace: Backtrace },

    /// The character set does not admit combination with
    /// code extension techniques (multi-valued Specific Character Set).
    #[snafu(display("character set `{}` cannot be combined with code extensions", term))]
    IllegalCombination { term: String, backtrace: Backtrace },
}

type EncodeResult<T> = Result<T, EncodeTextError>;
type DecodeResult<T> = Result<T, DecodeTextError>;

/// A holder of encoding and decoding mechanisms for text in DICOM content,
/// which according to the standard, depends on the specific character set.
pub trait TextCodec {
    /// Obtain the defined term (unique name) of the text encoding,
    /// which may be used as the value of a
    /// Specific Character Set (0008,0005) element to refer to this codec.
    fn name(&self) -> Cow<'static, str>;

    /// Decode the given byte buffer as a single string. The resulting string
    /// _may_ contain backslash characters ('\') to delimit individual values,
    /// and should be split later on if required.
    fn decode(&self, text: &[u8]) -> DecodeResult<String>;

    /// Encode a text value into a byte vector. The input string can
    /// feature multiple text values by using the backslash character ('\')
    /// as the value delimiter.
    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>>;
}

impl<T: ?Sized> TextCodec for Box<T>
where
    T: TextCodec,
{
    fn name(&self) -> Cow<'static, str> {
        self.as_ref().name()
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        self.as_ref().decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        self.as_ref().encode(text)
    }
}

impl<'a, T: ?Sized> TextCodec for &'a T
where
    T: TextCodec,
{
    fn name(&self) -> Cow<'static, str> {
        (**self).name()
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        (**self).decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        (**self).encode(text)
    }
}

/// A descriptor for a specific character set,
/// taking part in text encoding and decoding.
///
/// Use [`from_code`](SpecificCharacterSet::from_code)
/// to resolve a single defined term, or
/// [`from_element_value`](SpecificCharacterSet::from_element_value)
/// to resolve the raw value of a Specific Character Set element,
/// which may be multi-valued.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SpecificCharacterSet {
    /// The default character repertoire, ISO-IR 6.
    #[default]
    Default,
    /// ISO-IR 100 (ISO-8859-1): Western Europe.
    IsoIr100,
    /// ISO-IR 101 (ISO-8859-2): Central/Eastern Europe.
    IsoIr101,
    /// ISO-IR 144 (ISO-8859-5): Latin/Cyrillic.
    IsoIr144,
    /// ISO-IR 192: Unicode in UTF-8.
    IsoIr192,
    /// GB18030: Simplified Chinese.
    Gb18030,
    /// GBK: Simplified Chinese.
    Gbk,
}

impl SpecificCharacterSet {
    /// Obtain the character set for a single defined term,
    /// such as `"ISO_IR 100"`.
    pub fn from_code(code: &str) -> Option<Self> {
        use SpecificCharacterSet::*;
        match code.trim_end() {
            "" | "ISO_IR 6" | "ISO 2022 IR 6" => Some(Default),
            "ISO_IR 100" | "ISO 2022 IR 100" => Some(IsoIr100),
            "ISO_IR 101" | "ISO 2022 IR 101" => Some(IsoIr101),
            "ISO_IR 144" | "ISO 2022 IR 144" => Some(IsoIr144),
            "ISO_IR 192" => Some(IsoIr192),
            "GB18030" => Some(Gb18030),
            "GBK" => Some(Gbk),
            _ => None,
        }
    }

    /// Resolve the raw value of a Specific Character Set element.
    ///
    /// Multiple values signal the use of code extension techniques.
    /// ISO-IR 192, GB18030 and GBK do not admit such combinations
    /// and are rejected outright; other combinations are unsupported
    /// by this implementation.
    pub fn from_element_value(value: &str) -> Result<Self, CharsetError> {
        let mut values = value.split('\\').map(str::trim);
        let first = values.next().unwrap_or("");
        match values.next() {
            None => from_single_term(first),
            Some(second) => {
                // a multi-valued specific character set:
                // reject terms which do not admit code extensions
                for term in [first, second].iter().copied().chain(values) {
                    if matches!(term, "ISO_IR 192" | "GB18030" | "GBK") {
                        return IllegalCombinationSnafu { term }.fail();
                    }
                }
                UnsupportedTermSnafu { term: value }.fail()
            }
        }
    }
}

fn from_single_term(term: &str) -> Result<SpecificCharacterSet, CharsetError> {
    SpecificCharacterSet::from_code(term)
        .ok_or_else(|| UnsupportedTermSnafu { term }.build())
}

impl TextCodec for SpecificCharacterSet {
    fn name(&self) -> Cow<'static, str> {
        use SpecificCharacterSet::*;
        Cow::Borrowed(match self {
            Default => "ISO_IR 6",
            IsoIr100 => "ISO_IR 100",
            IsoIr101 => "ISO_IR 101",
            IsoIr144 => "ISO_IR 144",
            IsoIr192 => "ISO_IR 192",
            Gb18030 => "GB18030",
            Gbk => "GBK",
        })
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        use SpecificCharacterSet::*;
        let encoding: &dyn Encoding = match self {
            Default | IsoIr100 => ISO_8859_1,
            IsoIr101 => ISO_8859_2,
            IsoIr144 => ISO_8859_5,
            IsoIr192 => UTF_8,
            // GBK is a subset of GB18030
            Gb18030 | Gbk => GB18030,
        };
        encoding
            .decode(text, DecoderTrap::Strict)
            .map_err(|message| DecodeCustomSnafu { message }.build())
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        use SpecificCharacterSet::*;
        let encoding: &dyn Encoding = match self {
            Default | IsoIr100 => ISO_8859_1,
            IsoIr101 => ISO_8859_2,
            IsoIr144 => ISO_8859_5,
            IsoIr192 => UTF_8,
            Gb18030 | Gbk => GB18030,
        };
        encoding
            .encode(text, EncoderTrap::Strict)
            .map_err(|message| EncodeCustomSnafu { message }.build())
    }
}

/// A text codec for the default character repertoire (ISO-IR 6).
///
/// Decoding is permissive towards the ISO-8859-1 superset,
/// as non-conformant files with extended characters
/// and no declared character set are common in the wild.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct DefaultCharacterSetCodec;

impl TextCodec for DefaultCharacterSetCodec {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ISO_IR 6")
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        SpecificCharacterSet::Default.decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        SpecificCharacterSet::Default.encode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_single_terms() {
        assert_eq!(
            SpecificCharacterSet::from_code("ISO_IR 100"),
            Some(SpecificCharacterSet::IsoIr100)
        );
        assert_eq!(
            SpecificCharacterSet::from_code("ISO_IR 192"),
            Some(SpecificCharacterSet::IsoIr192)
        );
        assert_eq!(
            SpecificCharacterSet::from_code(""),
            Some(SpecificCharacterSet::Default)
        );
        assert_eq!(SpecificCharacterSet::from_code("ISO_IR 13"), None);
    }

    #[test]
    fn rejects_utf8_in_combination() {
        assert!(SpecificCharacterSet::from_element_value("ISO_IR 192").is_ok());
        assert!(matches!(
            SpecificCharacterSet::from_element_value("ISO 2022 IR 6\\ISO_IR 192"),
            Err(CharsetError::IllegalCombination { .. })
        ));
        assert!(matches!(
            SpecificCharacterSet::from_element_value("GB18030\\ISO 2022 IR 58"),
            Err(CharsetError::IllegalCombination { .. })
        ));
    }

    #[test]
    fn iso_2022_combinations_are_unsupported() {
        assert!(matches!(
            SpecificCharacterSet::from_element_value("ISO 2022 IR 13\\ISO 2022 IR 87"),
            Err(CharsetError::UnsupportedTerm { .. })
        ));
    }

    #[test]
    fn utf8_round_trip() {
        let cs = SpecificCharacterSet::IsoIr192;
        let bytes = cs.encode("Пирогов^Николай").unwrap();
        assert_eq!(cs.decode(&bytes).unwrap(), "Пирогов^Николай");
    }

    #[test]
    fn latin1_decoding() {
        let cs = SpecificCharacterSet::IsoIr100;
        assert_eq!(cs.decode(b"Dupont^Andr\xE9").unwrap(), "Dupont^André");
    }
}
