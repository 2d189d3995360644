//! This module contains all DICOM data element encoding logic.

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;

use byteordered::Endianness;
use dcm_core::header::{DataElementHeader, Tag, VR};
use dcm_core::value::PrimitiveValue;
use snafu::{Backtrace, Snafu};
use std::io::Write;

pub use self::basic::BasicEncoder;

/// Module-level error type:
/// for errors which may occur while encoding DICOM data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("failed to write tag"))]
    WriteTag {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to write value representation"))]
    WriteVr {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to write reserved bytes"))]
    WriteReserved {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to write value length"))]
    WriteLength {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to write value data"))]
    WriteValueData {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("value length {} does not fit in a 16-bit length field", length))]
    OversizedValue { length: usize, backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Type trait for encoding basic data values to a data sink,
/// based on the sink's endianness.
pub trait BasicEncode {
    /// Retrieve the sink's endianness.
    fn endianness(&self) -> Endianness;

    /// Encode an unsigned short value to the given destination.
    fn encode_us<W>(&self, to: W, value: u16) -> std::io::Result<()>
    where
        W: Write;

    /// Encode an unsigned long value to the given destination.
    fn encode_ul<W>(&self, to: W, value: u32) -> std::io::Result<()>
    where
        W: Write;

    /// Encode an unsigned very long value to the given destination.
    fn encode_uv<W>(&self, to: W, value: u64) -> std::io::Result<()>
    where
        W: Write;

    /// Encode a signed short value to the given destination.
    fn encode_ss<W>(&self, to: W, value: i16) -> std::io::Result<()>
    where
        W: Write;

    /// Encode a signed long value to the given destination.
    fn encode_sl<W>(&self, to: W, value: i32) -> std::io::Result<()>
    where
        W: Write;

    /// Encode a signed very long value to the given destination.
    fn encode_sv<W>(&self, to: W, value: i64) -> std::io::Result<()>
    where
        W: Write;

    /// Encode a single precision float value to the given destination.
    fn encode_fl<W>(&self, to: W, value: f32) -> std::io::Result<()>
    where
        W: Write;

    /// Encode a double precision float value to the given destination.
    fn encode_fd<W>(&self, to: W, value: f64) -> std::io::Result<()>
    where
        W: Write;
}

/// Type trait for encoding data element headers and values
/// into a data sink. The encoder's endianness and VR interpretation
/// mode are implementation defined.
pub trait Encode {
    /// Encode and write an element tag.
    fn encode_tag<W>(&self, to: &mut W, tag: Tag) -> Result<()>
    where
        W: Write + ?Sized;

    /// Encode and write a data element header to the given destination.
    /// Returns the number of bytes effectively written on success.
    fn encode_element_header<W>(&self, to: &mut W, de: DataElementHeader) -> Result<usize>
    where
        W: Write + ?Sized;

    /// Encode and write a DICOM sequence item header to the given destination.
    fn encode_item_header<W>(&self, to: &mut W, len: u32) -> Result<()>
    where
        W: Write + ?Sized;

    /// Encode and write a DICOM sequence item delimiter to the given destination.
    fn encode_item_delimiter<W>(&self, to: &mut W) -> Result<()>
    where
        W: Write + ?Sized,
    {
        use snafu::ResultExt;
        self.encode_tag(to, Tag(0xFFFE, 0xE00D))?;
        to.write_all(&[0u8; 4]).context(WriteLengthSnafu)?;
        Ok(())
    }

    /// Encode and write a DICOM sequence delimiter to the given destination.
    fn encode_sequence_delimiter<W>(&self, to: &mut W) -> Result<()>
    where
        W: Write + ?Sized,
    {
        use snafu::ResultExt;
        self.encode_tag(to, Tag(0xFFFE, 0xE0DD))?;
        to.write_all(&[0u8; 4]).context(WriteLengthSnafu)?;
        Ok(())
    }

    /// Encode and write a primitive value's raw bytes
    /// to the given destination, converting numeric data from
    /// its canonical little endian storage to the target byte order.
    /// The caller is responsible for even-length padding.
    /// Returns the number of bytes effectively written on success.
    fn encode_primitive<W>(&self, to: &mut W, vr: VR, value: &PrimitiveValue) -> Result<usize>
    where
        W: Write + ?Sized;
}

/// Type trait for encoding to a specific data sink type.
/// Unlike [`Encode`], this trait is object safe.
pub trait EncodeTo<W: ?Sized> {
    /// Encode and write an element tag.
    fn encode_tag(&self, to: &mut W, tag: Tag) -> Result<()>;

    /// Encode and write a data element header to the given destination.
    /// Returns the number of bytes effectively written on success.
    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize>;

    /// Encode and write a DICOM sequence item header to the given destination.
    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()>;

    /// Encode and write a DICOM sequence item delimiter to the given destination.
    fn encode_item_delimiter(&self, to: &mut W) -> Result<()>;

    /// Encode and write a DICOM sequence delimiter to the given destination.
    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()>;

    /// Encode and write a primitive value's raw bytes.
    fn encode_primitive(&self, to: &mut W, vr: VR, value: &PrimitiveValue) -> Result<usize>;
}

impl<W: ?Sized, T: ?Sized> EncodeTo<W> for Box<T>
where
    T: EncodeTo<W>,
{
    fn encode_tag(&self, to: &mut W, tag: Tag) -> Result<()> {
        (**self).encode_tag(to, tag)
    }

    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize> {
        (**self).encode_element_header(to, de)
    }

    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()> {
        (**self).encode_item_header(to, len)
    }

    fn encode_item_delimiter(&self, to: &mut W) -> Result<()> {
        (**self).encode_item_delimiter(to)
    }

    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()> {
        (**self).encode_sequence_delimiter(to)
    }

    fn encode_primitive(&self, to: &mut W, vr: VR, value: &PrimitiveValue) -> Result<usize> {
        (**self).encode_primitive(to, vr, value)
    }
}

/// A wrapper to turn any [`Encode`] implementation into
/// an object safe [`EncodeTo`] for a concrete writer type.
#[derive(Debug, Default, Clone)]
pub struct EncoderFor<T> {
    inner: T,
}

impl<T> EncoderFor<T> {
    /// Wrap the given encoder.
    pub fn new(inner: T) -> Self {
        EncoderFor { inner }
    }
}

impl<T, W: ?Sized> EncodeTo<W> for EncoderFor<T>
where
    T: Encode,
    W: Write,
{
    fn encode_tag(&self, to: &mut W, tag: Tag) -> Result<()> {
        self.inner.encode_tag(to, tag)
    }

    fn encode_element_header(&self, to: &mut W, de: DataElementHeader) -> Result<usize> {
        self.inner.encode_element_header(to, de)
    }

    fn encode_item_header(&self, to: &mut W, len: u32) -> Result<()> {
        self.inner.encode_item_header(to, len)
    }

    fn encode_item_delimiter(&self, to: &mut W) -> Result<()> {
        self.inner.encode_item_delimiter(to)
    }

    fn encode_sequence_delimiter(&self, to: &mut W) -> Result<()> {
        self.inner.encode_sequence_delimiter(to)
    }

    fn encode_primitive(&self, to: &mut W, vr: VR, value: &PrimitiveValue) -> Result<usize> {
        self.inner.encode_primitive(to, vr, value)
    }
}
