//! This module provides the decoding traits and implementations
//! for reading data element headers in the supported
//! VR-mode and endianness combinations.

pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;

use dcm_core::header::{DataElementHeader, SequenceItemHeader, Tag};
use snafu::{Backtrace, Snafu};
use std::io::Read;

pub use self::basic::BasicDecoder;

/// Module-level error type:
/// for errors which may occur while decoding DICOM data.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("failed to read the beginning (tag) of the header"))]
    ReadHeaderTag {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to read the item header"))]
    ReadItemHeader {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to read the header's item length field"))]
    ReadItemLength {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to read the header's tag"))]
    ReadTag {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to read the header's reserved bytes"))]
    ReadReserved {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to read the value representation"))]
    ReadVr {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("failed to read the value length"))]
    ReadLength {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("unrecognized value representation `{}{}`", *b1 as char, *b2 as char))]
    UnknownVr {
        b1: u8,
        b2: u8,
        backtrace: Backtrace,
    },

    #[snafu(display("invalid sequence item header"))]
    BadSequenceHeader {
        source: dcm_core::error::Error,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// What the decoder should do upon finding a value representation
/// code outside the standard set.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InvalidVrStrategy {
    /// Fail the parse with an error.
    Throw,
    /// Interpret the element as `UN` from this point on.
    #[default]
    MapToUn,
    /// Retain the raw code ([`VR::Other`](dcm_core::VR::Other)),
    /// so that writers can reproduce it verbatim.
    Preserve,
}

/** Obtain the default data element decoder.
 * According to the standard, data elements are encoded in Implicit
 * VR Little Endian by default.
 */
pub fn default_reader() -> implicit_le::ImplicitVRLittleEndianDecoder {
    implicit_le::ImplicitVRLittleEndianDecoder::default()
}

/** Obtain a data element decoder for reading the data elements in a DICOM
 * file's Meta group. According to the standard, these are always encoded in
 * Explicit VR Little Endian.
 */
pub fn file_header_decoder() -> explicit_le::ExplicitVRLittleEndianDecoder {
    explicit_le::ExplicitVRLittleEndianDecoder::default()
}

/// Type trait for reading and decoding basic data values from a data source.
///
/// This trait aims to provide methods for reading binary numbers based on
/// the given source's endianness.
pub trait BasicDecode {
    /// Retrieve the source's endianness.
    fn endianness(&self) -> byteordered::Endianness;

    /// Decode an unsigned short value from the given source.
    fn decode_us<S>(&self, source: S) -> std::io::Result<u16>
    where
        S: Read;

    /// Decode an unsigned long value from the given source.
    fn decode_ul<S>(&self, source: S) -> std::io::Result<u32>
    where
        S: Read;

    /// Decode an unsigned very long value from the given source.
    fn decode_uv<S>(&self, source: S) -> std::io::Result<u64>
    where
        S: Read;

    /// Decode a signed short value from the given source.
    fn decode_ss<S>(&self, source: S) -> std::io::Result<i16>
    where
        S: Read;

    /// Decode a signed long value from the given source.
    fn decode_sl<S>(&self, source: S) -> std::io::Result<i32>
    where
        S: Read;

    /// Decode a signed very long value from the given source.
    fn decode_sv<S>(&self, source: S) -> std::io::Result<i64>
    where
        S: Read;

    /// Decode a single precision float value from the given source.
    fn decode_fl<S>(&self, source: S) -> std::io::Result<f32>
    where
        S: Read;

    /// Decode a double precision float value from the given source.
    fn decode_fd<S>(&self, source: S) -> std::io::Result<f64>
    where
        S: Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, mut source: S) -> std::io::Result<Tag>
    where
        S: Read,
    {
        let g = self.decode_us(&mut source)?;
        let e = self.decode_us(source)?;
        Ok(Tag(g, e))
    }
}

/// Type trait for decoding data element headers from a data source.
/// The decoder's endianness and VR interpretation mode are
/// implementation defined.
pub trait Decode {
    /// Fetch and decode the next data element header from the given source.
    /// This method returns only the header of the element and the number of
    /// bytes read from the source. At the end of this operation, the source
    /// will be pointing at the element's value data, which should be read or
    /// skipped as necessary.
    fn decode_header<S>(&self, source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read;

    /// Fetch and decode the next sequence item head from the given source.
    /// It is a separate method because value representation is always
    /// implicit when reading item headers and delimiters.
    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read;
}

/// Type trait for decoding data element headers from a specific
/// data source type. Unlike [`Decode`], this trait is object safe.
pub trait DecodeFrom<S: ?Sized + Read> {
    /// Fetch and decode the next data element header from the given source.
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)>;

    /// Fetch and decode the next sequence item head from the given source.
    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader>;

    /// Decode a DICOM attribute tag from the given source.
    fn decode_tag(&self, source: &mut S) -> Result<Tag>;
}

impl<S: ?Sized + Read, T: ?Sized> DecodeFrom<S> for Box<T>
where
    T: DecodeFrom<S>,
{
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        (**self).decode_header(source)
    }

    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        (**self).decode_item_header(source)
    }

    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        (**self).decode_tag(source)
    }
}
