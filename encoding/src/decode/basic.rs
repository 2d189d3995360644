//! This module provides implementations for basic decoders: little endian and big endian.

use super::BasicDecode;
use byteordered::byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use byteordered::Endianness;
use std::io::Read;

/// A basic decoder of DICOM primitive values in little endian.
#[derive(Debug, Default, Clone)]
pub struct LittleEndianBasicDecoder;

impl BasicDecode for LittleEndianBasicDecoder {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn decode_us<S>(&self, mut source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        source.read_u16::<LittleEndian>()
    }

    fn decode_ul<S>(&self, mut source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        source.read_u32::<LittleEndian>()
    }

    fn decode_uv<S>(&self, mut source: S) -> std::io::Result<u64>
    where
        S: Read,
    {
        source.read_u64::<LittleEndian>()
    }

    fn decode_ss<S>(&self, mut source: S) -> std::io::Result<i16>
    where
        S: Read,
    {
        source.read_i16::<LittleEndian>()
    }

    fn decode_sl<S>(&self, mut source: S) -> std::io::Result<i32>
    where
        S: Read,
    {
        source.read_i32::<LittleEndian>()
    }

    fn decode_sv<S>(&self, mut source: S) -> std::io::Result<i64>
    where
        S: Read,
    {
        source.read_i64::<LittleEndian>()
    }

    fn decode_fl<S>(&self, mut source: S) -> std::io::Result<f32>
    where
        S: Read,
    {
        source.read_f32::<LittleEndian>()
    }

    fn decode_fd<S>(&self, mut source: S) -> std::io::Result<f64>
    where
        S: Read,
    {
        source.read_f64::<LittleEndian>()
    }
}

/// A basic decoder of DICOM primitive values in big endian.
#[derive(Debug, Default, Clone)]
pub struct BigEndianBasicDecoder;

impl BasicDecode for BigEndianBasicDecoder {
    fn endianness(&self) -> Endianness {
        Endianness::Big
    }

    fn decode_us<S>(&self, mut source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        source.read_u16::<BigEndian>()
    }

    fn decode_ul<S>(&self, mut source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        source.read_u32::<BigEndian>()
    }

    fn decode_uv<S>(&self, mut source: S) -> std::io::Result<u64>
    where
        S: Read,
    {
        source.read_u64::<BigEndian>()
    }

    fn decode_ss<S>(&self, mut source: S) -> std::io::Result<i16>
    where
        S: Read,
    {
        source.read_i16::<BigEndian>()
    }

    fn decode_sl<S>(&self, mut source: S) -> std::io::Result<i32>
    where
        S: Read,
    {
        source.read_i32::<BigEndian>()
    }

    fn decode_sv<S>(&self, mut source: S) -> std::io::Result<i64>
    where
        S: Read,
    {
        source.read_i64::<BigEndian>()
    }

    fn decode_fl<S>(&self, mut source: S) -> std::io::Result<f32>
    where
        S: Read,
    {
        source.read_f32::<BigEndian>()
    }

    fn decode_fd<S>(&self, mut source: S) -> std::io::Result<f64>
    where
        S: Read,
    {
        source.read_f64::<BigEndian>()
    }
}

/// A basic decoder with support for both endianness modes,
/// decided at run-time.
#[derive(Debug, Clone)]
pub enum BasicDecoder {
    /// Decode in little endian
    LE(LittleEndianBasicDecoder),
    /// Decode in big endian
    BE(BigEndianBasicDecoder),
}

impl From<Endianness> for BasicDecoder {
    fn from(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => BasicDecoder::LE(LittleEndianBasicDecoder),
            Endianness::Big => BasicDecoder::BE(BigEndianBasicDecoder),
        }
    }
}

macro_rules! for_both {
    ($selff:ident, |$e:ident| $f:expr) => {
        match $selff {
            BasicDecoder::LE($e) => $f,
            BasicDecoder::BE($e) => $f,
        }
    };
}

impl BasicDecode for BasicDecoder {
    fn endianness(&self) -> Endianness {
        for_both!(self, |decoder| decoder.endianness())
    }

    fn decode_us<S>(&self, source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_us(source))
    }

    fn decode_ul<S>(&self, source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_ul(source))
    }

    fn decode_uv<S>(&self, source: S) -> std::io::Result<u64>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_uv(source))
    }

    fn decode_ss<S>(&self, source: S) -> std::io::Result<i16>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_ss(source))
    }

    fn decode_sl<S>(&self, source: S) -> std::io::Result<i32>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_sl(source))
    }

    fn decode_sv<S>(&self, source: S) -> std::io::Result<i64>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_sv(source))
    }

    fn decode_fl<S>(&self, source: S) -> std::io::Result<f32>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_fl(source))
    }

    fn decode_fd<S>(&self, source: S) -> std::io::Result<f64>
    where
        S: Read,
    {
        for_both!(self, |decoder| decoder.decode_fd(source))
    }
}
