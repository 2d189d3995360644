//! This module provides implementations for basic encoders: little endian and big endian.

use super::BasicEncode;
use byteordered::byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use byteordered::Endianness;
use std::io::Write;

/// A basic encoder of DICOM primitive values in little endian.
#[derive(Debug, Default, Clone)]
pub struct LittleEndianBasicEncoder;

impl BasicEncode for LittleEndianBasicEncoder {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn encode_us<W>(&self, mut to: W, value: u16) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_u16::<LittleEndian>(value)
    }

    fn encode_ul<W>(&self, mut to: W, value: u32) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_u32::<LittleEndian>(value)
    }

    fn encode_uv<W>(&self, mut to: W, value: u64) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_u64::<LittleEndian>(value)
    }

    fn encode_ss<W>(&self, mut to: W, value: i16) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_i16::<LittleEndian>(value)
    }

    fn encode_sl<W>(&self, mut to: W, value: i32) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_i32::<LittleEndian>(value)
    }

    fn encode_sv<W>(&self, mut to: W, value: i64) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_i64::<LittleEndian>(value)
    }

    fn encode_fl<W>(&self, mut to: W, value: f32) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_f32::<LittleEndian>(value)
    }

    fn encode_fd<W>(&self, mut to: W, value: f64) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_f64::<LittleEndian>(value)
    }
}

/// A basic encoder of DICOM primitive values in big endian.
#[derive(Debug, Default, Clone)]
pub struct BigEndianBasicEncoder;

impl BasicEncode for BigEndianBasicEncoder {
    fn endianness(&self) -> Endianness {
        Endianness::Big
    }

    fn encode_us<W>(&self, mut to: W, value: u16) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_u16::<BigEndian>(value)
    }

    fn encode_ul<W>(&self, mut to: W, value: u32) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_u32::<BigEndian>(value)
    }

    fn encode_uv<W>(&self, mut to: W, value: u64) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_u64::<BigEndian>(value)
    }

    fn encode_ss<W>(&self, mut to: W, value: i16) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_i16::<BigEndian>(value)
    }

    fn encode_sl<W>(&self, mut to: W, value: i32) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_i32::<BigEndian>(value)
    }

    fn encode_sv<W>(&self, mut to: W, value: i64) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_i64::<BigEndian>(value)
    }

    fn encode_fl<W>(&self, mut to: W, value: f32) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_f32::<BigEndian>(value)
    }

    fn encode_fd<W>(&self, mut to: W, value: f64) -> std::io::Result<()>
    where
        W: Write,
    {
        to.write_f64::<BigEndian>(value)
    }
}

/// A basic encoder with support for both endianness modes,
/// decided at run-time.
#[derive(Debug, Clone)]
pub enum BasicEncoder {
    /// Encode in little endian
    LE(LittleEndianBasicEncoder),
    /// Encode in big endian
    BE(BigEndianBasicEncoder),
}

impl From<Endianness> for BasicEncoder {
    fn from(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => BasicEncoder::LE(LittleEndianBasicEncoder),
            Endianness::Big => BasicEncoder::BE(BigEndianBasicEncoder),
        }
    }
}

macro_rules! for_both {
    ($selff:ident, |$e:ident| $f:expr) => {
        match $selff {
            BasicEncoder::LE($e) => $f,
            BasicEncoder::BE($e) => $f,
        }
    };
}

impl BasicEncode for BasicEncoder {
    fn endianness(&self) -> Endianness {
        for_both!(self, |encoder| encoder.endianness())
    }

    fn encode_us<W>(&self, to: W, value: u16) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_us(to, value))
    }

    fn encode_ul<W>(&self, to: W, value: u32) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_ul(to, value))
    }

    fn encode_uv<W>(&self, to: W, value: u64) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_uv(to, value))
    }

    fn encode_ss<W>(&self, to: W, value: i16) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_ss(to, value))
    }

    fn encode_sl<W>(&self, to: W, value: i32) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_sl(to, value))
    }

    fn encode_sv<W>(&self, to: W, value: i64) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_sv(to, value))
    }

    fn encode_fl<W>(&self, to: W, value: f32) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_fl(to, value))
    }

    fn encode_fd<W>(&self, to: W, value: f64) -> std::io::Result<()>
    where
        W: Write,
    {
        for_both!(self, |encoder| encoder.encode_fd(to, value))
    }
}
