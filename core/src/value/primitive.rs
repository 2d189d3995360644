//! Declaration and implementation of the primitive (non-container)
//! element value.
//!
//! Primitive values own the raw bytes of the element exactly as they
//! travel in a data set, already normalized to little endian for numeric
//! representations and stripped of trailing padding for textual ones.
//! Interpretation is on demand: textual access goes through the active
//! character set (applied by a higher layer), numeric access reinterprets
//! the buffer at the width of the element's VR.

use snafu::Snafu;
use std::fmt;

/// An error raised when interpreting a primitive value
/// under an incompatible shape.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum CastValueError {
    /// The value is not textual.
    #[snafu(display("value of kind {:?} is not textual", kind))]
    NotString { kind: ValueKind },

    /// The value is not numeric.
    #[snafu(display("value of kind {:?} is not numeric", kind))]
    NotNumeric { kind: ValueKind },

    /// The buffer does not hold a whole number of values
    /// at the requested width.
    #[snafu(display("buffer of {} bytes does not divide into values of {} bytes", len, width))]
    Misaligned { len: usize, width: usize },

    /// The raw text is not valid for the expected character repertoire.
    #[snafu(display("text is not valid in the default character repertoire"))]
    InvalidText,
}

pub type Result<T, E = CastValueError> = std::result::Result<T, E>;

/// The kind of data held in a primitive value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// No value.
    Empty,
    /// Textual data, decoded through the active specific character set.
    Str,
    /// Binary numeric data in little endian byte order.
    Num,
    /// Opaque binary data.
    Bin,
}

/// A primitive DICOM element value: raw bytes tagged with their kind.
///
/// Values of multiplicity greater than one are kept in their wire form:
/// `\`-separated for textual representations, contiguous fixed-width
/// records for numeric ones.
#[derive(Clone, PartialEq)]
pub enum PrimitiveValue {
    /// An empty value (zero length).
    Empty,
    /// Raw textual data in the data set's character set,
    /// without trailing padding.
    Str(Vec<u8>),
    /// Raw numeric data, little endian.
    Num(Vec<u8>),
    /// Raw opaque data.
    Bin(Vec<u8>),
}

impl PrimitiveValue {
    /// The kind of data held in this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            PrimitiveValue::Empty => ValueKind::Empty,
            PrimitiveValue::Str(_) => ValueKind::Str,
            PrimitiveValue::Num(_) => ValueKind::Num,
            PrimitiveValue::Bin(_) => ValueKind::Bin,
        }
    }

    /// The number of raw bytes owned by this value, before padding.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the value holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// A view of the value's raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PrimitiveValue::Empty => &[],
            PrimitiveValue::Str(data) | PrimitiveValue::Num(data) | PrimitiveValue::Bin(data) => {
                data
            }
        }
    }

    /// Take the value's raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PrimitiveValue::Empty => Vec::new(),
            PrimitiveValue::Str(data) | PrimitiveValue::Num(data) | PrimitiveValue::Bin(data) => {
                data
            }
        }
    }

    /// Construct a textual value from a string,
    /// storing its bytes verbatim. The caller is responsible for
    /// providing text in the data set's character set.
    pub fn from_text(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        if text.is_empty() {
            PrimitiveValue::Empty
        } else {
            PrimitiveValue::Str(text.as_bytes().to_vec())
        }
    }

    /// Construct an opaque binary value.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        if data.is_empty() {
            PrimitiveValue::Empty
        } else {
            PrimitiveValue::Bin(data)
        }
    }

    /// Construct a numeric value from 16-bit unsigned integers.
    pub fn from_u16_slice(values: &[u16]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Construct a numeric value from 16-bit signed integers.
    pub fn from_i16_slice(values: &[i16]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Construct a numeric value from 32-bit unsigned integers.
    pub fn from_u32_slice(values: &[u32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Construct a numeric value from 32-bit signed integers.
    pub fn from_i32_slice(values: &[i32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Construct a numeric value from 64-bit unsigned integers.
    pub fn from_u64_slice(values: &[u64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Construct a numeric value from single precision floats.
    pub fn from_f32_slice(values: &[f32]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Construct a numeric value from double precision floats.
    pub fn from_f64_slice(values: &[f64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        PrimitiveValue::Num(data)
    }

    /// Read the raw text as a string in the default character repertoire.
    ///
    /// This is suitable for representations which never leave ASCII,
    /// such as `UI`, `CS`, `DA` and `TM`. Text in other character sets
    /// should be decoded through the respective codec instead.
    pub fn string(&self) -> Result<&str> {
        match self {
            PrimitiveValue::Empty => Ok(""),
            PrimitiveValue::Str(data) => std::str::from_utf8(data).map_err(|_| InvalidTextSnafu.build()),
            other => NotStringSnafu { kind: other.kind() }.fail(),
        }
    }

    /// Read the raw text split by the standard value delimiter.
    pub fn strings(&self) -> Result<Vec<&str>> {
        Ok(self.string()?.split('\\').collect())
    }

    /// Read the first value as a 16-bit unsigned integer.
    pub fn uint16(&self) -> Result<u16> {
        self.numeric_chunk(2, 0)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read all values as 16-bit unsigned integers.
    pub fn uint16_all(&self) -> Result<Vec<u16>> {
        self.numeric_chunks(2)
            .map(|chunks| chunks.map(|b| u16::from_le_bytes([b[0], b[1]])).collect())
    }

    /// Read the first value as a 16-bit signed integer.
    pub fn int16(&self) -> Result<i16> {
        self.numeric_chunk(2, 0)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    /// Read the first value as a 32-bit unsigned integer.
    pub fn uint32(&self) -> Result<u32> {
        self.numeric_chunk(4, 0)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read all values as 32-bit unsigned integers.
    pub fn uint32_all(&self) -> Result<Vec<u32>> {
        self.numeric_chunks(4).map(|chunks| {
            chunks
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
    }

    /// Read the first value as a 32-bit signed integer.
    pub fn int32(&self) -> Result<i32> {
        self.numeric_chunk(4, 0)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read all values as 64-bit unsigned integers.
    pub fn uint64_all(&self) -> Result<Vec<u64>> {
        self.numeric_chunks(8).map(|chunks| {
            chunks
                .map(|b| {
                    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                })
                .collect()
        })
    }

    /// Read the first value as a single precision float.
    pub fn float32(&self) -> Result<f32> {
        self.numeric_chunk(4, 0)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read the first value as a double precision float.
    pub fn float64(&self) -> Result<f64> {
        self.numeric_chunk(8, 0)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Interpret an `IS` value as a 32-bit signed integer.
    pub fn to_int(&self) -> Result<i32> {
        self.string()?
            .trim()
            .parse()
            .map_err(|_| InvalidTextSnafu.build())
    }

    fn numeric_data(&self) -> Result<&[u8]> {
        match self {
            PrimitiveValue::Num(data) => Ok(data),
            // opaque data may be reinterpreted, e.g. OB pixel samples
            PrimitiveValue::Bin(data) => Ok(data),
            PrimitiveValue::Empty => Ok(&[]),
            other => NotNumericSnafu { kind: other.kind() }.fail(),
        }
    }

    fn numeric_chunk(&self, width: usize, index: usize) -> Result<&[u8]> {
        let data = self.numeric_data()?;
        data.chunks_exact(width).nth(index).ok_or_else(|| {
            MisalignedSnafu {
                len: data.len(),
                width,
            }
            .build()
        })
    }

    fn numeric_chunks(&self, width: usize) -> Result<std::slice::ChunksExact<'_, u8>> {
        let data = self.numeric_data()?;
        if data.len() % width != 0 {
            return MisalignedSnafu {
                len: data.len(),
                width,
            }
            .fail();
        }
        Ok(data.chunks_exact(width))
    }
}

impl fmt::Debug for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrimitiveValue::Empty => f.write_str("Empty"),
            PrimitiveValue::Str(data) => match std::str::from_utf8(data) {
                Ok(text) => write!(f, "Str({:?})", text),
                Err(_) => write!(f, "Str({} raw bytes)", data.len()),
            },
            PrimitiveValue::Num(data) => write!(f, "Num({} bytes)", data.len()),
            PrimitiveValue::Bin(data) => write!(f, "Bin({} bytes)", data.len()),
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(text: &str) -> Self {
        PrimitiveValue::from_text(text)
    }
}

impl From<String> for PrimitiveValue {
    fn from(text: String) -> Self {
        if text.is_empty() {
            PrimitiveValue::Empty
        } else {
            PrimitiveValue::Str(text.into_bytes())
        }
    }
}

impl From<u16> for PrimitiveValue {
    fn from(value: u16) -> Self {
        PrimitiveValue::from_u16_slice(&[value])
    }
}

impl From<i16> for PrimitiveValue {
    fn from(value: i16) -> Self {
        PrimitiveValue::from_i16_slice(&[value])
    }
}

impl From<u32> for PrimitiveValue {
    fn from(value: u32) -> Self {
        PrimitiveValue::from_u32_slice(&[value])
    }
}

impl From<i32> for PrimitiveValue {
    fn from(value: i32) -> Self {
        PrimitiveValue::from_i32_slice(&[value])
    }
}

impl From<f32> for PrimitiveValue {
    fn from(value: f32) -> Self {
        PrimitiveValue::from_f32_slice(&[value])
    }
}

impl From<f64> for PrimitiveValue {
    fn from(value: f64) -> Self {
        PrimitiveValue::from_f64_slice(&[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let v = PrimitiveValue::from_text("DOE^JOHN");
        assert_eq!(v.string().unwrap(), "DOE^JOHN");
        assert_eq!(v.len(), 8);
    }

    #[test]
    fn multi_valued_strings() {
        let v = PrimitiveValue::from_text("ORIGINAL\\PRIMARY");
        assert_eq!(v.strings().unwrap(), vec!["ORIGINAL", "PRIMARY"]);
    }

    #[test]
    fn numeric_access_is_little_endian() {
        let v = PrimitiveValue::Num(vec![0x34, 0x12, 0x78, 0x56]);
        assert_eq!(v.uint16().unwrap(), 0x1234);
        assert_eq!(v.uint16_all().unwrap(), vec![0x1234, 0x5678]);
        assert_eq!(v.uint32().unwrap(), 0x5678_1234);
    }

    #[test]
    fn misaligned_numeric_access_fails() {
        let v = PrimitiveValue::Num(vec![0x00, 0x01, 0x02]);
        assert!(v.uint16_all().is_err());
        assert!(v.uint32().is_err());
    }

    #[test]
    fn from_slice_constructors() {
        assert_eq!(
            PrimitiveValue::from_u16_slice(&[0x0102]).as_bytes(),
            &[0x02, 0x01]
        );
        assert_eq!(
            PrimitiveValue::from_u32_slice(&[1]).as_bytes(),
            &[1, 0, 0, 0]
        );
    }
}
