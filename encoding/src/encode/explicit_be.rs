//! Explicit VR Big Endian encoding.

use crate::encode::basic::BigEndianBasicEncoder;
use crate::encode::*;
use dcm_core::header::{DataElementHeader, Tag, VR};
use dcm_core::value::PrimitiveValue;
use snafu::ResultExt;
use std::io::Write;

/// A data element encoder for the (retired) Explicit VR Big Endian
/// transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRBigEndianEncoder {
    basic: BigEndianBasicEncoder,
}

impl Encode for ExplicitVRBigEndianEncoder {
    fn encode_tag<W>(&self, to: &mut W, tag: Tag) -> Result<()>
    where
        W: Write + ?Sized,
    {
        self.basic
            .encode_us(&mut *to, tag.group())
            .context(WriteTagSnafu)?;
        self.basic
            .encode_us(&mut *to, tag.element())
            .context(WriteTagSnafu)?;
        Ok(())
    }

    fn encode_element_header<W>(&self, to: &mut W, de: DataElementHeader) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        self.encode_tag(to, de.tag)?;
        to.write_all(&de.vr.to_bytes()).context(WriteVrSnafu)?;

        if de.vr.has_short_length() {
            let len = de.len.0;
            if len > u32::from(u16::MAX) {
                return OversizedValueSnafu { length: len as usize }.fail();
            }
            self.basic
                .encode_us(&mut *to, len as u16)
                .context(WriteLengthSnafu)?;
            Ok(8)
        } else {
            to.write_all(&[0u8; 2]).context(WriteReservedSnafu)?;
            self.basic
                .encode_ul(&mut *to, de.len.0)
                .context(WriteLengthSnafu)?;
            Ok(12)
        }
    }

    fn encode_item_header<W>(&self, to: &mut W, len: u32) -> Result<()>
    where
        W: Write + ?Sized,
    {
        self.encode_tag(to, Tag(0xFFFE, 0xE000))?;
        self.basic
            .encode_ul(&mut *to, len)
            .context(WriteLengthSnafu)?;
        Ok(())
    }

    fn encode_primitive<W>(&self, to: &mut W, vr: VR, value: &PrimitiveValue) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        let data = value.as_bytes();
        match (value, vr.numeric_width()) {
            // numeric data is stored in little endian
            // and must be swapped into big endian words
            (PrimitiveValue::Num(_), Some(width)) if width > 1 => {
                let mut swapped = data.to_vec();
                for chunk in swapped.chunks_exact_mut(width) {
                    chunk.reverse();
                }
                to.write_all(&swapped).context(WriteValueDataSnafu)?;
            }
            _ => {
                to.write_all(data).context(WriteValueDataSnafu)?;
            }
        }
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_core::Length;

    #[test]
    fn encode_element_header_big_endian() {
        let enc = ExplicitVRBigEndianEncoder::default();
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0028, 0x0100), VR::US, Length(2));
        enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(
            out,
            vec![0x00, 0x28, 0x01, 0x00, b'U', b'S', 0x00, 0x02]
        );
    }

    #[test]
    fn numeric_values_are_byte_swapped() {
        let enc = ExplicitVRBigEndianEncoder::default();
        let mut out = Vec::new();
        let value = PrimitiveValue::from_u16_slice(&[0x0102, 0x0304]);
        enc.encode_primitive(&mut out, VR::US, &value).unwrap();
        assert_eq!(out, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn text_values_pass_through() {
        let enc = ExplicitVRBigEndianEncoder::default();
        let mut out = Vec::new();
        let value = PrimitiveValue::from_text("CT");
        enc.encode_primitive(&mut out, VR::CS, &value).unwrap();
        assert_eq!(out, b"CT");
    }
}
