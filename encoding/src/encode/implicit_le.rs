//! Implicit VR Little Endian encoding.

use crate::encode::basic::LittleEndianBasicEncoder;
use crate::encode::*;
use dcm_core::header::{DataElementHeader, Tag, VR};
use dcm_core::value::PrimitiveValue;
use snafu::ResultExt;
use std::io::Write;

/// A data element encoder for the Implicit VR Little Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ImplicitVRLittleEndianEncoder {
    basic: LittleEndianBasicEncoder,
}

impl Encode for ImplicitVRLittleEndianEncoder {
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
        self.basic
            .encode_ul(&mut *to, de.len.0)
            .context(WriteLengthSnafu)?;
        Ok(8)
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

    fn encode_primitive<W>(&self, to: &mut W, _vr: VR, value: &PrimitiveValue) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        // values are stored in little endian; write them through
        let data = value.as_bytes();
        to.write_all(data).context(WriteValueDataSnafu)?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_core::Length;

    #[test]
    fn encode_element_header_is_always_8_bytes() {
        let enc = ImplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0010, 0x0010), VR::PN, Length(8));
        let bytes = enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(bytes, 8);
        assert_eq!(
            out,
            vec![0x10, 0x00, 0x10, 0x00, 0x08, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn encode_item_and_delimiters() {
        let enc = ImplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        enc.encode_item_header(&mut out, 0xFFFF_FFFF).unwrap();
        enc.encode_item_delimiter(&mut out).unwrap();
        enc.encode_sequence_delimiter(&mut out).unwrap();
        assert_eq!(
            out,
            vec![
                0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, // item, undefined
                0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, // item delimitation
                0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00, // sequence delimitation
            ]
        );
    }
}
