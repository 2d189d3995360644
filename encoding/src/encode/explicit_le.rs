//! Explicit VR Little Endian encoding.

use crate::encode::basic::LittleEndianBasicEncoder;
use crate::encode::*;
use dcm_core::header::{DataElementHeader, HasLength, Tag, VR};
use dcm_core::value::PrimitiveValue;
use snafu::ResultExt;
use std::io::Write;

/// A data element encoder for the Explicit VR Little Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRLittleEndianEncoder {
    basic: LittleEndianBasicEncoder,
}

impl Encode for ExplicitVRLittleEndianEncoder {
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

impl Encode for &ExplicitVRLittleEndianEncoder {
    fn encode_tag<W>(&self, to: &mut W, tag: Tag) -> Result<()>
    where
        W: Write + ?Sized,
    {
        (**self).encode_tag(to, tag)
    }

    fn encode_element_header<W>(&self, to: &mut W, de: DataElementHeader) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        (**self).encode_element_header(to, de)
    }

    fn encode_item_header<W>(&self, to: &mut W, len: u32) -> Result<()>
    where
        W: Write + ?Sized,
    {
        (**self).encode_item_header(to, len)
    }

    fn encode_primitive<W>(&self, to: &mut W, vr: VR, value: &PrimitiveValue) -> Result<usize>
    where
        W: Write + ?Sized,
    {
        (**self).encode_primitive(to, vr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_core::Length;

    #[test]
    fn encode_element_header_short_form() {
        // (0010,0010) PN, length 8
        let enc = ExplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0010, 0x0010), VR::PN, Length(8));
        let bytes = enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(bytes, 8);
        assert_eq!(
            out,
            vec![0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00]
        );
    }

    #[test]
    fn encode_element_header_long_form() {
        // (7FE0,0010) OB, undefined length
        let enc = ExplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x7FE0, 0x0010), VR::OB, Length::UNDEFINED);
        let bytes = enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(bytes, 12);
        assert_eq!(
            out,
            vec![0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn short_form_rejects_oversized_values() {
        let enc = ExplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0010, 0x0010), VR::PN, Length(0x0001_0000));
        assert!(enc.encode_element_header(&mut out, de).is_err());
    }

    #[test]
    fn encode_element_round_trip_bytes() {
        // end-to-end byte image of (0010,0010) PN "DOE^JOHN"
        let enc = ExplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        let value = PrimitiveValue::from_text("DOE^JOHN");
        let de = DataElementHeader::new(Tag(0x0010, 0x0010), VR::PN, Length(8));
        enc.encode_element_header(&mut out, de).unwrap();
        enc.encode_primitive(&mut out, VR::PN, &value).unwrap();
        assert_eq!(
            out,
            vec![
                0x10, 0x00, 0x10, 0x00, 0x50, 0x4E, 0x08, 0x00, 0x44, 0x4F, 0x45, 0x5E, 0x4A,
                0x4F, 0x48, 0x4E,
            ]
        );
    }

    #[test]
    fn preserved_vr_is_written_back_verbatim() {
        let enc = ExplicitVRLittleEndianEncoder::default();
        let mut out = Vec::new();
        let de = DataElementHeader::new(Tag(0x0009, 0x0010), VR::Other([b'Z', b'Z']), Length(2));
        enc.encode_element_header(&mut out, de).unwrap();
        assert_eq!(
            out,
            vec![0x09, 0x00, 0x10, 0x00, b'Z', b'Z', 0x02, 0x00]
        );
    }
}
