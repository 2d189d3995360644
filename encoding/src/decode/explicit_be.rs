//! Explicit VR Big Endian syntax transfer implementation.
//! This transfer syntax is retired, but readers still support it.

use crate::decode::basic::BigEndianBasicDecoder;
use crate::decode::*;
use byteordered::byteorder::{BigEndian, ByteOrder};
use dcm_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcm_core::{Tag, VR};
use snafu::ResultExt;
use std::io::Read;

/// A data element decoder for the Explicit VR Big Endian transfer syntax.
#[derive(Debug, Default, Clone)]
pub struct ExplicitVRBigEndianDecoder {
    basic: BigEndianBasicDecoder,
    invalid_vr: InvalidVrStrategy,
}

impl ExplicitVRBigEndianDecoder {
    /// Create a decoder which handles unrecognized value representation
    /// codes according to the given strategy.
    pub fn with_invalid_vr_strategy(invalid_vr: InvalidVrStrategy) -> Self {
        ExplicitVRBigEndianDecoder {
            basic: BigEndianBasicDecoder,
            invalid_vr,
        }
    }
}

impl Decode for ExplicitVRBigEndianDecoder {
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag
        let Tag(group, element) = self
            .basic
            .decode_tag(&mut source)
            .context(ReadHeaderTagSnafu)?;

        let mut buf = [0u8; 4];
        if group == 0xFFFE {
            // item delimiters do not have VR or reserved field
            source.read_exact(&mut buf).context(ReadItemLengthSnafu)?;
            let len = BigEndian::read_u32(&buf);
            return Ok((
                DataElementHeader::new((group, element), VR::UN, Length(len)),
                8, // tag + len
            ));
        }

        // retrieve explicit VR
        source.read_exact(&mut buf[0..2]).context(ReadVrSnafu)?;
        let vr = match VR::from_binary([buf[0], buf[1]]) {
            Some(vr) => vr,
            None => match self.invalid_vr {
                InvalidVrStrategy::Throw => {
                    return UnknownVrSnafu {
                        b1: buf[0],
                        b2: buf[1],
                    }
                    .fail();
                }
                InvalidVrStrategy::MapToUn => VR::UN,
                InvalidVrStrategy::Preserve => VR::Other([buf[0], buf[1]]),
            },
        };
        let bytes_read;

        // retrieve data length
        let len = if vr.has_short_length() {
            // read 2 bytes for the data length
            source.read_exact(&mut buf[0..2]).context(ReadLengthSnafu)?;
            bytes_read = 8;
            u32::from(BigEndian::read_u16(&buf[0..2]))
        } else {
            // read 2 reserved bytes, then 4 bytes for data length
            source
                .read_exact(&mut buf[0..2])
                .context(ReadReservedSnafu)?;
            source.read_exact(&mut buf).context(ReadLengthSnafu)?;
            bytes_read = 12;
            BigEndian::read_u32(&buf)
        };

        Ok((
            DataElementHeader::new((group, element), vr, Length(len)),
            bytes_read,
        ))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        // retrieve tag
        let group = BigEndian::read_u16(&buf[0..2]);
        let element = BigEndian::read_u16(&buf[2..4]);
        let len = BigEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadTagSnafu)?;
        Ok(Tag(
            BigEndian::read_u16(&buf[0..2]),
            BigEndian::read_u16(&buf[2..4]),
        ))
    }
}

impl<S: ?Sized> DecodeFrom<S> for ExplicitVRBigEndianDecoder
where
    S: Read,
{
    #[inline]
    fn decode_header(&self, source: &mut S) -> Result<(DataElementHeader, usize)> {
        Decode::decode_header(self, source)
    }

    #[inline]
    fn decode_item_header(&self, source: &mut S) -> Result<SequenceItemHeader> {
        Decode::decode_item_header(self, source)
    }

    #[inline]
    fn decode_tag(&self, source: &mut S) -> Result<Tag> {
        Decode::decode_tag(self, source)
    }
}

#[cfg(test)]
mod tests {
    use super::ExplicitVRBigEndianDecoder;
    use crate::decode::Decode;
    use dcm_core::header::{HasLength, Header, Length};
    use dcm_core::{Tag, VR};
    use std::io::{Cursor, Read};

    //  Tag: (0010,0010) Patient's Name
    //  VR: PN
    //  Length: 8
    //  Value: "DOE^JOHN"
    const RAW: &'static [u8] = &[
        0x00, 0x10, 0x00, 0x10, b'P', b'N', 0x00, 0x08, b'D', b'O', b'E', b'^', b'J', b'O', b'H',
        b'N',
    ];

    #[test]
    fn decode_data_elements() {
        let dec = ExplicitVRBigEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);
        let (elem, bytes_read) = dec
            .decode_header(&mut cursor)
            .expect("should find an element");
        assert_eq!(elem.tag(), Tag(0x0010, 0x0010));
        assert_eq!(elem.vr(), VR::PN);
        assert_eq!(elem.length(), Length(8));
        assert_eq!(bytes_read, 8);
        let mut buffer = [0; 8];
        cursor.read_exact(&mut buffer).expect("should read it fine");
        assert_eq!(&buffer, b"DOE^JOHN".as_ref());
    }
}
