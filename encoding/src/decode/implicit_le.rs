//! Implicit VR Little Endian syntax transfer implementation.

use crate::decode::basic::LittleEndianBasicDecoder;
use crate::decode::*;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use dcm_core::dictionary::{DataDictionary, DictionaryEntry};
use dcm_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcm_core::{Tag, VR};
use dcm_dictionary::StandardDataDictionary;
use snafu::ResultExt;
use std::io::Read;

/// A data element decoder for the Implicit VR Little Endian transfer syntax.
///
/// The value representation of each element is resolved through an
/// attribute dictionary. Unknown attributes decode as `UN`; attributes
/// with a context dependent VR decode as the dictionary's preferred VR,
/// and are reinterpreted by the stateful decoder once the data set
/// context is known.
#[derive(Debug, Clone)]
pub struct ImplicitVRLittleEndianDecoder<D = StandardDataDictionary> {
    dict: D,
    basic: LittleEndianBasicDecoder,
}

impl Default for ImplicitVRLittleEndianDecoder<StandardDataDictionary> {
    fn default() -> Self {
        ImplicitVRLittleEndianDecoder::with_dict(StandardDataDictionary)
    }
}

impl<D> ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    /// Retrieve this decoder using a custom attribute dictionary.
    pub fn with_dict(dictionary: D) -> Self {
        ImplicitVRLittleEndianDecoder {
            dict: dictionary,
            basic: LittleEndianBasicDecoder,
        }
    }
}

impl<D> Decode for ImplicitVRLittleEndianDecoder<D>
where
    D: DataDictionary,
{
    fn decode_header<S>(&self, mut source: &mut S) -> Result<(DataElementHeader, usize)>
    where
        S: ?Sized + Read,
    {
        // retrieve tag
        let tag = self
            .basic
            .decode_tag(&mut source)
            .context(ReadHeaderTagSnafu)?;

        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadLengthSnafu)?;
        let len = LittleEndian::read_u32(&buf);

        // VR resolution is by dictionary lookup;
        // sequence delimitation items have no meaningful VR
        let vr = match tag {
            Tag(0xFFFE, 0xE000) | Tag(0xFFFE, 0xE00D) | Tag(0xFFFE, 0xE0DD) => VR::UN,
            _ if len == 0xFFFF_FFFF => {
                // an undefined length here can only mean a sequence
                // or undefined-length pixel data
                self.dict
                    .entry(tag)
                    .map(DictionaryEntry::preferred_vr)
                    .filter(|vr| vr.can_have_undefined_length())
                    .unwrap_or(VR::SQ)
            }
            _ => self
                .dict
                .entry(tag)
                .map(DictionaryEntry::preferred_vr)
                .unwrap_or(VR::UN),
        };

        Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
    }

    fn decode_item_header<S>(&self, source: &mut S) -> Result<SequenceItemHeader>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf).context(ReadItemHeaderSnafu)?;
        // retrieve tag
        let group = LittleEndian::read_u16(&buf[0..2]);
        let element = LittleEndian::read_u16(&buf[2..4]);
        let len = LittleEndian::read_u32(&buf[4..8]);

        SequenceItemHeader::new((group, element), Length(len)).context(BadSequenceHeaderSnafu)
    }

    fn decode_tag<S>(&self, source: &mut S) -> Result<Tag>
    where
        S: ?Sized + Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadTagSnafu)?;
        Ok(Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        ))
    }
}

impl<S: ?Sized, D> DecodeFrom<S> for ImplicitVRLittleEndianDecoder<D>
where
    S: Read,
    D: DataDictionary,
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
    use super::ImplicitVRLittleEndianDecoder;
    use crate::decode::Decode;
    use dcm_core::header::{HasLength, Header, Length};
    use dcm_core::{Tag, VR};
    use std::io::{Cursor, Read};

    //  Tag: (0010,0010) Patient's Name
    //  Length: 8
    //  Value: "DOE^JOHN"
    // --
    //  Tag: (0009,0010) [private]
    //  Length: 4
    //  Value: "ACME"
    const RAW: &'static [u8] = &[
        0x10, 0x00, 0x10, 0x00, 0x08, 0x00, 0x00, 0x00, b'D', b'O', b'E', b'^', b'J', b'O', b'H',
        b'N', 0x09, 0x00, 0x10, 0x00, 0x04, 0x00, 0x00, 0x00, b'A', b'C', b'M', b'E',
    ];

    #[test]
    fn decode_with_dictionary_resolution() {
        let dec = ImplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(RAW);

        let (elem, bytes_read) = dec.decode_header(&mut cursor).unwrap();
        assert_eq!(elem.tag(), Tag(0x0010, 0x0010));
        assert_eq!(elem.vr(), VR::PN);
        assert_eq!(elem.length(), Length(8));
        assert_eq!(bytes_read, 8);
        let mut value = [0; 8];
        cursor.read_exact(&mut value).unwrap();

        // private attribute resolves to UN
        let (elem, _) = dec.decode_header(&mut cursor).unwrap();
        assert_eq!(elem.tag(), Tag(0x0009, 0x0010));
        assert_eq!(elem.vr(), VR::UN);
        assert_eq!(elem.length(), Length(4));
    }

    #[test]
    fn undefined_length_resolves_to_sequence() {
        // (0008,1140) ReferencedImageSequence with undefined length
        let raw = [0x08, 0x00, 0x40, 0x11, 0xFF, 0xFF, 0xFF, 0xFF];
        let dec = ImplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(&raw[..]);
        let (elem, _) = dec.decode_header(&mut cursor).unwrap();
        assert_eq!(elem.vr(), VR::SQ);
        assert!(elem.length().is_undefined());
    }

    #[test]
    fn unknown_tag_with_undefined_length_is_a_sequence() {
        let raw = [0x09, 0x00, 0x01, 0x10, 0xFF, 0xFF, 0xFF, 0xFF];
        let dec = ImplicitVRLittleEndianDecoder::default();
        let mut cursor = Cursor::new(&raw[..]);
        let (elem, _) = dec.decode_header(&mut cursor).unwrap();
        assert_eq!(elem.vr(), VR::SQ);
    }
}
