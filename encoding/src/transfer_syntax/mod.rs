//! Module containing the DICOM transfer syntax data structure and the
//! registry of the well-known transfer syntaxes.
//!
//! A [`TransferSyntax`] carries the byte order and VR mode with which
//! data sets are encoded, and a [`Codec`] descriptor which states
//! whether pixel data is encapsulated or the whole data set stream is
//! deflated. Since image codecs are out of the scope of this project,
//! encapsulated transfer syntaxes round-trip their fragments opaquely.

pub mod deflate;

use crate::decode::{
    basic::BasicDecoder, explicit_be::ExplicitVRBigEndianDecoder,
    explicit_le::ExplicitVRLittleEndianDecoder, implicit_le::ImplicitVRLittleEndianDecoder,
    DecodeFrom, InvalidVrStrategy,
};
use crate::encode::{
    explicit_be::ExplicitVRBigEndianEncoder, explicit_le::ExplicitVRLittleEndianEncoder,
    implicit_le::ImplicitVRLittleEndianEncoder, EncodeTo, EncoderFor,
};
use std::borrow::Cow;
use std::io::{Read, Write};

pub use byteordered::Endianness;

/// A decoder with its type erased.
pub type DynDecoder<'s, S> = Box<dyn DecodeFrom<S> + 's>;

/// An encoder with its type erased.
pub type DynEncoder<'w, W> = Box<dyn EncodeTo<W> + 'w>;

/// A descriptor of the encoding and decoding requirements
/// of a transfer syntax, beyond byte order and VR mode.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Codec {
    /// No codec is required: pixel data, if any, is in its native form.
    None,
    /// Pixel data is encapsulated in a fragment sequence.
    /// Fragments are parsed and written back opaquely.
    EncapsulatedPixelData {
        /// whether the compression scheme is lossy
        lossy: bool,
    },
    /// The data set region is wrapped in a raw deflate stream
    /// (RFC 1951, no zlib header).
    Deflated,
}

/// A DICOM transfer syntax specifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSyntax {
    /// The unique identifier of the transfer syntax.
    uid: Cow<'static, str>,
    /// The name of the transfer syntax.
    name: &'static str,
    /// The byte order of data.
    byte_order: Endianness,
    /// Whether the transfer syntax mandates an explicit value
    /// representation, or the VR is implicit.
    explicit_vr: bool,
    /// The transfer syntax' codec requirements.
    codec: Codec,
    /// Whether the transfer syntax is in the well-known set.
    /// Syntaxes built for unrecognized UIDs report `false` here
    /// and assume Explicit VR Little Endian data sets.
    known: bool,
}

impl TransferSyntax {
    /// Create a well-known transfer syntax descriptor.
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        byte_order: Endianness,
        explicit_vr: bool,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid: Cow::Borrowed(uid),
            name,
            byte_order,
            explicit_vr,
            codec,
            known: true,
        }
    }

    /// Create a descriptor for an unrecognized transfer syntax UID.
    /// Data sets are assumed to be in Explicit VR Little Endian.
    pub fn unknown(uid: impl Into<String>) -> Self {
        TransferSyntax {
            uid: Cow::Owned(uid.into()),
            name: "Unknown",
            byte_order: Endianness::Little,
            explicit_vr: true,
            codec: Codec::None,
            known: false,
        }
    }

    /// Obtain this transfer syntax' unique identifier.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Obtain the name of this transfer syntax.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Obtain this transfer syntax' expected endianness.
    pub fn endianness(&self) -> Endianness {
        self.byte_order
    }

    /// Whether the transfer syntax mandates an explicit VR.
    pub fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// Obtain this transfer syntax' codec specification.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether this is one of the well-known transfer syntaxes.
    pub fn is_known(&self) -> bool {
        self.known
    }

    /// Whether pixel data under this transfer syntax is encapsulated.
    pub fn is_encapsulated(&self) -> bool {
        matches!(self.codec, Codec::EncapsulatedPixelData { .. })
    }

    /// Whether the compression scheme of this transfer syntax is lossy.
    pub fn is_lossy(&self) -> bool {
        matches!(self.codec, Codec::EncapsulatedPixelData { lossy: true })
    }

    /// Whether the data set region of this transfer syntax
    /// is wrapped in a deflate stream.
    pub fn is_deflated(&self) -> bool {
        self.codec == Codec::Deflated
    }

    /// Retrieve the appropriate data element decoder for this
    /// transfer syntax and given reader type.
    ///
    /// The resulting decoder does not consider pixel data encapsulation or
    /// data set compression rules. This means that the consumer of this
    /// method needs to adapt the reader before using the decoder.
    pub fn decoder_for<'s, S: 's>(&self) -> Option<DynDecoder<'s, S>>
    where
        S: ?Sized + Read,
    {
        self.decoder_for_with_strategy(InvalidVrStrategy::default())
    }

    /// Retrieve a data element decoder with an explicit strategy
    /// for unrecognized value representation codes.
    pub fn decoder_for_with_strategy<'s, S: 's>(
        &self,
        invalid_vr: InvalidVrStrategy,
    ) -> Option<DynDecoder<'s, S>>
    where
        S: ?Sized + Read,
    {
        match (self.byte_order, self.explicit_vr) {
            (Endianness::Little, false) => Some(Box::<ImplicitVRLittleEndianDecoder<_>>::default()),
            (Endianness::Little, true) => Some(Box::new(
                ExplicitVRLittleEndianDecoder::with_invalid_vr_strategy(invalid_vr),
            )),
            (Endianness::Big, true) => Some(Box::new(
                ExplicitVRBigEndianDecoder::with_invalid_vr_strategy(invalid_vr),
            )),
            _ => None,
        }
    }

    /// Retrieve the appropriate data element encoder for this
    /// transfer syntax and the given writer type.
    /// The resulting encoder does not consider pixel data encapsulation or
    /// data set compression rules.
    pub fn encoder_for<'w, T: 'w>(&self) -> Option<DynEncoder<'w, T>>
    where
        T: ?Sized + Write,
    {
        match (self.byte_order, self.explicit_vr) {
            (Endianness::Little, false) => Some(Box::new(EncoderFor::new(
                ImplicitVRLittleEndianEncoder::default(),
            ))),
            (Endianness::Little, true) => Some(Box::new(EncoderFor::new(
                ExplicitVRLittleEndianEncoder::default(),
            ))),
            (Endianness::Big, true) => Some(Box::new(EncoderFor::new(
                ExplicitVRBigEndianEncoder::default(),
            ))),
            _ => None,
        }
    }

    /// Obtain a dynamic basic decoder, based on this transfer syntax'
    /// expected endianness.
    pub fn basic_decoder(&self) -> BasicDecoder {
        BasicDecoder::from(self.endianness())
    }
}

/// Compiled transfer syntax specifiers.
pub mod entries {
    use super::{Codec, Endianness, TransferSyntax};

    /// Implicit VR Little Endian: the default transfer syntax.
    pub static IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2",
        "Implicit VR Little Endian",
        Endianness::Little,
        false,
        Codec::None,
    );

    /// Explicit VR Little Endian.
    pub static EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.1",
        "Explicit VR Little Endian",
        Endianness::Little,
        true,
        Codec::None,
    );

    /// Explicit VR Big Endian (retired).
    pub static EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.2",
        "Explicit VR Big Endian",
        Endianness::Big,
        true,
        Codec::None,
    );

    /// Deflated Explicit VR Little Endian.
    pub static DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.1.99",
        "Deflated Explicit VR Little Endian",
        Endianness::Little,
        true,
        Codec::Deflated,
    );

    /// RLE Lossless.
    pub static RLE_LOSSLESS: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.5",
        "RLE Lossless",
        Endianness::Little,
        true,
        Codec::EncapsulatedPixelData { lossy: false },
    );

    /// JPEG Baseline (Process 1).
    pub static JPEG_BASELINE: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.4.50",
        "JPEG Baseline (Process 1)",
        Endianness::Little,
        true,
        Codec::EncapsulatedPixelData { lossy: true },
    );

    /// JPEG 2000 Image Compression (Lossless Only).
    pub static JPEG_2000_LOSSLESS: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.4.90",
        "JPEG 2000 Image Compression (Lossless Only)",
        Endianness::Little,
        true,
        Codec::EncapsulatedPixelData { lossy: false },
    );

    /// The full well-known set.
    pub const ALL: &[&TransferSyntax] = &[
        &IMPLICIT_VR_LITTLE_ENDIAN,
        &EXPLICIT_VR_LITTLE_ENDIAN,
        &EXPLICIT_VR_BIG_ENDIAN,
        &DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
        &RLE_LOSSLESS,
        &JPEG_BASELINE,
        &JPEG_2000_LOSSLESS,
    ];
}

/// The registry of well-known transfer syntaxes.
///
/// The set is closed: syntaxes outside it are represented through
/// [`TransferSyntax::unknown`], which assumes Explicit VR Little Endian.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct TransferSyntaxRegistry;

impl TransferSyntaxRegistry {
    /// Obtain a well-known DICOM transfer syntax by its respective UID.
    ///
    /// This method is robust to the possible presence of trailing
    /// null characters or spaces in `uid`.
    pub fn get(&self, uid: &str) -> Option<&'static TransferSyntax> {
        let uid = trim_uid(uid);
        entries::ALL.iter().copied().find(|ts| ts.uid() == uid)
    }

    /// Obtain a transfer syntax descriptor by UID,
    /// building an unknown-syntax descriptor
    /// (assuming Explicit VR Little Endian)
    /// when the UID is not in the well-known set.
    pub fn get_or_unknown(&self, uid: &str) -> Cow<'static, TransferSyntax> {
        let uid = trim_uid(uid);
        match self.get(uid) {
            Some(ts) => Cow::Borrowed(ts),
            None => Cow::Owned(TransferSyntax::unknown(uid)),
        }
    }
}

fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_well_known_uids() {
        let registry = TransferSyntaxRegistry;
        let ts = registry.get("1.2.840.10008.1.2.1").unwrap();
        assert_eq!(ts.name(), "Explicit VR Little Endian");
        assert!(ts.explicit_vr());
        assert_eq!(ts.endianness(), Endianness::Little);
        assert!(ts.is_known());
        assert!(!ts.is_encapsulated());

        // trailing padding is tolerated
        let ts = registry.get("1.2.840.10008.1.2\0").unwrap();
        assert!(!ts.explicit_vr());
    }

    #[test]
    fn unknown_uids_default_to_explicit_le() {
        let registry = TransferSyntaxRegistry;
        assert!(registry.get("1.2.840.113619.5.2").is_none());
        let ts = registry.get_or_unknown("1.2.840.113619.5.2");
        assert!(!ts.is_known());
        assert!(ts.explicit_vr());
        assert_eq!(ts.endianness(), Endianness::Little);
        assert_eq!(ts.uid(), "1.2.840.113619.5.2");
    }

    #[test]
    fn codec_classification() {
        assert!(entries::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN.is_deflated());
        assert!(entries::RLE_LOSSLESS.is_encapsulated());
        assert!(!entries::RLE_LOSSLESS.is_lossy());
        assert!(entries::JPEG_BASELINE.is_lossy());
        assert!(!entries::EXPLICIT_VR_LITTLE_ENDIAN.is_encapsulated());
    }
}
