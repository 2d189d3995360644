//! This crate contains the DICOM encoding and decoding primitives:
//! basic endian-aware codecs, data element decoders and encoders for the
//! supported transfer syntax families, text codecs for the supported
//! specific character sets, and the transfer syntax registry.

pub mod decode;
pub mod encode;
pub mod text;
pub mod transfer_syntax;

pub use crate::decode::{Decode, DecodeFrom, InvalidVrStrategy};
pub use crate::encode::{Encode, EncodeTo, EncoderFor};
pub use crate::text::{SpecificCharacterSet, TextCodec};
pub use crate::transfer_syntax::{Codec, Endianness, TransferSyntax, TransferSyntaxRegistry};
