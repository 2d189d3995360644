//! This crate contains the essential data structures for handling
//! DICOM data: attribute tags, value representations and their static
//! properties, unique identifiers, element headers and values,
//! dictionary traits and validation plumbing.
//!
//! Byte-level encoding and decoding of these structures
//! lives in the `dcm-encoding` crate.

pub mod dictionary;
pub mod error;
pub mod header;
pub mod uid;
pub mod validation;
pub mod value;

pub use crate::error::Error;
pub use crate::header::{
    DataElement, DataElementHeader, HasLength, Header, Length, SequenceItemHeader, Tag, VR,
};
pub use crate::uid::Uid;
pub use crate::value::{DataSetSequence, PixelFragmentSequence, PrimitiveValue, Value};
