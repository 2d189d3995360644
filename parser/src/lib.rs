//! This crate works on top of the encoding primitives
//! to provide a middle-level abstraction for parsing and printing
//! DICOM data sets: stateful decoding and encoding with byte-offset
//! tracking, and the interpretation of data sets as token streams.

pub mod dataset;
pub mod stateful;

pub use crate::dataset::read::DataSetReader;
pub use crate::dataset::write::DataSetWriter;
pub use crate::dataset::DataToken;
pub use crate::stateful::decode::{StatefulDecode, StatefulDecoder};
pub use crate::stateful::encode::StatefulEncoder;
