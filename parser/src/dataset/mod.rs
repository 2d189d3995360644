//! Interpretation of DICOM data sets as streams of tokens.
//!
//! The rest of the crate is used to obtain DICOM element headers and
//! values. At this level, headers and values are treated as tokens which
//! can be used to form a syntax tree of a full data set.

pub mod read;
pub mod write;

use dcm_core::header::{DataElementHeader, Length, Tag};
use dcm_core::value::PrimitiveValue;
use std::fmt;

pub use self::read::DataSetReader;
pub use self::write::DataSetWriter;

/// A token of a DICOM data set stream.
#[derive(Clone)]
pub enum DataToken {
    /// A data element header, for an element with a primitive value.
    /// Always followed by a [`PrimitiveValue`](DataToken::PrimitiveValue)
    /// token.
    ElementHeader(DataElementHeader),
    /// The beginning of a sequence element.
    SequenceStart {
        /// the sequence tag
        tag: Tag,
        /// the declared length of the sequence value
        len: Length,
    },
    /// The end of a sequence element.
    SequenceEnd,
    /// The beginning of a new item in the sequence.
    ItemStart {
        /// the declared length of the item value
        len: Length,
    },
    /// The end of an item.
    ItemEnd,
    /// An element value.
    PrimitiveValue(PrimitiveValue),
    /// The beginning of an encapsulated pixel data element.
    PixelSequenceStart,
    /// The parsed basic offset table of an encapsulated
    /// pixel data element. May be empty.
    OffsetTable(Vec<u32>),
    /// A single pixel data fragment, in its opaque compressed form.
    ItemValue(Vec<u8>),
}

impl fmt::Debug for DataToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataToken::ElementHeader(header) => write!(f, "ElementHeader({:?})", header),
            DataToken::SequenceStart { tag, len } => {
                write!(f, "SequenceStart({}, {})", tag, len)
            }
            DataToken::SequenceEnd => f.write_str("SequenceEnd"),
            DataToken::ItemStart { len } => write!(f, "ItemStart({})", len),
            DataToken::ItemEnd => f.write_str("ItemEnd"),
            DataToken::PrimitiveValue(v) => write!(f, "PrimitiveValue({:?})", v.kind()),
            DataToken::PixelSequenceStart => f.write_str("PixelSequenceStart"),
            DataToken::OffsetTable(offsets) => write!(f, "OffsetTable({} entries)", offsets.len()),
            DataToken::ItemValue(data) => write!(f, "ItemValue({} bytes)", data.len()),
        }
    }
}

impl PartialEq for DataToken {
    fn eq(&self, other: &Self) -> bool {
        use DataToken::*;
        match (self, other) {
            (ElementHeader(h1), ElementHeader(h2)) => {
                h1.tag == h2.tag && h1.vr == h2.vr && h1.len.inner_eq(h2.len)
            }
            (
                SequenceStart {
                    tag: tag1,
                    len: len1,
                },
                SequenceStart {
                    tag: tag2,
                    len: len2,
                },
            ) => tag1 == tag2 && len1.inner_eq(*len2),
            (ItemStart { len: len1 }, ItemStart { len: len2 }) => len1.inner_eq(*len2),
            (PrimitiveValue(v1), PrimitiveValue(v2)) => v1 == v2,
            (ItemValue(v1), ItemValue(v2)) => v1 == v2,
            (OffsetTable(v1), OffsetTable(v2)) => v1 == v2,
            (ItemEnd, ItemEnd)
            | (SequenceEnd, SequenceEnd)
            | (PixelSequenceStart, PixelSequenceStart) => true,
            _ => false,
        }
    }
}

/// The type of delimiter expected at the top of the reader's stack.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SeqTokenType {
    /// Delimiting a sequence.
    Sequence,
    /// Delimiting an item.
    Item,
}
