//! This module includes a high level abstraction over a DICOM data
//! element's value.

pub mod primitive;

pub use self::primitive::{CastValueError, PrimitiveValue, ValueKind};

use crate::header::{HasLength, Length};
use smallvec::SmallVec;

/// The type of a collection of multiple values,
/// held inline for low multiplicities.
pub type C<T> = SmallVec<[T; 2]>;

/// Representation of a full DICOM value, which can be a primitive value,
/// a nested data set (where `I` is the item type),
/// an encapsulated pixel data fragment sequence,
/// or native pixel data behind a payload abstraction `P`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<I, P = Vec<u8>> {
    /// Primitive value.
    Primitive(PrimitiveValue),
    /// A complex sequence of items.
    Sequence(DataSetSequence<I>),
    /// An encapsulated pixel data sequence.
    PixelSequence(PixelFragmentSequence),
    /// Native pixel data, possibly not residing in memory.
    PixelData(P),
}

impl<I, P> Value<I, P> {
    /// Create a value from a primitive value,
    /// resolving the container types to the surrounding context.
    pub fn new(value: PrimitiveValue) -> Self {
        Value::Primitive(value)
    }

    /// Obtain the primitive value, if the value is primitive.
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Obtain the sequence items, if the value is a data set sequence.
    pub fn items(&self) -> Option<&[I]> {
        match self {
            Value::Sequence(seq) => Some(seq.items()),
            _ => None,
        }
    }

    /// Obtain the encapsulated fragments, if the value is a pixel sequence.
    pub fn fragments(&self) -> Option<&[Vec<u8>]> {
        match self {
            Value::PixelSequence(seq) => Some(seq.fragments()),
            _ => None,
        }
    }
}

impl<I, P> HasLength for Value<I, P>
where
    P: HasLength,
{
    fn length(&self) -> Length {
        match self {
            Value::Primitive(v) => Length::defined(v.len() as u32),
            Value::Sequence(_) | Value::PixelSequence(_) => Length::UNDEFINED,
            Value::PixelData(p) => p.length(),
        }
    }
}

impl<I, P> From<PrimitiveValue> for Value<I, P> {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

impl HasLength for Vec<u8> {
    fn length(&self) -> Length {
        Length::defined(self.len() as u32)
    }
}

/// A sequence of data set items, as the value of an `SQ` element.
///
/// The sequence's own length towards consumers is always undefined;
/// whether it is encoded with delimiters or with precomputed lengths
/// is an encoding concern. Accordingly, two sequences are equal
/// if and only if their items are, regardless of the lengths
/// declared in their sources.
#[derive(Debug, Clone)]
pub struct DataSetSequence<I> {
    /// The item data sets.
    items: C<I>,
    /// The sequence length as declared in its source,
    /// which can be undefined.
    length: Length,
}

impl<I> DataSetSequence<I> {
    /// Create a sequence from the given items,
    /// with an undefined declared length.
    pub fn new(items: impl IntoIterator<Item = I>) -> Self {
        DataSetSequence {
            items: items.into_iter().collect(),
            length: Length::UNDEFINED,
        }
    }

    /// Create an empty sequence.
    pub fn empty() -> Self {
        DataSetSequence {
            items: C::new(),
            length: Length::UNDEFINED,
        }
    }

    /// Create a sequence from items and the length declared in the source.
    pub fn new_with_length(items: impl IntoIterator<Item = I>, length: Length) -> Self {
        DataSetSequence {
            items: items.into_iter().collect(),
            length,
        }
    }

    /// Obtain a view of the sequence items.
    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Obtain a mutable view of the sequence items.
    pub fn items_mut(&mut self) -> &mut C<I> {
        &mut self.items
    }

    /// Take the sequence items.
    pub fn into_items(self) -> C<I> {
        self.items
    }

    /// The number of items in the sequence.
    pub fn multiplicity(&self) -> usize {
        self.items.len()
    }

    /// The declared length of the sequence in its source.
    pub fn declared_length(&self) -> Length {
        self.length
    }
}

impl<I> HasLength for DataSetSequence<I> {
    fn length(&self) -> Length {
        Length::UNDEFINED
    }
}

impl<I: PartialEq> PartialEq for DataSetSequence<I> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

/// The value of an encapsulated pixel data element:
/// a basic offset table followed by a list of compressed fragments.
///
/// Fragment contents are treated as opaque byte strings;
/// decoding them is outside the responsibility of this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFragmentSequence {
    /// The value of the basic offset table,
    /// one 32-bit offset per frame relative to
    /// the first byte of the first fragment. May be empty.
    offset_table: C<u32>,
    /// The compressed fragments, in encounter order.
    fragments: C<Vec<u8>>,
}

impl PixelFragmentSequence {
    /// Create a pixel data fragment sequence from its parts.
    pub fn new(
        offset_table: impl IntoIterator<Item = u32>,
        fragments: impl IntoIterator<Item = Vec<u8>>,
    ) -> Self {
        PixelFragmentSequence {
            offset_table: offset_table.into_iter().collect(),
            fragments: fragments.into_iter().collect(),
        }
    }

    /// Obtain the parsed basic offset table. Empty when the
    /// basic offset table item had zero length.
    pub fn offset_table(&self) -> &[u32] {
        &self.offset_table
    }

    /// Obtain a view of the fragments.
    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    /// Obtain a mutable view of the fragments.
    pub fn fragments_mut(&mut self) -> &mut C<Vec<u8>> {
        &mut self.fragments
    }

    /// The number of fragments.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }
}

impl HasLength for PixelFragmentSequence {
    fn length(&self) -> Length {
        Length::UNDEFINED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_value_length_is_byte_length() {
        let v: Value<(), Vec<u8>> = Value::Primitive(PrimitiveValue::from_text("1.2.3"));
        assert_eq!(v.length(), Length(5));
    }

    #[test]
    fn sequence_length_is_undefined() {
        let v: Value<(), Vec<u8>> = Value::Sequence(DataSetSequence::new(vec![(), ()]));
        assert!(v.length().is_undefined());
    }

    #[test]
    fn fragment_sequence_holds_parts() {
        let seq = PixelFragmentSequence::new(vec![], vec![vec![0xAA, 0xBB, 0xCC, 0xDD]]);
        assert!(seq.offset_table().is_empty());
        assert_eq!(seq.fragment_count(), 1);
        assert_eq!(seq.fragments()[0], vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }
}
