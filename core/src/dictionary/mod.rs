//! Core attribute dictionary abstractions.
//!
//! This crate does not ship a full attribute dictionary.
//! Implementations of [`DataDictionary`] (such as the one in the
//! `dcm-dictionary` crate) act as collaborators, answering for
//! standard attributes so that implicit VR data sets can be interpreted
//! and validated.

use crate::header::{Tag, VR};

pub mod stub;

pub use self::stub::StubDataDictionary;

/// A data type for a dictionary entry with full ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEntry {
    /// The attribute tag.
    pub tag: Tag,
    /// The attribute keyword, e.g. `PatientName`.
    pub keyword: &'static str,
    /// The full attribute name, e.g. `Patient's Name`.
    pub name: &'static str,
    /// The admissible value representations, in order of preference.
    /// More than one entry means the effective VR depends on context.
    pub vrs: &'static [VR],
    /// The value multiplicity constraint, e.g. `"1"` or `"1-n"`.
    pub vm: &'static str,
    /// Whether the attribute is retired from the standard.
    pub retired: bool,
}

impl DictionaryEntry {
    /// The preferred value representation of the attribute,
    /// or `UN` when the entry does not state one.
    pub fn preferred_vr(&self) -> VR {
        self.vrs.first().copied().unwrap_or(VR::UN)
    }

    /// Whether the effective VR of the attribute depends on
    /// data set context (more than one admissible VR).
    pub fn is_ambiguous(&self) -> bool {
        self.vrs.len() > 1
    }
}

/// An attribute dictionary: the query interface used to resolve
/// implicit value representations and to obtain validation hints.
pub trait DataDictionary {
    /// Fetch the dictionary entry for the given tag, if known.
    fn entry(&self, tag: Tag) -> Option<&DictionaryEntry>;

    /// Resolve the preferred VR of the given tag,
    /// or `None` if the tag is unknown to this dictionary.
    fn vr_of(&self, tag: Tag) -> Option<VR> {
        self.entry(tag).map(DictionaryEntry::preferred_vr)
    }
}

impl<T: ?Sized> DataDictionary for &T
where
    T: DataDictionary,
{
    fn entry(&self, tag: Tag) -> Option<&DictionaryEntry> {
        (**self).entry(tag)
    }
}

/// Metadata about a private data element,
/// as answered by a vendor dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivateTagInfo {
    /// The element offset within the reserved block (the `yy`
    /// in `(gggg,xxyy)`).
    pub element_offset: u8,
    /// The attribute name given by the vendor.
    pub name: String,
    /// The admissible value representations.
    pub vrs: Vec<VR>,
    /// The value multiplicity constraint.
    pub vm: String,
}

/// A vendor (private attribute) dictionary:
/// queried by private creator identifier and element offset.
pub trait PrivateDictionary {
    /// Fetch the private tag information registered by `creator`
    /// for the given element offset, if known.
    fn info(&self, creator: &str, element_offset: u8) -> Option<PrivateTagInfo>;
}
