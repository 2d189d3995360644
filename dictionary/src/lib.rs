//! This crate implements a standard DICOM attribute dictionary
//! and constant declarations for well-known tags and unique identifiers.
//!
//! The dictionary is provided as a singleton behind a unit type
//! ([`StandardDataDictionary`]) for efficiency and ease of use.
//! It is curated rather than exhaustive: it answers for the command set,
//! the file meta group, and the standard attributes which this project's
//! readers, writers, and services consult. Attributes outside the table
//! resolve to `UN` under implicit VR, which the readers tolerate.

pub mod entries;
pub mod tags;
pub mod uids;

use dcm_core::dictionary::{DataDictionary, DictionaryEntry};
use dcm_core::Tag;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static REGISTRY: Lazy<HashMap<Tag, &'static DictionaryEntry>> = Lazy::new(|| {
    entries::ENTRIES
        .iter()
        .map(|entry| (entry.tag, entry))
        .collect()
});

/// The standard attribute dictionary, backed by the curated
/// entry table in [`entries`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct StandardDataDictionary;

impl DataDictionary for StandardDataDictionary {
    fn entry(&self, tag: Tag) -> Option<&DictionaryEntry> {
        REGISTRY.get(&tag).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcm_core::VR;

    #[test]
    fn resolves_common_attributes() {
        let dict = StandardDataDictionary;
        assert_eq!(dict.vr_of(tags::PATIENT_NAME), Some(VR::PN));
        assert_eq!(dict.vr_of(tags::SPECIFIC_CHARACTER_SET), Some(VR::CS));
        assert_eq!(dict.vr_of(tags::BITS_ALLOCATED), Some(VR::US));
        assert_eq!(dict.vr_of(Tag(0x0009, 0x0010)), None);
    }

    #[test]
    fn ambiguous_attributes_carry_multiple_vrs() {
        let dict = StandardDataDictionary;
        let entry = dict.entry(tags::PIXEL_DATA).unwrap();
        assert!(entry.is_ambiguous());
        assert_eq!(entry.vrs, &[VR::OB, VR::OW]);
        let entry = dict.entry(tags::SMALLEST_IMAGE_PIXEL_VALUE).unwrap();
        assert_eq!(entry.vrs, &[VR::US, VR::SS]);
    }
}
