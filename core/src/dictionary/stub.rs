//! A trivial data dictionary that knows no attributes.

use super::{DataDictionary, DictionaryEntry};
use crate::header::Tag;

/// An attribute dictionary which answers `None` to every query.
///
/// With this dictionary, all implicit VR elements resolve to `UN`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct StubDataDictionary;

impl DataDictionary for StubDataDictionary {
    fn entry(&self, _tag: Tag) -> Option<&DictionaryEntry> {
        None
    }
}
