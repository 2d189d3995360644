//! Unique identifier (UID) data type and generation routines.
//!
//! DICOM unique identifiers are ASCII strings of up to 64 bytes,
//! composed of `.`-separated decimal components without superfluous
//! leading zeros. [`Uid`] stores the identifier inline,
//! so that well-known identifiers and freshly generated ones alike
//! never hit the allocator.

use sha2::{Digest, Sha256};
use snafu::Snafu;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// The maximum number of bytes in a DICOM unique identifier.
pub const MAX_UID_LEN: usize = 64;

/// The UID root for UUID-derived unique identifiers,
/// as specified in PS3.5 B.2.
const UUID_ROOT: &str = "2.25";

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum InvalidUid {
    /// The candidate exceeds the 64-byte limit.
    #[snafu(display("UID of {} bytes exceeds the 64 byte limit", len))]
    TooLong { len: usize },

    /// The candidate does not match `digits ('.' digits)*`
    /// or has a leading zero in a multi-digit component.
    #[snafu(display("malformed UID component at byte {}", position))]
    Malformed { position: usize },
}

/// A DICOM unique identifier with bounded inline storage.
///
/// Equality is byte-wise. Values are validated on construction;
/// use [`Uid::trim`] first when the source may carry trailing
/// null or space padding.
#[derive(Clone, Copy)]
pub struct Uid {
    bytes: [u8; MAX_UID_LEN],
    len: u8,
}

impl Uid {
    /// Construct a UID from a string, validating its format.
    pub fn new(uid: &str) -> Result<Self, InvalidUid> {
        validate_uid(uid)?;
        let mut bytes = [0u8; MAX_UID_LEN];
        bytes[..uid.len()].copy_from_slice(uid.as_bytes());
        Ok(Uid {
            bytes,
            len: uid.len() as u8,
        })
    }

    /// Obtain the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        // safe: only ASCII is admitted on construction
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    /// Remove trailing null and space padding from a UID value
    /// as found in a data stream.
    pub fn trim(candidate: &str) -> &str {
        candidate.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
    }

    /// Generate a new unique identifier from a random UUID,
    /// in the form `2.25.{uuid}` with the UUID rendered
    /// as a decimal integer.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().as_u128();
        let uid = format!("{}.{}", UUID_ROOT, uuid);
        // 4 + 1 + at most 39 decimal digits, always within bounds
        Uid::new(&uid).unwrap_or_else(|_| unreachable!("UUID-derived UID is always valid"))
    }

    /// Generate a new unique identifier under the given organization root,
    /// suffixed with the current timestamp and a random component.
    ///
    /// Fails if the resulting identifier would not fit in 64 bytes.
    pub fn generate_from_root(root: &str) -> Result<Self, InvalidUid> {
        let now = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let entropy: u32 = rand::random();
        let uid = format!("{}.{}.{}", root, now, entropy);
        Uid::new(&uid)
    }

    /// Derive a unique identifier deterministically from a name,
    /// by taking the SHA-256 digest of its UTF-8 bytes and
    /// rendering the first 16 digest bytes as a decimal integer
    /// under the `2.25` root.
    pub fn from_name(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut hi = [0u8; 16];
        hi.copy_from_slice(&digest[..16]);
        let value = u128::from_be_bytes(hi);
        let uid = format!("{}.{}", UUID_ROOT, value);
        Uid::new(&uid).unwrap_or_else(|_| unreachable!("digest-derived UID is always valid"))
    }
}

/// Check that the candidate is a well-formed unique identifier:
/// ASCII, at most 64 bytes, matching `digits ('.' digits)*`,
/// without leading zeros on multi-digit components.
pub fn validate_uid(candidate: &str) -> Result<(), InvalidUid> {
    if candidate.len() > MAX_UID_LEN {
        return TooLongSnafu {
            len: candidate.len(),
        }
        .fail();
    }
    if candidate.is_empty() {
        return MalformedSnafu { position: 0_usize }.fail();
    }

    let mut position = 0;
    for component in candidate.split('.') {
        if component.is_empty()
            || !component.bytes().all(|b| b.is_ascii_digit())
            || (component.len() > 1 && component.starts_with('0'))
        {
            return MalformedSnafu { position }.fail();
        }
        position += component.len() + 1;
    }
    Ok(())
}

impl Deref for Uid {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for Uid {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Uid {}

impl PartialEq<str> for Uid {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Uid {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl FromStr for Uid {
    type Err = InvalidUid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uid::new(s)
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Uid").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_uids() {
        for uid in &[
            "1.2.840.10008.1.1",
            "1.2.840.10008.1.2.1",
            "2.25.329800735698586629295641978511506172918",
            "0.0",
            "1",
        ] {
            assert!(validate_uid(uid).is_ok(), "{} should be valid", uid);
        }
    }

    #[test]
    fn rejects_malformed_uids() {
        for uid in &[
            "",
            "1.",
            ".1",
            "1..2",
            "1.02.3",
            "1.2a.3",
            "1.2.840.10008.1.1 ",
        ] {
            assert!(validate_uid(uid).is_err(), "{} should be invalid", uid);
        }
        let too_long = "1.".repeat(40) + "1";
        assert!(validate_uid(&too_long).is_err());
    }

    #[test]
    fn generated_uids_are_valid_and_bounded() {
        for _ in 0..32 {
            let uid = Uid::generate();
            assert!(uid.len() <= MAX_UID_LEN);
            assert!(validate_uid(&uid).is_ok());
            assert!(uid.starts_with("2.25."));
        }
    }

    #[test]
    fn name_derived_uids_are_deterministic() {
        let a = Uid::from_name("study-001");
        let b = Uid::from_name("study-001");
        let c = Uid::from_name("study-002");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(validate_uid(&a).is_ok());
    }

    #[test]
    fn root_derived_uids_carry_the_root() {
        let uid = Uid::generate_from_root("1.2.826.0.1.3680043.10").unwrap();
        assert!(uid.starts_with("1.2.826.0.1.3680043.10."));
        assert!(validate_uid(&uid).is_ok());
    }

    #[test]
    fn trims_stream_padding() {
        assert_eq!(Uid::trim("1.2.840.10008.1.2.1\0"), "1.2.840.10008.1.2.1");
        assert_eq!(Uid::trim("1.2.840.10008.1.1 "), "1.2.840.10008.1.1");
    }
}
