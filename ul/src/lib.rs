//! This crate contains the types and methods needed to interact
//! with DICOM nodes through the upper layer protocol over TCP:
//! protocol data unit encoding and decoding, association negotiation
//! on both the requesting and accepting side, presentation data value
//! fragmentation and reassembly, DIMSE command sets, and the
//! verification service (C-ECHO).
//!
//! # Examples
//!
//! Issue a verification request against another node:
//!
//! ```no_run
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use dcm_ul::association::ClientAssociationOptions;
//! use dcm_ul::echo;
//!
//! let mut association = ClientAssociationOptions::new()
//!     .calling_ae_title("THIS-SCU")
//!     .called_ae_title("MAIN-STORAGE")
//!     .with_abstract_syntax("1.2.840.10008.1.1")
//!     .establish("192.168.1.99:104")?;
//! let status = echo::echo(&mut association)?;
//! assert_eq!(status, 0x0000);
//! association.release()?;
//! # Ok(())
//! # }
//! ```

pub mod association;
pub mod commands;
pub mod echo;
pub mod pdu;

pub use crate::association::{ClientAssociation, ClientAssociationOptions};
pub use crate::association::{ServerAssociation, ServerAssociationOptions};
pub use crate::pdu::Pdu;

// the implementation identifiers are shared with the file layer
pub use dcm_object::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
