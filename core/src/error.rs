//! Crate-level error types.

use snafu::Snafu;

/// An error which may occur when constructing core data types
/// from raw properties.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A data element was found where a sequence item,
    /// item delimiter or sequence delimiter was expected.
    #[snafu(display("unexpected element in place of a sequence item header"))]
    UnexpectedElement,

    /// The declared length of the value is not admissible
    /// for the data element in context.
    #[snafu(display("inadmissible data value length"))]
    UnexpectedDataValueLength,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
