//! Error type returned by the credential lifecycle operations.

use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the protocol operations.
///
/// A presentation that is well-formed but fails a cryptographic check is not an error: verifiers
/// return `Ok(false)` in that case. Errors are reserved for malformed or inconsistent inputs.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("registry index {index} is out of range for a registry of size {max}")]
    IndexOutOfRange { index: u32, max: u32 },

    #[error("revocation registry has no free index remaining")]
    RegistryFull,

    #[error("attribute mismatch: {0}")]
    AttributeMismatch(String),

    #[error("signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    #[error("missing referent: {0}")]
    MissingReferent(String),

    #[error("unsupported signature type: {0}")]
    UnsupportedSignatureType(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of an [Error], stable across the variants' payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidSchema,
    IndexOutOfRange,
    RegistryFull,
    AttributeMismatch,
    SignatureVerificationFailed,
    MissingReferent,
    UnsupportedSignatureType,
    IOError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::Json(_) => ErrorKind::InvalidArgument,
            Error::InvalidSchema(_) => ErrorKind::InvalidSchema,
            Error::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Error::RegistryFull => ErrorKind::RegistryFull,
            Error::AttributeMismatch(_) => ErrorKind::AttributeMismatch,
            Error::SignatureVerificationFailed(_) => ErrorKind::SignatureVerificationFailed,
            Error::MissingReferent(_) => ErrorKind::MissingReferent,
            Error::UnsupportedSignatureType(_) => ErrorKind::UnsupportedSignatureType,
            Error::Io(_) => ErrorKind::IOError,
        }
    }

    pub(crate) fn invalid(msg: impl fmt::Display) -> Self {
        Error::InvalidArgument(msg.to_string())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidSchema => "InvalidSchema",
            ErrorKind::IndexOutOfRange => "IndexOutOfRange",
            ErrorKind::RegistryFull => "RegistryFull",
            ErrorKind::AttributeMismatch => "AttributeMismatch",
            ErrorKind::SignatureVerificationFailed => "SignatureVerificationFailed",
            ErrorKind::MissingReferent => "MissingReferent",
            ErrorKind::UnsupportedSignatureType => "UnsupportedSignatureType",
            ErrorKind::IOError => "IOError",
        };
        f.write_str(name)
    }
}
