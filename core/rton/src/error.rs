use thiserror::Error;

/// Broad failure classes, used by callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Crypto,
    Io,
    Reference,
    Json,
}

#[derive(Error, Debug)]
pub enum Error {
    // === External Errors (Automatic conversion) ===
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 Error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Integer Parse Error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("Regex Error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool Error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // === Format Errors ===
    #[error("Invalid RTON Header")]
    InvalidHeader,

    #[error("Unsupported RTON version: {0}")]
    UnsupportedVersion(u32),

    #[error("Missing DONE footer")]
    MissingFooter,

    #[error("Reference index {index} out of bounds (table holds {len} strings)")]
    RefIndexOutOfBounds { index: u64, len: usize },

    #[error("Unknown Identifier Byte: {0:#04x}")]
    UnknownTag(u8),

    #[error("Reserved Identifier Byte: {0:#04x}")]
    ReservedTag(u8),

    #[error("Unknown RTID sub-identifier: {0:#04x}")]
    UnknownRtidSubId(u8),

    #[error("Unexpected container marker {0:#04x} in value position")]
    UnexpectedMarker(u8),

    #[error("Object key must be a string, found tag {0:#04x}")]
    InvalidKey(u8),

    #[error("String length mismatch: expected {expected}, got {actual}")]
    StringLengthMismatch { expected: u64, actual: u64 },

    #[error("Containers nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("RTON root must be an object")]
    RootNotObject,

    // === Crypto Errors ===
    #[error("Invalid key size: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeySize(usize),

    #[error("Invalid IV size: {0} bytes (expected 16, 24 or 32)")]
    InvalidIvSize(usize),

    #[error("Missing encryption header 0x10 0x00")]
    MissingCipherHeader,

    #[error("Ciphertext of {len} bytes is not aligned to {block_size}-byte blocks")]
    MisalignedCiphertext { len: usize, block_size: usize },

    #[error("Cipher failure: {0}")]
    Cipher(String),

    #[error("Decryption required but no key provided")]
    MissingKey,

    // === Reference Errors ===
    #[error("Not an RTID string: {0}")]
    NotRtid(String),

    #[error("Invalid RTID format: {0}")]
    InvalidRtid(String),

    // === Batch input ===
    #[error("Invalid path pair #{index}: expected 2 paths, got {len}")]
    InvalidPathPair { index: usize, len: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => ErrorKind::Format,
            Error::Io(_) | Error::ThreadPool(_) => ErrorKind::Io,
            Error::Utf8(_)
            | Error::InvalidHeader
            | Error::UnsupportedVersion(_)
            | Error::MissingFooter
            | Error::RefIndexOutOfBounds { .. }
            | Error::UnknownTag(_)
            | Error::ReservedTag(_)
            | Error::UnknownRtidSubId(_)
            | Error::UnexpectedMarker(_)
            | Error::InvalidKey(_)
            | Error::StringLengthMismatch { .. }
            | Error::NestingTooDeep(_)
            | Error::RootNotObject => ErrorKind::Format,
            Error::InvalidKeySize(_)
            | Error::InvalidIvSize(_)
            | Error::MissingCipherHeader
            | Error::MisalignedCiphertext { .. }
            | Error::Cipher(_)
            | Error::MissingKey => ErrorKind::Crypto,
            Error::ParseInt(_) | Error::Regex(_) | Error::NotRtid(_) | Error::InvalidRtid(_) => {
                ErrorKind::Reference
            }
            Error::Json(_) | Error::InvalidPathPair { .. } => ErrorKind::Json,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
