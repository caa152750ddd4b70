//! The error taxonomy used across the core (spec §7).
//!
//! Library call sites return `Result<T, BarError>`; glue code that chains
//! several fallible steps before crossing a module boundary uses
//! `anyhow::Context` and converts to `BarError` at the edge.

use thiserror::Error;

/// Errors that can occur while parsing or writing chunks (§4.1).
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("unknown chunk id {0:?}")]
    UnknownChunk([u8; 4]),
    #[error("truncated chunk (expected {expected} bytes, got {got})")]
    TruncatedChunk { expected: u64, got: u64 },
    #[error("fixed field mismatch: {0}")]
    FixedFieldMismatch(String),
    #[error("payload CRC mismatch")]
    CrcMismatch,
    #[error("resync scan exceeded {0} bytes without finding a known chunk id")]
    ResyncFailed(usize),
}

/// Errors from the storage adapter layer (§4.6).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage '{0}' already exists")]
    ModeConflict(String),
    #[error("volume swap required: {0:?}")]
    VolumeRequest(crate::storage::VolumeRequest),
    #[error("insufficient space on storage")]
    OutOfSpace,
    #[error("storage backend does not support operation: {0}")]
    NotSupported(String),
}

/// Errors from the index database (§4.10).
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index schema error: {0}")]
    Schema(String),
    #[error("index is busy")]
    Busy,
    #[error("storage {0} is not in a state that allows this operation")]
    BadState(String),
}

/// The top-level error taxonomy (§7).
#[derive(Debug, Error)]
pub enum BarError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("password required")]
    PasswordRequired,
    #[error("wrong password")]
    WrongPassword,
    #[error("crypt error: {0}")]
    Crypt(String),
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("key format error: {0}")]
    KeyFormat(String),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),
    #[error("entry error: {0}")]
    Entry(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("aborted")]
    Aborted,
    #[error("interrupted")]
    Interrupted,
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<openssl::error::ErrorStack> for BarError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        BarError::Crypt(err.to_string())
    }
}

impl From<serde_json::Error> for BarError {
    fn from(err: serde_json::Error) -> Self {
        BarError::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for BarError {
    fn from(err: rusqlite::Error) -> Self {
        BarError::Index(IndexError::Schema(err.to_string()))
    }
}

/// Exit codes from §6.3.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Fail = 1,
    InvalidArgument = 5,
    ConfigError = 6,
    TestCode = 124,
    FunctionNotSupported = 127,
    Unknown = 128,
}

impl BarError {
    /// Maps an error to the exit code its outermost kind implies (§6.3, §7).
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BarError::Config(_) => ExitCode::ConfigError,
            BarError::InvalidArgument(_) => ExitCode::InvalidArgument,
            BarError::NotSupported(_) => ExitCode::FunctionNotSupported,
            BarError::Internal(_) => ExitCode::Unknown,
            _ => ExitCode::Fail,
        }
    }

    /// Whether this error is recoverable at entry granularity by default
    /// (§7 "Propagation"). Per-run errors (bad password, signature, space)
    /// are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BarError::PasswordRequired
                | BarError::WrongPassword
                | BarError::SignatureMismatch
                | BarError::Storage(StorageError::OutOfSpace)
                | BarError::Aborted
                | BarError::Config(_)
        )
    }
}
