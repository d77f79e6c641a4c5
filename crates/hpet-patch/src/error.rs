use thiserror::Error;

pub type Result<T> = std::result::Result<T, FixError>;

/// Fatal failures of the HPET analysis pass.
///
/// Recoverable conditions (an IRQ run with no recognised terminator, a conflicting non-legacy
/// device) are not errors; they are collected on [`crate::Analysis`] instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixError {
    #[error("could not locate {0}")]
    NotFound(String),

    #[error("hit end of listing before a unique pattern was found (still {occurrences} matches for {pattern})")]
    Ambiguous { pattern: String, occurrences: usize },

    #[error("invalid hex payload {payload:?} on listing line {line}")]
    InvalidHex { line: usize, payload: String },

    #[error("patch {label:?} has malformed hex {digits:?}")]
    MalformedPatch { label: String, digits: String },

    #[error("find/replace length mismatch for {label:?} ({find} vs {replace} hex digits)")]
    PatchLength {
        label: String,
        find: usize,
        replace: usize,
    },

    #[error("invalid method tag {0:?} (expected a 4-character name segment)")]
    InvalidMethodTag(String),

    #[error("invalid scope name {0:?}")]
    InvalidScope(String),

    #[error("invalid device name {0:?} (expected 1 to 4 characters of A-Z, 0-9 or _)")]
    InvalidDevice(String),
}
