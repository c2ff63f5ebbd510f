//! Result taxonomy for module operations.

use thiserror::Error;

/// Everything a module operation can end in other than success.
///
/// `Ok(_)` is the Success outcome. `ValidationFail`, `NoTagResponse` and
/// `MemoryOverrun` come from the channel or the module; `RejectedConfiguration`
/// is raised locally before any frame is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UhfError {
    /// Integrity, delimiter or framing mismatch, or the module refused the request
    #[error("validation failed: {0}")]
    ValidationFail(String),

    /// Well-formed exchange in which no tag was present or responding
    #[error("no tag response")]
    NoTagResponse,

    /// Requested or returned data exceeds a bank or buffer bound
    #[error("memory overrun: {0}")]
    MemoryOverrun(String),

    /// Argument failed range or enumeration checks; nothing was sent
    #[error("rejected configuration: {0}")]
    RejectedConfiguration(String),

    /// The serial link itself failed
    #[error("transport error: {0}")]
    Transport(String),
}

impl UhfError {
    /// True for errors the caller could have avoided by passing other arguments.
    ///
    /// A `MemoryOverrun` counts as preventable whether it came from a local
    /// bound check or from the module rejecting the same out-of-bounds access.
    pub fn is_preventable(&self) -> bool {
        matches!(
            self,
            UhfError::RejectedConfiguration(_) | UhfError::MemoryOverrun(_)
        )
    }
}
