//! Admission error taxonomy.

use thiserror::Error;
use velvet_core::StoreError;

/// Errors produced by the admission gate.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// No presale window for the given event.
    #[error("presale window not found")]
    WindowNotFound,

    /// The window is not open right now.
    #[error("presale window is closed")]
    WindowClosed,

    /// No access path admits the member.
    #[error("not eligible for this presale")]
    NotEligible,

    /// The supplied access code is not accepted by the window.
    #[error("invalid access code")]
    InvalidAccessCode,

    /// The admission lock could not be acquired; retry shortly.
    #[error("admission is busy, retry shortly")]
    Busy,

    /// The member holds no grant to release.
    #[error("no grant to release")]
    GrantNotFound,

    /// The underlying store or lock backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdmissionError {
    /// Stable machine-readable code for logs and clients.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::WindowNotFound => "window_not_found",
            Self::WindowClosed => "window_closed",
            Self::NotEligible => "not_eligible",
            Self::InvalidAccessCode => "invalid_access_code",
            Self::Busy => "busy",
            Self::GrantNotFound => "grant_not_found",
            Self::Store(err) => err.reason_code(),
        }
    }

    /// Whether the caller should retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}
