//! Error handling and types

use std::io;

use thiserror::Error;

/// Failures reported by the synchronization primitives.
///
/// Timeouts and contention on the non-blocking operations are not errors;
/// see [`WaitTimeoutResult`] and [`TryError::WouldBlock`].
#[derive(Error, Debug)]
pub enum Error {
    /// The native backend could not provide resources for a new primitive
    #[error("failed to create {primitive}: {source}")]
    Alloc {
        /// Which primitive was being created
        primitive: &'static str,
        /// Error reported by the operating system
        #[source]
        source: io::Error,
    },

    /// A native backend call failed unexpectedly
    #[error("{op} failed: {source}")]
    System {
        /// The operation that failed, e.g. `"mutex lock"`
        op: &'static str,
        /// Error reported by the operating system
        #[source]
        source: io::Error,
    },

    /// A semaphore post would push the count past `u32::MAX`
    #[error("semaphore count overflow")]
    Overflow,
}

impl Error {
    pub(crate) fn alloc(primitive: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Alloc { primitive, source }
    }

    pub(crate) fn system(op: &'static str) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::System { op, source }
    }
}

/// Result of the blocking operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a non-blocking operation that could not complete.
#[derive(Error, Debug)]
pub enum TryError {
    /// The operation would have had to block
    #[error("operation would block")]
    WouldBlock,

    /// The backend failed
    #[error(transparent)]
    Failed(#[from] Error),
}

/// Whether a timed wait returned because its deadline elapsed.
///
/// A timed-out wait is an expected outcome, not an error. Even when
/// `timed_out()` is false the caller must re-check its predicate.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[must_use]
pub struct WaitTimeoutResult(pub(crate) bool);

impl WaitTimeoutResult {
    /// Returns true if the wait ended because the deadline elapsed.
    pub fn timed_out(&self) -> bool {
        self.0
    }
}
