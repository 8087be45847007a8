//! Portable synchronization primitives for native threads.
//!
//! This crate provides a recursive [`Mutex`], a counting [`Semaphore`] and a
//! [`Condvar`] that behave the same on every platform, layered over the
//! primitives the operating system offers (pthreads on unix, SRW locks and
//! condition variables on Windows). The raw backend is exposed in [`sys`].
//!
//! Failures come back as [`Error`] values; waits with a deadline report
//! timeouts through [`WaitTimeoutResult`] and the non-blocking operations
//! report contention through [`TryError::WouldBlock`]. The [`status`] module
//! maps all of these onto the classic `0` / [`MUTEX_TIMEDOUT`] / `-1` codes.

#![warn(missing_docs)]

pub use condvar::Condvar;
pub use error::{Error, Result, TryError, WaitTimeoutResult};
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::Semaphore;
pub use status::{ToStatus, MUTEX_ERROR, MUTEX_MAXWAIT, MUTEX_OK, MUTEX_TIMEDOUT};
pub use timeout::Timeout;

pub mod status;
pub mod sys;

mod condvar;
mod error;
mod mutex;
mod semaphore;
mod timeout;
