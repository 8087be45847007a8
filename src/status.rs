//! Integer status codes for callers that speak the classic contract.
//!
//! Every operation in this crate returns a rich `Result`. Code that needs the
//! traditional `0` / timed-out / `-1` convention, for example at an FFI
//! boundary, converts those results with [`ToStatus`]:
//!
//! ```rust
//! use threadsync::{Mutex, ToStatus, MUTEX_OK};
//!
//! let m = Mutex::new().unwrap();
//! assert_eq!(m.lock().to_status(), MUTEX_OK);
//! ```

use crate::error::{Error, TryError, WaitTimeoutResult};
use crate::mutex::MutexGuard;

/// The operation succeeded.
pub const MUTEX_OK: i32 = 0;

/// A timed wait hit its deadline, or a non-blocking operation would have
/// blocked.
pub const MUTEX_TIMEDOUT: i32 = 1;

/// The operation failed; the error value carries the details.
pub const MUTEX_ERROR: i32 = -1;

/// Millisecond timeout meaning "never time out".
pub const MUTEX_MAXWAIT: u32 = !0;

/// Conversion of an operation's outcome into a status code.
pub trait ToStatus {
    /// Returns [`MUTEX_OK`], [`MUTEX_TIMEDOUT`] or [`MUTEX_ERROR`].
    fn to_status(&self) -> i32;
}

impl ToStatus for () {
    fn to_status(&self) -> i32 { MUTEX_OK }
}

impl ToStatus for MutexGuard<'_> {
    fn to_status(&self) -> i32 { MUTEX_OK }
}

impl ToStatus for WaitTimeoutResult {
    fn to_status(&self) -> i32 {
        if self.timed_out() { MUTEX_TIMEDOUT } else { MUTEX_OK }
    }
}

impl ToStatus for Error {
    fn to_status(&self) -> i32 { MUTEX_ERROR }
}

impl ToStatus for TryError {
    fn to_status(&self) -> i32 {
        match *self {
            TryError::WouldBlock => MUTEX_TIMEDOUT,
            TryError::Failed(ref e) => e.to_status(),
        }
    }
}

impl<T: ToStatus, E: ToStatus> ToStatus for Result<T, E> {
    fn to_status(&self) -> i32 {
        match *self {
            Ok(ref v) => v.to_status(),
            Err(ref e) => e.to_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ToStatus, MUTEX_ERROR, MUTEX_OK, MUTEX_TIMEDOUT};
    use crate::error::{Error, TryError, WaitTimeoutResult};

    #[test]
    fn codes() {
        assert_eq!(Ok::<(), Error>(()).to_status(), MUTEX_OK);
        assert_eq!(Err::<(), Error>(Error::Overflow).to_status(), MUTEX_ERROR);
        assert_eq!(Ok::<_, Error>(WaitTimeoutResult(true)).to_status(), MUTEX_TIMEDOUT);
        assert_eq!(Ok::<_, Error>(WaitTimeoutResult(false)).to_status(), MUTEX_OK);
        assert_eq!(Err::<(), _>(TryError::WouldBlock).to_status(), MUTEX_TIMEDOUT);
        assert_eq!(Err::<(), _>(TryError::Failed(Error::Overflow)).to_status(),
                   MUTEX_ERROR);
    }
}
