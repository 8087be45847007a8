//! Counting semaphore.
//!
//! [`Semaphore`] holds a count of available units. Waiting takes a unit,
//! blocking while none is available; posting returns one and wakes at most
//! one blocked waiter.
//!
//! Taking a unit is a lock-free compare-and-swap on the count. Only threads
//! that find the count at zero touch the native mutex and condition variable,
//! and posts take the same mutex so that a waiter can never miss the post
//! that happened between its last look at the count and parking.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use tracing::{trace, warn};

use crate::error::{Error, Result, TryError, WaitTimeoutResult};
use crate::sys;
use crate::timeout::Timeout;

/// A counting semaphore for native threads.
///
/// # Example
///
/// ```rust
/// use threadsync::Semaphore;
///
/// let sem = Semaphore::new(1).unwrap();
/// sem.wait().unwrap();
/// assert!(sem.try_wait().is_err()); // no units left
/// sem.post().unwrap();
/// assert_eq!(sem.value(), 1);
/// ```
pub struct Semaphore {
    count: AtomicU32,
    // Threads parked on `cond`, guarded by `lock`.
    waiters: UnsafeCell<usize>,
    lock: Box<sys::Mutex>,
    cond: Box<sys::Condvar>,
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Creates a semaphore holding `initial` units.
    ///
    /// Fails with [`Error::Alloc`] if the native resources cannot be created.
    pub fn new(initial: u32) -> Result<Semaphore> {
        let lock = sys::Mutex::new().map_err(Error::alloc("semaphore"))?;
        let cond = match sys::Condvar::new() {
            Ok(cond) => cond,
            Err(e) => {
                unsafe { let _ = lock.destroy(); }
                return Err(Error::alloc("semaphore")(e));
            }
        };
        trace!(initial, "created semaphore");
        Ok(Semaphore {
            count: AtomicU32::new(initial),
            waiters: UnsafeCell::new(0),
            lock,
            cond,
        })
    }

    /// Takes one unit, blocking until one is available.
    pub fn wait(&self) -> Result<()> {
        if self.try_acquire() {
            return Ok(());
        }
        self.park(None).map(|_| ())
    }

    /// Takes one unit if one is available right now.
    ///
    /// Returns [`TryError::WouldBlock`] without touching the count otherwise.
    pub fn try_wait(&self) -> std::result::Result<(), TryError> {
        if self.try_acquire() {
            Ok(())
        } else {
            Err(TryError::WouldBlock)
        }
    }

    /// Takes one unit, blocking for at most `timeout`.
    ///
    /// On timeout the count is left alone: the wait never saw a unit
    /// available.
    pub fn wait_timeout<T: Into<Timeout>>(&self, timeout: T) -> Result<WaitTimeoutResult> {
        if self.try_acquire() {
            return Ok(WaitTimeoutResult(false));
        }
        self.park(timeout.into().deadline())
    }

    /// Returns one unit and wakes at most one blocked waiter.
    ///
    /// Fails with [`Error::Overflow`], leaving the count unchanged, if the
    /// count is already `u32::MAX`.
    pub fn post(&self) -> Result<()> {
        unsafe { self.lock.lock() }.map_err(Error::system("semaphore lock"))?;
        let r = unsafe { self.post_locked() };
        let u = unsafe { self.lock.unlock() }.map_err(Error::system("semaphore unlock"));
        r.and(u)
    }

    /// The current count.
    ///
    /// Only a snapshot: other threads may change it before the caller looks
    /// at the result.
    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    fn try_acquire(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(current, current - 1,
                                                   Ordering::AcqRel,
                                                   Ordering::Acquire) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    unsafe fn post_locked(&self) -> Result<()> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
            .map_err(|_| Error::Overflow)?;
        if *self.waiters.get() > 0 {
            trace!("waking semaphore waiter");
            self.cond.signal().map_err(Error::system("semaphore post"))?;
        }
        Ok(())
    }

    fn park(&self, deadline: Option<Instant>) -> Result<WaitTimeoutResult> {
        unsafe { self.lock.lock() }.map_err(Error::system("semaphore lock"))?;
        let r = unsafe {
            *self.waiters.get() += 1;
            let r = self.park_locked(deadline);
            *self.waiters.get() -= 1;
            r
        };
        let u = unsafe { self.lock.unlock() }.map_err(Error::system("semaphore unlock"));
        let r = r?;
        u?;
        Ok(r)
    }

    // A post may be consumed by `try_wait` before a woken waiter gets to it,
    // and the backend may wake spuriously, so every wakeup re-checks.
    unsafe fn park_locked(&self, deadline: Option<Instant>) -> Result<WaitTimeoutResult> {
        loop {
            if self.try_acquire() {
                return Ok(WaitTimeoutResult(false));
            }
            trace!("semaphore empty, blocking");
            match deadline {
                None => {
                    self.cond.wait(&self.lock).map_err(Error::system("semaphore wait"))?;
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(WaitTimeoutResult(true));
                    }
                    self.cond.wait_timeout(&self.lock, deadline - now)
                        .map_err(Error::system("semaphore timed wait"))?;
                }
            }
        }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // Waiting borrows the semaphore, so no thread is parked here.
        unsafe {
            if let Err(e) = self.cond.destroy() {
                warn!("failed to destroy semaphore condition variable: {}", e);
            }
            if let Err(e) = self.lock.destroy() {
                warn!("failed to destroy semaphore mutex: {}", e);
            }
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").field("value", &self.value()).finish()
    }
}
