use std::fmt;
use std::time::Instant;

use tracing::{trace, warn};

use crate::error::{Error, Result, WaitTimeoutResult};
use crate::mutex::MutexGuard;
use crate::sys;
use crate::timeout::Timeout;

/// A condition variable.
///
/// Condition variables block a thread until some predicate over data
/// protected by a [`Mutex`](crate::Mutex) becomes true. Waiting atomically
/// releases the mutex and parks the thread; before any wait returns the
/// mutex is held by the caller again, also when the wait timed out or the
/// backend reported an error.
///
/// Wakeups do not imply the predicate holds: another thread may have run
/// first, and the backend may wake a waiter spuriously. Always wait in a loop:
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::thread;
/// use threadsync::{Condvar, Mutex};
///
/// let pair = Arc::new((Mutex::new().unwrap(), Condvar::new().unwrap(), AtomicBool::new(false)));
/// let pair2 = pair.clone();
///
/// thread::spawn(move || {
///     let (lock, cvar, ready) = &*pair2;
///     let _g = lock.lock().unwrap();
///     ready.store(true, Ordering::Relaxed);
///     cvar.signal().unwrap();
/// });
///
/// let (lock, cvar, ready) = &*pair;
/// let mut g = lock.lock().unwrap();
/// while !ready.load(Ordering::Relaxed) {
///     cvar.wait(&mut g).unwrap();
/// }
/// ```
///
/// A condition variable may be used with different mutexes over time, but
/// never with two mutexes at once.
pub struct Condvar {
    inner: Box<sys::Condvar>,
}

impl Condvar {
    /// Creates a new condition variable with no waiters.
    pub fn new() -> Result<Condvar> {
        let inner = sys::Condvar::new().map_err(Error::alloc("condition variable"))?;
        trace!("created condition variable");
        Ok(Condvar { inner })
    }

    /// Wakes one thread blocked on this condition variable, if any.
    ///
    /// Which waiter is chosen is up to the backend. The signal is not
    /// remembered: with no waiter parked this does nothing.
    pub fn signal(&self) -> Result<()> {
        unsafe { self.inner.signal() }.map_err(Error::system("condvar signal"))
    }

    /// Wakes every thread currently blocked on this condition variable.
    pub fn broadcast(&self) -> Result<()> {
        unsafe { self.inner.broadcast() }.map_err(Error::system("condvar broadcast"))
    }

    /// Releases the mutex held by `guard` and blocks until woken.
    ///
    /// The mutex is re-acquired before this returns, whether it returns
    /// `Ok` or `Err`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is locked recursively: the wait must be able to
    /// release it fully.
    pub fn wait(&self, guard: &mut MutexGuard<'_>) -> Result<()> {
        let suspended = guard.suspend();
        trace!("waiting on condition variable");
        let r = unsafe { self.inner.wait(suspended.raw()) };
        suspended.resume();
        r.map_err(Error::system("condvar wait"))
    }

    /// Like [`wait`](Condvar::wait), but gives up once `timeout` elapses.
    ///
    /// The returned [`WaitTimeoutResult`] says whether the deadline was the
    /// reason for waking. Telling a timeout apart from a wakeup right at the
    /// deadline is best effort, so the predicate must be checked either way.
    pub fn wait_timeout<T>(&self, guard: &mut MutexGuard<'_>, timeout: T)
                           -> Result<WaitTimeoutResult>
        where T: Into<Timeout>
    {
        match timeout.into().deadline() {
            None => self.wait(guard).map(|()| WaitTimeoutResult(false)),
            Some(deadline) => self.wait_until(guard, deadline),
        }
    }

    /// Blocks while `condition` returns true, re-checking after every wakeup.
    pub fn wait_while<F>(&self, guard: &mut MutexGuard<'_>, mut condition: F)
                         -> Result<()>
        where F: FnMut() -> bool
    {
        while condition() {
            self.wait(guard)?;
        }
        Ok(())
    }

    /// Blocks while `condition` returns true, for at most `timeout` in total.
    ///
    /// Reports a timeout only if the condition still held when the deadline
    /// passed.
    pub fn wait_timeout_while<T, F>(&self, guard: &mut MutexGuard<'_>,
                                    timeout: T, mut condition: F)
                                    -> Result<WaitTimeoutResult>
        where T: Into<Timeout>,
              F: FnMut() -> bool
    {
        let deadline = match timeout.into().deadline() {
            Some(deadline) => deadline,
            None => return self.wait_while(guard, condition)
                               .map(|()| WaitTimeoutResult(false)),
        };
        while condition() {
            if self.wait_until(guard, deadline)?.timed_out() {
                return Ok(WaitTimeoutResult(condition()));
            }
        }
        Ok(WaitTimeoutResult(false))
    }

    fn wait_until(&self, guard: &mut MutexGuard<'_>, deadline: Instant)
                  -> Result<WaitTimeoutResult> {
        let dur = deadline.saturating_duration_since(Instant::now());
        let suspended = guard.suspend();
        trace!(timeout = ?dur, "waiting on condition variable");
        let r = unsafe { self.inner.wait_timeout(suspended.raw(), dur) };
        suspended.resume();
        let woken = r.map_err(Error::system("condvar timed wait"))?;
        Ok(WaitTimeoutResult(!woken && Instant::now() >= deadline))
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        // Waiting borrows the condition variable, so no thread is parked here.
        if let Err(e) = unsafe { self.inner.destroy() } {
            warn!("failed to destroy condition variable: {}", e);
        }
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::Condvar;
    use crate::mutex::Mutex;
    use crate::timeout::Timeout;

    struct Shared {
        m: Mutex,
        c: Condvar,
        flag: AtomicBool,
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared {
            m: Mutex::new().unwrap(),
            c: Condvar::new().unwrap(),
            flag: AtomicBool::new(false),
        })
    }

    #[test]
    fn smoke() {
        let c = Condvar::new().unwrap();
        c.signal().unwrap();
        c.broadcast().unwrap();
    }

    #[test]
    fn signal() {
        let s = shared();
        let mut g = s.m.lock().unwrap();
        let s2 = s.clone();
        thread::spawn(move || {
            let _g = s2.m.lock().unwrap();
            s2.flag.store(true, Ordering::Relaxed);
            s2.c.signal().unwrap();
        });
        s.c.wait_while(&mut g, || !s.flag.load(Ordering::Relaxed)).unwrap();
        assert!(s.m.is_owned_by_current_thread());
        assert_eq!(s.m.recursion_count(), 1);
    }

    #[test]
    fn broadcast() {
        let s = shared();
        let mut g = s.m.lock().unwrap();
        let s2 = s.clone();
        thread::spawn(move || {
            let _g = s2.m.lock().unwrap();
            s2.flag.store(true, Ordering::Relaxed);
            s2.c.broadcast().unwrap();
        });
        while !s.flag.load(Ordering::Relaxed) {
            s.c.wait(&mut g).unwrap();
        }
    }

    #[test]
    fn wait_timeout() {
        let s = shared();
        let mut g = s.m.lock().unwrap();
        let start = Instant::now();
        let r = s.c.wait_timeout_while(&mut g, Duration::from_millis(10),
                                       || !s.flag.load(Ordering::Relaxed)).unwrap();
        assert!(r.timed_out());
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(s.m.is_owned_by_current_thread());

        let s2 = s.clone();
        thread::spawn(move || {
            let _g = s2.m.lock().unwrap();
            s2.flag.store(true, Ordering::Relaxed);
            s2.c.signal().unwrap();
        });
        let r = s.c.wait_timeout_while(&mut g, Duration::from_secs(86400),
                                       || !s.flag.load(Ordering::Relaxed)).unwrap();
        assert!(!r.timed_out());
    }

    #[test]
    fn wait_timeout_never_behaves_like_wait() {
        let s = shared();
        let mut g = s.m.lock().unwrap();
        let s2 = s.clone();
        thread::spawn(move || {
            let _g = s2.m.lock().unwrap();
            s2.flag.store(true, Ordering::Relaxed);
            s2.c.signal().unwrap();
        });
        while !s.flag.load(Ordering::Relaxed) {
            let r = s.c.wait_timeout(&mut g, Timeout::Never).unwrap();
            assert!(!r.timed_out());
        }
    }

    #[test]
    fn elapsed_deadline_returns_at_once() {
        let s = shared();
        let mut g = s.m.lock().unwrap();
        let r = s.c.wait_timeout(&mut g, Instant::now()).unwrap();
        assert!(r.timed_out());
        assert!(s.m.is_owned_by_current_thread());
    }

    #[test]
    #[should_panic(expected = "locked 2 times")]
    fn recursive_wait_panics() {
        let m = Mutex::new().unwrap();
        let c = Condvar::new().unwrap();
        let _outer = m.lock().unwrap();
        let mut inner = m.lock().unwrap();
        let _ = c.wait_timeout(&mut inner, Duration::from_millis(1));
    }
}
