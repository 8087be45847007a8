use std::io;
use std::time::Duration;

use crate::sys::{mutex, Mutex};

/// An OS-based condition variable.
///
/// This structure is the lowest layer possible on top of the OS-provided
/// condition variables. It is consequently entirely unsafe to use. It is
/// recommended to use the safer types at the top level of this crate instead of
/// this type.
pub struct Condvar(imp::Condvar);

unsafe impl Send for Condvar {}
unsafe impl Sync for Condvar {}

impl Condvar {
    /// Creates a new condition variable for use, initialized in place behind
    /// the box.
    pub fn new() -> io::Result<Box<Condvar>> {
        let cond = Box::new(Condvar(imp::Condvar::uninit()));
        unsafe { cond.0.init()? }
        Ok(cond)
    }

    /// Signal one waiter on this condition variable to wake up.
    #[inline]
    pub unsafe fn signal(&self) -> io::Result<()> { self.0.signal() }

    /// Awaken all current waiters on this condition variable.
    #[inline]
    pub unsafe fn broadcast(&self) -> io::Result<()> { self.0.broadcast() }

    /// Wait for a signal on the specified mutex.
    ///
    /// The mutex is held again when this returns, whatever the outcome.
    /// Behavior is undefined if the mutex is not locked by the current thread.
    /// Behavior is also undefined if more than one mutex is used concurrently
    /// on this condition variable.
    #[inline]
    pub unsafe fn wait(&self, mutex: &Mutex) -> io::Result<()> {
        self.0.wait(mutex::raw(mutex))
    }

    /// Wait for a signal on the specified mutex with a timeout duration
    /// specified by `dur` (a relative time into the future).
    ///
    /// Returns `Ok(false)` if the deadline passed before a wakeup. The same
    /// preconditions as `wait` apply.
    #[inline]
    pub unsafe fn wait_timeout(&self, mutex: &Mutex, dur: Duration) -> io::Result<bool> {
        self.0.wait_timeout(mutex::raw(mutex), dur)
    }

    /// Deallocate all resources associated with this condition variable.
    ///
    /// Behavior is undefined if there are current or will be future users of
    /// this condition variable.
    #[inline]
    pub unsafe fn destroy(&self) -> io::Result<()> { self.0.destroy() }
}

#[cfg(unix)]
mod imp {
    use std::cell::UnsafeCell;
    use std::io;
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    use std::mem::MaybeUninit;
    use std::time::Duration;

    use crate::sys::ffi::{self, cvt};

    pub struct Condvar { inner: UnsafeCell<libc::pthread_cond_t> }

    impl Condvar {
        pub fn uninit() -> Condvar {
            Condvar { inner: UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER) }
        }

        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        pub unsafe fn init(&self) -> io::Result<()> {
            let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
            cvt(libc::pthread_condattr_init(attr.as_mut_ptr()))?;
            let r = match cvt(libc::pthread_condattr_setclock(attr.as_mut_ptr(),
                                                              ffi::CONDVAR_CLOCK)) {
                Ok(()) => cvt(libc::pthread_cond_init(self.inner.get(), attr.as_ptr())),
                Err(e) => Err(e),
            };
            let d = libc::pthread_condattr_destroy(attr.as_mut_ptr());
            debug_assert_eq!(d, 0);
            r
        }

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        pub unsafe fn init(&self) -> io::Result<()> {
            cvt(libc::pthread_cond_init(self.inner.get(), std::ptr::null()))
        }

        #[inline]
        pub unsafe fn signal(&self) -> io::Result<()> {
            cvt(libc::pthread_cond_signal(self.inner.get()))
        }

        #[inline]
        pub unsafe fn broadcast(&self) -> io::Result<()> {
            cvt(libc::pthread_cond_broadcast(self.inner.get()))
        }

        #[inline]
        pub unsafe fn wait(&self, mutex: *mut libc::pthread_mutex_t) -> io::Result<()> {
            cvt(libc::pthread_cond_wait(self.inner.get(), mutex))
        }

        pub unsafe fn wait_timeout(&self, mutex: *mut libc::pthread_mutex_t,
                                   dur: Duration) -> io::Result<bool> {
            let deadline = ffi::deadline_after(dur);

            // And wait!
            match libc::pthread_cond_timedwait(self.inner.get(), mutex, &deadline) {
                0 => Ok(true),
                libc::ETIMEDOUT => Ok(false),
                r => Err(io::Error::from_raw_os_error(r)),
            }
        }

        #[inline]
        pub unsafe fn destroy(&self) -> io::Result<()> {
            cvt(libc::pthread_cond_destroy(self.inner.get()))
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::cell::UnsafeCell;
    use std::io;
    use std::time::Duration;

    use crate::sys::ffi;

    pub struct Condvar { inner: UnsafeCell<ffi::CONDITION_VARIABLE> }

    impl Condvar {
        pub fn uninit() -> Condvar {
            Condvar { inner: UnsafeCell::new(ffi::CONDITION_VARIABLE_INIT) }
        }

        pub unsafe fn init(&self) -> io::Result<()> { Ok(()) }

        #[inline]
        pub unsafe fn wait(&self, mutex: ffi::PSRWLOCK) -> io::Result<()> {
            let r = ffi::SleepConditionVariableSRW(self.inner.get(), mutex,
                                                   ffi::INFINITE, 0);
            if r == 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }

        pub unsafe fn wait_timeout(&self, mutex: ffi::PSRWLOCK,
                                   dur: Duration) -> io::Result<bool> {
            let r = ffi::SleepConditionVariableSRW(self.inner.get(), mutex,
                                                   ffi::dur_to_ms(dur), 0);
            if r != 0 {
                return Ok(true);
            }
            match ffi::GetLastError() {
                ffi::ERROR_TIMEOUT => Ok(false),
                code => Err(io::Error::from_raw_os_error(code as i32)),
            }
        }

        #[inline]
        pub unsafe fn signal(&self) -> io::Result<()> {
            ffi::WakeConditionVariable(self.inner.get());
            Ok(())
        }

        #[inline]
        pub unsafe fn broadcast(&self) -> io::Result<()> {
            ffi::WakeAllConditionVariable(self.inner.get());
            Ok(())
        }

        pub unsafe fn destroy(&self) -> io::Result<()> { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::Condvar;
    use crate::sys::Mutex;

    #[test]
    fn smoke() {
        let c = Condvar::new().unwrap();
        unsafe {
            c.signal().unwrap();
            c.broadcast().unwrap();
            c.destroy().unwrap();
        }
    }

    #[test]
    fn wait_timeout_elapses_with_mutex_held() {
        let c = Condvar::new().unwrap();
        let m = Mutex::new().unwrap();
        unsafe {
            m.lock().unwrap();
            let start = Instant::now();
            let mut woken = c.wait_timeout(&m, Duration::from_millis(20)).unwrap();
            // Spurious wakeups are permitted; retry until the clock agrees.
            while woken && start.elapsed() < Duration::from_millis(20) {
                woken = c.wait_timeout(&m, Duration::from_millis(20)).unwrap();
            }
            assert!(!m.try_lock().unwrap());
            m.unlock().unwrap();
            m.destroy().unwrap();
            c.destroy().unwrap();
        }
    }
}
