use std::io;

/// An OS-based mutual exclusion lock.
///
/// This is the thinnest cross-platform wrapper around OS mutexes. It is not
/// recursive; relocking from the owning thread is undefined behavior. All
/// usage of this mutex is unsafe and it is recommended to instead use the safe
/// wrapper at the top level of the crate.
pub struct Mutex(imp::Mutex);

unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    /// Creates a newly initialized mutex.
    ///
    /// The native lock is initialized in place behind the box, so its address
    /// never changes after initialization.
    pub fn new() -> io::Result<Box<Mutex>> {
        let mutex = Box::new(Mutex(imp::Mutex::uninit()));
        unsafe { mutex.0.init()? }
        Ok(mutex)
    }

    /// Lock the mutex blocking the current thread until it is available.
    ///
    /// Behavior is undefined if the current thread already holds the mutex.
    #[inline]
    pub unsafe fn lock(&self) -> io::Result<()> { self.0.lock() }

    /// Attempt to lock the mutex without blocking, returning whether it was
    /// successfully acquired or not.
    #[inline]
    pub unsafe fn try_lock(&self) -> io::Result<bool> { self.0.try_lock() }

    /// Unlock the mutex.
    ///
    /// Behavior is undefined if the current thread does not actually hold the
    /// mutex.
    #[inline]
    pub unsafe fn unlock(&self) -> io::Result<()> { self.0.unlock() }

    /// Deallocate all resources associated with this mutex.
    ///
    /// Behavior is undefined if there are current or will be future users of
    /// this mutex.
    #[inline]
    pub unsafe fn destroy(&self) -> io::Result<()> { self.0.destroy() }
}

#[cfg(unix)]
pub use self::imp::raw;

#[cfg(unix)]
mod imp {
    use std::cell::UnsafeCell;
    use std::io;
    use std::ptr;

    use crate::sys::ffi::cvt;

    pub struct Mutex { inner: UnsafeCell<libc::pthread_mutex_t> }

    #[inline]
    pub unsafe fn raw(m: &super::Mutex) -> *mut libc::pthread_mutex_t {
        m.0.inner.get()
    }

    impl Mutex {
        pub fn uninit() -> Mutex {
            Mutex { inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER) }
        }
        pub unsafe fn init(&self) -> io::Result<()> {
            cvt(libc::pthread_mutex_init(self.inner.get(), ptr::null()))
        }
        #[inline]
        pub unsafe fn lock(&self) -> io::Result<()> {
            cvt(libc::pthread_mutex_lock(self.inner.get()))
        }
        #[inline]
        pub unsafe fn unlock(&self) -> io::Result<()> {
            cvt(libc::pthread_mutex_unlock(self.inner.get()))
        }
        #[inline]
        pub unsafe fn try_lock(&self) -> io::Result<bool> {
            match libc::pthread_mutex_trylock(self.inner.get()) {
                0 => Ok(true),
                libc::EBUSY => Ok(false),
                r => Err(io::Error::from_raw_os_error(r)),
            }
        }
        #[inline]
        pub unsafe fn destroy(&self) -> io::Result<()> {
            cvt(libc::pthread_mutex_destroy(self.inner.get()))
        }
    }
}

#[cfg(windows)]
pub use self::imp::raw;

#[cfg(windows)]
mod imp {
    use std::cell::UnsafeCell;
    use std::io;

    use crate::sys::ffi;

    pub struct Mutex { inner: UnsafeCell<ffi::SRWLOCK> }

    #[inline]
    pub unsafe fn raw(m: &super::Mutex) -> ffi::PSRWLOCK {
        m.0.inner.get()
    }

    impl Mutex {
        pub fn uninit() -> Mutex {
            Mutex { inner: UnsafeCell::new(ffi::SRWLOCK_INIT) }
        }
        // SRW locks need no resources beyond their own word.
        pub unsafe fn init(&self) -> io::Result<()> { Ok(()) }
        #[inline]
        pub unsafe fn lock(&self) -> io::Result<()> {
            ffi::AcquireSRWLockExclusive(self.inner.get());
            Ok(())
        }
        #[inline]
        pub unsafe fn try_lock(&self) -> io::Result<bool> {
            Ok(ffi::TryAcquireSRWLockExclusive(self.inner.get()) != 0)
        }
        #[inline]
        pub unsafe fn unlock(&self) -> io::Result<()> {
            ffi::ReleaseSRWLockExclusive(self.inner.get());
            Ok(())
        }
        #[inline]
        pub unsafe fn destroy(&self) -> io::Result<()> { Ok(()) }
    }
}
