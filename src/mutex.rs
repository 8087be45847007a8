use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{trace, warn};

use crate::error::{Error, Result, TryError};
use crate::sys;

/// A recursive mutual exclusion primitive.
///
/// The thread holding the mutex may lock it again without blocking; it must
/// then unlock it the same number of times before any other thread can
/// acquire it. Contended acquirers block in the native backend, and the
/// order in which they are let in is up to that backend.
///
/// Unlocking happens through the RAII [`MutexGuard`], which cannot leave the
/// thread that acquired it. This makes unlocking a mutex from a thread that
/// does not own it impossible in safe code.
///
/// # Example
///
/// ```rust
/// use threadsync::Mutex;
///
/// let m = Mutex::new().unwrap();
/// let outer = m.lock().unwrap();
/// let inner = m.lock().unwrap(); // same thread, does not block
/// assert_eq!(m.recursion_count(), 2);
/// drop(inner);
/// drop(outer); // unlocked here
/// assert!(!m.is_owned_by_current_thread());
/// ```
pub struct Mutex {
    // Once a native mutex has been used its address can never change, while
    // this type can be moved at any time, so the native lock lives in a box.
    lock: Box<sys::Mutex>,
    // Identity of the owning thread, 0 when unowned. Only written while the
    // native lock is held.
    owner: AtomicUsize,
    // Only touched by the owner.
    count: UnsafeCell<usize>,
}

unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

/// An RAII implementation of a "scoped lock" of a mutex. When this structure is
/// dropped (falls out of scope), one level of the lock is released.
#[must_use]
pub struct MutexGuard<'a> {
    lock: &'a Mutex,
    // Ownership belongs to the locking thread.
    marker: PhantomData<*const ()>,
}

/// Token proving the recursive bookkeeping was suspended for a condition
/// variable wait.
pub(crate) struct Suspended<'a> {
    lock: &'a Mutex,
    me: usize,
}

/// Process-unique identity of the calling thread, never 0.
pub(crate) fn current_thread_id() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    thread_local!(static ID: usize = NEXT.fetch_add(1, Ordering::Relaxed));
    ID.with(|id| *id)
}

impl Mutex {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// Fails with [`Error::Alloc`] if the native lock cannot be initialized.
    pub fn new() -> Result<Mutex> {
        let lock = sys::Mutex::new().map_err(Error::alloc("mutex"))?;
        trace!("created mutex");
        Ok(Mutex {
            lock,
            owner: AtomicUsize::new(0),
            count: UnsafeCell::new(0),
        })
    }

    /// Acquires the mutex, blocking the current thread until it is able to do
    /// so.
    ///
    /// If the current thread already owns the mutex this only bumps the
    /// recursion count. Otherwise the thread blocks until the mutex is free,
    /// after which it is the only thread holding it.
    pub fn lock(&self) -> Result<MutexGuard<'_>> {
        let me = current_thread_id();
        if self.relock(me) {
            return Ok(MutexGuard::new(self));
        }
        let acquired = unsafe { self.lock.try_lock() }
            .map_err(Error::system("mutex lock"))?;
        if !acquired {
            trace!("mutex contended, blocking");
            unsafe { self.lock.lock() }.map_err(Error::system("mutex lock"))?;
        }
        unsafe { self.mark_owner(me) };
        Ok(MutexGuard::new(self))
    }

    /// Attempts to acquire this lock without blocking.
    ///
    /// Succeeds immediately for the owning thread, like [`lock`](Mutex::lock).
    /// Returns [`TryError::WouldBlock`] if another thread holds the mutex.
    pub fn try_lock(&self) -> std::result::Result<MutexGuard<'_>, TryError> {
        let me = current_thread_id();
        if self.relock(me) {
            return Ok(MutexGuard::new(self));
        }
        if unsafe { self.lock.try_lock() }.map_err(Error::system("mutex trylock"))? {
            unsafe { self.mark_owner(me) };
            Ok(MutexGuard::new(self))
        } else {
            Err(TryError::WouldBlock)
        }
    }

    /// Returns whether the calling thread currently holds this mutex.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == current_thread_id()
    }

    /// How many times the calling thread has locked this mutex without
    /// unlocking it. Always 0 for threads that do not own it.
    pub fn recursion_count(&self) -> usize {
        if self.is_owned_by_current_thread() {
            unsafe { *self.count.get() }
        } else {
            0
        }
    }

    // Only the owner can read its own id back out of `owner`, so a relaxed
    // load is enough to decide whether this is a recursive acquisition.
    fn relock(&self, me: usize) -> bool {
        if self.owner.load(Ordering::Relaxed) != me {
            return false;
        }
        unsafe {
            let count = &mut *self.count.get();
            *count = count.checked_add(1).expect("mutex recursion count overflow");
        }
        true
    }

    // Must be called with the native lock just acquired.
    unsafe fn mark_owner(&self, me: usize) {
        self.owner.store(me, Ordering::Relaxed);
        *self.count.get() = 1;
    }

    // Must be called by the owner.
    unsafe fn release(&self) -> Result<()> {
        let count = &mut *self.count.get();
        debug_assert!(*count > 0);
        *count -= 1;
        if *count > 0 {
            return Ok(());
        }
        self.owner.store(0, Ordering::Relaxed);
        self.lock.unlock().map_err(Error::system("mutex unlock"))
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        // A guard borrows the mutex, so nobody can hold or wait on it here.
        if let Err(e) = unsafe { self.lock.destroy() } {
            warn!("failed to destroy mutex: {}", e);
        }
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &(self.owner.load(Ordering::Relaxed) != 0))
            .finish()
    }
}

impl<'mutex> MutexGuard<'mutex> {
    fn new(lock: &'mutex Mutex) -> MutexGuard<'mutex> {
        MutexGuard { lock, marker: PhantomData }
    }

    /// The mutex this guard holds.
    pub fn mutex(&self) -> &'mutex Mutex {
        self.lock
    }

    /// Releases one level of the lock, reporting backend failures that
    /// dropping the guard would only log.
    pub fn unlock(self) -> Result<()> {
        let lock = self.lock;
        mem::forget(self);
        unsafe { lock.release() }
    }

    /// Suspends the recursive bookkeeping ahead of a condition variable wait,
    /// which releases the native lock.
    ///
    /// # Panics
    ///
    /// Panics unless the calling thread holds the mutex exactly once: a wait
    /// can only give up a single level of the lock.
    pub(crate) fn suspend(&mut self) -> Suspended<'mutex> {
        let lock = self.lock;
        let depth = unsafe { *lock.count.get() };
        assert_eq!(depth, 1,
                   "condition variable wait on a mutex locked {} times", depth);
        let me = lock.owner.swap(0, Ordering::Relaxed);
        unsafe { *lock.count.get() = 0 };
        Suspended { lock, me }
    }
}

impl<'a> Suspended<'a> {
    /// The native lock to hand to the condition variable.
    pub(crate) fn raw(&self) -> &'a sys::Mutex {
        let lock: &'a Mutex = self.lock;
        &lock.lock
    }

    /// Restores ownership once the native lock has been re-acquired.
    pub(crate) fn resume(self) {
        unsafe { self.lock.mark_owner(self.me) }
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.lock.release() } {
            warn!("failed to unlock mutex: {}", e);
        }
    }
}

impl fmt::Debug for MutexGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use std::thread;

    use super::Mutex;
    use crate::error::TryError;

    #[test]
    fn smoke() {
        let m = Mutex::new().unwrap();
        drop(m.lock().unwrap());
        drop(m.lock().unwrap());
    }

    #[test]
    fn lots_and_lots() {
        const J: usize = 1000;
        const K: usize = 3;

        struct Counter {
            m: Mutex,
            cnt: std::cell::UnsafeCell<usize>,
        }
        unsafe impl Sync for Counter {}

        let c = Arc::new(Counter { m: Mutex::new().unwrap(), cnt: 0.into() });
        fn inc(c: &Counter) {
            for _ in 0..J {
                let _g = c.m.lock().unwrap();
                unsafe { *c.cnt.get() += 1 };
            }
        }

        let (tx, rx) = channel();
        for _ in 0..2 * K {
            let tx2 = tx.clone();
            let c2 = c.clone();
            thread::spawn(move || { inc(&c2); tx2.send(()).unwrap(); });
        }

        drop(tx);
        for _ in 0..2 * K {
            rx.recv().unwrap();
        }
        assert_eq!(unsafe { *c.cnt.get() }, J * K * 2);
    }

    #[test]
    fn try_lock() {
        let m = Mutex::new().unwrap();
        assert!(m.try_lock().is_ok());
    }

    #[test]
    fn try_lock_is_reentrant() {
        let m = Mutex::new().unwrap();
        let _a = m.lock().unwrap();
        let _b = m.try_lock().unwrap();
        assert_eq!(m.recursion_count(), 2);
    }

    #[test]
    fn try_lock_would_block_on_other_owner() {
        let m = Arc::new(Mutex::new().unwrap());
        let g = m.lock().unwrap();
        let m2 = m.clone();
        thread::spawn(move || {
            assert!(matches!(m2.try_lock(), Err(TryError::WouldBlock)));
            assert!(!m2.is_owned_by_current_thread());
            assert_eq!(m2.recursion_count(), 0);
        }).join().unwrap();
        drop(g);
    }

    #[test]
    fn explicit_unlock() {
        let m = Mutex::new().unwrap();
        let g = m.lock().unwrap();
        assert!(g.mutex().is_owned_by_current_thread());
        g.unlock().unwrap();
        assert!(!m.is_owned_by_current_thread());
    }
}
