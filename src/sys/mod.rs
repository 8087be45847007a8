//! The native blocking backend.
//!
//! Everything in here is a thin, unsafe wrapper over the primitives the
//! operating system provides. The safe types at the top level of the crate
//! layer recursion, counting and deadline handling on top of these.

#![allow(non_camel_case_types)]

pub use self::condvar::Condvar;
pub use self::mutex::Mutex;

mod condvar;
mod mutex;

#[cfg(unix)] #[path = "unix.rs"] mod ffi;
#[cfg(windows)] #[path = "windows.rs"] mod ffi;
