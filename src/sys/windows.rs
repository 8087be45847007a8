use std::ffi::c_void;
use std::time::Duration;

pub type BOOL = i32;
pub type BOOLEAN = u8;
pub type DWORD = u32;
pub type ULONG = u32;

pub type PSRWLOCK = *mut SRWLOCK;
pub type PCONDITION_VARIABLE = *mut CONDITION_VARIABLE;

pub const INFINITE: DWORD = 0xFFFF_FFFF;
pub const ERROR_TIMEOUT: DWORD = 0x5B4;

#[repr(C)]
pub struct SRWLOCK { pub ptr: *mut c_void }

#[repr(C)]
pub struct CONDITION_VARIABLE { pub ptr: *mut c_void }

pub const SRWLOCK_INIT: SRWLOCK = SRWLOCK { ptr: 0 as *mut _ };
pub const CONDITION_VARIABLE_INIT: CONDITION_VARIABLE =
    CONDITION_VARIABLE { ptr: 0 as *mut _ };

#[link(name = "kernel32")]
extern "system" {
    pub fn AcquireSRWLockExclusive(SRWLock: PSRWLOCK);
    pub fn TryAcquireSRWLockExclusive(SRWLock: PSRWLOCK) -> BOOLEAN;
    pub fn ReleaseSRWLockExclusive(SRWLock: PSRWLOCK);

    pub fn SleepConditionVariableSRW(ConditionVariable: PCONDITION_VARIABLE,
                                     SRWLock: PSRWLOCK,
                                     dwMilliseconds: DWORD,
                                     Flags: ULONG) -> BOOL;
    pub fn WakeConditionVariable(ConditionVariable: PCONDITION_VARIABLE);
    pub fn WakeAllConditionVariable(ConditionVariable: PCONDITION_VARIABLE);

    pub fn GetLastError() -> DWORD;
}

/// Milliseconds for `SleepConditionVariableSRW`, rounded up so a wait never
/// ends early and clamped below `INFINITE`.
pub fn dur_to_ms(dur: Duration) -> DWORD {
    let ms = dur.as_millis() + u128::from(dur.subsec_nanos() % 1_000_000 != 0);
    DWORD::try_from(ms).unwrap_or(INFINITE - 1).min(INFINITE - 1)
}
