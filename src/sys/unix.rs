use std::io;
use std::mem;
use std::time::Duration;

/// Clock that condition variable deadlines are measured against.
///
/// Apple platforms cannot attach a clock to a condition variable, so they
/// fall back to wall-clock time.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub const CONDVAR_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const CONDVAR_CLOCK: libc::clockid_t = libc::CLOCK_REALTIME;

const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

/// pthread functions return the error number directly instead of setting
/// `errno`.
#[inline]
pub fn cvt(r: libc::c_int) -> io::Result<()> {
    if r == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(r))
    }
}

/// Absolute deadline `dur` from now on `CONDVAR_CLOCK`, saturating at the
/// largest representable time.
pub fn deadline_after(dur: Duration) -> libc::timespec {
    // Some targets carry private padding in `timespec`.
    let mut now: libc::timespec = unsafe { mem::zeroed() };
    let r = unsafe { libc::clock_gettime(CONDVAR_CLOCK, &mut now) };
    debug_assert_eq!(r, 0);

    let mut max = now;
    max.tv_sec = libc::time_t::MAX;
    max.tv_nsec = NANOS_PER_SEC - 1;

    let secs = match libc::time_t::try_from(dur.as_secs()) {
        Ok(secs) => secs,
        Err(_) => return max,
    };
    let mut sec = match now.tv_sec.checked_add(secs) {
        Some(sec) => sec,
        None => return max,
    };
    let mut nsec = now.tv_nsec + dur.subsec_nanos() as libc::c_long;
    if nsec >= NANOS_PER_SEC {
        nsec -= NANOS_PER_SEC;
        sec = match sec.checked_add(1) {
            Some(sec) => sec,
            None => return max,
        };
    }

    let mut deadline = now;
    deadline.tv_sec = sec;
    deadline.tv_nsec = nsec;
    deadline
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{cvt, deadline_after};

    #[test]
    fn cvt_maps_error_numbers() {
        assert!(cvt(0).is_ok());
        let err = cvt(libc::EINVAL).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    #[test]
    fn huge_deadline_saturates() {
        let ts = deadline_after(Duration::from_secs(u64::MAX));
        assert_eq!(ts.tv_sec, libc::time_t::MAX);
    }

    #[test]
    fn deadline_is_normalized() {
        let ts = deadline_after(Duration::new(1, 999_999_999));
        assert!(ts.tv_nsec >= 0 && ts.tv_nsec < 1_000_000_000);
    }
}
