use std::time::{Duration, Instant};

use crate::status::MUTEX_MAXWAIT;

/// How long a timed wait may block.
///
/// Relative durations are turned into an absolute deadline when the wait
/// starts, so a wait that loops internally never extends its total bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Wait until woken, however long that takes.
    Never,
    /// Wait at most this long from the start of the call.
    After(Duration),
    /// Wait until this instant at the latest.
    At(Instant),
}

impl Timeout {
    /// Millisecond timeout where [`MUTEX_MAXWAIT`] means wait forever.
    pub fn from_millis(ms: u32) -> Timeout {
        if ms == MUTEX_MAXWAIT {
            Timeout::Never
        } else {
            Timeout::After(Duration::from_millis(u64::from(ms)))
        }
    }

    /// The absolute deadline for a wait starting now, `None` for no deadline.
    ///
    /// Durations too large to represent as an `Instant` are treated as no
    /// deadline.
    pub fn deadline(self) -> Option<Instant> {
        match self {
            Timeout::Never => None,
            Timeout::After(dur) => Instant::now().checked_add(dur),
            Timeout::At(at) => Some(at),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(dur: Duration) -> Timeout {
        Timeout::After(dur)
    }
}

impl From<Instant> for Timeout {
    fn from(at: Instant) -> Timeout {
        Timeout::At(at)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(dur: Option<Duration>) -> Timeout {
        dur.map_or(Timeout::Never, Timeout::After)
    }
}
