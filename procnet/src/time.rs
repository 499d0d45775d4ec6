//! Model time, wall-clock pacing and time-ordered waiting.
//!
//! This module provides most notably:
//!
//! * [`MonotonicTime`]: a monotonic timestamp based on the [TAI] time standard,
//!   used as the global model time of a timed process network,
//! * [`Clock`]: a trait for types that can pace the advance of model time
//!   against the wall clock, implemented for instance by [`SystemClock`] and
//!   [`AutoSystemClock`].
//!
//! [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time
//!
//!
//! # Examples
//!
//! A source actor that emits one token per second of model time:
//!
//! ```
//! use std::time::Duration;
//!
//! use procnet::actor::{Actor, ActorError, Context};
//! use procnet::channel::Output;
//!
//! pub struct Ticker {
//!     output: Output<u64>,
//!     count: u64,
//! }
//!
//! impl Actor for Ticker {
//!     fn fire(&mut self, cx: &Context) -> Result<(), ActorError> {
//!         self.output.put(self.count)?;
//!         self.count += 1;
//!         cx.fire_at(cx.time() + Duration::from_secs(1))?;
//!
//!         Ok(())
//!     }
//! }
//! ```

mod clock;
mod wait_queue;

use std::error::Error;
use std::fmt;

pub use tai_time::MonotonicTime;

pub use clock::{AutoSystemClock, Clock, NoClock, SyncStatus, SystemClock};
pub(crate) use wait_queue::WaitQueue;

/// Error returned when an actor requests to be fired at an invalid time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulingError {
    /// The requested time lies in the past of the current model time.
    PastTime {
        /// The requested firing time.
        requested: MonotonicTime,
        /// The model time when the request was made.
        current: MonotonicTime,
    },
    /// The director has no notion of time progress.
    Untimed,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PastTime { requested, current } => write!(
                fmt,
                "the requested firing time ({:?}) lies in the past of the current model time ({:?})",
                requested, current
            ),
            Self::Untimed => fmt.write_str("the director does not support timed firing requests"),
        }
    }
}

impl Error for SchedulingError {}
