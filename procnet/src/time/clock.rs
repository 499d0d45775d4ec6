use std::time::{Duration, Instant};

use tai_time::MonotonicClock;

use crate::time::MonotonicTime;

/// Paces model time against an external time source.
///
/// The timed director hands each new model time to its clock before releasing
/// the actors waiting for it, so a clock that blocks slows the whole network
/// down to its own pace. Without a clock, time advances as soon as a timed
/// deadlock is detected.
///
/// See [`NetInit::set_clock()`](crate::director::NetInit::set_clock).
pub trait Clock: Send {
    /// Waits until `deadline` is reached by the clock.
    fn synchronize(&mut self, deadline: MonotonicTime) -> SyncStatus;
}

/// Outcome of [`Clock::synchronize()`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// The deadline was met.
    Synchronized,
    /// The clock was already past the deadline, by the given duration.
    OutOfSync(Duration),
}

/// The default clock, which never waits.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoClock {}

impl NoClock {
    /// Creates the clock.
    pub fn new() -> Self {
        Self {}
    }
}

impl Clock for NoClock {
    fn synchronize(&mut self, _: MonotonicTime) -> SyncStatus {
        SyncStatus::Synchronized
    }
}

/// A clock running in lockstep with the system's monotonic clock.
///
/// # Examples
///
/// Start a network at model time `t0` one second from now, then let each
/// second of model time last one wall-clock second:
///
/// ```
/// use std::time::{Duration, Instant};
///
/// use procnet::director::NetInit;
/// use procnet::time::{MonotonicTime, SystemClock};
///
/// let t0 = MonotonicTime::new(1_234_567_890, 0).unwrap();
/// let clock = SystemClock::from_instant(t0, Instant::now() + Duration::from_secs(1));
///
/// let director = NetInit::new().set_clock(clock).init_timed(t0);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct SystemClock(MonotonicClock);

impl SystemClock {
    /// Creates a clock where model time `model_ref` falls on the wall-clock
    /// instant `wall_clock_ref`, which may be in the past or in the future.
    pub fn from_instant(model_ref: MonotonicTime, wall_clock_ref: Instant) -> Self {
        Self(MonotonicClock::init_from_instant(model_ref, wall_clock_ref))
    }
}

impl Clock for SystemClock {
    /// Sleeps until the wall clock reaches `deadline`; a late deadline is
    /// reported with the lag and does not sleep.
    fn synchronize(&mut self, deadline: MonotonicTime) -> SyncStatus {
        let now = self.0.now();
        if now > deadline {
            return SyncStatus::OutOfSync(now.duration_since(deadline));
        }
        spin_sleep::sleep(deadline.duration_since(now));

        SyncStatus::Synchronized
    }
}

/// A [`SystemClock`] anchored at the first time advance.
///
/// The first call to [`synchronize()`](Clock::synchronize) returns at once and
/// matches its deadline with the current instant. Later calls behave as with a
/// [`SystemClock`], so a network spends no wall-clock time reaching its first
/// firing time.
#[derive(Copy, Clone, Debug, Default)]
pub struct AutoSystemClock {
    inner: Option<SystemClock>,
}

impl AutoSystemClock {
    /// Creates a clock that is anchored on first use.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for AutoSystemClock {
    fn synchronize(&mut self, deadline: MonotonicTime) -> SyncStatus {
        match &mut self.inner {
            Some(clock) => clock.synchronize(deadline),
            None => {
                self.inner = Some(SystemClock::from_instant(deadline, Instant::now()));

                SyncStatus::Synchronized
            }
        }
    }
}
