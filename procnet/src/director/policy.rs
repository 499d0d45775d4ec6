//! Deadlock classification strategies.

use std::fmt;
use std::sync::MutexGuard;

use tracing::warn;

use crate::time::{Clock, MonotonicTime, SyncStatus};

use super::shared::{BlockCounts, Shared, State};
use super::ExecutionError;

/// The kind of a deadlock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeadlockKind {
    /// All active actors are blocked on reads: execution is complete.
    Real,
    /// At least one actor is blocked on a write to a full receiver.
    Artificial,
    /// No actor is blocked on a write and at least one waits for model time
    /// to advance.
    Timed,
}

impl fmt::Display for DeadlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => f.write_str("real"),
            Self::Artificial => f.write_str("artificial"),
            Self::Timed => f.write_str("timed"),
        }
    }
}

/// A strategy used by the coordinating thread to classify deadlocks and to
/// break timed deadlocks.
///
/// Artificial and real deadlocks are resolved identically by all directors;
/// only the notion of time differs between strategies.
pub(crate) trait DeadlockPolicy: Send {
    /// Whether actors may suspend themselves until a future model time.
    fn is_timed(&self) -> bool;

    /// Classifies a deadlock from the blocked-actor counts.
    fn classify(&self, counts: &BlockCounts) -> DeadlockKind;

    /// Breaks a timed deadlock.
    ///
    /// The lock may be released and re-acquired in the process. Returns the
    /// new model time and the number of released actors, or `None` if the
    /// network started terminating while the lock was released.
    fn resolve_timed<'a>(
        &mut self,
        shared: &'a Shared,
        state: MutexGuard<'a, State>,
    ) -> Result<(MutexGuard<'a, State>, Option<(MonotonicTime, usize)>), ExecutionError>;
}

/// Strategy of the untimed director.
#[derive(Debug, Default)]
pub(crate) struct Untimed;

impl DeadlockPolicy for Untimed {
    fn is_timed(&self) -> bool {
        false
    }

    fn classify(&self, counts: &BlockCounts) -> DeadlockKind {
        if counts.write > 0 {
            DeadlockKind::Artificial
        } else {
            DeadlockKind::Real
        }
    }

    fn resolve_timed<'a>(
        &mut self,
        _: &'a Shared,
        _: MutexGuard<'a, State>,
    ) -> Result<(MutexGuard<'a, State>, Option<(MonotonicTime, usize)>), ExecutionError> {
        Err(ExecutionError::Inconsistency(
            "timed deadlock detected by an untimed director",
        ))
    }
}

/// Strategy of the timed director.
pub(crate) struct Timed {
    clock: Box<dyn Clock>,
}

impl Timed {
    pub(crate) fn new(clock: Box<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl DeadlockPolicy for Timed {
    fn is_timed(&self) -> bool {
        true
    }

    fn classify(&self, counts: &BlockCounts) -> DeadlockKind {
        if counts.write > 0 {
            DeadlockKind::Artificial
        } else if counts.delay > 0 {
            DeadlockKind::Timed
        } else {
            DeadlockKind::Real
        }
    }

    fn resolve_timed<'a>(
        &mut self,
        shared: &'a Shared,
        state: MutexGuard<'a, State>,
    ) -> Result<(MutexGuard<'a, State>, Option<(MonotonicTime, usize)>), ExecutionError> {
        let next_time = state.waiting.peek_time().ok_or(ExecutionError::Inconsistency(
            "delay-blocked actors without pending firing requests",
        ))?;

        // All actors are blocked, so only a termination can intervene while
        // the clock is being synchronized.
        drop(state);
        if let SyncStatus::OutOfSync(lag) = self.clock.synchronize(next_time) {
            warn!(?lag, "model time lags behind the wall clock");
        }
        let mut state = shared.lock();
        if state.terminating {
            return Ok((state, None));
        }

        let advance = shared.advance_time(&mut state)?;

        Ok((state, Some(advance)))
    }
}

impl fmt::Debug for Timed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timed").finish_non_exhaustive()
    }
}
