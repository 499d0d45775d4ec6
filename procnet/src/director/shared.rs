//! State shared by the director, the actor threads and the receivers.

use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use crate::actor::{ActorError, Terminate};
use crate::channel::ReceiverTable;
use crate::time::{MonotonicTime, SchedulingError, WaitQueue};

use super::listener::{BlockCause, Listeners, ProcessState};
use super::{ActorId, ExecutionError, Phase};

/// Number of actors blocked on each kind of suspension point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockCounts {
    /// Actors blocked on a read from an empty receiver.
    pub read: usize,
    /// Actors blocked on a write to a full receiver.
    pub write: usize,
    /// Actors waiting for model time to advance.
    pub delay: usize,
}

impl BlockCounts {
    /// Returns the total number of blocked actors.
    pub fn total(&self) -> usize {
        self.read + self.write + self.delay
    }
}

/// The monitor state, protected by a single lock.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) receivers: ReceiverTable,
    pub(crate) counts: BlockCounts,
    /// Number of actor threads that have not exited yet.
    pub(crate) active_actors: usize,
    pub(crate) phase: Phase,
    /// Termination was broadcast to all suspension points.
    pub(crate) terminating: bool,
    /// The first fatal error of the run, if any.
    pub(crate) failure: Option<ExecutionError>,
    /// Whether `fire_at` requests are honored.
    pub(crate) timed: bool,
    /// Current model time.
    pub(crate) time: MonotonicTime,
    /// Pending firing requests.
    pub(crate) waiting: WaitQueue<ActorId>,
    pub(crate) listeners: Listeners,
}

impl State {
    /// Reports a state change of `actor`, if known, to the listeners.
    pub(crate) fn emit(&mut self, actor: Option<ActorId>, process_state: ProcessState) {
        if let Some(actor) = actor {
            self.listeners.emit(actor.0, process_state);
        }
    }

    /// Checks whether all active actors are blocked.
    pub(crate) fn is_deadlocked(&self) -> bool {
        self.active_actors != 0 && self.counts.total() >= self.active_actors
    }

    /// Moves model time forward.
    ///
    /// Moving time backward is an internal error.
    pub(crate) fn set_time(&mut self, time: MonotonicTime) -> Result<(), ExecutionError> {
        if time < self.time {
            return Err(ExecutionError::Inconsistency(
                "attempt to move model time backward",
            ));
        }
        self.time = time;

        Ok(())
    }

    /// Verifies the blocked-count bookkeeping.
    pub(crate) fn check_consistency(&self) -> Result<(), ExecutionError> {
        if self.counts.total() > self.active_actors {
            return Err(ExecutionError::Inconsistency(
                "more blocked actors than active actors",
            ));
        }
        if self.counts.delay != self.waiting.len() {
            return Err(ExecutionError::Inconsistency(
                "delay-blocked count does not match the pending firing requests",
            ));
        }
        if !self.receivers.iter().all(|(_, slot)| slot.is_consistent()) {
            return Err(ExecutionError::Inconsistency(
                "receiver occupancy does not match its pending operations",
            ));
        }

        Ok(())
    }
}

/// A monitor made of the shared state and its condition variables.
pub(crate) struct Shared {
    state: Mutex<State>,
    /// Wakes the coordinating thread.
    coordinator: Condvar,
    /// Wakes actors waiting for model time to advance.
    timeline: Condvar,
}

impl Shared {
    pub(crate) fn new(timed: bool, time: MonotonicTime) -> Self {
        Self {
            state: Mutex::new(State {
                receivers: ReceiverTable::default(),
                counts: BlockCounts::default(),
                active_actors: 0,
                phase: Phase::Idle,
                terminating: false,
                failure: None,
                timed,
                time,
                waiting: WaitQueue::new(),
                listeners: Listeners::default(),
            }),
            coordinator: Condvar::new(),
            timeline: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Blocks the coordinating thread until a deadlock, a termination or the
    /// exit of all actors.
    pub(crate) fn wait_for_deadlock<'a>(
        &'a self,
        mut state: MutexGuard<'a, State>,
    ) -> MutexGuard<'a, State> {
        while !(state.is_deadlocked() || state.terminating || state.active_actors == 0) {
            state = self.coordinator.wait(state).unwrap();
        }

        state
    }

    pub(crate) fn read_block(&self, state: &mut State, actor: Option<ActorId>) {
        state.counts.read += 1;
        state.emit(actor, ProcessState::Blocked(BlockCause::Read));
        self.check_deadlock(state);
    }

    /// Accounts for the release of a reader; `actor` is `None` when the
    /// reader releases itself on termination.
    pub(crate) fn read_unblock(&self, state: &mut State, actor: Option<ActorId>) {
        state.counts.read -= 1;
        state.emit(actor, ProcessState::Running);
    }

    pub(crate) fn write_block(&self, state: &mut State, actor: Option<ActorId>) {
        state.counts.write += 1;
        state.emit(actor, ProcessState::Blocked(BlockCause::Write));
        self.check_deadlock(state);
    }

    /// Accounts for the release of a writer; `actor` is `None` when the
    /// writer releases itself on termination.
    pub(crate) fn write_unblock(&self, state: &mut State, actor: Option<ActorId>) {
        state.counts.write -= 1;
        state.emit(actor, ProcessState::Running);
    }

    pub(crate) fn delay_block(&self, state: &mut State, actor: ActorId) {
        state.counts.delay += 1;
        state.emit(Some(actor), ProcessState::Blocked(BlockCause::Delay));
        self.check_deadlock(state);
    }

    /// Re-evaluates the deadlock predicate and notifies the coordinating
    /// thread if it holds.
    fn check_deadlock(&self, state: &mut State) {
        if state.is_deadlocked() {
            if state.phase == Phase::Active {
                state.phase = Phase::Deadlocked;
            }
            trace!(counts = ?state.counts, active = state.active_actors, "all actors blocked");
            self.coordinator.notify_one();
        }
    }

    /// Broadcasts termination to every suspension point.
    ///
    /// This is idempotent.
    pub(crate) fn terminate_all(&self, state: &mut State) {
        if !state.terminating {
            debug!("terminating all receivers");
        }
        state.terminating = true;
        state.phase = Phase::Terminating;
        for slot in state.receivers.iter_mut() {
            slot.terminate();
        }
        self.timeline.notify_all();
        self.coordinator.notify_all();
    }

    /// Records a fatal error and terminates the network.
    ///
    /// Only the first failure of a run is kept.
    pub(crate) fn fail(&self, state: &mut State, failure: ExecutionError) {
        warn!(error = %failure, "fatal error, stopping the network");
        if state.failure.is_none() {
            state.failure = Some(failure);
        }
        self.terminate_all(state);
    }

    /// Reports the start of an actor thread.
    pub(crate) fn start(&self, id: ActorId) {
        self.lock().emit(Some(id), ProcessState::Running);
    }

    /// Records the exit of an actor thread, together with its fatal error if
    /// any.
    pub(crate) fn retire(&self, id: ActorId, actor: &str, failure: Option<ExecutionError>) {
        let mut state = self.lock();
        if let Some(failure) = failure {
            self.fail(&mut state, failure);
        }
        state.active_actors -= 1;
        state.emit(Some(id), ProcessState::Finished);
        debug!(actor, active = state.active_actors, "actor exited");

        self.check_deadlock(&mut state);
        self.coordinator.notify_one();
    }

    /// Suspends the calling actor until model time reaches `time`.
    ///
    /// A rejected request stops the network even if the actor discards the
    /// error.
    pub(crate) fn fire_at(
        &self,
        actor: ActorId,
        name: &str,
        time: MonotonicTime,
    ) -> Result<MonotonicTime, ActorError> {
        let mut state = self.lock();

        if state.terminating {
            return Err(Terminate.into());
        }
        let rejection = if !state.timed {
            Some(SchedulingError::Untimed)
        } else if time < state.time {
            Some(SchedulingError::PastTime {
                requested: time,
                current: state.time,
            })
        } else {
            None
        };
        if let Some(error) = rejection {
            self.fail(
                &mut state,
                ExecutionError::Scheduling {
                    actor: name.to_owned(),
                    error,
                },
            );
            return Err(error.into());
        }
        if time == state.time {
            return Ok(time);
        }

        let key = state.waiting.insert(time, actor);
        trace!(%actor, ?time, "delay blocked");
        self.delay_block(&mut state, actor);

        while state.time < time && !state.terminating {
            state = self.timeline.wait(state).unwrap();
        }

        if state.time < time {
            // Withdraw the request unless it was released concurrently.
            if state.waiting.delete(key) {
                state.counts.delay -= 1;
            }
            return Err(Terminate.into());
        }

        Ok(state.time)
    }

    /// Moves model time forward and releases every actor whose firing time
    /// is reached.
    ///
    /// Returns the number of released actors.
    pub(crate) fn set_time(
        &self,
        state: &mut State,
        time: MonotonicTime,
    ) -> Result<usize, ExecutionError> {
        state.set_time(time)?;

        let mut released = 0;
        while let Some((_, actor)) = state.waiting.pull_due(time) {
            state.emit(Some(actor), ProcessState::Running);
            released += 1;
        }
        state.counts.delay = state
            .counts
            .delay
            .checked_sub(released)
            .ok_or(ExecutionError::Inconsistency(
                "more firing requests released than delay-blocked actors",
            ))?;

        if released != 0 {
            if state.phase == Phase::Deadlocked {
                state.phase = Phase::Active;
            }
            debug!(?time, released, "model time advanced");
            self.timeline.notify_all();
        }

        Ok(released)
    }

    /// Advances model time to the earliest pending firing request, releasing
    /// together every actor waiting for that time.
    ///
    /// Returns the new time and the number of released actors.
    pub(crate) fn advance_time(
        &self,
        state: &mut State,
    ) -> Result<(MonotonicTime, usize), ExecutionError> {
        let next_time = state.waiting.peek_time().ok_or(ExecutionError::Inconsistency(
            "delay-blocked actors without pending firing requests",
        ))?;
        if next_time < state.time {
            return Err(ExecutionError::Inconsistency(
                "pending firing request lies in the past",
            ));
        }
        let released = self.set_time(state, next_time)?;

        Ok((next_time, released))
    }
}
