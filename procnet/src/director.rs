//! Process network execution.
//!
//! This module contains most notably the [`Director`], which runs and
//! coordinates the actor threads of a network, the [`NetInit`] network
//! builder, as well as the types reporting how a run ended.
//!
//! # Network lifecycle
//!
//! The lifecycle of a process network typically comprises the following
//! stages:
//!
//! 1. creation of a [`NetInit`] builder and of the channels connecting the
//!    actors with [`NetInit::channel()`],
//! 2. instantiation of the actors from the channel endpoints and registration
//!    with [`NetInit::add_actor()`],
//! 3. creation of an untimed [`Director`] with [`NetInit::init()`] or of a
//!    timed one with [`NetInit::init_timed()`],
//! 4. execution with [`Director::execute()`], or step by step with
//!    [`Director::initialize()`], [`Director::run()`] and
//!    [`Director::wrapup()`].
//!
//! A network can be initialized and run again after a wrap-up.
//!
//! # Deadlocks
//!
//! Each actor runs on its own thread. The director keeps track of the number
//! of actors blocked reading an empty channel, writing to a full channel or,
//! for a timed director, waiting for model time to advance. When all active
//! actors are blocked, the coordinating thread classifies the deadlock:
//!
//! * an *artificial* deadlock, where at least one actor is blocked on a
//!   write, is broken by growing the capacity of the write-blocked receiver
//!   with the smallest capacity, choosing the receiver created first among
//!   equals,
//! * a *timed* deadlock, where no actor is blocked on a write but at least one
//!   waits for time, is broken by advancing model time to the earliest
//!   requested firing time and releasing every actor waiting for that time,
//! * a *real* deadlock, where all actors are blocked on reads, is the normal
//!   end of execution: all receivers are terminated and [`Director::run()`]
//!   returns [`Completion::Deadlocked`].
//!
//! The most recent deadlocks are logged in [`Director::deadlocks()`] and
//! counted in [`Director::stats()`].
//!
//! # Observing actors
//!
//! A [`ProcessListener`] registered with [`NetInit::add_listener()`] is
//! notified each time an actor thread starts, blocks, is released or exits.
//!
//! # Termination
//!
//! Termination is broadcast to every receiver and every actor waiting for
//! time. Each blocked call then returns [`Terminate`](crate::actor::Terminate),
//! which the actor propagates to exit its loop. Termination occurs on real
//! deadlock, on a [`StopHandle::stop()`] request, and when an actor fails or
//! panics, in which case the failure is reported by [`Director::run()`].
mod listener;
mod net_init;
mod policy;
mod process;
mod shared;

pub use listener::{BlockCause, ProcessEvent, ProcessListener, ProcessState};
pub use net_init::NetInit;
pub use policy::DeadlockKind;
pub use shared::BlockCounts;
pub(crate) use process::current_actor;
pub(crate) use shared::Shared;

use std::any::Any;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::actor::{Actor, BoxError, Context};
use crate::channel::Capacity;
use crate::time::{MonotonicTime, SchedulingError};

use policy::DeadlockPolicy;

/// Index of an actor in registration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ActorId(usize);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered actor, absent while its thread is running.
struct ActorEntry {
    name: String,
    actor: Option<Box<dyn Actor>>,
}

/// Execution phase of a network.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The network was never initialized.
    Idle,
    /// At least one actor is able to make progress.
    Active,
    /// All active actors are blocked.
    Deadlocked,
    /// The coordinating thread is classifying and resolving a deadlock.
    Resolving,
    /// Termination was broadcast; actor threads are exiting.
    Terminating,
    /// All actor threads have exited.
    Terminated,
}

/// The way a run ended without error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// All remaining actors were blocked on reads.
    Deadlocked(Vec<DeadlockInfo>),
    /// All actors returned from their loop on their own.
    Finished,
    /// Execution was stopped by a [`StopHandle`].
    Stopped,
}

/// A read-blocked channel at the time of a real deadlock.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeadlockInfo {
    /// Name of the channel.
    pub channel: String,
}

/// The action taken to resolve a deadlock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The capacity of a write-blocked channel was grown.
    CapacityIncreased {
        /// Name of the channel.
        channel: String,
        /// The new capacity.
        capacity: Capacity,
    },
    /// Model time was advanced.
    TimeAdvanced {
        /// The new model time.
        time: MonotonicTime,
        /// Number of actors released.
        released: usize,
    },
    /// The network was terminated.
    Terminated,
}

/// A deadlock detected during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadlockRecord {
    /// The kind of deadlock.
    pub kind: DeadlockKind,
    /// Blocked-actor counts at detection time.
    pub counts: BlockCounts,
    /// Number of active actors at detection time.
    pub active_actors: usize,
    /// Model time at detection time.
    pub time: MonotonicTime,
    /// How the deadlock was resolved.
    pub resolution: Resolution,
}

/// Number of deadlock records kept by default.
const DEFAULT_DEADLOCK_HISTORY: usize = 1024;

/// Number of deadlocks resolved during a run, by kind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeadlockStats {
    /// Artificial deadlocks broken by growing a channel.
    pub artificial: usize,
    /// Timed deadlocks broken by advancing model time.
    pub timed: usize,
}

/// Execution environment of a process network.
///
/// A `Director` is created by calling [`NetInit::init()`] or
/// [`NetInit::init_timed()`]. It owns the actors of the network and spawns one
/// thread per actor at initialization. The thread calling [`Director::run()`]
/// becomes the coordinating thread, which resolves deadlocks until execution
/// completes.
pub struct Director {
    shared: Arc<Shared>,
    actors: Vec<ActorEntry>,
    threads: Vec<(usize, JoinHandle<Box<dyn Actor>>)>,
    policy: Box<dyn DeadlockPolicy>,
    start_time: MonotonicTime,
    initialized: bool,
    deadlocks: VecDeque<DeadlockRecord>,
    deadlock_history: usize,
    stats: DeadlockStats,
}

impl Director {
    /// Creates a new `Director`.
    pub(crate) fn new(
        shared: Arc<Shared>,
        actors: Vec<(String, Box<dyn Actor>)>,
        policy: Box<dyn DeadlockPolicy>,
        start_time: MonotonicTime,
        deadlock_history: usize,
    ) -> Self {
        shared
            .lock()
            .listeners
            .set_actor_names(actors.iter().map(|(name, _)| name.clone()).collect());

        Self {
            shared,
            actors: actors
                .into_iter()
                .map(|(name, actor)| ActorEntry {
                    name,
                    actor: Some(actor),
                })
                .collect(),
            threads: Vec::new(),
            policy,
            start_time,
            initialized: false,
            deadlocks: VecDeque::new(),
            deadlock_history,
            stats: DeadlockStats::default(),
        }
    }

    /// Resets all receivers, counters and model time and starts one thread per
    /// actor.
    ///
    /// An error is returned if the network is already initialized and was not
    /// wrapped up, or if a thread could not be spawned. In the latter case,
    /// the network is terminated and should be wrapped up.
    pub fn initialize(&mut self) -> Result<(), ExecutionError> {
        if self.initialized {
            return Err(ExecutionError::InvalidState(
                "the network is already initialized",
            ));
        }
        if self.actors.iter().any(|entry| entry.actor.is_none()) {
            return Err(ExecutionError::InvalidState(
                "an actor was lost by a previous run",
            ));
        }

        {
            let mut state = self.shared.lock();
            for slot in state.receivers.iter_mut() {
                slot.reset();
            }
            state.counts = BlockCounts::default();
            state.active_actors = self.actors.len();
            state.terminating = false;
            state.failure = None;
            state.timed = self.policy.is_timed();
            state.time = self.start_time;
            state.waiting.clear();
            state.phase = Phase::Active;
        }
        self.deadlocks.clear();
        self.stats = DeadlockStats::default();
        self.initialized = true;

        debug!(actors = self.actors.len(), "initializing network");

        let actor_count = self.actors.len();
        for (idx, entry) in self.actors.iter_mut().enumerate() {
            let Some(actor) = entry.actor.take() else {
                continue;
            };
            let cx = Context::new(ActorId(idx), entry.name.clone(), self.shared.clone());
            let shared = self.shared.clone();

            let spawned = thread::Builder::new()
                .name(entry.name.clone())
                .spawn(move || process::run_process(actor, cx, shared));

            match spawned {
                Ok(handle) => self.threads.push((idx, handle)),
                Err(e) => {
                    let mut state = self.shared.lock();
                    // The threads that were never started are not active.
                    state.active_actors -= actor_count - idx;
                    self.shared.terminate_all(&mut state);

                    return Err(ExecutionError::Spawn(e));
                }
            }
        }

        Ok(())
    }

    /// Coordinates the actors until execution completes.
    ///
    /// This method blocks until a real deadlock occurs, all actors exit on
    /// their own, or execution is stopped. Artificial and timed deadlocks are
    /// resolved along the way.
    ///
    /// An error is returned if an actor fails, panics or issues an invalid
    /// firing request, or if an inconsistency is detected in the director's
    /// bookkeeping. Termination is broadcast in all cases.
    pub fn run(&mut self) -> Result<Completion, ExecutionError> {
        if !self.initialized {
            return Err(ExecutionError::InvalidState(
                "the network must be initialized before it is run",
            ));
        }

        let result = self.coordinate();

        let mut state = self.shared.lock();
        self.shared.terminate_all(&mut state);

        result
    }

    /// The coordinating loop.
    fn coordinate(&mut self) -> Result<Completion, ExecutionError> {
        let shared = self.shared.clone();
        let mut state = shared.lock();

        loop {
            state = shared.wait_for_deadlock(state);

            if let Some(failure) = state.failure.take() {
                return Err(failure);
            }
            if state.terminating {
                info!("execution stopped");
                return Ok(Completion::Stopped);
            }
            if state.active_actors == 0 {
                debug!("all actors exited");
                return Ok(Completion::Finished);
            }
            state.check_consistency()?;

            state.phase = Phase::Resolving;
            let counts = state.counts;
            let active_actors = state.active_actors;
            let time = state.time;
            let kind = self.policy.classify(&counts);
            info!(%kind, ?counts, active_actors, "deadlock detected");

            let resolution = match kind {
                DeadlockKind::Artificial => {
                    let id = state.receivers.smallest_write_blocked().ok_or(
                        ExecutionError::Inconsistency(
                            "write-blocked actors without a write-blocked receiver",
                        ),
                    )?;
                    let slot = &mut state.receivers[id];
                    let capacity = slot.grow();
                    slot.write_pending = false;
                    let writer = slot.writer.take();
                    let signal = slot.signal.clone();
                    let channel = slot.name.clone();
                    info!(%channel, %capacity, "channel capacity increased");

                    shared.write_unblock(&mut state, writer);
                    signal.notify_all();
                    state.phase = Phase::Active;

                    Resolution::CapacityIncreased { channel, capacity }
                }
                DeadlockKind::Timed => {
                    let (s, advance) = self.policy.resolve_timed(&shared, state)?;
                    state = s;
                    let Some((time, released)) = advance else {
                        continue;
                    };
                    state.phase = Phase::Active;

                    Resolution::TimeAdvanced { time, released }
                }
                DeadlockKind::Real => {
                    let blocked: Vec<_> = state
                        .receivers
                        .iter()
                        .filter(|(_, slot)| slot.read_pending)
                        .map(|(_, slot)| DeadlockInfo {
                            channel: slot.name.clone(),
                        })
                        .collect();
                    shared.terminate_all(&mut state);

                    self.record(DeadlockRecord {
                        kind,
                        counts,
                        active_actors,
                        time,
                        resolution: Resolution::Terminated,
                    });

                    return Ok(Completion::Deadlocked(blocked));
                }
            };

            self.record(DeadlockRecord {
                kind,
                counts,
                active_actors,
                time,
                resolution,
            });
        }
    }

    /// Counts a deadlock and appends it to the history, evicting the oldest
    /// record when the history is full.
    fn record(&mut self, record: DeadlockRecord) {
        match record.kind {
            DeadlockKind::Artificial => self.stats.artificial += 1,
            DeadlockKind::Timed => self.stats.timed += 1,
            DeadlockKind::Real => {}
        }
        if self.deadlock_history == 0 {
            return;
        }
        if self.deadlocks.len() == self.deadlock_history {
            self.deadlocks.pop_front();
        }
        self.deadlocks.push_back(record);
    }

    /// Terminates the network, waits for all actor threads to exit and takes
    /// the actors back so the network can be initialized again.
    ///
    /// An error is returned if a fatal error occurred that was not already
    /// reported by [`Director::run()`], or if the bookkeeping is inconsistent
    /// once all threads have exited.
    pub fn wrapup(&mut self) -> Result<(), ExecutionError> {
        {
            let mut state = self.shared.lock();
            self.shared.terminate_all(&mut state);
        }

        let mut panic = None;
        for (idx, handle) in self.threads.drain(..) {
            match handle.join() {
                Ok(actor) => self.actors[idx].actor = Some(actor),
                Err(payload) => {
                    panic.get_or_insert(ExecutionError::Panic {
                        actor: self.actors[idx].name.clone(),
                        payload,
                    });
                }
            }
        }
        self.initialized = false;

        let mut state = self.shared.lock();
        state.phase = Phase::Terminated;
        debug!("network wrapped up");

        if let Some(error) = panic.or_else(|| state.failure.take()) {
            return Err(error);
        }
        if state.counts.total() != 0 || state.active_actors != 0 {
            return Err(ExecutionError::Inconsistency(
                "actors still accounted for after all threads exited",
            ));
        }

        Ok(())
    }

    /// Initializes, runs and wraps up the network.
    ///
    /// The first error encountered is returned; the network is wrapped up in
    /// all cases.
    pub fn execute(&mut self) -> Result<Completion, ExecutionError> {
        let result = self.initialize().and_then(|()| self.run());
        let wrapup = self.wrapup();

        let completion = result?;
        wrapup?;

        Ok(completion)
    }

    /// Returns the current model time.
    pub fn time(&self) -> MonotonicTime {
        self.shared.lock().time
    }

    /// Moves model time forward, releasing every actor waiting for a time that
    /// is reached.
    ///
    /// Moving time backward is a fatal error, and so is any attempt to change
    /// the time of an untimed director.
    pub fn set_time(&mut self, time: MonotonicTime) -> Result<(), ExecutionError> {
        if !self.policy.is_timed() {
            return Err(ExecutionError::InvalidState(
                "the model time of an untimed director cannot be changed",
            ));
        }

        let mut state = self.shared.lock();
        if !self.initialized {
            state.set_time(time)?;
            self.start_time = time;

            return Ok(());
        }
        self.shared.set_time(&mut state, time)?;

        Ok(())
    }

    /// Returns the current execution phase.
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Returns the most recent deadlocks detected during the last run, in
    /// detection order.
    ///
    /// Only the last records are kept, as set with
    /// [`NetInit::with_deadlock_history()`].
    pub fn deadlocks(&self) -> &VecDeque<DeadlockRecord> {
        &self.deadlocks
    }

    /// Returns the number of deadlocks resolved during the last run.
    ///
    /// Unlike [`Director::deadlocks()`], this counts every deadlock.
    pub fn stats(&self) -> DeadlockStats {
        self.stats
    }

    /// Checks whether this director supports timed firing requests.
    pub fn is_timed(&self) -> bool {
        self.policy.is_timed()
    }

    /// Returns a handle that can stop the current run from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for Director {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            {
                let mut state = self.shared.lock();
                self.shared.terminate_all(&mut state);
            }
            for (_, handle) in self.threads.drain(..) {
                let _ = handle.join();
            }
        }
    }
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("timed", &self.policy.is_timed())
            .field("actors", &self.actors.len())
            .field("time", &self.time())
            .finish_non_exhaustive()
    }
}

/// A handle to stop the execution of a network from any thread.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Requests termination of the current run.
    ///
    /// Termination is broadcast to all blocked actors and
    /// [`Director::run()`] returns [`Completion::Stopped`]. A request made
    /// before the network is initialized is discarded by the initialization.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if !state.terminating {
            info!("stop requested");
        }
        self.shared.terminate_all(&mut state);
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle").finish_non_exhaustive()
    }
}

/// A fatal error that stopped the execution of a network.
pub enum ExecutionError {
    /// An actor returned an error.
    Actor {
        /// Name of the actor.
        actor: String,
        /// The error raised by the actor.
        error: BoxError,
    },
    /// An actor issued an invalid firing request.
    Scheduling {
        /// Name of the actor.
        actor: String,
        /// The rejected request.
        error: SchedulingError,
    },
    /// An actor panicked.
    Panic {
        /// Name of the actor.
        actor: String,
        /// The panic payload.
        payload: Box<dyn Any + Send + 'static>,
    },
    /// The director bookkeeping is inconsistent.
    Inconsistency(&'static str),
    /// The operation is not valid in the current state of the director.
    InvalidState(&'static str),
    /// An actor thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Debug for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor { actor, error } => f
                .debug_struct("Actor")
                .field("actor", actor)
                .field("error", error)
                .finish(),
            Self::Scheduling { actor, error } => f
                .debug_struct("Scheduling")
                .field("actor", actor)
                .field("error", error)
                .finish(),
            Self::Panic { actor, .. } => f
                .debug_struct("Panic")
                .field("actor", actor)
                .finish_non_exhaustive(),
            Self::Inconsistency(msg) => f.debug_tuple("Inconsistency").field(msg).finish(),
            Self::InvalidState(msg) => f.debug_tuple("InvalidState").field(msg).finish(),
            Self::Spawn(e) => f.debug_tuple("Spawn").field(e).finish(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor { actor, error } => write!(f, "actor '{}' failed: {}", actor, error),
            Self::Scheduling { actor, error } => {
                write!(f, "actor '{}' issued an invalid firing request: {}", actor, error)
            }
            Self::Panic { actor, .. } => write!(f, "actor '{}' panicked", actor),
            Self::Inconsistency(msg) => write!(f, "internal inconsistency: {}", msg),
            Self::InvalidState(msg) => f.write_str(msg),
            Self::Spawn(e) => write!(f, "could not spawn an actor thread: {}", e),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Actor { error, .. } => Some(&**error),
            Self::Scheduling { error, .. } => Some(error),
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}
