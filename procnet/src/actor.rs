//! Actor instantiation.
//!
//! An actor is a sequential unit of computation that runs on its own thread
//! and communicates with other actors exclusively through the
//! [`Input`](crate::channel::Input) and [`Output`](crate::channel::Output)
//! endpoints it owns.
//!
//! Once the network is initialized, the thread of each actor calls
//! [`Actor::initialize()`] once, then repeatedly calls [`Actor::prefire()`],
//! [`Actor::fire()`] and [`Actor::postfire()`] until `postfire` returns
//! `false`, an error is returned or the network terminates.
//!
//! # Examples
//!
//! An actor that doubles each incoming token:
//!
//! ```
//! use procnet::actor::{Actor, ActorError, Context};
//! use procnet::channel::{Input, Output};
//!
//! pub struct Doubler {
//!     input: Input<f64>,
//!     output: Output<f64>,
//! }
//!
//! impl Actor for Doubler {
//!     fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
//!         let value = self.input.get()?;
//!         self.output.put(2.0 * value)?;
//!
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Termination of the network is signaled to blocked calls by a [`Terminate`]
//! error. Propagating it with `?` unwinds the actor loop, after which the
//! actor thread exits cleanly.
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::director::{ActorId, Shared};
use crate::time::{MonotonicTime, SchedulingError};

/// Boxed error type raised by actors.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Trait to be implemented by process network actors.
///
/// Only [`fire()`](Actor::fire) is mandatory: by default an actor has nothing
/// to initialize, is always ready to fire and keeps iterating forever.
pub trait Actor: Send + 'static {
    /// Called once on the actor thread before the first iteration.
    fn initialize(&mut self, cx: &Context) -> Result<(), ActorError> {
        let _ = cx;

        Ok(())
    }

    /// Checks whether the actor is ready to fire.
    ///
    /// When `false` is returned, `fire` and `postfire` are skipped and the
    /// iteration is attempted again.
    fn prefire(&mut self, cx: &Context) -> Result<bool, ActorError> {
        let _ = cx;

        Ok(true)
    }

    /// Performs one iteration of the actor.
    fn fire(&mut self, cx: &Context) -> Result<(), ActorError>;

    /// Concludes an iteration; returning `false` terminates the actor.
    fn postfire(&mut self, cx: &Context) -> Result<bool, ActorError> {
        let _ = cx;

        Ok(true)
    }
}

/// Per-actor view of the director.
///
/// A context is handed to every lifecycle call of an actor. It identifies the
/// calling actor to the director, gives access to the model time and lets a
/// timed actor suspend itself until a future model time.
pub struct Context {
    id: ActorId,
    name: String,
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn new(id: ActorId, name: String, shared: Arc<Shared>) -> Self {
        Self { id, name, shared }
    }

    pub(crate) fn id(&self) -> ActorId {
        self.id
    }

    /// Returns the name the actor was registered with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current model time.
    ///
    /// On an untimed director, this is the start time and never changes.
    pub fn time(&self) -> MonotonicTime {
        self.shared.lock().time
    }

    /// Suspends the actor until the model time reaches `time` and returns the
    /// accepted firing time.
    ///
    /// A request for the current model time is accepted immediately. A request
    /// for a time in the past is rejected with
    /// [`SchedulingError::PastTime`], and any request made on an untimed
    /// director is rejected with [`SchedulingError::Untimed`]. A rejection is
    /// fatal: the network is terminated and the error is reported by
    /// [`Director::run()`](crate::director::Director::run) whether or not the
    /// actor propagates it.
    ///
    /// [`ActorError::Terminate`] is returned if the network terminates while
    /// the actor is suspended.
    pub fn fire_at(&self, time: MonotonicTime) -> Result<MonotonicTime, ActorError> {
        self.shared.fire_at(self.id, &self.name, time)
    }

    /// Suspends the actor for the specified model time duration.
    ///
    /// See [`Context::fire_at()`].
    pub fn fire_after(&self, duration: Duration) -> Result<MonotonicTime, ActorError> {
        let time = self.time() + duration;

        self.fire_at(time)
    }

    /// Checks whether the network is terminating.
    ///
    /// Actors that may compute for long stretches without communicating can
    /// poll this to exit early.
    pub fn is_terminating(&self) -> bool {
        self.shared.lock().terminating
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Signal returned by blocking calls when the network terminates.
///
/// This is normal control flow rather than a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Terminate;

impl fmt::Display for Terminate {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("the process network is terminating")
    }
}

impl Error for Terminate {}

/// Error returned by actor lifecycle calls.
#[derive(Debug)]
pub enum ActorError {
    /// The network is terminating; the actor should stop iterating.
    Terminate,
    /// A firing request was rejected.
    Scheduling(SchedulingError),
    /// The actor failed.
    Failed(BoxError),
}

impl ActorError {
    /// Wraps an arbitrary error raised by the actor.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Failed(error.into())
    }
}

impl fmt::Display for ActorError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => Terminate.fmt(fmt),
            Self::Scheduling(e) => e.fmt(fmt),
            Self::Failed(e) => write!(fmt, "actor failure: {}", e),
        }
    }
}

impl Error for ActorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Terminate => None,
            Self::Scheduling(e) => Some(e),
            Self::Failed(e) => Some(&**e),
        }
    }
}

impl From<Terminate> for ActorError {
    fn from(_: Terminate) -> Self {
        Self::Terminate
    }
}

impl From<SchedulingError> for ActorError {
    fn from(e: SchedulingError) -> Self {
        Self::Scheduling(e)
    }
}
