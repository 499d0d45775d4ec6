use std::fmt;
use std::sync::Arc;

use crate::actor::Actor;
use crate::channel::{Capacity, Input, Output, ReceiverSlot};
use crate::time::{Clock, MonotonicTime, NoClock};

use super::listener::ProcessListener;
use super::policy::{Timed, Untimed};
use super::{Director, Shared, DEFAULT_DEADLOCK_HISTORY};

/// Builder for a process network.
///
/// Channels are created first so that their endpoints can be moved into the
/// actors, which are then registered in the order in which their threads will
/// be spawned.
///
/// Channel creation borrows the builder mutably because it returns the
/// endpoints to the caller, who needs them to construct the actors before any
/// actor can be added. All other methods configure the network and consume the
/// builder so they can be chained:
///
/// ```
/// # use procnet::actor::{Actor, ActorError, Context};
/// # use procnet::channel::{Input, Output};
/// # struct Producer(Output<u8>);
/// # impl Actor for Producer {
/// #     fn fire(&mut self, _: &Context) -> Result<(), ActorError> { Ok(self.0.put(1)?) }
/// #     fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> { Ok(false) }
/// # }
/// # struct Consumer(Input<u8>);
/// # impl Actor for Consumer {
/// #     fn fire(&mut self, _: &Context) -> Result<(), ActorError> { self.0.get()?; Ok(()) }
/// # }
/// use procnet::channel::Capacity;
/// use procnet::director::NetInit;
///
/// // Channels first.
/// let mut net = NetInit::new().with_initial_capacity(Capacity::Bounded(4));
/// let (output, input) = net.channel("bytes");
///
/// // Then actors and configuration.
/// let director = net
///     .add_actor(Producer(output), "producer")
///     .add_actor(Consumer(input), "consumer")
///     .init();
/// ```
pub struct NetInit {
    shared: Arc<Shared>,
    actors: Vec<(String, Box<dyn Actor>)>,
    initial_capacity: Capacity,
    clock: Box<dyn Clock + 'static>,
    deadlock_history: usize,
}

impl NetInit {
    /// Creates a builder for an empty network.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new(false, MonotonicTime::EPOCH)),
            actors: Vec::new(),
            initial_capacity: Capacity::DEFAULT,
            clock: Box::new(NoClock::new()),
            deadlock_history: DEFAULT_DEADLOCK_HISTORY,
        }
    }

    /// Sets the capacity of the channels subsequently created with
    /// [`NetInit::channel()`].
    ///
    /// If not set, a capacity of one token is used.
    pub fn with_initial_capacity(mut self, capacity: Capacity) -> Self {
        self.initial_capacity = capacity;

        self
    }

    /// Creates a channel with the initial capacity of the builder and returns
    /// its endpoints.
    ///
    /// The `name` argument needs not be unique but is used to identify the
    /// channel in logs and deadlock reports. Channels are enumerated in
    /// creation order whenever the director needs a deterministic choice.
    pub fn channel<T: Send + 'static>(
        &mut self,
        name: impl Into<String>,
    ) -> (Output<T>, Input<T>) {
        let capacity = self.initial_capacity;

        self.channel_with_capacity(name, capacity)
    }

    /// Creates a channel with the specified initial capacity and returns its
    /// endpoints.
    pub fn channel_with_capacity<T: Send + 'static>(
        &mut self,
        name: impl Into<String>,
        capacity: Capacity,
    ) -> (Output<T>, Input<T>) {
        let id = self
            .shared
            .lock()
            .receivers
            .push(ReceiverSlot::new::<T>(name.into(), capacity));

        (
            Output::new(id, self.shared.clone()),
            Input::new(id, self.shared.clone()),
        )
    }

    /// Adds an actor to the network.
    ///
    /// The `name` argument needs not be unique; it names the actor thread and
    /// identifies the actor in logs and error reports.
    pub fn add_actor(mut self, actor: impl Actor, name: impl Into<String>) -> Self {
        self.actors.push((name.into(), Box::new(actor)));

        self
    }

    /// Registers a listener notified of every state change of the actor
    /// threads.
    ///
    /// See [`ProcessListener`] for the restrictions that apply to listeners.
    pub fn add_listener(self, listener: impl ProcessListener) -> Self {
        self.shared.lock().listeners.push(Box::new(listener));

        self
    }

    /// Sets the number of deadlock records kept by
    /// [`Director::deadlocks()`].
    ///
    /// Older records are discarded first. If not set, the last 1024 deadlocks
    /// are kept. [`Director::stats()`] counts all deadlocks regardless.
    pub fn with_deadlock_history(mut self, len: usize) -> Self {
        self.deadlock_history = len;

        self
    }

    /// Synchronizes model time with the provided [`Clock`] at each time
    /// advance of a timed director.
    ///
    /// If the clock isn't explicitly set then the default [`NoClock`] is used,
    /// resulting in the network running as fast as possible. The clock is
    /// ignored by untimed directors.
    pub fn set_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);

        self
    }

    /// Builds an untimed director.
    ///
    /// Actors of an untimed network cannot suspend themselves on model time.
    pub fn init(self) -> Director {
        let start_time = self.shared.lock().time;

        Director::new(
            self.shared,
            self.actors,
            Box::new(Untimed),
            start_time,
            self.deadlock_history,
        )
    }

    /// Builds a timed director whose model time starts at `start_time`.
    pub fn init_timed(self, start_time: MonotonicTime) -> Director {
        {
            let mut state = self.shared.lock();
            state.timed = true;
            state.time = start_time;
        }

        Director::new(
            self.shared,
            self.actors,
            Box::new(Timed::new(self.clock)),
            start_time,
            self.deadlock_history,
        )
    }
}

impl Default for NetInit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NetInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetInit")
            .field("actors", &self.actors.len())
            .field("initial_capacity", &self.initial_capacity)
            .field("deadlock_history", &self.deadlock_history)
            .finish_non_exhaustive()
    }
}
