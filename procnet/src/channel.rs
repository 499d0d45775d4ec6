//! Blocking FIFO channels between actors.
//!
//! A channel is created with [`NetInit::channel()`](crate::director::NetInit::channel)
//! and consists of an [`Output`] endpoint owned by the producing actor and an
//! [`Input`] endpoint owned by the consuming actor. Tokens are delivered in the
//! exact order they were put.
//!
//! Each channel is backed by a receiver with a mutable [`Capacity`]:
//!
//! * [`Output::put()`] blocks while the receiver is full,
//! * [`Input::get()`] blocks while the receiver is empty.
//!
//! A blocked call registers itself with the director, which uses these
//! registrations to detect deadlocks. When all actors are blocked and at least
//! one of them is blocked on a write, the director grows the capacity of the
//! smallest write-blocked receiver, which is the only mechanism by which a
//! capacity ever changes during a run.
//!
//! Both calls return [`Terminate`] once the network is being torn down, which
//! an actor is expected to propagate with `?`.
mod slot;

pub(crate) use slot::{ReceiverId, ReceiverSlot, ReceiverTable};

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::actor::Terminate;
use crate::director::{current_actor, Shared};

/// The capacity of a receiver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capacity {
    /// The receiver holds at most the specified number of tokens.
    Bounded(usize),
    /// The receiver never blocks a writer.
    Unbounded,
}

impl Capacity {
    /// The capacity given to channels when none is configured.
    pub const DEFAULT: Capacity = Capacity::Bounded(1);

    /// Converts the integer convention where `-1` stands for an unbounded
    /// capacity.
    ///
    /// Returns `None` for any other negative value.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -1 => Some(Self::Unbounded),
            n => usize::try_from(n).ok().map(Self::Bounded),
        }
    }

    /// Returns the bound, or `None` if the capacity is unbounded.
    pub fn bound(&self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(*n),
            Self::Unbounded => None,
        }
    }

    /// Checks whether a receiver holding `occupancy` tokens can accept one
    /// more.
    pub fn has_room(&self, occupancy: usize) -> bool {
        match self {
            Self::Bounded(n) => occupancy < *n,
            Self::Unbounded => true,
        }
    }

    /// Returns the capacity after one growth step.
    pub(crate) fn grown(self) -> Self {
        match self {
            Self::Bounded(0) => Self::Bounded(1),
            Self::Bounded(n) => Self::Bounded(n + 1),
            Self::Unbounded => Self::Unbounded,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{}", n),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Handle to a receiver shared by both endpoints.
struct Channel<T> {
    id: ReceiverId,
    shared: Arc<Shared>,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T: Send + 'static> Channel<T> {
    fn capacity(&self) -> Capacity {
        self.shared.lock().receivers[self.id].capacity
    }

    fn occupancy(&self) -> usize {
        self.shared.lock().receivers[self.id].occupancy()
    }

    fn name(&self) -> String {
        self.shared.lock().receivers[self.id].name.clone()
    }
}

/// The producing endpoint of a channel.
pub struct Output<T> {
    channel: Channel<T>,
}

impl<T: Send + 'static> Output<T> {
    pub(crate) fn new(id: ReceiverId, shared: Arc<Shared>) -> Self {
        Self {
            channel: Channel {
                id,
                shared,
                _phantom: PhantomData,
            },
        }
    }

    /// Appends a token to the tail of the channel, if necessary waiting until
    /// the receiver has room for it.
    ///
    /// If the reader was blocked on this channel, it is woken up.
    ///
    /// An error is returned if the network terminates while the call is
    /// pending or before it was made.
    pub fn put(&self, token: T) -> Result<(), Terminate> {
        let shared = &*self.channel.shared;
        let id = self.channel.id;
        let mut state = shared.lock();

        loop {
            let slot = &mut state.receivers[id];
            if slot.terminated {
                if slot.write_pending {
                    slot.write_pending = false;
                    slot.writer = None;
                    shared.write_unblock(&mut state, None);
                }
                return Err(Terminate);
            }
            if slot.capacity.has_room(slot.occupancy()) {
                break;
            }

            slot.write_pending = true;
            let writer = current_actor();
            slot.writer = writer;
            let signal = slot.signal.clone();
            trace!(channel = %slot.name, "write blocked");
            shared.write_block(&mut state, writer);

            while state.receivers[id].write_pending && !state.receivers[id].terminated {
                state = signal.wait(state).unwrap();
            }
        }

        let slot = &mut state.receivers[id];
        slot.tokens::<T>().push_back(token);

        if slot.read_pending {
            slot.read_pending = false;
            let reader = slot.reader.take();
            let signal = slot.signal.clone();
            trace!(channel = %slot.name, "reader unblocked");
            shared.read_unblock(&mut state, reader);
            signal.notify_all();
        }

        Ok(())
    }

    /// Returns the current capacity of the channel.
    pub fn capacity(&self) -> Capacity {
        self.channel.capacity()
    }

    /// Returns the number of tokens currently queued in the channel.
    pub fn occupancy(&self) -> usize {
        self.channel.occupancy()
    }

    /// Returns the name of the channel.
    pub fn name(&self) -> String {
        self.channel.name()
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("channel", &self.channel.id)
            .finish_non_exhaustive()
    }
}

/// The consuming endpoint of a channel.
pub struct Input<T> {
    channel: Channel<T>,
}

impl<T: Send + 'static> Input<T> {
    pub(crate) fn new(id: ReceiverId, shared: Arc<Shared>) -> Self {
        Self {
            channel: Channel {
                id,
                shared,
                _phantom: PhantomData,
            },
        }
    }

    /// Removes and returns the oldest token of the channel, if necessary
    /// waiting until one becomes available.
    ///
    /// If the writer was blocked on this channel, it is woken up.
    ///
    /// An error is returned if the network terminates while the call is
    /// pending or before it was made, even if tokens are still queued.
    pub fn get(&self) -> Result<T, Terminate> {
        let shared = &*self.channel.shared;
        let id = self.channel.id;
        let mut state = shared.lock();

        let token = loop {
            let slot = &mut state.receivers[id];
            if slot.terminated {
                if slot.read_pending {
                    slot.read_pending = false;
                    slot.reader = None;
                    shared.read_unblock(&mut state, None);
                }
                return Err(Terminate);
            }
            if let Some(token) = slot.tokens::<T>().pop_front() {
                break token;
            }

            slot.read_pending = true;
            let reader = current_actor();
            slot.reader = reader;
            let signal = slot.signal.clone();
            trace!(channel = %slot.name, "read blocked");
            shared.read_block(&mut state, reader);

            while state.receivers[id].read_pending && !state.receivers[id].terminated {
                state = signal.wait(state).unwrap();
            }
        };

        let slot = &mut state.receivers[id];
        if slot.write_pending {
            slot.write_pending = false;
            let writer = slot.writer.take();
            let signal = slot.signal.clone();
            trace!(channel = %slot.name, "writer unblocked");
            shared.write_unblock(&mut state, writer);
            signal.notify_all();
        }

        Ok(token)
    }

    /// Returns the current capacity of the channel.
    pub fn capacity(&self) -> Capacity {
        self.channel.capacity()
    }

    /// Returns the number of tokens currently queued in the channel.
    pub fn occupancy(&self) -> usize {
        self.channel.occupancy()
    }

    /// Returns the name of the channel.
    pub fn name(&self) -> String {
        self.channel.name()
    }
}

impl<T> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("channel", &self.channel.id)
            .finish_non_exhaustive()
    }
}

/// Type-erased token storage of a receiver.
pub(crate) trait TokenQueue: Send {
    /// Number of queued tokens.
    fn len(&self) -> usize;
    /// Drops all queued tokens.
    fn clear(&mut self);
    /// Gives access to the concrete `VecDeque<T>`.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

impl<T: Send + 'static> TokenQueue for VecDeque<T> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }
    fn clear(&mut self) {
        VecDeque::clear(self)
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
