//! Receiver bookkeeping held under the director lock.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::{Arc, Condvar};

use crate::director::ActorId;

use super::{Capacity, TokenQueue};

/// Index of a receiver in creation order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ReceiverId(usize);

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The state of a single receiver.
///
/// Invariants, maintained under the director lock:
///
/// * `occupancy() <= capacity` unless unbounded,
/// * `read_pending` implies `occupancy() == 0`,
/// * `write_pending` implies `occupancy() == capacity`.
pub(crate) struct ReceiverSlot {
    pub(crate) name: String,
    /// Capacity restored at each initialization.
    pub(crate) initial_capacity: Capacity,
    pub(crate) capacity: Capacity,
    /// A reader is blocked on this receiver.
    pub(crate) read_pending: bool,
    /// A writer is blocked on this receiver.
    pub(crate) write_pending: bool,
    /// The blocked reader, when it runs on an actor thread.
    pub(crate) reader: Option<ActorId>,
    /// The blocked writer, when it runs on an actor thread.
    pub(crate) writer: Option<ActorId>,
    pub(crate) terminated: bool,
    /// Signals the threads blocked on this receiver.
    pub(crate) signal: Arc<Condvar>,
    tokens: Box<dyn TokenQueue>,
}

impl ReceiverSlot {
    pub(crate) fn new<T: Send + 'static>(name: String, capacity: Capacity) -> Self {
        Self {
            name,
            initial_capacity: capacity,
            capacity,
            read_pending: false,
            write_pending: false,
            reader: None,
            writer: None,
            terminated: false,
            signal: Arc::new(Condvar::new()),
            tokens: Box::new(VecDeque::<T>::new()),
        }
    }

    pub(crate) fn occupancy(&self) -> usize {
        self.tokens.len()
    }

    /// Checks the occupancy against the capacity and the pending operations.
    pub(crate) fn is_consistent(&self) -> bool {
        let occupancy = self.occupancy();
        let bound = self.capacity.bound();

        bound.map_or(true, |bound| occupancy <= bound)
            && (!self.read_pending || occupancy == 0)
            && (!self.write_pending || bound == Some(occupancy))
    }

    /// Returns the typed token queue.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the token type the slot was created with, which
    /// cannot happen through the typed endpoints.
    pub(crate) fn tokens<T: Send + 'static>(&mut self) -> &mut VecDeque<T> {
        self.tokens
            .as_any_mut()
            .downcast_mut::<VecDeque<T>>()
            .expect("channel endpoint used with a foreign token type")
    }

    /// Grows the capacity by one step and returns the new capacity.
    pub(crate) fn grow(&mut self) -> Capacity {
        self.capacity = self.capacity.grown();

        self.capacity
    }

    /// Sets the receiver as terminated and wakes up all blocked threads.
    ///
    /// This is idempotent.
    pub(crate) fn terminate(&mut self) {
        self.terminated = true;
        self.signal.notify_all();
    }

    /// Restores the state of a freshly created receiver.
    pub(crate) fn reset(&mut self) {
        self.tokens.clear();
        self.capacity = self.initial_capacity;
        self.read_pending = false;
        self.write_pending = false;
        self.reader = None;
        self.writer = None;
        self.terminated = false;
    }
}

impl fmt::Debug for ReceiverSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverSlot")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("occupancy", &self.occupancy())
            .field("read_pending", &self.read_pending)
            .field("write_pending", &self.write_pending)
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// All receivers of a network, enumerated in creation order.
#[derive(Debug, Default)]
pub(crate) struct ReceiverTable(Vec<ReceiverSlot>);

impl ReceiverTable {
    pub(crate) fn push(&mut self, slot: ReceiverSlot) -> ReceiverId {
        let id = ReceiverId(self.0.len());
        self.0.push(slot);

        id
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ReceiverId, &ReceiverSlot)> {
        self.0.iter().enumerate().map(|(i, slot)| (ReceiverId(i), slot))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ReceiverSlot> {
        self.0.iter_mut()
    }

    /// Returns the write-blocked receiver with the smallest capacity.
    ///
    /// Ties are broken in favor of the receiver created first.
    pub(crate) fn smallest_write_blocked(&self) -> Option<ReceiverId> {
        self.iter()
            .filter(|(_, slot)| slot.write_pending)
            .min_by_key(|(_, slot)| slot.capacity.bound().unwrap_or(usize::MAX))
            .map(|(id, _)| id)
    }
}

impl Index<ReceiverId> for ReceiverTable {
    type Output = ReceiverSlot;

    fn index(&self, id: ReceiverId) -> &ReceiverSlot {
        &self.0[id.0]
    }
}

impl IndexMut<ReceiverId> for ReceiverTable {
    fn index_mut(&mut self, id: ReceiverId) -> &mut ReceiverSlot {
        &mut self.0[id.0]
    }
}
