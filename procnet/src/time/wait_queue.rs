//! Time-ordered queue of pending firing requests.

use std::collections::BTreeMap;

use super::MonotonicTime;

/// A queue of values ordered by wake-up time.
///
/// Values with the same wake-up time are pulled in insertion order, which
/// makes the release order of simultaneous waiters reproducible. Each
/// insertion returns a unique [`WaitKey`] that can later be used to withdraw
/// the entry, for instance when a waiting actor observes termination before
/// its wake-up time was reached.
#[derive(Debug)]
pub(crate) struct WaitQueue<V> {
    entries: BTreeMap<WaitKey, V>,
    next_epoch: u64,
}

impl<V> WaitQueue<V> {
    /// Creates an empty `WaitQueue`.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_epoch: 0,
        }
    }

    /// Returns the number of pending entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts a value to be woken at the specified time and returns a unique
    /// key for the entry.
    pub(crate) fn insert(&mut self, time: MonotonicTime, value: V) -> WaitKey {
        let epoch = self.next_epoch;
        assert_ne!(epoch, u64::MAX);
        self.next_epoch += 1;

        let key = WaitKey { time, epoch };
        self.entries.insert(key, value);

        key
    }

    /// Returns the earliest wake-up time, if any.
    pub(crate) fn peek_time(&self) -> Option<MonotonicTime> {
        self.entries.keys().next().map(|key| key.time)
    }

    /// Pulls the entry with the earliest wake-up time.
    ///
    /// If several entries share the earliest time, the one inserted first is
    /// returned.
    pub(crate) fn pull(&mut self) -> Option<(MonotonicTime, V)> {
        self.entries
            .pop_first()
            .map(|(key, value)| (key.time, value))
    }

    /// Pulls the earliest entry only if its wake-up time is not later than
    /// `time`.
    pub(crate) fn pull_due(&mut self, time: MonotonicTime) -> Option<(MonotonicTime, V)> {
        if self.peek_time()? > time {
            return None;
        }

        self.pull()
    }

    /// Withdraws the entry associated to the key if it is still queued.
    ///
    /// Returns `true` if the entry was indeed in the queue.
    pub(crate) fn delete(&mut self, key: WaitKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Removes all entries.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A unique insertion key made of the wake-up time complemented by an epoch.
///
/// The derived `Ord` sorts by time first, then by insertion epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct WaitKey {
    time: MonotonicTime,
    epoch: u64,
}
