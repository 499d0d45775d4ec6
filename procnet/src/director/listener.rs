//! Observation of actor state changes.

use std::fmt;

/// The suspension point an actor is blocked on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockCause {
    /// A read from an empty channel.
    Read,
    /// A write to a full channel.
    Write,
    /// A firing request for a future model time.
    Delay,
}

/// State of an actor thread as tracked by the director.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// The actor thread started or was released from a suspension point.
    Running,
    /// The actor is suspended.
    Blocked(BlockCause),
    /// The actor thread exited.
    Finished,
}

/// A state change of an actor thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessEvent {
    /// Name of the actor.
    pub actor: String,
    /// The new state.
    pub state: ProcessState,
}

/// An observer of actor state changes.
///
/// Listeners are registered with
/// [`NetInit::add_listener()`](super::NetInit::add_listener) and called
/// synchronously, under the director lock, in the order in which state changes
/// are accounted for. A listener must therefore return quickly and must not
/// use channel endpoints, firing requests or the director.
///
/// A release is reported by the thread that caused it, so the `Running` event
/// of an unblocked actor always follows the `Blocked` event that preceded it.
/// Actors woken by termination do not report `Running` before `Finished`.
pub trait ProcessListener: Send + 'static {
    /// Called on each state change.
    fn process_state_changed(&mut self, event: &ProcessEvent);
}

impl<F> ProcessListener for F
where
    F: FnMut(&ProcessEvent) + Send + 'static,
{
    fn process_state_changed(&mut self, event: &ProcessEvent) {
        self(event)
    }
}

/// The registered listeners and the names they report.
#[derive(Default)]
pub(crate) struct Listeners {
    listeners: Vec<Box<dyn ProcessListener>>,
    actor_names: Vec<String>,
}

impl Listeners {
    pub(crate) fn push(&mut self, listener: Box<dyn ProcessListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn set_actor_names(&mut self, names: Vec<String>) {
        self.actor_names = names;
    }

    /// Notifies all listeners of a state change of the actor at `index`.
    ///
    /// Unknown actors are ignored.
    pub(crate) fn emit(&mut self, index: usize, state: ProcessState) {
        if self.listeners.is_empty() {
            return;
        }
        let Some(actor) = self.actor_names.get(index) else {
            return;
        };
        let event = ProcessEvent {
            actor: actor.clone(),
            state,
        };
        for listener in &mut self.listeners {
            listener.process_state_changed(&event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
