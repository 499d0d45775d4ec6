//! The thread body of an actor.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::info_span;

use crate::actor::{Actor, ActorError, Context};

use super::shared::Shared;
use super::{ActorId, ExecutionError};

thread_local! {
    static CURRENT_ACTOR: Cell<Option<ActorId>> = const { Cell::new(None) };
}

/// Returns the actor running on the calling thread, if any.
pub(crate) fn current_actor() -> Option<ActorId> {
    CURRENT_ACTOR.with(Cell::get)
}

/// Runs the lifecycle of an actor until it completes, fails or observes
/// termination, then hands the actor back.
pub(crate) fn run_process(
    mut actor: Box<dyn Actor>,
    cx: Context,
    shared: Arc<Shared>,
) -> Box<dyn Actor> {
    let name = cx.name().to_owned();
    let span = info_span!("actor", name = %name);
    let _enter = span.enter();

    CURRENT_ACTOR.with(|current| current.set(Some(cx.id())));
    shared.start(cx.id());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| iterate(&mut *actor, &cx)));

    let failure = match outcome {
        Ok(Ok(())) | Ok(Err(ActorError::Terminate)) => None,
        Ok(Err(ActorError::Scheduling(error))) => Some(ExecutionError::Scheduling {
            actor: name.clone(),
            error,
        }),
        Ok(Err(ActorError::Failed(error))) => Some(ExecutionError::Actor {
            actor: name.clone(),
            error,
        }),
        Err(payload) => Some(ExecutionError::Panic {
            actor: name.clone(),
            payload,
        }),
    };
    shared.retire(cx.id(), &name, failure);
    CURRENT_ACTOR.with(|current| current.set(None));

    actor
}

fn iterate(actor: &mut dyn Actor, cx: &Context) -> Result<(), ActorError> {
    actor.initialize(cx)?;

    while !cx.is_terminating() {
        if actor.prefire(cx)? {
            actor.fire(cx)?;
            if !actor.postfire(cx)? {
                break;
            }
        } else {
            thread::yield_now();
        }
    }

    Ok(())
}
