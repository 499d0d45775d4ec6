//! A Kahn process network runtime with bounded-memory scheduling.
//!
//! Procnet runs networks of sequential actors, each on its own thread,
//! connected by blocking FIFO channels. A read from an empty channel blocks
//! the reader until a token arrives, so the sequence of tokens on every
//! channel is independent of thread scheduling: the network is
//! deterministic.
//!
//! Channels are created with a small capacity and a write to a full channel
//! blocks the writer as well. Blocked actors are tracked by a director, which
//! detects when all active actors are blocked and classifies the deadlock:
//!
//! * an *artificial* deadlock, caused by the limited capacity of the channels,
//!   is broken by growing the smallest full channel that has a blocked writer,
//! * a *timed* deadlock, where actors wait for a future model time, is broken
//!   by advancing model time,
//! * a *real* deadlock, where all actors wait for tokens that will never
//!   come, is the normal end of execution.
//!
//! This gives networks that complete in bounded memory whenever a bounded
//! schedule exists, and a well-defined termination otherwise.
//!
//! # A practical overview
//!
//! Running a process network typically involves three distinct activities:
//!
//! 1. the design of actors, implementing the [`Actor`](actor::Actor) trait,
//! 2. the assembly of a network with a [`NetInit`](director::NetInit)
//!    builder, by creating channels and moving their endpoints into the
//!    actors,
//! 3. the execution of the network by a [`Director`](director::Director).
//!
//! ## Authoring actors
//!
//! Actors own the [`Input`](channel::Input) and [`Output`](channel::Output)
//! endpoints they communicate through. Their thread calls
//! [`Actor::initialize()`](actor::Actor::initialize) once, then iterates
//! [`prefire`](actor::Actor::prefire), [`fire`](actor::Actor::fire) and
//! [`postfire`](actor::Actor::postfire) until `postfire` returns `false`.
//!
//! Blocking calls return a [`Terminate`](actor::Terminate) signal once the
//! network is torn down. This is not a failure: it is meant to be propagated
//! with `?`, which ends the actor loop.
//!
//! ```
//! use procnet::actor::{Actor, ActorError, Context};
//! use procnet::channel::{Input, Output};
//!
//! /// Emits the integers from `0` to `count - 1`.
//! pub struct Counter {
//!     pub output: Output<u64>,
//!     pub next: u64,
//!     pub count: u64,
//! }
//!
//! impl Actor for Counter {
//!     fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
//!         self.output.put(self.next)?;
//!         self.next += 1;
//!
//!         Ok(())
//!     }
//!
//!     fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
//!         Ok(self.next < self.count)
//!     }
//! }
//!
//! /// Accumulates its input.
//! pub struct Sum {
//!     pub input: Input<u64>,
//!     pub total: u64,
//! }
//!
//! impl Actor for Sum {
//!     fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
//!         self.total += self.input.get()?;
//!
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Assembling and running a network
//!
//! ```
//! # use procnet::actor::{Actor, ActorError, Context};
//! # use procnet::channel::{Input, Output};
//! # pub struct Counter { pub output: Output<u64>, pub next: u64, pub count: u64 }
//! # impl Actor for Counter {
//! #     fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
//! #         self.output.put(self.next)?;
//! #         self.next += 1;
//! #         Ok(())
//! #     }
//! #     fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
//! #         Ok(self.next < self.count)
//! #     }
//! # }
//! # pub struct Sum { pub input: Input<u64>, pub total: u64 }
//! # impl Actor for Sum {
//! #     fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
//! #         self.total += self.input.get()?;
//! #         Ok(())
//! #     }
//! # }
//! use procnet::director::{Completion, NetInit};
//!
//! let mut net = NetInit::new();
//! let (output, input) = net.channel("numbers");
//!
//! let mut director = net
//!     .add_actor(Counter { output, next: 0, count: 10 }, "counter")
//!     .add_actor(Sum { input, total: 0 }, "sum")
//!     .init();
//!
//! // Once the counter is done, the sum waits forever on an empty channel.
//! let completion = director.execute().unwrap();
//! assert!(matches!(completion, Completion::Deadlocked(_)));
//! ```
//!
//! ## Timed networks
//!
//! A director built with
//! [`NetInit::init_timed()`](director::NetInit::init_timed) maintains a model
//! time. Actors suspend themselves until a future model time with
//! [`Context::fire_at()`](actor::Context::fire_at); when every active actor
//! is blocked and at least one of them waits for time, model time jumps to the
//! earliest requested time and all actors waiting for that time are released
//! together. Model time can optionally be paced against the wall clock with a
//! [`Clock`](time::Clock).
//!
//! # Modules documentation
//!
//! * the [`actor`] module provides the [`Actor`](actor::Actor) trait and the
//!   per-actor [`Context`](actor::Context),
//! * the [`channel`] module provides the channel endpoints and
//!   [`Capacity`](channel::Capacity),
//! * the [`director`] module provides the [`NetInit`](director::NetInit)
//!   builder, the [`Director`](director::Director), the types describing
//!   the outcome of a run and the
//!   [`ProcessListener`](director::ProcessListener) observer,
//! * the [`time`] module provides [`MonotonicTime`](time::MonotonicTime) and
//!   the clocks.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod actor;
pub mod channel;
pub mod director;
pub mod time;
