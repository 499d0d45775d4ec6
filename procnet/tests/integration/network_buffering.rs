//! Token buffering and FIFO delivery.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use procnet::actor::{Actor, ActorError, Context};
use procnet::channel::{Capacity, Input, Output};
use procnet::director::{Completion, DeadlockKind, NetInit, Phase, Resolution};

use crate::common::{Sink, Source};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Event {
    Put(u32),
    GetStart,
    Got(u32),
}

struct Writer {
    output: Output<u32>,
    log: Arc<Mutex<Vec<Event>>>,
    next: u32,
}
impl Actor for Writer {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        self.output.put(self.next)?;
        self.log.lock().unwrap().push(Event::Put(self.next));
        self.next += 1;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(self.next < 3)
    }
}

struct SlowReader {
    input: Input<u32>,
    log: Arc<Mutex<Vec<Event>>>,
    count: usize,
}
impl Actor for SlowReader {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        thread::sleep(Duration::from_millis(50));
        self.log.lock().unwrap().push(Event::GetStart);
        let token = self.input.get()?;
        self.log.lock().unwrap().push(Event::Got(token));
        self.count += 1;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(self.count < 3)
    }
}

#[test]
fn writer_waits_for_slow_reader() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut net = NetInit::new();
    let (output, input) = net.channel("a_to_b");
    let mut director = net
        .add_actor(
            Writer {
                output,
                log: log.clone(),
                next: 0,
            },
            "A",
        )
        .add_actor(
            SlowReader {
                input,
                log: log.clone(),
                count: 0,
            },
            "B",
        )
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    let log = log.lock().unwrap();
    let position = |event: &Event| log.iter().position(|e| e == event).unwrap();

    // The second put can only complete once the reader took the first token.
    assert!(position(&Event::Put(1)) > position(&Event::GetStart));
    assert!(position(&Event::Put(2)) > position(&Event::Got(0)));

    let received: Vec<_> = log
        .iter()
        .filter_map(|e| match e {
            Event::Got(token) => Some(*token),
            _ => None,
        })
        .collect();
    assert_eq!(received, vec![0, 1, 2]);

    // A slow reader is not a deadlock, so the capacity was never grown.
    assert!(director.deadlocks().is_empty());
    assert_eq!(director.phase(), Phase::Terminated);
}

#[test]
fn reader_left_waiting_is_a_real_deadlock() {
    let mut net = NetInit::new();
    let (output, input) = net.channel("numbers");
    let (sink, received) = Sink::new(input);
    let mut director = net
        .add_actor(Source::new(output, vec![1u32, 2, 3]), "source")
        .add_actor(sink, "sink")
        .init();

    let completion = director.execute().unwrap();

    assert_eq!(*received.lock().unwrap(), vec![1, 2, 3]);
    match completion {
        Completion::Deadlocked(info) => {
            assert_eq!(info.len(), 1);
            assert_eq!(info[0].channel, "numbers");
        }
        other => panic!("unexpected completion: {:?}", other),
    }

    let records = director.deadlocks();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DeadlockKind::Real);
    assert_eq!(records[0].counts.read, 1);
    assert_eq!(records[0].counts.write, 0);
    assert_eq!(records[0].active_actors, 1);
    assert_eq!(records[0].resolution, Resolution::Terminated);
}

#[test]
fn unbounded_channel_preserves_order() {
    const COUNT: usize = 1000;

    let tokens: Vec<usize> = (0..COUNT).collect();

    let mut net = NetInit::new().with_initial_capacity(Capacity::Unbounded);
    let (output, input) = net.channel("unbounded");
    let (sink, received) = Sink::new(input);
    let mut director = net
        .add_actor(Source::new(output, tokens.clone()), "source")
        .add_actor(sink.with_limit(COUNT), "sink")
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);
    assert_eq!(*received.lock().unwrap(), tokens);
    assert!(director.deadlocks().is_empty());
}

struct Countdown {
    remaining: Arc<Mutex<u32>>,
}
impl Actor for Countdown {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        *self.remaining.lock().unwrap() -= 1;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(*self.remaining.lock().unwrap() > 0)
    }
}

#[test]
fn actors_finishing_on_their_own() {
    let first = Arc::new(Mutex::new(5));
    let second = Arc::new(Mutex::new(1));

    let mut director = NetInit::new()
        .add_actor(
            Countdown {
                remaining: first.clone(),
            },
            "first",
        )
        .add_actor(
            Countdown {
                remaining: second.clone(),
            },
            "second",
        )
        .init();

    director.initialize().unwrap();
    assert_eq!(director.run().unwrap(), Completion::Finished);
    director.wrapup().unwrap();

    assert_eq!(*first.lock().unwrap(), 0);
    assert_eq!(*second.lock().unwrap(), 0);
    assert!(director.deadlocks().is_empty());
    assert_eq!(director.phase(), Phase::Terminated);
}

#[test]
fn network_can_run_again_after_wrapup() {
    let mut net = NetInit::new();
    let (output, input) = net.channel_with_capacity("rendezvous", Capacity::Bounded(0));
    let (sink, received) = Sink::new(input);
    let mut director = net
        .add_actor(Source::new(output, vec!['a', 'b']), "source")
        .add_actor(sink.with_limit(2), "sink")
        .init();

    for _ in 0..2 {
        assert_eq!(director.execute().unwrap(), Completion::Finished);

        // The capacity is restored at each initialization, so the first put
        // blocks again until the channel is grown.
        let records = director.deadlocks();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].resolution,
            Resolution::CapacityIncreased {
                channel: "rendezvous".into(),
                capacity: Capacity::Bounded(1),
            }
        );
    }

    assert_eq!(*received.lock().unwrap(), vec!['a', 'b', 'a', 'b']);
}

#[test]
fn run_before_initialize_is_rejected() {
    let mut director = NetInit::new().init();

    assert!(director.run().is_err());
    assert_eq!(director.phase(), Phase::Idle);
}

/// Writes `count` tokens and checks the channel occupancy after each of them.
struct CheckedWriter {
    output: Output<u32>,
    count: u32,
    next: u32,
}
impl Actor for CheckedWriter {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        self.output.put(self.next)?;
        self.next += 1;

        let occupancy = self.output.occupancy();
        let capacity = self.output.capacity();
        if capacity.bound().map_or(false, |bound| occupancy > bound) {
            return Err(ActorError::failed(format!(
                "channel '{}' holds {} tokens with capacity {}",
                self.output.name(),
                occupancy,
                capacity
            )));
        }

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(self.next < self.count)
    }
}

/// Reads `count` tokens and checks the channel occupancy before each of them.
struct CheckedReader {
    input: Input<u32>,
    count: u32,
    received: Arc<Mutex<Vec<u32>>>,
}
impl Actor for CheckedReader {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        if self.input.capacity() != Capacity::Bounded(2) {
            return Err(ActorError::failed("the channel capacity changed"));
        }
        if self.input.occupancy() > 2 {
            return Err(ActorError::failed("the channel holds too many tokens"));
        }
        let token = self.input.get()?;
        self.received.lock().unwrap().push(token);

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok((self.received.lock().unwrap().len() as u32) < self.count)
    }
}

#[test]
fn occupancy_never_exceeds_capacity() {
    const COUNT: u32 = 200;

    let received = Arc::new(Mutex::new(Vec::new()));

    let mut net = NetInit::new().with_initial_capacity(Capacity::Bounded(2));
    let (output, input) = net.channel("bounded");
    assert_eq!(output.name(), "bounded");
    assert_eq!(input.name(), "bounded");
    assert_eq!(output.capacity(), Capacity::Bounded(2));
    assert_eq!(input.occupancy(), 0);

    let mut director = net
        .add_actor(
            CheckedWriter {
                output,
                count: COUNT,
                next: 0,
            },
            "writer",
        )
        .add_actor(
            CheckedReader {
                input,
                count: COUNT,
                received: received.clone(),
            },
            "reader",
        )
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);
    assert_eq!(*received.lock().unwrap(), (0..COUNT).collect::<Vec<_>>());

    // The reader always made progress, so the capacity was never grown.
    assert!(director.deadlocks().is_empty());
}
