//! Actor state changes reported to process listeners.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use procnet::actor::{Actor, ActorError, Context};
use procnet::channel::{Capacity, Input, Output};
use procnet::director::{BlockCause, Completion, NetInit, ProcessEvent, ProcessState};
use procnet::time::MonotonicTime;

use crate::common::{Sink, Source};

use ProcessState::{Blocked, Finished, Running};

type EventLog = Arc<Mutex<Vec<ProcessEvent>>>;

fn recorder(log: &EventLog) -> impl FnMut(&ProcessEvent) + Send + 'static {
    let log = log.clone();

    move |event: &ProcessEvent| log.lock().unwrap().push(event.clone())
}

fn states_of(log: &EventLog, actor: &str) -> Vec<ProcessState> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|event| event.actor == actor)
        .map(|event| event.state)
        .collect()
}

struct Writer {
    output: Output<u32>,
    next: u32,
}
impl Actor for Writer {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        self.output.put(self.next)?;
        self.next += 1;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(self.next < 3)
    }
}

struct SlowReader {
    input: Input<u32>,
    count: usize,
}
impl Actor for SlowReader {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        thread::sleep(Duration::from_millis(50));
        self.input.get()?;
        self.count += 1;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(self.count < 3)
    }
}

#[test]
fn writer_blocked_by_slow_reader() {
    let log = EventLog::default();

    let mut net = NetInit::new();
    let (output, input) = net.channel("a_to_b");
    let mut director = net
        .add_listener(recorder(&log))
        .add_actor(Writer { output, next: 0 }, "A")
        .add_actor(SlowReader { input, count: 0 }, "B")
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    // The second and third puts each wait for the reader to take a token.
    assert_eq!(
        states_of(&log, "A"),
        vec![
            Running,
            Blocked(BlockCause::Write),
            Running,
            Blocked(BlockCause::Write),
            Running,
            Finished,
        ]
    );
    assert_eq!(states_of(&log, "B"), vec![Running, Finished]);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 8);
    assert_eq!(
        log.last(),
        Some(&ProcessEvent {
            actor: "B".into(),
            state: Finished,
        })
    );
}

#[test]
fn channel_growth_releases_the_writer() {
    let log = EventLog::default();

    let mut net = NetInit::new();
    let (output, input) = net.channel_with_capacity("rendezvous", Capacity::Bounded(0));
    let (sink, received) = Sink::new(input);
    let mut director = net
        .add_actor(Source::new(output, vec![7u8]), "source")
        .add_actor(sink.with_limit(1), "sink")
        .add_listener(recorder(&log))
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);
    assert_eq!(*received.lock().unwrap(), vec![7]);

    assert_eq!(
        states_of(&log, "source"),
        vec![Running, Blocked(BlockCause::Write), Running, Finished]
    );
    assert_eq!(
        states_of(&log, "sink"),
        vec![Running, Blocked(BlockCause::Read), Running, Finished]
    );
}

struct Napper {
    wake_time: MonotonicTime,
}
impl Actor for Napper {
    fn fire(&mut self, cx: &Context) -> Result<(), ActorError> {
        cx.fire_at(self.wake_time)?;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(false)
    }
}

#[test]
fn time_advance_and_real_deadlock() {
    let t0 = MonotonicTime::EPOCH;
    let log = EventLog::default();

    let mut net = NetInit::new();
    let (_output, input) = net.channel::<u32>("never_written");
    let (sink, _) = Sink::new(input);
    let mut director = net
        .add_actor(
            Napper {
                wake_time: t0 + Duration::from_secs(1),
            },
            "napper",
        )
        .add_actor(sink, "sink")
        .add_listener(recorder(&log))
        .init_timed(t0);

    assert!(matches!(
        director.execute().unwrap(),
        Completion::Deadlocked(_)
    ));

    assert_eq!(
        states_of(&log, "napper"),
        vec![Running, Blocked(BlockCause::Delay), Running, Finished]
    );
    // A reader released by termination goes straight to `Finished`.
    assert_eq!(
        states_of(&log, "sink"),
        vec![Running, Blocked(BlockCause::Read), Finished]
    );
}

#[test]
fn every_listener_is_notified() {
    let first = EventLog::default();
    let second = EventLog::default();

    let mut net = NetInit::new();
    let (output, input) = net.channel("numbers");
    let (sink, _) = Sink::new(input);
    let mut director = net
        .add_listener(recorder(&first))
        .add_listener(recorder(&second))
        .add_actor(Source::new(output, vec![1u32, 2]), "source")
        .add_actor(sink.with_limit(2), "sink")
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    assert!(!first.lock().unwrap().is_empty());
    assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
}
