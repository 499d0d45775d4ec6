//! Detection and resolution of artificial deadlocks.

use std::sync::{Arc, Mutex};

use procnet::actor::{Actor, ActorError, Context};
use procnet::channel::{Capacity, Input, Output};
use procnet::director::{
    BlockCounts, Completion, DeadlockKind, DeadlockStats, NetInit, Resolution,
};

/// Capacities of output channels, as seen by their writers.
type CapacityLog = Arc<Mutex<Vec<(String, Capacity)>>>;

/// Writes `writes` tokens before reading `reads` tokens, then exits.
struct WriteThenRead {
    output: Output<usize>,
    input: Input<usize>,
    writes: usize,
    reads: usize,
    received: Vec<usize>,
    capacity_log: Option<CapacityLog>,
}
impl WriteThenRead {
    fn new(output: Output<usize>, input: Input<usize>, writes: usize, reads: usize) -> Self {
        Self {
            output,
            input,
            writes,
            reads,
            received: Vec::new(),
            capacity_log: None,
        }
    }

    /// Records the capacity of the output channel once all writes completed.
    fn with_capacity_log(mut self, log: CapacityLog) -> Self {
        self.capacity_log = Some(log);

        self
    }
}
impl Actor for WriteThenRead {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        for token in 0..self.writes {
            self.output.put(token)?;
        }
        if let Some(log) = &self.capacity_log {
            log.lock()
                .unwrap()
                .push((self.output.name(), self.output.capacity()));
        }
        for _ in 0..self.reads {
            self.received.push(self.input.get()?);
        }

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        let expected: Vec<_> = (0..self.reads).collect();
        if self.received != expected {
            return Err(ActorError::failed(format!(
                "received {:?} instead of {:?}",
                self.received, expected
            )));
        }

        Ok(false)
    }
}

#[test]
fn mutual_write_cycle_grows_one_channel() {
    let mut net = NetInit::new();
    let (a_out, b_in) = net.channel("a_to_b");
    let (b_out, a_in) = net.channel("b_to_a");

    let capacity_log = CapacityLog::default();
    let mut director = net
        .add_actor(
            WriteThenRead::new(a_out, a_in, 2, 2).with_capacity_log(capacity_log.clone()),
            "A",
        )
        .add_actor(
            WriteThenRead::new(b_out, b_in, 2, 2).with_capacity_log(capacity_log.clone()),
            "B",
        )
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    // Only the grown channel changed capacity.
    let mut capacities = capacity_log.lock().unwrap().clone();
    capacities.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        capacities,
        vec![
            ("a_to_b".to_string(), Capacity::Bounded(2)),
            ("b_to_a".to_string(), Capacity::Bounded(1)),
        ]
    );

    let records = director.deadlocks();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DeadlockKind::Artificial);
    assert_eq!(
        records[0].counts,
        BlockCounts {
            read: 0,
            write: 2,
            delay: 0
        }
    );
    assert_eq!(records[0].active_actors, 2);
    // Both receivers have capacity 1: the one created first is grown.
    assert_eq!(
        records[0].resolution,
        Resolution::CapacityIncreased {
            channel: "a_to_b".into(),
            capacity: Capacity::Bounded(2),
        }
    );
}

#[test]
fn smallest_blocked_channel_is_grown() {
    let mut net = NetInit::new();
    let (a_out, b_in) = net.channel_with_capacity("a_to_b", Capacity::Bounded(3));
    let (b_out, a_in) = net.channel_with_capacity("b_to_a", Capacity::Bounded(2));

    let mut director = net
        .add_actor(WriteThenRead::new(a_out, a_in, 4, 3), "A")
        .add_actor(WriteThenRead::new(b_out, b_in, 3, 4), "B")
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    let records = director.deadlocks();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].resolution,
        Resolution::CapacityIncreased {
            channel: "b_to_a".into(),
            capacity: Capacity::Bounded(3),
        }
    );
}

#[test]
fn equal_capacities_are_ordered_by_creation() {
    let mut net = NetInit::new().with_initial_capacity(Capacity::Bounded(2));
    // Created in the reverse order of the actors using them.
    let (b_out, a_in) = net.channel("b_to_a");
    let (a_out, b_in) = net.channel("a_to_b");

    let mut director = net
        .add_actor(WriteThenRead::new(a_out, a_in, 3, 3), "A")
        .add_actor(WriteThenRead::new(b_out, b_in, 3, 3), "B")
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    let records = director.deadlocks();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].resolution,
        Resolution::CapacityIncreased {
            channel: "b_to_a".into(),
            capacity: Capacity::Bounded(3),
        }
    );
}

#[test]
fn growth_repeats_until_progress() {
    // Each actor needs 4 slots to write all its tokens before reading, which
    // takes several growth steps starting from an empty capacity.
    let mut net = NetInit::new().with_initial_capacity(Capacity::Bounded(0));
    let (a_out, b_in) = net.channel("a_to_b");
    let (b_out, a_in) = net.channel("b_to_a");

    let mut director = net
        .add_actor(WriteThenRead::new(a_out, a_in, 4, 4), "A")
        .add_actor(WriteThenRead::new(b_out, b_in, 4, 4), "B")
        .init();

    assert_eq!(director.execute().unwrap(), Completion::Finished);

    // Every resolution strictly increases the capacity of the grown channel.
    let mut last_bound = [0usize; 2];
    for record in director.deadlocks() {
        assert_eq!(record.kind, DeadlockKind::Artificial);
        match &record.resolution {
            Resolution::CapacityIncreased { channel, capacity } => {
                let idx = if channel == "a_to_b" { 0 } else { 1 };
                let bound = capacity.bound().unwrap();
                assert!(bound > last_bound[idx]);
                last_bound[idx] = bound;
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }
    assert_eq!(
        director.stats(),
        DeadlockStats {
            artificial: director.deadlocks().len(),
            timed: 0
        }
    );
    // Growth alternates between both channels until "A" can write its last
    // token; "B" is then released by the reads of "A".
    assert_eq!(last_bound, [4, 3]);
    assert_eq!(director.deadlocks().len(), 7);
}
