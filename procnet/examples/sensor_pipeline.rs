//! Example: a timed sensor pipeline that needs one channel to be enlarged.
//!
//! This example demonstrates in particular:
//!
//! * timed actors suspending themselves with `Context::fire_after`,
//! * the resolution of an artificial deadlock by channel growth,
//! * the normal end of execution on a real deadlock.
//!
//! ```text
//!                                   live
//!  ┌────────┐ samples ┌───────┐ ──────────► ┌───────────┐ frames ┌──────────┐
//!  │ Sensor ├────────►│  Tee  │             │  Checker  ├───────►│  Logger  │
//!  └────────┘         └───────┘ ──────────► └───────────┘        └──────────┘
//!                                 archive
//! ```
//!
//! The checker assembles a frame from two live samples before reading the two
//! matching archived samples, so the archive channel must hold two samples.
//! Run with `RUST_LOG=procnet=debug` to see the director at work.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procnet::actor::{Actor, ActorError, Context};
use procnet::channel::{Input, Output};
use procnet::director::{Completion, ExecutionError, NetInit};
use procnet::time::MonotonicTime;

/// A timestamped measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub time: MonotonicTime,
    pub value: f64,
}

/// Samples a ramp once per second of model time.
pub struct Sensor {
    pub output: Output<Sample>,
    pub count: usize,
    taken: usize,
}

impl Sensor {
    pub fn new(output: Output<Sample>, count: usize) -> Self {
        Self {
            output,
            count,
            taken: 0,
        }
    }
}

impl Actor for Sensor {
    fn fire(&mut self, cx: &Context) -> Result<(), ActorError> {
        let time = cx.fire_after(Duration::from_secs(1))?;
        self.taken += 1;
        self.output.put(Sample {
            time,
            value: 0.5 * self.taken as f64,
        })?;

        Ok(())
    }

    fn postfire(&mut self, _: &Context) -> Result<bool, ActorError> {
        Ok(self.taken < self.count)
    }
}

/// Copies each sample to the live and archive channels, in that order.
pub struct Tee {
    pub input: Input<Sample>,
    pub live: Output<Sample>,
    pub archive: Output<Sample>,
}

impl Actor for Tee {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        let sample = self.input.get()?;
        self.archive.put(sample)?;
        self.live.put(sample)?;

        Ok(())
    }
}

/// Averages pairs of live samples after checking them against the archive.
pub struct Checker {
    pub live: Input<Sample>,
    pub archive: Input<Sample>,
    pub frames: Output<f64>,
}

impl Actor for Checker {
    fn fire(&mut self, _: &Context) -> Result<(), ActorError> {
        let pair = [self.live.get()?, self.live.get()?];
        for live in pair {
            let archived = self.archive.get()?;
            if archived != live {
                return Err(ActorError::failed(format!(
                    "archived sample {:?} does not match live sample {:?}",
                    archived, live
                )));
            }
        }
        self.frames.put(0.5 * (pair[0].value + pair[1].value))?;

        Ok(())
    }
}

/// Records every frame.
pub struct Logger {
    pub input: Input<f64>,
    pub frames: Arc<Mutex<Vec<f64>>>,
}

impl Actor for Logger {
    fn fire(&mut self, cx: &Context) -> Result<(), ActorError> {
        let frame = self.input.get()?;
        tracing::info!(time = ?cx.time(), frame, "frame received");
        self.frames.lock().unwrap().push(frame);

        Ok(())
    }
}

fn main() -> Result<(), ExecutionError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ---------------
    // Network assembly.
    // ---------------

    let mut net = NetInit::new();
    let (samples_out, samples_in) = net.channel("samples");
    let (archive_out, archive_in) = net.channel("archive");
    let (live_out, live_in) = net.channel("live");
    let (frames_out, frames_in) = net.channel("frames");

    let frames = Arc::new(Mutex::new(Vec::new()));

    let t0 = MonotonicTime::EPOCH;
    let mut director = net
        .add_actor(Sensor::new(samples_out, 6), "sensor")
        .add_actor(
            Tee {
                input: samples_in,
                live: live_out,
                archive: archive_out,
            },
            "tee",
        )
        .add_actor(
            Checker {
                live: live_in,
                archive: archive_in,
                frames: frames_out,
            },
            "checker",
        )
        .add_actor(
            Logger {
                input: frames_in,
                frames: frames.clone(),
            },
            "logger",
        )
        .init_timed(t0);

    // ----------
    // Execution.
    // ----------

    let completion = director.execute()?;

    // The logger is left waiting for a frame that never comes.
    assert!(matches!(completion, Completion::Deadlocked(_)));
    assert_eq!(*frames.lock().unwrap(), vec![0.75, 1.75, 2.75]);
    assert_eq!(director.time(), t0 + Duration::from_secs(6));

    let stats = director.stats();
    assert_eq!(stats.artificial, 1);
    println!(
        "done at {:?}: {} artificial and {} timed deadlocks resolved",
        director.time(),
        stats.artificial,
        stats.timed
    );

    Ok(())
}
