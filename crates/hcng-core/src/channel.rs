//! Background-sampled value channel.
//!
//! One producer thread per physical source, writing its most recent sample
//! into a single-slot lock-guarded cell. Readers take a short-held lock to
//! copy the sample out; no lock is ever held across I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};

use crate::error::SourceError;

/// Sleep between retries after a transient read failure.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Capacity of the every-sample queue. Sized for several consumer intervals
/// of headroom at the fastest supported sample rate; overflow drops the
/// newest sample (the latest-sample slot still carries it).
const QUEUE_DEPTH: usize = 64;

/// A timestamped sensor value. Immutable once produced; the next sample
/// supersedes it in the channel's slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    pub at: Instant,
    pub value: T,
}

/// Blocking access to a physical source, driven only from the producer thread.
pub trait SampleSource<T>: Send + 'static {
    fn open(&mut self) -> Result<(), SourceError>;
    fn read(&mut self) -> Result<T, SourceError>;
    fn close(&mut self) {}
}

type Slot<T> = Arc<Mutex<Option<Sample<T>>>>;

/// Read handle over a channel. Cheap to clone; never blocks beyond the slot
/// copy. `latest` gives the newest sample, `drain` every sample published
/// since the previous drain (the two consumers the core has: snapshots and
/// the gas check).
#[derive(Debug, Clone)]
pub struct ChannelReader<T> {
    slot: Slot<T>,
    queue: Receiver<Sample<T>>,
    alive: Arc<AtomicBool>,
}

impl<T: Clone> ChannelReader<T> {
    pub fn latest(&self) -> Option<Sample<T>> {
        self.slot.lock().unwrap().clone()
    }
}

impl<T> ChannelReader<T> {
    /// Every sample published since the last drain, oldest first. Draining
    /// is destructive; a channel gets exactly one draining consumer.
    pub fn drain(&self) -> Vec<Sample<T>> {
        self.queue.try_iter().collect()
    }

    /// False once the producer thread has exited, whether on shutdown or on
    /// an unrecoverable source error. Stale `latest`/`drain` data stays
    /// readable either way.
    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

/// Producer-less feed for exercising consumers in tests.
#[cfg(test)]
pub(crate) struct TestFeed<T> {
    slot: Slot<T>,
    tx: crossbeam_channel::Sender<Sample<T>>,
    alive: Arc<AtomicBool>,
}

#[cfg(test)]
impl<T: Clone> TestFeed<T> {
    pub(crate) fn publish(&self, sample: Sample<T>) {
        *self.slot.lock().unwrap() = Some(sample.clone());
        self.tx.try_send(sample).unwrap();
    }

    /// Simulate the producer dying mid-run.
    pub(crate) fn kill(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
impl<T> ChannelReader<T> {
    pub(crate) fn test_pair() -> (TestFeed<T>, Self) {
        let slot: Slot<T> = Arc::new(Mutex::new(None));
        let alive = Arc::new(AtomicBool::new(true));
        let (tx, queue) = bounded(QUEUE_DEPTH);
        (
            TestFeed {
                slot: slot.clone(),
                tx,
                alive: alive.clone(),
            },
            Self { slot, queue, alive },
        )
    }
}

/// Owns one background producer thread polling a [`SampleSource`] at a fixed
/// rate and publishing into the latest-sample slot.
pub struct SampledChannel<T> {
    name: &'static str,
    slot: Slot<T>,
    queue_rx: Receiver<Sample<T>>,
    alive: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    grace: Duration,
}

impl<T: Clone + Send + 'static> SampledChannel<T> {
    /// Open the source and begin sampling. Fails only when the source cannot
    /// be opened; after that, transient read errors are retried with backoff
    /// inside the producer and never end the channel.
    pub fn start<S: SampleSource<T>>(
        name: &'static str,
        mut source: S,
        period: Duration,
        grace: Duration,
    ) -> Result<Self, SourceError> {
        source.open()?;

        let slot: Slot<T> = Arc::new(Mutex::new(None));
        let alive = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));
        let (queue_tx, queue_rx) = bounded(QUEUE_DEPTH);
        // The producer holds the sender and drops it on exit; stop() waits on
        // the receiver with a bounded timeout.
        let (done_tx, done_rx) = bounded::<()>(0);

        let thread_slot = slot.clone();
        let thread_alive = alive.clone();
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name(format!("sample-{name}"))
            .spawn(move || {
                let _done = done_tx;
                while thread_running.load(Ordering::Relaxed) {
                    match source.read() {
                        Ok(value) => {
                            let sample = Sample {
                                at: Instant::now(),
                                value,
                            };
                            *thread_slot.lock().unwrap() = Some(sample.clone());
                            if queue_tx.try_send(sample).is_err() {
                                debug!("{name}: sample queue full, consumer lagging");
                            }
                            thread::sleep(period);
                        }
                        Err(e) if e.is_transient() => {
                            warn!("{name}: read failed, retrying: {e}");
                            thread::sleep(RETRY_BACKOFF);
                        }
                        Err(e) => {
                            error!("{name}: source died, sampling stopped: {e}");
                            break;
                        }
                    }
                }
                thread_alive.store(false, Ordering::Relaxed);
                source.close();
            })
            .map_err(|e| SourceError::Unavailable(format!("{name}: spawn failed: {e}")))?;

        info!("{name}: sampling started (period {period:?})");
        Ok(Self {
            name,
            slot,
            queue_rx,
            alive,
            running,
            handle: Some(handle),
            done_rx,
            grace,
        })
    }

    pub fn reader(&self) -> ChannelReader<T> {
        ChannelReader {
            slot: self.slot.clone(),
            queue: self.queue_rx.clone(),
            alive: self.alive.clone(),
        }
    }

    /// False once the producer thread has exited.
    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Most recent sample, if any has arrived yet.
    pub fn latest(&self) -> Option<Sample<T>> {
        self.slot.lock().unwrap().clone()
    }

    /// Signal the producer to end and wait up to the grace period for it to
    /// exit. Best effort: on timeout the thread is left to finish on its own.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        match self.done_rx.recv_timeout(self.grace) {
            // Disconnected means the producer dropped its sender, i.e. exited.
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if let Some(h) = self.handle.take() {
                    let _ = h.join();
                }
                info!("{}: sampling stopped", self.name);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("{}: producer did not exit within grace, detaching", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSource {
        script: Vec<Result<u16, SourceError>>,
        pos: usize,
        open_fails: bool,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<u16, SourceError>>) -> Self {
            Self {
                script,
                pos: 0,
                open_fails: false,
            }
        }
    }

    impl SampleSource<u16> for ScriptedSource {
        fn open(&mut self) -> Result<(), SourceError> {
            if self.open_fails {
                Err(SourceError::Unavailable("no device".into()))
            } else {
                Ok(())
            }
        }

        fn read(&mut self) -> Result<u16, SourceError> {
            let out = self
                .script
                .get(self.pos)
                .cloned()
                .unwrap_or_else(|| self.script.last().cloned().unwrap());
            self.pos += 1;
            out
        }
    }

    #[test]
    fn open_failure_is_unavailable() {
        let mut src = ScriptedSource::new(vec![Ok(1)]);
        src.open_fails = true;
        let err = SampledChannel::start(
            "gas",
            src,
            Duration::from_millis(1),
            Duration::from_millis(100),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn publishes_latest_sample() {
        let ch = SampledChannel::start(
            "gas",
            ScriptedSource::new(vec![Ok(7), Ok(8), Ok(9)]),
            Duration::from_millis(1),
            Duration::from_millis(500),
        )
        .unwrap();
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            if let Some(s) = ch.latest() {
                assert!(s.value >= 7);
                break;
            }
            assert!(Instant::now() < deadline, "no sample arrived");
            thread::sleep(Duration::from_millis(1));
        }
        ch.stop();
    }

    #[test]
    fn reader_sees_none_before_first_sample() {
        let (_feed, reader) = ChannelReader::<u16>::test_pair();
        assert!(reader.latest().is_none());
        assert!(reader.drain().is_empty());
    }

    #[test]
    fn drain_yields_every_sample_in_order() {
        let (feed, reader) = ChannelReader::<u16>::test_pair();
        let base = Instant::now();
        for i in 0..5u16 {
            feed.publish(Sample {
                at: base + Duration::from_millis(i as u64),
                value: i,
            });
        }
        let drained: Vec<u16> = reader.drain().into_iter().map(|s| s.value).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        // a second drain has nothing left
        assert!(reader.drain().is_empty());
        // the latest-sample slot is unaffected by draining
        assert_eq!(reader.latest().unwrap().value, 4);
    }

    #[test]
    fn producer_death_clears_liveness() {
        let ch = SampledChannel::start(
            "gas",
            ScriptedSource::new(vec![Ok(5), Err(SourceError::Unavailable("sensor gone".into()))]),
            Duration::from_millis(1),
            Duration::from_secs(2),
        )
        .unwrap();
        let reader = ch.reader();
        let deadline = Instant::now() + Duration::from_secs(2);
        while reader.is_live() {
            assert!(Instant::now() < deadline, "producer never exited");
            thread::sleep(Duration::from_millis(5));
        }
        // the last good sample stays readable after death
        assert_eq!(reader.latest().unwrap().value, 5);
        ch.stop();
    }

    #[test]
    fn transient_error_does_not_kill_producer() {
        let ch = SampledChannel::start(
            "gas",
            ScriptedSource::new(vec![
                Err(SourceError::Transient("bus glitch".into())),
                Ok(42),
            ]),
            Duration::from_millis(1),
            Duration::from_secs(2),
        )
        .unwrap();
        // producer sits out the 1 s backoff, then recovers
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            if let Some(s) = ch.latest() {
                assert_eq!(s.value, 42);
                break;
            }
            assert!(Instant::now() < deadline, "producer never recovered");
            thread::sleep(Duration::from_millis(10));
        }
        ch.stop();
    }

    #[test]
    fn stop_returns_within_grace() {
        let ch = SampledChannel::start(
            "gas",
            ScriptedSource::new(vec![Ok(1)]),
            Duration::from_millis(1),
            Duration::from_secs(2),
        )
        .unwrap();
        let t0 = Instant::now();
        ch.stop();
        assert!(t0.elapsed() < Duration::from_secs(3));
    }
}
