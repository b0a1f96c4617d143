//! FrameRelay: admits at most one frame at a time from the source into the
//! encoder and broadcasts the result.
//!
//! # Drop policy
//!
//! The display driver pushes frames faster than a phone CPU can re-encode
//! them.  Queuing every frame would grow memory and latency without bound, so
//! the relay keeps a single busy token:
//!
//! ```text
//! frame ready ─► acquire newest frame ─► token free? ──yes──► take token
//!                                          │                   encode (blocking pool)
//!                                          no                  release frame
//!                                          │                   broadcast image
//!                                          ▼                   drop token
//!                                   release frame, drop
//! ```
//!
//! Viewers only need a recent frame, not every frame, so silently losing the
//! frames that arrive mid-encode is the intended behaviour.  Because the newest
//! frame is always the one pulled, what survives is always the freshest image.
//!
//! # Threading
//!
//! [`FrameRelay::on_frame_available`] runs on the source's producer thread and
//! never waits on the encoder: the drop path is a compare-exchange and a slot
//! release.  Admitted frames move to `tokio::task::spawn_blocking`.
//!
//! The token is an `AtomicBool`.  Taking it uses `Acquire`; the permit's
//! `Drop` stores `false` with `Release`.  Everything the previous worker did
//! (slot release, broadcast, counter updates) therefore happens-before the
//! next frame is admitted.
//!
//! # Frame slots
//!
//! Every acquired frame is wrapped in a [`FrameLease`] whose `Drop` hands the
//! slot back to the source.  The slot is released exactly once on every path:
//! success, drop, encode failure, encoder panic, and relay closed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tortoise_core::{EncodedImage, Frame, FrameCounters, FrameLayoutError, SequenceCounter};
use tracing::{debug, trace, warn};

// ── Errors ────────────────────────────────────────────────────────────────────

/// The frame source could not hand out a frame.
#[derive(Debug, Error)]
#[error("frame source error: {0}")]
pub struct SourceError(pub String);

/// A frame could not be encoded.  The relay drops the frame and carries on.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid frame layout: {0}")]
    Layout(#[from] FrameLayoutError),
    #[error("image codec error: {0}")]
    Codec(String),
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Callback the source invokes each time a new frame is ready.
pub type FrameListener = Box<dyn Fn() + Send + Sync>;

/// The OS screen-mirroring surface: a virtual display writing into a
/// fixed-size pool of frame buffers.
///
/// Implementations call the registered listener from their producer thread.
/// A slot handed out by [`acquire_latest`](Self::acquire_latest) stays
/// unavailable to the producer until [`release`](Self::release) is called with
/// its index, so a leaked slot eventually stalls capture.
pub trait FrameSource: Send + Sync {
    /// Registers (or with `None`, removes) the frame-ready listener.
    fn set_listener(&self, listener: Option<FrameListener>);

    /// Pulls the newest ready frame.  Older ready frames are discarded by the
    /// source.  Returns `Ok(None)` when nothing is ready.
    fn acquire_latest(&self) -> Result<Option<Frame>, SourceError>;

    /// Returns a slot to the pool.
    fn release(&self, slot: usize);

    /// Tears down the virtual display and the buffer pool.  Idempotent.
    fn close(&self);
}

/// Compresses one frame into an image.
pub trait FrameEncoder: Send + Sync {
    /// Encodes `frame`, cropping any row padding.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] for malformed frames or codec failures.
    fn encode(&self, frame: &Frame) -> Result<Bytes, EncodeError>;

    /// Quality the encoder was configured with (1..=100).
    fn quality(&self) -> u8;
}

// ── Relay gate ────────────────────────────────────────────────────────────────

/// Single-token admission control.
#[derive(Debug, Default)]
pub struct RelayGate {
    busy: AtomicBool,
}

impl RelayGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the token if it is free.  Never blocks.
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GatePermit { gate: Arc::clone(self) })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the gate token.  Dropping it frees the gate.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<RelayGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

// ── Frame lease ───────────────────────────────────────────────────────────────

/// An acquired frame that returns its slot to the source when dropped.
struct FrameLease {
    source: Arc<dyn FrameSource>,
    frame: Frame,
}

impl FrameLease {
    fn new(source: Arc<dyn FrameSource>, frame: Frame) -> Self {
        Self { source, frame }
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.source.release(self.frame.slot);
    }
}

// ── Counters ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RelayCounters {
    events: AtomicU64,
    empty: AtomicU64,
    dropped: AtomicU64,
    encoded: AtomicU64,
    failed: AtomicU64,
}

impl RelayCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FrameCounters {
        FrameCounters {
            events: self.events.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            encoded: self.encoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

// ── Relay ─────────────────────────────────────────────────────────────────────

/// What happened to one frame-ready notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The frame passed the gate and an encode worker was started.
    Admitted,
    /// An encode was in flight; the frame was released unprocessed.
    Dropped,
    /// The source had no frame (or failed to produce one).
    Empty,
    /// The relay is closed; the frame was released unprocessed.
    Closed,
}

#[derive(Default)]
struct WorkerSlot {
    closed: bool,
    inflight: Option<JoinHandle<()>>,
}

/// Moves frames from a [`FrameSource`] through a [`FrameEncoder`] to the
/// viewer broadcast channel, one at a time.
pub struct FrameRelay {
    source: Arc<dyn FrameSource>,
    encoder: Arc<dyn FrameEncoder>,
    sink: broadcast::Sender<EncodedImage>,
    gate: Arc<RelayGate>,
    sequence: Arc<SequenceCounter>,
    counters: Arc<RelayCounters>,
    worker: Mutex<WorkerSlot>,
    runtime: Handle,
}

impl FrameRelay {
    /// Creates a relay.  Encode workers are spawned on `runtime`'s blocking
    /// pool, so the relay can be driven from threads outside the runtime.
    pub fn new(
        source: Arc<dyn FrameSource>,
        encoder: Arc<dyn FrameEncoder>,
        sink: broadcast::Sender<EncodedImage>,
        runtime: Handle,
    ) -> Self {
        Self {
            source,
            encoder,
            sink,
            gate: RelayGate::new(),
            sequence: Arc::new(SequenceCounter::new()),
            counters: Arc::new(RelayCounters::default()),
            worker: Mutex::new(WorkerSlot::default()),
            runtime,
        }
    }

    /// Handles one frame-ready notification.  Never waits for an encode.
    pub fn on_frame_available(&self) -> RelayOutcome {
        RelayCounters::bump(&self.counters.events);

        let frame = match self.source.acquire_latest() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                RelayCounters::bump(&self.counters.empty);
                return RelayOutcome::Empty;
            }
            Err(e) => {
                debug!("frame acquisition failed: {e}");
                RelayCounters::bump(&self.counters.empty);
                return RelayOutcome::Empty;
            }
        };
        let lease = FrameLease::new(Arc::clone(&self.source), frame);

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.closed {
            RelayCounters::bump(&self.counters.dropped);
            return RelayOutcome::Closed;
        }

        let Some(permit) = self.gate.try_acquire() else {
            RelayCounters::bump(&self.counters.dropped);
            trace!("encode in flight; dropping frame");
            return RelayOutcome::Dropped;
        };

        let job = EncodeJob {
            lease,
            permit,
            encoder: Arc::clone(&self.encoder),
            sink: self.sink.clone(),
            sequence: Arc::clone(&self.sequence),
            counters: Arc::clone(&self.counters),
        };
        // Holding the permit means any previous worker has already released
        // its frame, so replacing its handle loses nothing `close` must await.
        worker.inflight = Some(self.runtime.spawn_blocking(move || job.run()));
        RelayOutcome::Admitted
    }

    /// Stops admitting frames and waits for the in-flight encode, if any.
    ///
    /// After `close` returns, no frame of this relay is held, so the source
    /// can be torn down safely.  Calling it again is a no-op.
    pub async fn close(&self) {
        let inflight = {
            let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            worker.closed = true;
            worker.inflight.take()
        };
        if let Some(handle) = inflight {
            if let Err(e) = handle.await {
                warn!("encode worker ended abnormally: {e}");
            }
        }
    }

    /// `true` while an encode is in flight.
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn stats(&self) -> FrameCounters {
        self.counters.snapshot()
    }
}

/// Everything one encode worker needs, moved onto the blocking pool.
struct EncodeJob {
    lease: FrameLease,
    permit: GatePermit,
    encoder: Arc<dyn FrameEncoder>,
    sink: broadcast::Sender<EncodedImage>,
    sequence: Arc<SequenceCounter>,
    counters: Arc<RelayCounters>,
}

impl EncodeJob {
    fn run(self) {
        let Self { lease, permit, encoder, sink, sequence, counters } = self;
        let started = Instant::now();

        let (width, height) = (lease.frame().width, lease.frame().height);
        let result = encoder.encode(lease.frame());
        drop(lease);

        match result {
            Ok(data) => {
                let image = EncodedImage {
                    data,
                    width,
                    height,
                    quality: encoder.quality(),
                    sequence: sequence.next(),
                };
                trace!(
                    sequence = image.sequence,
                    bytes = image.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "frame encoded"
                );
                RelayCounters::bump(&counters.encoded);
                // No viewers is not an error; the image is simply discarded.
                let _ = sink.send(image);
            }
            Err(e) => {
                RelayCounters::bump(&counters.failed);
                debug!("frame dropped after encode failure: {e}");
            }
        }

        drop(permit);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
