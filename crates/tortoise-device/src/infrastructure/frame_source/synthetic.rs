//! Synthetic screen projection that renders a moving test pattern.
//!
//! [`SyntheticFrameSource`] behaves like an image reader attached to a
//! virtual display:
//!
//! - a fixed pool of `buffer_slots` buffers, each `Free`, `Ready` (holding a
//!   produced frame) or `Acquired` (handed to a consumer);
//! - [`acquire_latest`](FrameSource::acquire_latest) takes the newest ready
//!   frame and discards older ready ones;
//! - when every slot is `Acquired` the producer stalls and the frame is lost,
//!   which is what happens on a device when a consumer leaks buffers.
//!
//! Rows are padded up to `row_alignment` bytes so consumers must honour the
//! stride.  Frames are produced either by calling [`fire`] directly (tests) or
//! by a background ticker thread at a fixed rate (demo binary).
//!
//! [`fire`]: SyntheticFrameSource::fire

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tortoise_core::{Frame, OutputResolution, PixelFormat};
use tracing::{debug, info, trace};

use crate::application::capture_session::{CaptureError, ScreenProjector};
use crate::application::relay_frames::{FrameListener, FrameSource, SourceError};

/// Default number of buffers in the pool.
pub const DEFAULT_BUFFER_SLOTS: usize = 2;

/// Row alignment applied when none is configured.  Most GPUs pad rows to 64
/// bytes, which leaves a visible gap on widths that are not multiples of 16.
pub const DEFAULT_ROW_ALIGNMENT: usize = 64;

// ── Slot pool ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Ready(u64),
    Acquired,
}

struct SlotPool {
    slots: Vec<SlotState>,
    next_frame: u64,
}

impl SlotPool {
    fn new(capacity: usize) -> Self {
        Self { slots: vec![SlotState::Free; capacity.max(1)], next_frame: 0 }
    }

    /// Picks the slot the producer writes into: a free one, else the oldest
    /// ready one.  `None` when every slot is held by a consumer.
    fn producer_slot(&self) -> Option<usize> {
        if let Some(i) = self.slots.iter().position(|s| *s == SlotState::Free) {
            return Some(i);
        }
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                SlotState::Ready(n) => Some((i, *n)),
                _ => None,
            })
            .min_by_key(|(_, n)| *n)
            .map(|(i, _)| i)
    }

    /// Marks the newest ready slot acquired and frees the older ready ones.
    fn take_latest(&mut self) -> Option<(usize, u64)> {
        let (slot, frame_no) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                SlotState::Ready(n) => Some((i, *n)),
                _ => None,
            })
            .max_by_key(|(_, n)| *n)?;

        for state in &mut self.slots {
            if matches!(state, SlotState::Ready(_)) {
                *state = SlotState::Free;
            }
        }
        self.slots[slot] = SlotState::Acquired;
        Some((slot, frame_no))
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct SyntheticFrameSource {
    resolution: OutputResolution,
    format: PixelFormat,
    row_stride: usize,
    pool: Mutex<SlotPool>,
    listener: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    closed: AtomicBool,
    produced: AtomicU64,
    stalls: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl SyntheticFrameSource {
    pub fn new(
        resolution: OutputResolution,
        format: PixelFormat,
        buffer_slots: usize,
        row_alignment: usize,
    ) -> Self {
        let row_bytes = resolution.width as usize * format.bytes_per_pixel();
        let align = row_alignment.max(1);
        Self {
            resolution,
            format,
            row_stride: row_bytes.div_ceil(align) * align,
            pool: Mutex::new(SlotPool::new(buffer_slots)),
            listener: Mutex::new(None),
            closed: AtomicBool::new(false),
            produced: AtomicU64::new(0),
            stalls: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Renders one frame into the pool and notifies the listener.
    ///
    /// Returns `false` without notifying if the source is closed or every
    /// slot is held by a consumer.
    pub fn fire(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        {
            let mut pool = self.pool();
            let Some(slot) = pool.producer_slot() else {
                self.stalls.fetch_add(1, Ordering::Relaxed);
                trace!("all buffer slots held by consumers; producer stalled");
                return false;
            };
            let frame_no = pool.next_frame;
            pool.next_frame += 1;
            pool.slots[slot] = SlotState::Ready(frame_no);
        }
        self.produced.fetch_add(1, Ordering::Relaxed);

        // Called outside the pool lock: the listener re-enters acquire_latest.
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener();
        }
        true
    }

    /// Spawns a thread calling [`fire`](Self::fire) `fps` times per second
    /// until the source is closed or dropped.
    pub fn start_ticker(self: &Arc<Self>, fps: u32) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = Duration::from_secs(1) / fps.max(1);
        std::thread::spawn(move || loop {
            std::thread::sleep(period);
            match weak.upgrade() {
                Some(source) if !source.is_closed() => {
                    source.fire();
                }
                _ => break,
            }
        });
    }

    pub fn resolution(&self) -> OutputResolution {
        self.resolution
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn has_listener(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Frames written into the pool.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Frames lost because every slot was acquired.
    pub fn stalls(&self) -> u64 {
        self.stalls.load(Ordering::Relaxed)
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Slots currently held by consumers.
    pub fn outstanding(&self) -> usize {
        self.pool()
            .slots
            .iter()
            .filter(|s| **s == SlotState::Acquired)
            .count()
    }

    fn pool(&self) -> MutexGuard<'_, SlotPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fills a buffer with a diagonal gradient that shifts with `frame_no`.
    fn render(&self, frame_no: u64) -> Vec<u8> {
        let width = self.resolution.width as usize;
        let height = self.resolution.height as usize;
        let shift = frame_no.wrapping_mul(4) as usize;
        let mut data = vec![0u8; self.row_stride * height];

        for (y, row) in data.chunks_exact_mut(self.row_stride).enumerate() {
            for (x, px) in row[..width * 4].chunks_exact_mut(4).enumerate() {
                let r = x.wrapping_add(shift) as u8;
                let g = y as u8;
                let b = (x ^ y).wrapping_add(shift) as u8;
                let rgba = match self.format {
                    PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => [r, g, b, 0xFF],
                    PixelFormat::Bgra8888 => [b, g, r, 0xFF],
                };
                px.copy_from_slice(&rgba);
            }
        }
        data
    }
}

impl FrameSource for SyntheticFrameSource {
    fn set_listener(&self, listener: Option<FrameListener>) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = listener.map(Arc::from);
    }

    fn acquire_latest(&self) -> Result<Option<Frame>, SourceError> {
        if self.is_closed() {
            return Err(SourceError("frame source closed".into()));
        }
        let Some((slot, frame_no)) = self.pool().take_latest() else {
            return Ok(None);
        };
        self.acquired.fetch_add(1, Ordering::SeqCst);

        Ok(Some(Frame {
            width: self.resolution.width,
            height: self.resolution.height,
            row_stride: self.row_stride,
            format: self.format,
            data: self.render(frame_no),
            slot,
        }))
    }

    fn release(&self, slot: usize) {
        let mut pool = self.pool();
        match pool.slots.get_mut(slot) {
            Some(state) if *state == SlotState::Acquired => {
                *state = SlotState::Free;
                self.released.fetch_add(1, Ordering::SeqCst);
            }
            _ => debug!(slot, "release of a slot that is not acquired"),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.set_listener(None);
        debug!(
            produced = self.produced(),
            stalls = self.stalls(),
            "synthetic frame source closed"
        );
    }
}

// ── Projector ─────────────────────────────────────────────────────────────────

/// Stand-in for the OS projection service.
///
/// Permission and display failures can be switched on to exercise the start
/// error paths.  The most recent source is kept so tests can inspect it.
pub struct SyntheticProjector {
    format: PixelFormat,
    buffer_slots: usize,
    fps: Option<u32>,
    deny_permission: AtomicBool,
    fail_display: AtomicBool,
    opened: AtomicUsize,
    last: Mutex<Option<Arc<SyntheticFrameSource>>>,
}

impl Default for SyntheticProjector {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SLOTS)
    }
}

impl SyntheticProjector {
    pub fn new(buffer_slots: usize) -> Self {
        Self {
            format: PixelFormat::Rgba8888,
            buffer_slots,
            fps: None,
            deny_permission: AtomicBool::new(false),
            fail_display: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// Drives each opened source from a ticker thread at `fps`.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Pixel layout of the frames the opened sources produce.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn set_deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    pub fn set_fail_display(&self, fail: bool) {
        self.fail_display.store(fail, Ordering::SeqCst);
    }

    /// Number of virtual displays created so far.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The most recently opened source.
    pub fn last_opened(&self) -> Option<Arc<SyntheticFrameSource>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ScreenProjector for SyntheticProjector {
    async fn open(&self, resolution: OutputResolution) -> Result<Arc<dyn FrameSource>, CaptureError> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(CaptureError::Display("virtual display creation failed".into()));
        }
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CaptureError::Display(format!(
                "cannot create a {}x{} surface",
                resolution.width, resolution.height
            )));
        }

        let source = Arc::new(SyntheticFrameSource::new(
            resolution,
            self.format,
            self.buffer_slots,
            DEFAULT_ROW_ALIGNMENT,
        ));
        if let Some(fps) = self.fps {
            source.start_ticker(fps);
        }
        info!(
            width = resolution.width,
            height = resolution.height,
            slots = self.buffer_slots,
            stride = source.row_stride(),
            "synthetic virtual display created"
        );
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&source));
        Ok(source)
    }
}
