//! CaptureService: the `Idle → Starting → Active → Idle` session lifecycle.
//!
//! The service owns the viewer broadcast channel for its whole lifetime, so
//! viewers subscribe once and keep receiving images across sessions.  Each
//! session owns one frame source and one [`FrameRelay`].
//!
//! # Serialisation
//!
//! `start` and `stop` run under one async lock that also holds the live
//! session.  The observable state lives in a separate short-lived lock so
//! that a second `start` is rejected immediately (instead of queuing behind
//! the first) and `status` never waits on a slow projection request.
//!
//! # Teardown order
//!
//! 1. Detach the listener so no new notifications reach the relay.
//! 2. Close the relay, awaiting the in-flight encode.
//! 3. Close the frame source.
//!
//! Step 2 before step 3 guarantees no worker still holds a frame of a source
//! that is being destroyed.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tortoise_core::domain::resolution::DEFAULT_MAX_WIDTH;
use tortoise_core::{
    negotiate_resolution, CaptureState, CaptureStatusDto, DisplayMetrics, EncodedImage,
    FrameCounters, OutputResolution,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::relay_frames::{FrameEncoder, FrameRelay, FrameSource, SourceError};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons a capture session could not be started.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture permission denied")]
    PermissionDenied,

    #[error("virtual display unavailable: {0}")]
    Display(String),

    #[error("capture session already active")]
    AlreadyActive,

    #[error(transparent)]
    Source(#[from] SourceError),
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Reports the physical display's metrics.
pub trait DisplayProbe: Send + Sync {
    fn display_metrics(&self) -> Result<DisplayMetrics, CaptureError>;
}

/// The OS projection capability: asks for capture consent and creates a
/// virtual display at the requested resolution.
#[async_trait]
pub trait ScreenProjector: Send + Sync {
    /// Opens a frame source mirroring the screen at `resolution`.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::PermissionDenied`] if the user refused capture.
    /// - [`CaptureError::Display`] if the surface could not be created.
    async fn open(&self, resolution: OutputResolution) -> Result<Arc<dyn FrameSource>, CaptureError>;
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Width budget used when `start` is called without one.
    pub default_max_width: u32,
    /// Capacity of the viewer broadcast channel.
    pub sink_capacity: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self { default_max_width: DEFAULT_MAX_WIDTH, sink_capacity: 4 }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One running capture: created on start, consumed on stop.
struct CaptureSession {
    id: Uuid,
    resolution: OutputResolution,
    source: Arc<dyn FrameSource>,
    relay: Arc<FrameRelay>,
}

/// What `status` reports while a session exists.
#[derive(Clone)]
struct SessionView {
    id: Uuid,
    resolution: OutputResolution,
    relay: Arc<FrameRelay>,
}

#[derive(Default)]
struct Observed {
    state: CaptureState,
    session: Option<SessionView>,
}

/// Holds the service in `Starting`.  Unless disarmed, dropping it resets the
/// observed state to `Idle`, which covers both a failed start and a start
/// future that was cancelled mid-await.
struct PendingStart<'a> {
    service: &'a CaptureService,
    armed: bool,
}

impl PendingStart<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.service.set_observed(CaptureState::Idle, None);
        }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

pub struct CaptureService {
    probe: Arc<dyn DisplayProbe>,
    projector: Arc<dyn ScreenProjector>,
    encoder: Arc<dyn FrameEncoder>,
    settings: CaptureSettings,
    sink: broadcast::Sender<EncodedImage>,
    lifecycle: tokio::sync::Mutex<Option<CaptureSession>>,
    observed: Mutex<Observed>,
}

impl CaptureService {
    pub fn new(
        probe: Arc<dyn DisplayProbe>,
        projector: Arc<dyn ScreenProjector>,
        encoder: Arc<dyn FrameEncoder>,
        settings: CaptureSettings,
    ) -> Self {
        // broadcast::channel panics on zero capacity.
        let (sink, _) = broadcast::channel(settings.sink_capacity.max(1));
        Self {
            probe,
            projector,
            encoder,
            settings,
            sink,
            lifecycle: tokio::sync::Mutex::new(None),
            observed: Mutex::new(Observed::default()),
        }
    }

    /// Starts a capture session and returns the negotiated resolution.
    ///
    /// `max_width` overrides [`CaptureSettings::default_max_width`].  Must be
    /// called from within a Tokio runtime; encode workers run on its blocking
    /// pool.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::AlreadyActive`] while a session is starting or active.
    /// - Any error from the display probe or the projector.  The service is
    ///   back in `Idle` when this returns.
    ///
    /// Dropping the returned future before it completes also leaves the
    /// service in `Idle`.
    pub async fn start(&self, max_width: Option<u32>) -> Result<OutputResolution, CaptureError> {
        let pending = self.begin_starting()?;
        let mut slot = self.lifecycle.lock().await;

        match self.open_session(max_width).await {
            Ok(session) => {
                let resolution = session.resolution;
                info!(
                    session = %session.id,
                    width = resolution.width,
                    height = resolution.height,
                    dpi = resolution.density_dpi,
                    "capture session active"
                );
                self.set_observed(
                    CaptureState::Active,
                    Some(SessionView {
                        id: session.id,
                        resolution,
                        relay: Arc::clone(&session.relay),
                    }),
                );
                pending.disarm();
                *slot = Some(session);
                Ok(resolution)
            }
            Err(e) => {
                warn!("capture start failed: {e}");
                Err(e)
            }
        }
    }

    /// Stops the active session.
    ///
    /// Returns `Ok(false)` if nothing was running.  A stop issued while a
    /// start is still pending waits for it and then stops the new session.
    pub async fn stop(&self) -> Result<bool, CaptureError> {
        let mut slot = self.lifecycle.lock().await;
        let Some(session) = slot.take() else {
            debug!("stop requested with no active session");
            return Ok(false);
        };

        session.source.set_listener(None);
        session.relay.close().await;
        session.source.close();

        let frames = session.relay.stats();
        self.set_observed(CaptureState::Idle, None);
        info!(
            session = %session.id,
            events = frames.events,
            encoded = frames.encoded,
            dropped = frames.dropped,
            failed = frames.failed,
            "capture session stopped"
        );
        Ok(true)
    }

    /// A new receiver of encoded images.  Stays valid across sessions.
    pub fn subscribe(&self) -> broadcast::Receiver<EncodedImage> {
        self.sink.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        self.observed().state
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    pub fn status(&self) -> CaptureStatusDto {
        let observed = self.observed();
        let view = observed.session.as_ref();
        CaptureStatusDto {
            state: observed.state,
            session_id: view.map(|v| v.id.to_string()),
            resolution: view.map(|v| v.resolution),
            frames: view.map(|v| v.relay.stats()).unwrap_or_else(FrameCounters::default),
            viewers: self.sink.receiver_count(),
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn observed(&self) -> std::sync::MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_starting(&self) -> Result<PendingStart<'_>, CaptureError> {
        let mut observed = self.observed();
        if observed.state != CaptureState::Idle {
            return Err(CaptureError::AlreadyActive);
        }
        observed.state = CaptureState::Starting;
        Ok(PendingStart { service: self, armed: true })
    }

    fn set_observed(&self, state: CaptureState, session: Option<SessionView>) {
        let mut observed = self.observed();
        observed.state = state;
        observed.session = session;
    }

    async fn open_session(&self, max_width: Option<u32>) -> Result<CaptureSession, CaptureError> {
        let max_width = max_width.unwrap_or(self.settings.default_max_width);
        if max_width == 0 {
            return Err(CaptureError::Display("maximum width must be positive".into()));
        }

        let metrics = self.probe.display_metrics()?;
        let resolution = negotiate_resolution(metrics, max_width);
        debug!(?metrics, ?resolution, "resolution negotiated");

        let source = self.projector.open(resolution).await?;
        let relay = Arc::new(FrameRelay::new(
            Arc::clone(&source),
            Arc::clone(&self.encoder),
            self.sink.clone(),
            Handle::current(),
        ));

        let weak = Arc::downgrade(&relay);
        source.set_listener(Some(Box::new(move || {
            if let Some(relay) = weak.upgrade() {
                relay.on_frame_available();
            }
        })));

        Ok(CaptureSession { id: Uuid::new_v4(), resolution, source, relay })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
