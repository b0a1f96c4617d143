//! Integration tests for the capture path.
//!
//! These tests run the real relay, JPEG encoder and synthetic frame source
//! together through `CaptureService`, the way the binary wires them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};
use tortoise_core::{CaptureState, DisplayMetrics, EncodedImage, Frame, OutputResolution, PixelFormat};
use tortoise_device::application::capture_session::{
    CaptureError, CaptureService, CaptureSettings, ScreenProjector,
};
use tortoise_device::application::relay_frames::{EncodeError, FrameEncoder, FrameSource};
use tortoise_device::infrastructure::display_info::FixedDisplayProbe;
use tortoise_device::infrastructure::encoder::JpegFrameEncoder;
use tortoise_device::infrastructure::frame_source::SyntheticProjector;

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Wraps the JPEG encoder with a fixed delay and tracks how many encodes
/// overlap.
struct SlowEncoder {
    inner: JpegFrameEncoder,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl SlowEncoder {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: JpegFrameEncoder::default(),
            delay,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        })
    }
}

impl FrameEncoder for SlowEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let result = self.inner.encode(frame);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn quality(&self) -> u8 {
        self.inner.quality()
    }
}

/// Holds `open` until the test grants consent, keeping the service in
/// `Starting`.
struct ConsentProjector {
    inner: Arc<SyntheticProjector>,
    consent: Notify,
}

impl ConsentProjector {
    fn new() -> Arc<Self> {
        Arc::new(Self { inner: Arc::new(SyntheticProjector::new(2)), consent: Notify::new() })
    }

    fn grant(&self) {
        self.consent.notify_one();
    }
}

#[async_trait]
impl ScreenProjector for ConsentProjector {
    async fn open(&self, resolution: OutputResolution) -> Result<Arc<dyn FrameSource>, CaptureError> {
        self.consent.notified().await;
        self.inner.open(resolution).await
    }
}

fn small_display() -> FixedDisplayProbe {
    FixedDisplayProbe::new(DisplayMetrics { width: 320, height: 640, density_dpi: 160 })
}

fn settings() -> CaptureSettings {
    CaptureSettings { default_max_width: 600, sink_capacity: 256 }
}

fn service_with(projector: Arc<SyntheticProjector>, encoder: Arc<dyn FrameEncoder>) -> CaptureService {
    CaptureService::new(Arc::new(small_display()), projector, encoder, settings())
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<EncodedImage>) -> Vec<EncodedImage> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(image) => out.push(image),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
        }
    }
}

// ── Drop policy ───────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_against_slow_encoder_drops_frames_and_never_overlaps() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2));
    let encoder = SlowEncoder::new(Duration::from_millis(5));
    let svc = service_with(Arc::clone(&projector), encoder.clone());
    let mut rx = svc.subscribe();
    assert_ok!(svc.start(None).await);
    let source = projector.last_opened().unwrap();

    // Act: 100 frame-ready events back to back.
    for _ in 0..100 {
        source.fire();
    }
    assert_ok!(svc.stop().await);

    // Assert
    let calls = encoder.calls.load(Ordering::SeqCst);
    assert!(calls >= 1, "at least the first frame is encoded");
    assert!(calls < 100, "expected drops, got {calls} encodes for 100 events");
    assert_eq!(encoder.max_running.load(Ordering::SeqCst), 1);

    assert_eq!(source.acquired(), source.released());
    assert_eq!(source.outstanding(), 0);
    assert_eq!(source.stalls(), 0);

    let images = drain(&mut rx);
    assert_eq!(images.len(), calls);
    for pair in images.windows(2) {
        assert!(pair[0].sequence < pair[1].sequence);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_counters_add_up_after_stop() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2));
    let encoder = SlowEncoder::new(Duration::from_millis(2));
    let svc = service_with(Arc::clone(&projector), encoder.clone());
    svc.start(None).await.unwrap();
    let source = projector.last_opened().unwrap();

    // Act
    for _ in 0..40 {
        source.fire();
        tokio::task::yield_now().await;
    }

    // Wait for the in-flight encode to settle.
    let frames = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frames = svc.status().frames;
            if frames.encoded + frames.failed == frames.admitted() {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("relay settles within timeout");
    svc.stop().await.unwrap();

    // Assert: every admitted frame reached the encoder exactly once.
    assert_eq!(frames.events, 40);
    assert!(frames.admitted() >= 1);
    assert_eq!(frames.failed, 0);
    assert_eq!(frames.encoded as usize, encoder.calls.load(Ordering::SeqCst));
    assert_eq!(source.acquired(), source.released());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_frames_are_cropped_to_negotiated_resolution() {
    // Arrange: 1080-wide panel, 600 budget, rows padded to 64 bytes.
    let projector = Arc::new(SyntheticProjector::new(2));
    let svc = CaptureService::new(
        Arc::new(FixedDisplayProbe::phone_1080x2400()),
        projector.clone(),
        Arc::new(JpegFrameEncoder::new(70)),
        settings(),
    );
    let mut rx = svc.subscribe();
    svc.start(None).await.unwrap();
    let source = projector.last_opened().unwrap();
    assert!(source.row_stride() > 600 * 4);

    // Act
    source.fire();
    let image = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("image within timeout")
        .unwrap();
    svc.stop().await.unwrap();

    // Assert
    assert_eq!((image.width, image.height, image.quality), (600, 1333, 70));
    let decoded = image::load_from_memory(&image.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (600, 1333));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bgra_frames_encode_end_to_end() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2).with_format(PixelFormat::Bgra8888));
    let svc = service_with(Arc::clone(&projector), Arc::new(JpegFrameEncoder::default()));
    let mut rx = svc.subscribe();
    svc.start(None).await.unwrap();

    // Act
    projector.last_opened().unwrap().fire();
    let image = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("image within timeout")
        .unwrap();
    svc.stop().await.unwrap();

    // Assert
    let decoded = image::load_from_memory(&image.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 640));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ticker_driven_session_streams_images() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2).with_fps(120));
    let svc = service_with(Arc::clone(&projector), Arc::new(JpegFrameEncoder::default()));
    let mut rx = svc.subscribe();

    // Act
    svc.start(None).await.unwrap();
    let mut sequences = Vec::new();
    while sequences.len() < 3 {
        let image = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("image within timeout")
            .unwrap();
        sequences.push(image.sequence);
    }
    svc.stop().await.unwrap();

    // Assert
    assert_eq!(sequences, vec![0, 1, 2]);
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_start_is_rejected_without_opening_a_display() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2));
    let svc = service_with(Arc::clone(&projector), Arc::new(JpegFrameEncoder::default()));
    svc.start(None).await.unwrap();

    // Act
    let second = svc.start(Some(300)).await;

    // Assert
    assert!(matches!(second, Err(CaptureError::AlreadyActive)));
    assert_eq!(projector.open_count(), 1);
    assert_eq!(svc.state(), CaptureState::Active);
    svc.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_while_starting_is_rejected() {
    // Arrange
    let projector = ConsentProjector::new();
    let svc = CaptureService::new(
        Arc::new(small_display()),
        projector.clone(),
        Arc::new(JpegFrameEncoder::default()),
        settings(),
    );

    // Act: the second start arrives while the first waits for consent.
    let (first, (seen, second)) = tokio::join!(svc.start(None), async {
        let seen = svc.state();
        let second = svc.start(Some(300)).await;
        projector.grant();
        (seen, second)
    });

    // Assert
    assert_eq!(seen, CaptureState::Starting);
    assert!(matches!(second, Err(CaptureError::AlreadyActive)));
    assert_ok!(first);
    assert_eq!(projector.inner.open_count(), 1);
    assert_eq!(svc.state(), CaptureState::Active);
    svc.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_while_starting_waits_then_tears_down() {
    // Arrange
    let projector = ConsentProjector::new();
    let svc = CaptureService::new(
        Arc::new(small_display()),
        projector.clone(),
        Arc::new(JpegFrameEncoder::default()),
        settings(),
    );

    // Act
    let (started, (seen, stopped)) = tokio::join!(svc.start(None), async {
        let seen = svc.state();
        projector.grant();
        (seen, svc.stop().await)
    });

    // Assert: the start completed, then the stop closed that session.
    assert_eq!(seen, CaptureState::Starting);
    assert_ok!(started);
    assert!(stopped.unwrap());
    assert_eq!(svc.state(), CaptureState::Idle);
    assert_eq!(projector.inner.open_count(), 1);
    assert!(projector.inner.last_opened().unwrap().is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_tears_down_source_and_allows_restart() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2));
    let svc = service_with(Arc::clone(&projector), Arc::new(JpegFrameEncoder::default()));
    let mut rx = svc.subscribe();
    svc.start(None).await.unwrap();
    let first = projector.last_opened().unwrap();
    first.fire();

    // Act
    assert!(svc.stop().await.unwrap());
    assert!(!svc.stop().await.unwrap());
    svc.start(None).await.unwrap();
    let second = projector.last_opened().unwrap();
    second.fire();
    svc.stop().await.unwrap();

    // Assert
    assert!(first.is_closed());
    assert!(!first.has_listener());
    assert_eq!(first.outstanding(), 0);
    assert!(!first.fire(), "closed source produces nothing");
    assert_eq!(projector.open_count(), 2);

    // Sequence numbers restart with each session.
    let sequences: Vec<u64> = drain(&mut rx).iter().map(|i| i.sequence).collect();
    assert_eq!(sequences, vec![0, 0]);
}

#[tokio::test]
async fn test_stop_when_idle_is_a_noop() {
    let svc = service_with(Arc::new(SyntheticProjector::new(2)), Arc::new(JpegFrameEncoder::default()));
    assert!(!svc.stop().await.unwrap());
    assert_eq!(svc.state(), CaptureState::Idle);
}

#[tokio::test]
async fn test_permission_denied_then_granted() {
    // Arrange
    let projector = Arc::new(SyntheticProjector::new(2));
    let svc = service_with(Arc::clone(&projector), Arc::new(JpegFrameEncoder::default()));
    projector.set_deny_permission(true);

    // Act / Assert: denied start leaves everything idle.
    let denied = svc.start(None).await;
    assert!(matches!(denied, Err(CaptureError::PermissionDenied)));
    assert_eq!(svc.state(), CaptureState::Idle);
    assert_eq!(projector.open_count(), 0);

    // Act / Assert: the next attempt succeeds.
    projector.set_deny_permission(false);
    assert_ok!(svc.start(None).await);
    assert_eq!(svc.state(), CaptureState::Active);
    svc.stop().await.unwrap();
}

#[tokio::test]
async fn test_display_failure_returns_to_idle() {
    let projector = Arc::new(SyntheticProjector::new(2));
    projector.set_fail_display(true);
    let svc = service_with(Arc::clone(&projector), Arc::new(JpegFrameEncoder::default()));

    assert_err!(svc.start(None).await);
    assert_eq!(svc.state(), CaptureState::Idle);
    assert!(svc.status().resolution.is_none());
}

#[tokio::test]
async fn test_missing_display_fails_start() {
    let svc = CaptureService::new(
        Arc::new(FixedDisplayProbe::disconnected()),
        Arc::new(SyntheticProjector::new(2)),
        Arc::new(JpegFrameEncoder::default()),
        settings(),
    );
    assert!(matches!(svc.start(None).await, Err(CaptureError::Display(_))));
}
