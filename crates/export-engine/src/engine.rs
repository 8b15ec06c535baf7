//! Export sessions and the frame loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;
use reelforge_common::clock::{frame_time_secs, total_frames, DurationDrift, Stopwatch, Throughput};
use reelforge_common::config::ExportDefaults;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline::ExportSnapshot;
use serde::Serialize;
use tracing::Instrument;

use crate::cache::{CacheStats, DecodedMediaCache};
use crate::capture::{backend_factory, BackendFactory, CaptureBackend, CaptureSpec};
use crate::media::{FfmpegMediaSource, MediaSource};
use crate::renderer::FrameRenderer;
use crate::text::{FontTextRasterizer, TextRasterizer};
use crate::tuning::RenderTuning;

/// Share of the progress bar covered by the frame loop; the rest is finalization.
const RENDER_PERCENT: f64 = 95.0;

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    /// Overall progress in [0, 100].
    pub percent: f64,

    /// Human-readable status line.
    pub status: String,

    /// Current stage.
    pub stage: ExportStage,

    /// Per-frame statistics, present while rendering.
    pub advanced: Option<AdvancedProgress>,
}

/// Frame counters and throughput for one progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdvancedProgress {
    pub current_frame: u64,
    pub total_frames: u64,
    pub encoding_speed_fps: f64,
    pub elapsed_secs: f64,
    pub average_frame_time_ms: f64,
    pub estimated_secs_remaining: f64,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
}

/// Summary of a finished export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub frames_rendered: u64,
    pub total_frames: u64,
    pub fps: u32,
    pub elapsed_secs: f64,
    pub expected_duration_secs: f64,
    pub actual_duration_secs: f64,
    pub drift_secs: f64,
    /// Elements left out under the skip policy, counted once per frame.
    pub skipped_elements: u64,
    pub cache: CacheStats,
    pub backend: String,
    pub mime_type: String,
    pub output_filename: String,
    pub output_bytes: usize,
}

/// Renders snapshots into encoded video, one session at a time.
pub struct ExportEngine {
    fps: u32,
    tuning: RenderTuning,
    media: Arc<dyn MediaSource>,
    text: Option<Arc<dyn TextRasterizer>>,
    backends: Arc<dyn BackendFactory>,
    in_progress: AtomicBool,
    active_token: Mutex<Option<Arc<AtomicBool>>>,
}

impl ExportEngine {
    pub fn new(fps: u32, media: Arc<dyn MediaSource>, backends: Arc<dyn BackendFactory>) -> Self {
        Self {
            fps: fps.max(1),
            tuning: RenderTuning::default(),
            media,
            text: None,
            backends,
            in_progress: AtomicBool::new(false),
            active_token: Mutex::new(None),
        }
    }

    /// Engine wired to ffmpeg and the configured backend kind.
    ///
    /// A configured font that fails to load is logged and text is skipped.
    pub fn from_config(defaults: &ExportDefaults) -> Self {
        let tuning = RenderTuning::default();
        let media = Arc::new(FfmpegMediaSource::new(
            defaults.ffmpeg_binary.clone(),
            defaults.ffprobe_binary.clone(),
        ));
        let backends = backend_factory(defaults.backend, defaults, tuning.live_frame_yield);
        let mut engine = Self::new(defaults.fps, media, backends).with_tuning(tuning);

        if let Some(path) = &defaults.font_path {
            match FontTextRasterizer::from_path(path) {
                Ok(font) => engine = engine.with_text_rasterizer(Arc::new(font)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load font");
                }
            }
        }
        engine
    }

    pub fn with_tuning(mut self, tuning: RenderTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_text_rasterizer(mut self, text: Arc<dyn TextRasterizer>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn tuning(&self) -> &RenderTuning {
        &self.tuning
    }

    pub fn is_export_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Request cancellation of the running export.
    ///
    /// Observed at the next frame boundary. No-op when nothing is running.
    pub fn cancel(&self) {
        if let Some(token) = self.token_slot().as_ref() {
            if !token.swap(true, Ordering::SeqCst) {
                tracing::info!("Export cancellation requested");
            }
        }
    }

    /// Render `snapshot` and return the encoded container bytes.
    ///
    /// A zero output size or a timeline that yields no frames is rejected up
    /// front with [`ReelforgeError::Config`]; no backend is started.
    pub async fn export(
        &self,
        snapshot: &ExportSnapshot,
        progress: Option<ProgressCallback>,
    ) -> ReelforgeResult<Vec<u8>> {
        self.export_with_report(snapshot, progress)
            .await
            .map(|(bytes, _)| bytes)
    }

    /// Like [`ExportEngine::export`], also returning the session summary.
    pub async fn export_with_report(
        &self,
        snapshot: &ExportSnapshot,
        progress: Option<ProgressCallback>,
    ) -> ReelforgeResult<(Vec<u8>, ExportReport)> {
        let _guard = self.acquire()?;
        let token = Arc::new(AtomicBool::new(false));
        *self.token_slot() = Some(token.clone());

        let settings = &snapshot.settings;
        tracing::info!(
            width = settings.width,
            height = settings.height,
            fps = self.fps,
            format = settings.format.extension(),
            quality = ?settings.quality,
            purpose = ?settings.purpose,
            elements = snapshot.timeline.element_count(),
            "Starting export"
        );

        let progress = ProgressEmitter(progress);
        progress.emit(0.0, "Preparing export", ExportStage::Preparing, None);

        if settings.width == 0 || settings.height == 0 {
            return Err(ReelforgeError::config(format!(
                "Invalid output size {}x{}",
                settings.width, settings.height
            )));
        }
        let duration_secs = snapshot.timeline.duration_secs();
        let total = total_frames(duration_secs, self.fps);
        if total == 0 {
            return Err(ReelforgeError::config(format!(
                "Timeline yields no frames (duration {duration_secs:.3}s at {} fps)",
                self.fps
            )));
        }

        let session = ExportSession {
            token,
            cache: DecodedMediaCache::new(),
            backend: self.backends.create(),
            renderer: FrameRenderer::new(self.media.clone(), self.text.clone(), self.tuning.clone()),
            stopwatch: Stopwatch::start(),
            frames_rendered: 0,
            skipped_elements: 0,
        };
        let span = tracing::info_span!("export_session", fps = self.fps, total_frames = total);
        session
            .run(snapshot, self.fps, total, duration_secs, &self.tuning, &progress)
            .instrument(span)
            .await
    }

    fn acquire(&self) -> ReelforgeResult<InProgressGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ReelforgeError::AlreadyExporting)?;
        Ok(InProgressGuard { engine: self })
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.active_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-progress flag and the session token when the export ends.
struct InProgressGuard<'a> {
    engine: &'a ExportEngine,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        *self.engine.token_slot() = None;
        self.engine.in_progress.store(false, Ordering::SeqCst);
    }
}

struct ProgressEmitter(Option<ProgressCallback>);

impl ProgressEmitter {
    fn emit(
        &self,
        percent: f64,
        status: impl Into<String>,
        stage: ExportStage,
        advanced: Option<AdvancedProgress>,
    ) {
        if let Some(cb) = &self.0 {
            cb(ExportProgress {
                percent: percent.clamp(0.0, 100.0),
                status: status.into(),
                stage,
                advanced,
            });
        }
    }
}

/// State owned by one `export` call.
struct ExportSession {
    token: Arc<AtomicBool>,
    cache: DecodedMediaCache,
    backend: Box<dyn CaptureBackend>,
    renderer: FrameRenderer,
    stopwatch: Stopwatch,
    frames_rendered: u64,
    skipped_elements: u64,
}

impl ExportSession {
    /// Drive the session to completion, then tear it down exactly once.
    async fn run(
        mut self,
        snapshot: &ExportSnapshot,
        fps: u32,
        total: u64,
        duration_secs: f64,
        tuning: &RenderTuning,
        progress: &ProgressEmitter,
    ) -> ReelforgeResult<(Vec<u8>, ExportReport)> {
        let spec = CaptureSpec::from_settings(&snapshot.settings, fps);
        let outcome = self.encode(snapshot, &spec, total, progress).await;
        let failed = outcome.is_err();
        let cache_stats = self.cache.stats();
        self.teardown(failed).await;

        let bytes = match outcome {
            Ok(bytes) => bytes,
            Err(ReelforgeError::Cancelled) => {
                tracing::info!(frames = self.frames_rendered, total, "Export cancelled");
                return Err(ReelforgeError::Cancelled);
            }
            Err(err) => {
                tracing::error!(
                    frames = self.frames_rendered,
                    total,
                    backend = self.backend.name(),
                    error = %err,
                    "Export failed"
                );
                return Err(err);
            }
        };

        let drift = DurationDrift::from_frames(duration_secs, self.frames_rendered, fps);
        if drift.exceeds_tolerance_secs(tuning.duration_tolerance_secs) {
            tracing::warn!(
                expected_secs = drift.expected_secs,
                actual_secs = drift.actual_secs,
                drift_secs = drift.drift_secs(),
                "Output duration differs from timeline duration"
            );
        }

        let report = ExportReport {
            frames_rendered: self.frames_rendered,
            total_frames: total,
            fps,
            elapsed_secs: self.stopwatch.elapsed_secs(),
            expected_duration_secs: drift.expected_secs,
            actual_duration_secs: drift.actual_secs,
            drift_secs: drift.drift_secs(),
            skipped_elements: self.skipped_elements,
            cache: cache_stats,
            backend: self.backend.name().to_string(),
            mime_type: spec.mime_type().to_string(),
            output_filename: snapshot.settings.output_filename(),
            output_bytes: bytes.len(),
        };

        progress.emit(100.0, "Export complete", ExportStage::Complete, None);
        tracing::info!(
            frames = report.frames_rendered,
            bytes = report.output_bytes,
            elapsed_secs = report.elapsed_secs,
            cache_hits = report.cache.hits,
            cache_misses = report.cache.misses,
            backend = %report.backend,
            "Export finished"
        );
        Ok((bytes, report))
    }

    async fn encode(
        &mut self,
        snapshot: &ExportSnapshot,
        spec: &CaptureSpec,
        total: u64,
        progress: &ProgressEmitter,
    ) -> ReelforgeResult<Vec<u8>> {
        self.backend.begin(spec).await.map_err(|e| match e {
            e @ ReelforgeError::EncoderInit { .. } => e,
            other => ReelforgeError::encoder_init(other.to_string()),
        })?;
        tracing::info!(backend = self.backend.name(), total_frames = total, "Capture started");

        let mut canvas = RgbaImage::new(spec.width, spec.height);
        for index in 0..total {
            if self.is_cancelled() {
                return Err(ReelforgeError::Cancelled);
            }

            let t = frame_time_secs(index, spec.fps);
            let frame = self
                .renderer
                .render_frame(&mut canvas, snapshot, &mut self.cache, t)
                .await
                .map_err(|err| {
                    tracing::error!(frame = index, time_secs = t, error = %err, "Frame render failed");
                    err
                })?;
            self.skipped_elements += frame.skipped.len() as u64;
            tracing::trace!(frame = index, drawn = ?frame.drawn, "Frame rendered");

            self.backend.submit_frame(&canvas, index).await?;
            self.frames_rendered += 1;

            let done = self.frames_rendered;
            let elapsed_secs = self.stopwatch.elapsed_secs();
            let throughput = Throughput::measure(done, total, elapsed_secs);
            progress.emit(
                done as f64 / total as f64 * RENDER_PERCENT,
                format!("Rendering frame {done}/{total}"),
                ExportStage::Rendering,
                Some(AdvancedProgress {
                    current_frame: done,
                    total_frames: total,
                    encoding_speed_fps: throughput.frames_per_sec,
                    elapsed_secs,
                    average_frame_time_ms: throughput.average_frame_time_ms,
                    estimated_secs_remaining: throughput.estimated_secs_remaining,
                }),
            );
        }

        if self.is_cancelled() {
            return Err(ReelforgeError::Cancelled);
        }

        progress.emit(RENDER_PERCENT, "Finalizing video", ExportStage::Finalizing, None);
        self.backend.finalize().await
    }

    fn is_cancelled(&self) -> bool {
        self.token.load(Ordering::SeqCst)
    }

    async fn teardown(&mut self, failed: bool) {
        if failed {
            self.backend.abort().await;
        }
        self.cache.clear().await;
        tracing::debug!(failed, "Export session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoHandle;
    use reelforge_timeline::{
        ExportSettings, MediaCatalog, MediaItem, TextContent, Timeline, TimelineElement, Track,
        TrackKind,
    };

    struct NoMedia;

    #[async_trait::async_trait]
    impl MediaSource for NoMedia {
        async fn load_image(&self, url: &str) -> ReelforgeResult<RgbaImage> {
            Err(ReelforgeError::media_load(url, "no media in this test"))
        }

        async fn open_video(&self, item: &MediaItem) -> ReelforgeResult<Box<dyn VideoHandle>> {
            Err(ReelforgeError::media_load(&item.url, "no media in this test"))
        }
    }

    #[derive(Default)]
    struct NullBackend {
        recording: bool,
    }

    #[async_trait::async_trait]
    impl CaptureBackend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }

        fn is_recording(&self) -> bool {
            self.recording
        }

        async fn begin(&mut self, _spec: &CaptureSpec) -> ReelforgeResult<()> {
            self.recording = true;
            Ok(())
        }

        async fn submit_frame(&mut self, _frame: &RgbaImage, _index: u64) -> ReelforgeResult<()> {
            Ok(())
        }

        async fn finalize(&mut self) -> ReelforgeResult<Vec<u8>> {
            self.recording = false;
            Ok(b"video".to_vec())
        }

        async fn abort(&mut self) {
            self.recording = false;
        }
    }

    fn engine() -> ExportEngine {
        ExportEngine::new(
            10,
            Arc::new(NoMedia),
            Arc::new(|| -> Box<dyn CaptureBackend> { Box::new(NullBackend::default()) }),
        )
    }

    fn text_snapshot(duration: f64) -> ExportSnapshot {
        let timeline = Timeline::new().with_track(Track::new(TrackKind::Text).with_element(
            TimelineElement::text("title", TextContent::new("Hello"), 0.0, duration),
        ));
        ExportSnapshot::new(
            timeline,
            MediaCatalog::default(),
            ExportSettings::new(32, 18, Default::default()),
        )
    }

    #[tokio::test]
    async fn test_export_reports_frames_and_milestones() {
        let engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let (bytes, report) = engine
            .export_with_report(
                &text_snapshot(1.0),
                Some(Box::new(move |p: ExportProgress| sink.lock().unwrap().push(p))),
            )
            .await
            .unwrap();

        assert_eq!(bytes, b"video");
        assert_eq!(report.frames_rendered, 10);
        assert_eq!(report.total_frames, 10);
        assert_eq!(report.backend, "null");
        assert_eq!(report.output_filename, "export.webm");
        assert!(report.drift_secs.abs() < 1e-9);
        assert!(!engine.is_export_in_progress());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first().map(|p| p.stage), Some(ExportStage::Preparing));
        assert_eq!(seen.first().map(|p| p.percent), Some(0.0));
        let finalizing = &seen[seen.len() - 2];
        assert_eq!(finalizing.stage, ExportStage::Finalizing);
        assert_eq!(finalizing.percent, 95.0);
        assert_eq!(seen.last().map(|p| p.percent), Some(100.0));
        assert_eq!(seen.last().map(|p| p.status.as_str()), Some("Export complete"));

        let rendering: Vec<&ExportProgress> = seen
            .iter()
            .filter(|p| p.stage == ExportStage::Rendering)
            .collect();
        assert_eq!(rendering.len(), 10);
        assert_eq!(rendering[0].status, "Rendering frame 1/10");
        assert!(rendering.windows(2).all(|w| w[0].percent < w[1].percent));
        assert!(rendering.iter().all(|p| p.percent <= 95.0));
    }

    #[tokio::test]
    async fn test_empty_timeline_is_rejected() {
        let engine = engine();
        let snapshot = ExportSnapshot::new(
            Timeline::new(),
            MediaCatalog::default(),
            ExportSettings::default(),
        );
        let err = engine.export(&snapshot, None).await.unwrap_err();
        assert!(matches!(err, ReelforgeError::Config { .. }));
        assert!(err.to_string().contains("yields no frames"));
        assert!(!engine.is_export_in_progress());
    }

    #[tokio::test]
    async fn test_zero_output_size_is_config_error() {
        let engine = engine();
        let mut snapshot = text_snapshot(1.0);
        snapshot.settings.width = 0;
        let err = engine.export(&snapshot, None).await.unwrap_err();
        assert!(matches!(err, ReelforgeError::Config { .. }));
    }

    #[test]
    fn test_cancel_without_export_is_noop() {
        let engine = engine();
        engine.cancel();
        engine.cancel();
        assert!(!engine.is_export_in_progress());
    }

    #[test]
    fn test_from_config_survives_missing_font() {
        let defaults = ExportDefaults {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..ExportDefaults::default()
        };
        let engine = ExportEngine::from_config(&defaults);
        assert_eq!(engine.fps(), defaults.fps);
        assert!(engine.text.is_none());
    }
}
