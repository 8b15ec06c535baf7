//! Capture backends: where composited frames go to be encoded.
//!
//! Two interchangeable strategies sit behind [`CaptureBackend`]:
//! - [`live::LiveCapture`] feeds a continuously running real-time recorder.
//! - [`offline::OfflineFrameEncoder`] serializes every frame to a still and
//!   assembles the container afterwards, independent of wall-clock time.

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use reelforge_common::config::{CaptureBackendKind, ExportDefaults};
use reelforge_common::error::ReelforgeResult;
use reelforge_timeline::{ExportFormat, ExportPurpose, ExportQuality, ExportSettings};

pub mod live;
pub mod offline;

pub use live::{FfmpegStreamRecorder, LiveCapture, StreamRecorder};
pub use offline::{FfmpegSequenceEncoder, FrameSequenceEncoder, OfflineFrameEncoder, StillFormat};

/// Output parameters handed to a backend when a session begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: ExportFormat,
    pub quality: ExportQuality,
    pub purpose: ExportPurpose,
}

impl CaptureSpec {
    pub fn from_settings(settings: &ExportSettings, fps: u32) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            fps,
            format: settings.format,
            quality: settings.quality,
            purpose: settings.purpose,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Encoder side of an export session.
///
/// A backend is owned by exactly one session. `abort` must be safe to call
/// in any state, including before `begin` and after `finalize`.
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Backend name for logs and reports.
    fn name(&self) -> &str;

    /// Whether `begin` succeeded and neither `finalize` nor `abort` ran yet.
    fn is_recording(&self) -> bool;

    /// Prepare the encoder. Failures are reported as `EncoderInit`.
    async fn begin(&mut self, spec: &CaptureSpec) -> ReelforgeResult<()>;

    /// Hand over the composited frame `index`.
    async fn submit_frame(&mut self, frame: &RgbaImage, index: u64) -> ReelforgeResult<()>;

    /// Finish encoding and return the container bytes.
    async fn finalize(&mut self) -> ReelforgeResult<Vec<u8>>;

    /// Stop and release everything, discarding output.
    async fn abort(&mut self);
}

/// Creates a fresh backend for each export session.
pub trait BackendFactory: Send + Sync {
    fn create(&self) -> Box<dyn CaptureBackend>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Box<dyn CaptureBackend> + Send + Sync,
{
    fn create(&self) -> Box<dyn CaptureBackend> {
        self()
    }
}

/// Factory for the configured backend kind.
///
/// `frame_yield` is the pause after each live frame; the offline backend ignores it.
pub fn backend_factory(
    kind: CaptureBackendKind,
    defaults: &ExportDefaults,
    frame_yield: Duration,
) -> Arc<dyn BackendFactory> {
    let ffmpeg = defaults.ffmpeg_binary.clone();
    match kind {
        CaptureBackendKind::Live => Arc::new(move || -> Box<dyn CaptureBackend> {
            Box::new(
                LiveCapture::new(Box::new(FfmpegStreamRecorder::new(ffmpeg.clone())))
                    .with_frame_yield(frame_yield),
            )
        }),
        CaptureBackendKind::Offline => Arc::new(move || -> Box<dyn CaptureBackend> {
            Box::new(OfflineFrameEncoder::new(Box::new(FfmpegSequenceEncoder::new(
                ffmpeg.clone(),
            ))))
        }),
    }
}

/// ffmpeg output arguments for a capture spec.
///
/// `streaming` selects muxer flags that work on a non-seekable pipe.
pub fn codec_args(spec: &CaptureSpec, streaming: bool) -> Vec<String> {
    let bitrate = format!("{}k", spec.quality.video_bitrate_kbps());
    let preview = spec.purpose == ExportPurpose::Preview;

    let mut args = vec![
        "-an".to_string(),
        "-c:v".to_string(),
        spec.format.video_codec().to_string(),
        "-b:v".to_string(),
        bitrate,
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ];

    match spec.format {
        ExportFormat::Webm => {
            args.extend([
                "-deadline".to_string(),
                if preview { "realtime" } else { "good" }.to_string(),
                "-cpu-used".to_string(),
                if preview { "8" } else { "2" }.to_string(),
            ]);
        }
        ExportFormat::Mp4 | ExportFormat::Mov => {
            args.extend([
                "-preset".to_string(),
                if preview { "veryfast" } else { "medium" }.to_string(),
                "-movflags".to_string(),
                if streaming {
                    "frag_keyframe+empty_moov"
                } else {
                    "+faststart"
                }
                .to_string(),
            ]);
        }
    }

    args.extend(["-f".to_string(), spec.format.muxer().to_string()]);
    args
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
