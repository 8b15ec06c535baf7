//! Source media decoding.
//!
//! Stills are decoded with `image`; video frames are pulled one at a time
//! from ffmpeg as raw RGBA at the requested source time.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use image::RgbaImage;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline::MediaItem;

/// Opens still images and videos referenced by the media catalog.
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    /// Decode a still image.
    async fn load_image(&self, url: &str) -> ReelforgeResult<RgbaImage>;

    /// Open a video for seeking. The handle is not ready until
    /// [`VideoHandle::wait_ready`] returns.
    async fn open_video(&self, item: &MediaItem) -> ReelforgeResult<Box<dyn VideoHandle>>;
}

/// A seekable decoded video.
#[async_trait::async_trait]
pub trait VideoHandle: Send {
    /// Wait until metadata is known and seeking is possible.
    async fn wait_ready(&mut self) -> ReelforgeResult<()>;

    /// Source duration in seconds (0 when unknown).
    fn duration_secs(&self) -> f64;

    /// Time of the currently decoded frame.
    fn position_secs(&self) -> f64;

    /// Native frame size.
    fn dimensions(&self) -> (u32, u32);

    /// Seek to `target_secs` and decode the frame there. Resolves when the
    /// seek has completed; callers bound it with a timeout.
    async fn seek(&mut self, target_secs: f64) -> ReelforgeResult<()>;

    /// Most recently decoded frame.
    fn current_frame(&self) -> Option<&RgbaImage>;

    /// Forget the decoded frame so the next seek decodes again, even to the
    /// same position.
    fn invalidate(&mut self);

    /// Release decoder resources.
    async fn close(&mut self);
}

/// Strip a `file://` scheme, leaving a filesystem path.
pub fn url_to_path(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}

/// ffmpeg/ffprobe backed media source.
#[derive(Debug, Clone)]
pub struct FfmpegMediaSource {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegMediaSource {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegMediaSource {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait::async_trait]
impl MediaSource for FfmpegMediaSource {
    async fn load_image(&self, url: &str) -> ReelforgeResult<RgbaImage> {
        let path = url_to_path(url);
        if !path.exists() {
            return Err(ReelforgeError::FileNotFound { path });
        }

        let owned_url = url.to_string();
        tokio::task::spawn_blocking(move || {
            image::open(&path)
                .map(|img| img.to_rgba8())
                .map_err(|e| ReelforgeError::media_load(&owned_url, e.to_string()))
        })
        .await
        .map_err(|e| ReelforgeError::media_load(url, format!("decode task failed: {e}")))?
    }

    async fn open_video(&self, item: &MediaItem) -> ReelforgeResult<Box<dyn VideoHandle>> {
        let path = url_to_path(&item.url);
        if !path.exists() {
            return Err(ReelforgeError::FileNotFound { path });
        }

        Ok(Box::new(FfmpegVideoHandle {
            url: item.url.clone(),
            path,
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            width: item.width,
            height: item.height,
            duration_secs: item.duration_secs.unwrap_or(0.0),
            position_secs: 0.0,
            frame: None,
            ready: false,
        }))
    }
}

/// Video handle that decodes single frames on demand through ffmpeg.
pub struct FfmpegVideoHandle {
    url: String,
    path: PathBuf,
    ffmpeg: String,
    ffprobe: String,
    width: u32,
    height: u32,
    duration_secs: f64,
    position_secs: f64,
    frame: Option<RgbaImage>,
    ready: bool,
}

#[async_trait::async_trait]
impl VideoHandle for FfmpegVideoHandle {
    async fn wait_ready(&mut self) -> ReelforgeResult<()> {
        if self.ready {
            return Ok(());
        }

        let probe = probe_video(&self.ffprobe, &self.path)
            .await
            .map_err(|e| ReelforgeError::media_load(&self.url, e))?;
        if self.width == 0 || self.height == 0 {
            self.width = probe.width;
            self.height = probe.height;
        }
        if self.duration_secs <= 0.0 {
            self.duration_secs = probe.duration_secs;
        }
        if self.width == 0 || self.height == 0 {
            return Err(ReelforgeError::media_load(
                &self.url,
                "video stream has no dimensions",
            ));
        }

        tracing::debug!(
            url = %self.url,
            width = self.width,
            height = self.height,
            duration_secs = self.duration_secs,
            "Video ready"
        );
        self.ready = true;
        Ok(())
    }

    fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    fn position_secs(&self) -> f64 {
        self.position_secs
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn seek(&mut self, target_secs: f64) -> ReelforgeResult<()> {
        if self.frame.is_some() && (target_secs - self.position_secs).abs() < 1e-6 {
            return Ok(());
        }

        // Clamp just inside the stream so the last frame is still decodable.
        let target = if self.duration_secs > 0.0 {
            target_secs.clamp(0.0, (self.duration_secs - 0.001).max(0.0))
        } else {
            target_secs.max(0.0)
        };

        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss", &format!("{target:.3}"), "-i"])
            .arg(&self.path)
            .args([
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", self.width, self.height),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelforgeError::media_load(&self.url, format!("Failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ReelforgeError::media_load(
                &self.url,
                format!(
                    "ffmpeg frame decode failed (status {}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let frame = RgbaImage::from_raw(self.width, self.height, output.stdout).ok_or_else(|| {
            ReelforgeError::media_load(&self.url, format!("no frame decoded at {target:.3}s"))
        })?;
        self.frame = Some(frame);
        self.position_secs = target_secs;
        Ok(())
    }

    fn current_frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    fn invalidate(&mut self) {
        self.frame = None;
    }

    async fn close(&mut self) {
        self.frame = None;
        self.ready = false;
    }
}

/// Stream metadata reported by ffprobe.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

/// Probe the first video stream of `path`.
pub async fn probe_video(ffprobe: &str, path: &Path) -> Result<VideoProbe, String> {
    let output = tokio::process::Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("Failed to run ffprobe: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(parse_probe_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_probe_output(raw: &str) -> VideoProbe {
    let mut probe = VideoProbe::default();
    for line in raw.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => probe.width = value.parse().unwrap_or(0),
            "height" => probe.height = value.parse().unwrap_or(0),
            "duration" => probe.duration_secs = value.parse().unwrap_or(0.0),
            _ => {}
        }
    }
    probe
}
