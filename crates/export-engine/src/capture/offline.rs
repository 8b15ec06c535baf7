//! Offline capture: numbered stills assembled into a container afterwards.
//!
//! Nothing here depends on wall-clock time, so slow frames never drop or
//! stretch the output.

use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;

use image::{DynamicImage, ImageFormat, RgbaImage};
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline::ExportPurpose;

use super::{codec_args, CaptureBackend, CaptureSpec};

/// Still image encoding used for intermediate frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillFormat {
    /// Lossless, for final renders.
    Png,
    /// Smaller and faster, for previews.
    Jpeg,
}

impl StillFormat {
    pub fn for_purpose(purpose: ExportPurpose) -> Self {
        match purpose {
            ExportPurpose::Final => StillFormat::Png,
            ExportPurpose::Preview => StillFormat::Jpeg,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpeg => "jpg",
        }
    }
}

/// Serialize a frame to still-image bytes.
pub fn encode_still(frame: &RgbaImage, format: StillFormat) -> ReelforgeResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    let result = match format {
        StillFormat::Png => frame.write_to(&mut out, ImageFormat::Png),
        // JPEG has no alpha channel.
        StillFormat::Jpeg => DynamicImage::ImageRgba8(frame.clone())
            .to_rgb8()
            .write_to(&mut out, ImageFormat::Jpeg),
    };
    result.map_err(|e| ReelforgeError::encode(format!("Failed to encode still: {e}")))?;
    Ok(out.into_inner())
}

/// Assembles an ordered sequence of encoded stills into a video container.
#[async_trait::async_trait]
pub trait FrameSequenceEncoder: Send {
    async fn start(&mut self, spec: &CaptureSpec, still: StillFormat) -> ReelforgeResult<()>;

    async fn add_frame(&mut self, still: Vec<u8>, index: u64) -> ReelforgeResult<()>;

    /// Encode everything added so far and return the container bytes.
    async fn finish(&mut self) -> ReelforgeResult<Vec<u8>>;

    /// Drop everything added so far.
    async fn cancel(&mut self);
}

/// [`CaptureBackend`] over a [`FrameSequenceEncoder`].
pub struct OfflineFrameEncoder {
    encoder: Box<dyn FrameSequenceEncoder>,
    still: StillFormat,
    recording: bool,
    frames: u64,
}

impl OfflineFrameEncoder {
    pub fn new(encoder: Box<dyn FrameSequenceEncoder>) -> Self {
        Self {
            encoder,
            still: StillFormat::Png,
            recording: false,
            frames: 0,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for OfflineFrameEncoder {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    async fn begin(&mut self, spec: &CaptureSpec) -> ReelforgeResult<()> {
        self.still = StillFormat::for_purpose(spec.purpose);
        self.encoder
            .start(spec, self.still)
            .await
            .map_err(|e| ReelforgeError::encoder_init(format!("frame sequence encoder: {e}")))?;
        self.recording = true;
        self.frames = 0;
        tracing::info!(
            width = spec.width,
            height = spec.height,
            fps = spec.fps,
            still = self.still.extension(),
            "Offline capture started"
        );
        Ok(())
    }

    async fn submit_frame(&mut self, frame: &RgbaImage, index: u64) -> ReelforgeResult<()> {
        if !self.recording {
            return Err(ReelforgeError::encode("offline encoder is not recording"));
        }
        let frame = frame.clone();
        let still = self.still;
        let bytes = tokio::task::spawn_blocking(move || encode_still(&frame, still))
            .await
            .map_err(|e| ReelforgeError::encode(format!("still encode task failed: {e}")))??;
        self.encoder.add_frame(bytes, index).await?;
        self.frames += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> ReelforgeResult<Vec<u8>> {
        if !self.recording {
            return Err(ReelforgeError::encode("offline encoder is not recording"));
        }
        self.recording = false;
        let bytes = self.encoder.finish().await?;
        tracing::info!(frames = self.frames, bytes = bytes.len(), "Offline capture finalized");
        Ok(bytes)
    }

    async fn abort(&mut self) {
        self.recording = false;
        self.encoder.cancel().await;
    }
}

/// Writes stills into a private temp directory and runs ffmpeg over them.
pub struct FfmpegSequenceEncoder {
    ffmpeg: String,
    spec: Option<CaptureSpec>,
    still: StillFormat,
    dir: Option<PathBuf>,
    frames: u64,
}

impl FfmpegSequenceEncoder {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            spec: None,
            still: StillFormat::Png,
            dir: None,
            frames: 0,
        }
    }

    fn frame_pattern(&self, dir: &std::path::Path) -> PathBuf {
        dir.join(format!("frame_%08d.{}", self.still.extension()))
    }

    async fn remove_dir(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove frame directory");
            }
        }
    }

    async fn assemble(&self, spec: &CaptureSpec, dir: &std::path::Path) -> ReelforgeResult<Vec<u8>> {
        let output_path = dir.join(format!("output.{}", spec.format.extension()));

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-framerate".to_string(),
            spec.fps.to_string(),
            "-i".to_string(),
            self.frame_pattern(dir).to_string_lossy().into_owned(),
        ];
        args.extend(codec_args(spec, false));
        args.push(output_path.to_string_lossy().into_owned());
        tracing::debug!(args = ?args, "Running ffmpeg sequence encode");

        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelforgeError::encode(format!("Failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ReelforgeError::encode(format!(
                "ffmpeg sequence encode failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(tokio::fs::read(&output_path).await?)
    }
}

#[async_trait::async_trait]
impl FrameSequenceEncoder for FfmpegSequenceEncoder {
    async fn start(&mut self, spec: &CaptureSpec, still: StillFormat) -> ReelforgeResult<()> {
        if !super::command_exists(&self.ffmpeg) && !std::path::Path::new(&self.ffmpeg).exists() {
            return Err(ReelforgeError::encoder_init(format!(
                "{} not found in PATH",
                self.ffmpeg
            )));
        }

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!(
            "reelforge-frames-{}-{nanos}",
            std::process::id()
        ));
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "Created frame directory");

        self.spec = Some(*spec);
        self.still = still;
        self.dir = Some(dir);
        self.frames = 0;
        Ok(())
    }

    async fn add_frame(&mut self, still: Vec<u8>, index: u64) -> ReelforgeResult<()> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| ReelforgeError::encode("sequence encoder not started"))?;
        let path = dir.join(format!("frame_{index:08}.{}", self.still.extension()));
        tokio::fs::write(&path, still).await?;
        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> ReelforgeResult<Vec<u8>> {
        let spec = self
            .spec
            .take()
            .ok_or_else(|| ReelforgeError::encode("sequence encoder not started"))?;
        let dir = self
            .dir
            .clone()
            .ok_or_else(|| ReelforgeError::encode("sequence encoder not started"))?;
        if self.frames == 0 {
            self.remove_dir().await;
            return Err(ReelforgeError::encode("no frames to encode"));
        }

        let result = self.assemble(&spec, &dir).await;
        self.remove_dir().await;
        result
    }

    async fn cancel(&mut self) {
        self.spec = None;
        self.remove_dir().await;
    }
}

impl Drop for FfmpegSequenceEncoder {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use reelforge_timeline::{ExportFormat, ExportQuality};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_still_format_follows_purpose() {
        assert_eq!(StillFormat::for_purpose(ExportPurpose::Final), StillFormat::Png);
        assert_eq!(StillFormat::for_purpose(ExportPurpose::Preview), StillFormat::Jpeg);
    }

    #[test]
    fn test_encode_still_signatures() {
        let frame = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
        let png = encode_still(&frame, StillFormat::Png).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        let jpeg = encode_still(&frame, StillFormat::Jpeg).unwrap();
        assert_eq!(&jpeg[..2], [0xFF, 0xD8]);
    }

    #[derive(Default)]
    struct Recorded {
        frames: Vec<(u64, usize)>,
        cancelled: bool,
    }

    struct MemorySequence(Arc<Mutex<Recorded>>);

    #[async_trait::async_trait]
    impl FrameSequenceEncoder for MemorySequence {
        async fn start(&mut self, _spec: &CaptureSpec, _still: StillFormat) -> ReelforgeResult<()> {
            Ok(())
        }

        async fn add_frame(&mut self, still: Vec<u8>, index: u64) -> ReelforgeResult<()> {
            self.0.lock().unwrap().frames.push((index, still.len()));
            Ok(())
        }

        async fn finish(&mut self) -> ReelforgeResult<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }

        async fn cancel(&mut self) {
            self.0.lock().unwrap().cancelled = true;
        }
    }

    fn spec(purpose: ExportPurpose) -> CaptureSpec {
        CaptureSpec {
            width: 8,
            height: 8,
            fps: 30,
            format: ExportFormat::Mp4,
            quality: ExportQuality::High,
            purpose,
        }
    }

    #[tokio::test]
    async fn test_frames_are_forwarded_in_order() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut backend = OfflineFrameEncoder::new(Box::new(MemorySequence(recorded.clone())));
        backend.begin(&spec(ExportPurpose::Preview)).await.unwrap();

        let frame = RgbaImage::from_pixel(8, 8, Rgba([200, 0, 0, 255]));
        for index in 0..3 {
            backend.submit_frame(&frame, index).await.unwrap();
        }
        assert_eq!(backend.finalize().await.unwrap(), vec![1, 2, 3]);

        let recorded = recorded.lock().unwrap();
        let indices: Vec<u64> = recorded.frames.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(recorded.frames.iter().all(|(_, len)| *len > 0));
    }

    #[tokio::test]
    async fn test_abort_cancels_sequence() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut backend = OfflineFrameEncoder::new(Box::new(MemorySequence(recorded.clone())));
        backend.begin(&spec(ExportPurpose::Final)).await.unwrap();
        backend.abort().await;
        assert!(!backend.is_recording());
        assert!(recorded.lock().unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_encoder_init() {
        let mut backend = OfflineFrameEncoder::new(Box::new(FfmpegSequenceEncoder::new(
            "/nonexistent/reelforge-ffmpeg",
        )));
        let err = backend.begin(&spec(ExportPurpose::Final)).await.unwrap_err();
        assert!(matches!(err, ReelforgeError::EncoderInit { .. }));
    }
}
