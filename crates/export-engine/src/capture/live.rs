//! Real-time capture through a continuously running stream recorder.

use std::process::Stdio;
use std::time::Duration;

use image::RgbaImage;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;

use super::{codec_args, CaptureBackend, CaptureSpec};

const DEFAULT_FRAME_YIELD: Duration = Duration::from_millis(50);
const CHUNK_SIZE: usize = 64 * 1024;

/// A real-time encoder that timestamps frames as they arrive.
#[async_trait::async_trait]
pub trait StreamRecorder: Send {
    async fn start(&mut self, spec: &CaptureSpec) -> ReelforgeResult<()>;

    /// Push the current canvas as the next stream frame.
    async fn request_frame(&mut self, frame: &RgbaImage) -> ReelforgeResult<()>;

    /// Stop recording and return the buffered output chunks in order.
    async fn stop(&mut self) -> ReelforgeResult<Vec<Vec<u8>>>;

    /// Stop at once, discarding anything not yet encoded.
    async fn kill(&mut self);

    fn is_running(&self) -> bool;
}

/// [`CaptureBackend`] over a [`StreamRecorder`].
///
/// Each submitted frame is followed by a short yield so the real-time
/// encoder sees frames spaced in wall-clock time.
pub struct LiveCapture {
    recorder: Box<dyn StreamRecorder>,
    frame_yield: Duration,
    recording: bool,
    frames: u64,
}

impl LiveCapture {
    pub fn new(recorder: Box<dyn StreamRecorder>) -> Self {
        Self {
            recorder,
            frame_yield: DEFAULT_FRAME_YIELD,
            recording: false,
            frames: 0,
        }
    }

    pub fn with_frame_yield(mut self, frame_yield: Duration) -> Self {
        self.frame_yield = frame_yield;
        self
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames
    }
}

#[async_trait::async_trait]
impl CaptureBackend for LiveCapture {
    fn name(&self) -> &str {
        "live"
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    async fn begin(&mut self, spec: &CaptureSpec) -> ReelforgeResult<()> {
        self.recorder
            .start(spec)
            .await
            .map_err(|e| ReelforgeError::encoder_init(format!("stream recorder: {e}")))?;
        self.recording = true;
        self.frames = 0;
        tracing::info!(
            width = spec.width,
            height = spec.height,
            fps = spec.fps,
            "Live capture started"
        );
        Ok(())
    }

    async fn submit_frame(&mut self, frame: &RgbaImage, index: u64) -> ReelforgeResult<()> {
        if !self.recording {
            return Err(ReelforgeError::encode("live capture is not recording"));
        }
        self.recorder.request_frame(frame).await?;
        self.frames += 1;
        tracing::trace!(index, "Live frame requested");
        tokio::time::sleep(self.frame_yield).await;
        Ok(())
    }

    async fn finalize(&mut self) -> ReelforgeResult<Vec<u8>> {
        if !self.recording {
            return Err(ReelforgeError::encode("live capture is not recording"));
        }
        self.recording = false;
        let chunks = self.recorder.stop().await?;
        let bytes = chunks.concat();
        tracing::info!(
            frames = self.frames,
            chunks = chunks.len(),
            bytes = bytes.len(),
            "Live capture finalized"
        );
        Ok(bytes)
    }

    async fn abort(&mut self) {
        self.recording = false;
        if self.recorder.is_running() {
            self.recorder.kill().await;
            tracing::info!(frames = self.frames, "Live capture aborted");
        }
    }
}

/// ffmpeg reading raw RGBA frames on stdin, timestamped by wall clock, and
/// writing the container to stdout.
pub struct FfmpegStreamRecorder {
    ffmpeg: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_task: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr_task: Option<JoinHandle<String>>,
}

impl FfmpegStreamRecorder {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            child: None,
            stdin: None,
            stdout_task: None,
            stderr_task: None,
        }
    }

    fn input_args(spec: &CaptureSpec) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-use_wallclock_as_timestamps".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s".to_string(),
            format!("{}x{}", spec.width, spec.height),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-r".to_string(),
            spec.fps.to_string(),
        ]
    }
}

#[async_trait::async_trait]
impl StreamRecorder for FfmpegStreamRecorder {
    async fn start(&mut self, spec: &CaptureSpec) -> ReelforgeResult<()> {
        let mut args = Self::input_args(spec);
        args.extend(codec_args(spec, true));
        args.push("pipe:1".to_string());
        tracing::debug!(args = ?args, "Starting ffmpeg stream recorder");

        let mut child = tokio::process::Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReelforgeError::encoder_init(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelforgeError::encoder_init("Failed to capture ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelforgeError::encoder_init("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelforgeError::encoder_init("Failed to capture ffmpeg stderr"))?;

        // Both pipes are drained concurrently so ffmpeg never blocks on a full pipe.
        self.stdout_task = Some(tokio::spawn(async move {
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok::<_, std::io::Error>(chunks)
        }));
        self.stderr_task = Some(tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        }));

        tracing::info!(pid = ?child.id(), "ffmpeg stream recorder started");
        self.stdin = Some(stdin);
        self.child = Some(child);
        Ok(())
    }

    async fn request_frame(&mut self, frame: &RgbaImage) -> ReelforgeResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ReelforgeError::encode("stream recorder is not running"))?;
        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| ReelforgeError::encode(format!("Failed to write frame: {e}")))
    }

    async fn stop(&mut self) -> ReelforgeResult<Vec<Vec<u8>>> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());

        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReelforgeError::encode("stream recorder is not running"))?;
        let status = child
            .wait()
            .await
            .map_err(|e| ReelforgeError::encode(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = match self.stderr_task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        };
        let chunks = match self.stdout_task.take() {
            Some(task) => task
                .await
                .map_err(|e| ReelforgeError::encode(format!("stdout reader failed: {e}")))??,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(ReelforgeError::encode(format!(
                "ffmpeg stream recorder failed (status {status}): {}",
                stderr_output.trim()
            )));
        }
        Ok(chunks)
    }

    async fn kill(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill ffmpeg stream recorder");
            }
        }
        if let Some(task) = self.stdout_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_timeline::{ExportFormat, ExportPurpose, ExportQuality};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Journal {
        frames: usize,
        started: bool,
        stops: usize,
        kills: usize,
    }

    struct MemoryRecorder {
        journal: Arc<Mutex<Journal>>,
    }

    #[async_trait::async_trait]
    impl StreamRecorder for MemoryRecorder {
        async fn start(&mut self, _spec: &CaptureSpec) -> ReelforgeResult<()> {
            self.journal.lock().unwrap().started = true;
            Ok(())
        }

        async fn request_frame(&mut self, _frame: &RgbaImage) -> ReelforgeResult<()> {
            self.journal.lock().unwrap().frames += 1;
            Ok(())
        }

        async fn stop(&mut self) -> ReelforgeResult<Vec<Vec<u8>>> {
            let mut journal = self.journal.lock().unwrap();
            journal.started = false;
            journal.stops += 1;
            Ok(vec![b"ab".to_vec(), b"cd".to_vec()])
        }

        async fn kill(&mut self) {
            let mut journal = self.journal.lock().unwrap();
            journal.started = false;
            journal.kills += 1;
        }

        fn is_running(&self) -> bool {
            self.journal.lock().unwrap().started
        }
    }

    fn spec() -> CaptureSpec {
        CaptureSpec {
            width: 4,
            height: 4,
            fps: 30,
            format: ExportFormat::Webm,
            quality: ExportQuality::Low,
            purpose: ExportPurpose::Preview,
        }
    }

    #[tokio::test]
    async fn test_finalize_concatenates_chunks() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut capture = LiveCapture::new(Box::new(MemoryRecorder {
            journal: journal.clone(),
        }))
        .with_frame_yield(Duration::from_millis(1));

        capture.begin(&spec()).await.unwrap();
        assert!(capture.is_recording());
        let frame = RgbaImage::new(4, 4);
        capture.submit_frame(&frame, 0).await.unwrap();
        capture.submit_frame(&frame, 1).await.unwrap();

        let bytes = capture.finalize().await.unwrap();
        assert_eq!(bytes, b"abcd");
        assert_eq!(journal.lock().unwrap().frames, 2);
        assert!(!capture.is_recording());

        // Aborting after finalize must not touch the recorder again.
        capture.abort().await;
        let journal = journal.lock().unwrap();
        assert_eq!(journal.stops, 1);
        assert_eq!(journal.kills, 0);
    }

    #[tokio::test]
    async fn test_abort_kills_instead_of_draining() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut capture = LiveCapture::new(Box::new(MemoryRecorder {
            journal: journal.clone(),
        }))
        .with_frame_yield(Duration::ZERO);

        capture.begin(&spec()).await.unwrap();
        capture.submit_frame(&RgbaImage::new(4, 4), 0).await.unwrap();
        capture.abort().await;

        assert!(!capture.is_recording());
        let journal = journal.lock().unwrap();
        assert_eq!(journal.kills, 1);
        assert_eq!(journal.stops, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_does_not_wait_for_ffmpeg() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("reelforge-live-kill-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // Ignores end of input, so only a kill ends it early.
        let script = dir.join("ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut recorder = FfmpegStreamRecorder::new(script.display().to_string());
        recorder.start(&spec()).await.unwrap();
        assert!(recorder.is_running());

        let killed = tokio::time::timeout(Duration::from_secs(5), recorder.kill()).await;
        std::fs::remove_dir_all(&dir).ok();

        assert!(killed.is_ok());
        assert!(!recorder.is_running());
    }

    #[tokio::test]
    async fn test_submit_before_begin_fails() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut capture = LiveCapture::new(Box::new(MemoryRecorder { journal }));
        let err = capture.submit_frame(&RgbaImage::new(1, 1), 0).await.unwrap_err();
        assert!(matches!(err, ReelforgeError::Encode { .. }));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_encoder_init() {
        let mut capture = LiveCapture::new(Box::new(FfmpegStreamRecorder::new(
            "/nonexistent/reelforge-ffmpeg",
        )));
        let err = capture.begin(&spec()).await.unwrap_err();
        assert!(matches!(err, ReelforgeError::EncoderInit { .. }));
        assert!(!capture.is_recording());
    }
}
