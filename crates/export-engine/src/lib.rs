//! Reelforge Export Engine
//!
//! Frame-by-frame export of a timeline snapshot: every output frame is
//! composited on a raster canvas and handed to a capture backend, strictly
//! in time order.
//!
//! # Pipeline Architecture
//!
//! ```text
//! ExportSnapshot ──► ExportEngine (frame loop, progress, cancel)
//!                          │  t = f / fps
//!                          ▼
//!                    FrameRenderer
//!                    ├── Active-element resolver (audio < media < text)
//!                    ├── DecodedMediaCache ◄── MediaSource (image / ffmpeg)
//!                    │     seek ─► settle ─► validate ─► retry
//!                    ├── Bounds calculator + effect compositor
//!                    └── Overlay stickers (z-order)
//!                          │  RgbaImage
//!                          ▼
//!                    CaptureBackend
//!                    ├── LiveCapture ──► StreamRecorder (real time)
//!                    └── OfflineFrameEncoder ──► stills ──► FrameSequenceEncoder
//!                          │
//!                          ▼
//!                    encoded bytes (webm / mp4 / mov)
//! ```

pub mod bounds;
pub mod cache;
pub mod capture;
pub mod compositor;
pub mod engine;
pub mod media;
pub mod renderer;
pub mod resolver;
pub mod text;
pub mod tuning;
pub mod validator;

pub use bounds::{calculate_element_bounds, Placement};
pub use cache::{CacheStats, DecodedMediaCache};
pub use capture::{backend_factory, BackendFactory, CaptureBackend, CaptureSpec};
pub use engine::*;
pub use media::{FfmpegMediaSource, MediaSource, VideoHandle};
pub use renderer::{FrameRenderer, FrameReport};
pub use resolver::{resolve_active_elements, ActiveElement};
pub use text::{FontTextRasterizer, TextRasterizer};
pub use tuning::{ElementFailurePolicy, RenderTuning};
pub use validator::FrameValidator;
