//! Reelforge Timeline Model
//!
//! Defines the read-only data contracts an export consumes:
//! - **Timeline:** Tracks of timed media and text elements
//! - **Media:** The catalog of image/video/audio sources elements refer to
//! - **Effects:** Per-element visual effect parameter stacks
//! - **Stickers:** Time-bounded overlay images drawn above every track
//! - **Settings:** Output resolution, container format, and quality
//!
//! Everything here is a snapshot: the export engine reads it and never
//! mutates it while a session is running.

pub mod color;
pub mod effects;
pub mod media;
pub mod settings;
pub mod snapshot;
pub mod sticker;
pub mod timeline;

pub use color::*;
pub use effects::*;
pub use media::*;
pub use settings::*;
pub use snapshot::*;
pub use sticker::*;
pub use timeline::*;
