//! Export output settings.

use serde::{Deserialize, Serialize};

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Webm,
    Mp4,
    Mov,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Webm => "webm",
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Mov => "mov",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Webm => "video/webm",
            ExportFormat::Mp4 => "video/mp4",
            ExportFormat::Mov => "video/quicktime",
        }
    }

    /// ffmpeg video encoder for this container.
    pub fn video_codec(self) -> &'static str {
        match self {
            ExportFormat::Webm => "libvpx-vp9",
            ExportFormat::Mp4 | ExportFormat::Mov => "libx264",
        }
    }

    /// ffmpeg muxer name.
    pub fn muxer(self) -> &'static str {
        match self {
            ExportFormat::Webm => "webm",
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Mov => "mov",
        }
    }

    pub fn all() -> [ExportFormat; 3] {
        [ExportFormat::Webm, ExportFormat::Mp4, ExportFormat::Mov]
    }
}

/// Encoding quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl ExportQuality {
    pub fn video_bitrate_kbps(self) -> u32 {
        match self {
            ExportQuality::Low => 2_500,
            ExportQuality::Medium => 5_000,
            ExportQuality::High => 8_000,
            ExportQuality::Ultra => 16_000,
        }
    }
}

/// What the export is for. Previews trade fidelity for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPurpose {
    Preview,
    #[default]
    Final,
}

/// Settings for one export, immutable while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub format: ExportFormat,

    #[serde(default)]
    pub quality: ExportQuality,

    #[serde(default)]
    pub purpose: ExportPurpose,

    /// Canvas fill colour.
    #[serde(default = "default_background")]
    pub background_color: String,

    /// Output base name.
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_background() -> String {
    "#000000".to_string()
}

fn default_filename() -> String {
    "export".to_string()
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            format: ExportFormat::default(),
            quality: ExportQuality::default(),
            purpose: ExportPurpose::default(),
            background_color: default_background(),
            filename: default_filename(),
        }
    }
}

impl ExportSettings {
    pub fn new(width: u32, height: u32, format: ExportFormat) -> Self {
        Self {
            width,
            height,
            format,
            ..Self::default()
        }
    }

    /// Filename with the extension matching `format`, replacing any other
    /// known video extension.
    pub fn output_filename(&self) -> String {
        let name = self.filename.trim();
        let name = if name.is_empty() { "export" } else { name };
        let expected = self.format.extension();

        let base = match name.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty()
                    && ExportFormat::all()
                        .iter()
                        .any(|f| f.extension().eq_ignore_ascii_case(ext)) =>
            {
                stem
            }
            _ => name,
        };
        format!("{base}.{expected}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tables() {
        assert_eq!(ExportFormat::Mov.mime_type(), "video/quicktime");
        assert_eq!(ExportFormat::Webm.video_codec(), "libvpx-vp9");
        assert_eq!(ExportFormat::Mp4.extension(), "mp4");
        assert_eq!(ExportQuality::Ultra.video_bitrate_kbps(), 16_000);
        assert_eq!(ExportQuality::Low.video_bitrate_kbps(), 2_500);
    }

    #[test]
    fn test_output_filename_extension() {
        let mut settings = ExportSettings::new(1280, 720, ExportFormat::Mp4);
        assert_eq!(settings.output_filename(), "export.mp4");

        settings.filename = "holiday.webm".to_string();
        assert_eq!(settings.output_filename(), "holiday.mp4");

        settings.filename = "v1.2.final".to_string();
        assert_eq!(settings.output_filename(), "v1.2.final.mp4");

        settings.filename = "clip.MP4".to_string();
        assert_eq!(settings.output_filename(), "clip.mp4");
    }

    #[test]
    fn test_settings_defaults_from_json() {
        let s: ExportSettings = serde_json::from_str(r#"{"width":640,"height":360}"#).unwrap();
        assert_eq!(s.format, ExportFormat::Webm);
        assert_eq!(s.purpose, ExportPurpose::Final);
        assert_eq!(s.background_color, "#000000");
    }
}
