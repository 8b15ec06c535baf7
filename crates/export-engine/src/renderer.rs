//! Paints one complete output frame.
//!
//! Order on the canvas: background, active elements in layer order, then
//! overlay stickers by z-index. Video elements go through seek, settle,
//! validate with bounded retries; a failed attempt never touches the canvas.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline::{
    parse_hex_color, visible_stickers, EffectParameters, ExportSnapshot, MediaItem, MediaKind,
    StickerOverlay, TextContent, TimelineElement, TrackKind,
};

use crate::bounds::{calculate_element_bounds, Placement};
use crate::cache::DecodedMediaCache;
use crate::compositor;
use crate::media::MediaSource;
use crate::resolver::{resolve_active_elements, ActiveElement};
use crate::text::TextRasterizer;
use crate::tuning::{ElementFailurePolicy, RenderTuning};
use crate::validator::FrameValidator;

/// What ended up on a rendered frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub time_secs: f64,
    /// Ids of drawn elements and stickers, in draw order.
    pub drawn: Vec<String>,
    /// Ids of elements left out under [`ElementFailurePolicy::SkipElement`].
    pub skipped: Vec<String>,
}

impl FrameReport {
    pub fn contains(&self, id: &str) -> bool {
        self.drawn.iter().any(|d| d == id)
    }
}

/// Frame renderer for one export session.
pub struct FrameRenderer {
    media: Arc<dyn MediaSource>,
    text: Option<Arc<dyn TextRasterizer>>,
    tuning: RenderTuning,
    validator: FrameValidator,
    warned_no_font: AtomicBool,
}

impl FrameRenderer {
    pub fn new(
        media: Arc<dyn MediaSource>,
        text: Option<Arc<dyn TextRasterizer>>,
        tuning: RenderTuning,
    ) -> Self {
        let validator = FrameValidator::from_tuning(&tuning);
        Self {
            media,
            text,
            tuning,
            validator,
            warned_no_font: AtomicBool::new(false),
        }
    }

    /// Render the frame at timeline time `t` into `canvas`.
    ///
    /// `canvas` must already have the output size.
    pub async fn render_frame(
        &self,
        canvas: &mut RgbaImage,
        snapshot: &ExportSnapshot,
        cache: &mut DecodedMediaCache,
        t: f64,
    ) -> ReelforgeResult<FrameReport> {
        let mut report = FrameReport {
            time_secs: t,
            ..FrameReport::default()
        };

        let background = parse_hex_color(&snapshot.settings.background_color).unwrap_or([0, 0, 0, 255]);
        compositor::fill_background(canvas, background);

        for active in resolve_active_elements(&snapshot.timeline, &snapshot.media, t) {
            if active.track.kind == TrackKind::Audio {
                continue;
            }
            let element = active.element;

            if let Some(text) = element.text_content() {
                if self.draw_text(canvas, element, text) {
                    report.drawn.push(element.id.clone());
                }
                continue;
            }

            let Some(item) = active.media else {
                continue;
            };
            let effects = snapshot.effects.merged_for(&element.id);

            let outcome = match item.kind {
                MediaKind::Audio => continue,
                MediaKind::Image => self
                    .draw_image(canvas, &active, item, cache, effects.as_ref())
                    .await
                    .map_err(|e| ReelforgeError::ElementRender {
                        element_id: element.id.clone(),
                        attempts: 1,
                        source: Box::new(e),
                    }),
                MediaKind::Video => {
                    self.draw_video_with_retry(canvas, &active, item, cache, t, effects.as_ref())
                        .await
                }
            };

            match outcome {
                Ok(()) => report.drawn.push(element.id.clone()),
                Err(err) if self.tuning.failure_policy == ElementFailurePolicy::SkipElement => {
                    tracing::warn!(element = %element.id, time_secs = t, error = %err, "Skipping element");
                    report.skipped.push(element.id.clone());
                }
                Err(err) => return Err(err),
            }
        }

        for sticker in visible_stickers(&snapshot.stickers, t) {
            match self.draw_sticker(canvas, snapshot, sticker, cache).await {
                Ok(true) => report.drawn.push(sticker.id.clone()),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(sticker = %sticker.id, error = %err, "Sticker draw failed");
                }
            }
        }

        Ok(report)
    }

    fn draw_text(&self, canvas: &mut RgbaImage, element: &TimelineElement, text: &TextContent) -> bool {
        let Some(rasterizer) = &self.text else {
            if !self.warned_no_font.swap(true, Ordering::Relaxed) {
                tracing::warn!(element = %element.id, "No font configured; text elements will be skipped");
            }
            return false;
        };
        if text.content.is_empty() {
            return false;
        }

        let (w, h) = rasterizer.measure(text);
        // Text is never scaled; only the origin is taken from the fit.
        let placement = calculate_element_bounds(element, w, h, canvas.width(), canvas.height());
        rasterizer.draw(
            canvas,
            text,
            placement.x.round() as i32,
            placement.y.round() as i32,
        );
        true
    }

    async fn draw_image(
        &self,
        canvas: &mut RgbaImage,
        active: &ActiveElement<'_>,
        item: &MediaItem,
        cache: &mut DecodedMediaCache,
        effects: Option<&EffectParameters>,
    ) -> ReelforgeResult<()> {
        let image = cache.image(self.media.as_ref(), &item.url).await?;
        let (mw, mh) = native_size(item, image.dimensions());
        let placement =
            calculate_element_bounds(active.element, mw, mh, canvas.width(), canvas.height());
        if let Some(mut layer) = compositor::prepare_layer(&image, &placement) {
            if let Some(effects) = effects {
                compositor::apply_effects(&mut layer, effects);
            }
            compositor::draw_layer(canvas, &layer, &placement);
        }
        Ok(())
    }

    async fn draw_video_with_retry(
        &self,
        canvas: &mut RgbaImage,
        active: &ActiveElement<'_>,
        item: &MediaItem,
        cache: &mut DecodedMediaCache,
        t: f64,
        effects: Option<&EffectParameters>,
    ) -> ReelforgeResult<()> {
        let max_attempts = self.tuning.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.draw_video_once(canvas, active, item, cache, t, effects).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::debug!(element = %active.element.id, attempt, "Video element recovered");
                    }
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    cache.invalidate_video(&item.url);
                    let backoff = self.tuning.backoff_for(attempt);
                    tracing::warn!(
                        element = %active.element.id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Video render attempt failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    cache.invalidate_video(&item.url);
                    tracing::error!(
                        element = %active.element.id,
                        attempts = attempt,
                        error = %err,
                        "Video element failed"
                    );
                    return Err(ReelforgeError::ElementRender {
                        element_id: active.element.id.clone(),
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }

    /// One attempt: open or reuse, seek and settle, validate, draw.
    async fn draw_video_once(
        &self,
        canvas: &mut RgbaImage,
        active: &ActiveElement<'_>,
        item: &MediaItem,
        cache: &mut DecodedMediaCache,
        t: f64,
        effects: Option<&EffectParameters>,
    ) -> ReelforgeResult<()> {
        let element = active.element;
        let handle = cache.video(self.media.as_ref(), item).await?;

        let target = element.source_time_at(t);
        let duration = match handle.duration_secs() {
            d if d > 0.0 => d,
            _ => item.duration_secs.unwrap_or(0.0),
        };
        let timeout = self
            .tuning
            .seek_timeout(duration, handle.position_secs(), target);

        match tokio::time::timeout(timeout, handle.seek(target)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ReelforgeError::SeekTimeout {
                    url: item.url.clone(),
                    target_secs: target,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
        tokio::time::sleep(self.tuning.seek_settle).await;

        let frame = handle
            .current_frame()
            .ok_or_else(|| ReelforgeError::render(format!("no frame decoded for {}", item.url)))?;
        let (mw, mh) = native_size(item, frame.dimensions());
        let placement = calculate_element_bounds(element, mw, mh, canvas.width(), canvas.height());

        let mut layer = compositor::prepare_layer(frame, &placement).ok_or_else(|| {
            ReelforgeError::render(format!("empty placement for element {}", element.id))
        })?;
        self.validator.validate(&element.id, &layer)?;

        if let Some(effects) = effects {
            compositor::apply_effects(&mut layer, effects);
        }
        compositor::draw_layer(canvas, &layer, &placement);
        Ok(())
    }

    /// Draw a sticker; `Ok(false)` when its media is unknown.
    async fn draw_sticker(
        &self,
        canvas: &mut RgbaImage,
        snapshot: &ExportSnapshot,
        sticker: &StickerOverlay,
        cache: &mut DecodedMediaCache,
    ) -> ReelforgeResult<bool> {
        let Some(item) = snapshot.media.get(&sticker.media_id) else {
            tracing::warn!(sticker = %sticker.id, media_id = %sticker.media_id, "Sticker media not found");
            return Ok(false);
        };

        let image = cache.image(self.media.as_ref(), &item.url).await?;
        let (x, y, width, height) = sticker.pixel_rect(canvas.width(), canvas.height());
        let placement = Placement { x, y, width, height };

        let Some(mut layer) = compositor::prepare_layer(&image, &placement) else {
            return Ok(false);
        };
        let opacity = sticker.opacity.clamp(0.0, 1.0) as f32;
        if opacity < 1.0 {
            compositor::apply_opacity(&mut layer, opacity);
        }
        compositor::draw_layer(canvas, &layer, &placement);
        Ok(true)
    }
}

/// Catalog size when known, otherwise the decoded size.
fn native_size(item: &MediaItem, decoded: (u32, u32)) -> (u32, u32) {
    if item.width > 0 && item.height > 0 {
        (item.width, item.height)
    } else {
        decoded
    }
}
