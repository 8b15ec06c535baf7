//! Decoded media cache scoped to one export session.
//!
//! Entries are only ever added while a session runs; everything is released
//! together at teardown.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use reelforge_common::error::{ReelforgeError, ReelforgeResult};
use reelforge_timeline::MediaItem;
use serde::Serialize;

use crate::media::{MediaSource, VideoHandle};

/// Cache counters reported at the end of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub images: usize,
    pub videos: usize,
}

/// Decoded stills and open video handles, keyed by URL.
#[derive(Default)]
pub struct DecodedMediaCache {
    images: HashMap<String, Arc<RgbaImage>>,
    videos: HashMap<String, Box<dyn VideoHandle>>,
    hits: u64,
    misses: u64,
}

impl DecodedMediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded still for `url`, loading it on first use.
    pub async fn image(
        &mut self,
        source: &dyn MediaSource,
        url: &str,
    ) -> ReelforgeResult<Arc<RgbaImage>> {
        if let Some(image) = self.images.get(url) {
            self.hits += 1;
            return Ok(Arc::clone(image));
        }

        self.misses += 1;
        let image = Arc::new(source.load_image(url).await?);
        tracing::debug!(url, width = image.width(), height = image.height(), "Cached image");
        self.images.insert(url.to_string(), Arc::clone(&image));
        Ok(image)
    }

    /// Ready video handle for `item`, opening it on first use.
    ///
    /// A handle that fails to open or become ready is not cached, so the next
    /// attempt starts from scratch.
    pub async fn video(
        &mut self,
        source: &dyn MediaSource,
        item: &MediaItem,
    ) -> ReelforgeResult<&mut dyn VideoHandle> {
        if self.videos.contains_key(&item.url) {
            self.hits += 1;
        } else {
            self.misses += 1;
            let mut handle = source.open_video(item).await?;
            handle.wait_ready().await?;
            tracing::debug!(url = %item.url, "Opened video");
            self.videos.insert(item.url.clone(), handle);
        }

        self.videos
            .get_mut(&item.url)
            .map(|handle| handle.as_mut() as &mut dyn VideoHandle)
            .ok_or_else(|| ReelforgeError::render(format!("video handle for {} vanished", item.url)))
    }

    /// Drop the decoded frame of an open video. No-op for unknown URLs.
    pub fn invalidate_video(&mut self, url: &str) {
        if let Some(handle) = self.videos.get_mut(url) {
            handle.invalidate();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            images: self.images.len(),
            videos: self.videos.len(),
        }
    }

    /// Close every video handle and drop all decoded stills.
    pub async fn clear(&mut self) {
        for (url, mut handle) in self.videos.drain() {
            handle.close().await;
            tracing::trace!(url = %url, "Closed video");
        }
        self.images.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_timeline::MediaKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        image_loads: AtomicUsize,
        video_opens: AtomicUsize,
    }

    struct StillVideo {
        frame: RgbaImage,
    }

    #[async_trait::async_trait]
    impl VideoHandle for StillVideo {
        async fn wait_ready(&mut self) -> ReelforgeResult<()> {
            Ok(())
        }
        fn duration_secs(&self) -> f64 {
            1.0
        }
        fn position_secs(&self) -> f64 {
            0.0
        }
        fn dimensions(&self) -> (u32, u32) {
            self.frame.dimensions()
        }
        async fn seek(&mut self, _target_secs: f64) -> ReelforgeResult<()> {
            Ok(())
        }
        fn current_frame(&self) -> Option<&RgbaImage> {
            Some(&self.frame)
        }
        fn invalidate(&mut self) {}
        async fn close(&mut self) {}
    }

    #[async_trait::async_trait]
    impl MediaSource for CountingSource {
        async fn load_image(&self, _url: &str) -> ReelforgeResult<RgbaImage> {
            self.image_loads.fetch_add(1, Ordering::SeqCst);
            Ok(RgbaImage::new(2, 2))
        }

        async fn open_video(&self, _item: &MediaItem) -> ReelforgeResult<Box<dyn VideoHandle>> {
            self.video_opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StillVideo {
                frame: RgbaImage::new(8, 8),
            }))
        }
    }

    #[tokio::test]
    async fn test_images_are_decoded_once_per_url() {
        let source = CountingSource::default();
        let mut cache = DecodedMediaCache::new();
        cache.image(&source, "a.png").await.unwrap();
        cache.image(&source, "a.png").await.unwrap();
        cache.image(&source, "b.png").await.unwrap();

        assert_eq!(source.image_loads.load(Ordering::SeqCst), 2);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.images), (1, 2, 2));
    }

    #[tokio::test]
    async fn test_one_video_handle_per_url() {
        let source = CountingSource::default();
        let mut cache = DecodedMediaCache::new();
        let item = MediaItem::new("v", MediaKind::Video, "v.mp4", 8, 8);
        for _ in 0..3 {
            let handle = cache.video(&source, &item).await.unwrap();
            assert_eq!(handle.dimensions(), (8, 8));
        }
        assert_eq!(source.video_opens.load(Ordering::SeqCst), 1);

        cache.clear().await;
        assert_eq!(cache.stats().videos, 0);
    }
}
