//! Which elements are visible at a point in time, in draw order.

use reelforge_timeline::{MediaCatalog, MediaItem, Timeline, TimelineElement, Track};

/// One visible element with its track and resolved media.
#[derive(Debug, Clone, Copy)]
pub struct ActiveElement<'a> {
    pub element: &'a TimelineElement,
    pub track: &'a Track,
    /// Catalog entry for media elements; `None` for text.
    pub media: Option<&'a MediaItem>,
}

/// Elements active at `t`, ordered audio, then media, then text tracks.
/// Within a track kind, declaration order is kept.
///
/// Media elements whose item is missing from the catalog are skipped.
pub fn resolve_active_elements<'a>(
    timeline: &'a Timeline,
    media: &'a MediaCatalog,
    t: f64,
) -> Vec<ActiveElement<'a>> {
    let mut active: Vec<ActiveElement<'a>> = timeline
        .elements()
        .filter(|(_, element)| element.is_active_at(t))
        .filter_map(|(track, element)| {
            let item = match element.media_id() {
                Some(media_id) => match media.get(media_id) {
                    Some(item) => Some(item),
                    None => {
                        tracing::warn!(
                            element = %element.id,
                            media_id,
                            time_secs = t,
                            "Media item not found; skipping element"
                        );
                        return None;
                    }
                },
                None => None,
            };
            Some(ActiveElement {
                element,
                track,
                media: item,
            })
        })
        .collect();

    // Stable: equal kinds keep declaration order.
    active.sort_by_key(|a| a.track.kind);
    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_timeline::{MediaKind, TextContent, TrackKind};

    fn catalog() -> MediaCatalog {
        MediaCatalog::new(vec![
            MediaItem::new("v", MediaKind::Video, "v.mp4", 1920, 1080),
            MediaItem::new("i", MediaKind::Image, "i.png", 100, 100),
            MediaItem::new("a", MediaKind::Audio, "a.wav", 0, 0),
        ])
    }

    fn ids(active: &[ActiveElement<'_>]) -> Vec<String> {
        active.iter().map(|a| a.element.id.clone()).collect()
    }

    #[test]
    fn test_layer_order_ignores_declaration_order() {
        let timeline = Timeline::new()
            .with_track(Track::new(TrackKind::Text).with_element(TimelineElement::text(
                "title",
                TextContent::new("Hi"),
                0.0,
                5.0,
            )))
            .with_track(
                Track::new(TrackKind::Media)
                    .with_element(TimelineElement::media("video", "v", 0.0, 5.0))
                    .with_element(TimelineElement::media("image", "i", 0.0, 5.0)),
            )
            .with_track(
                Track::new(TrackKind::Audio)
                    .with_element(TimelineElement::media("music", "a", 0.0, 5.0)),
            );

        let media = catalog();
        let active = resolve_active_elements(&timeline, &media, 1.0);
        assert_eq!(ids(&active), vec!["music", "video", "image", "title"]);
        assert!(active[3].media.is_none());
        assert_eq!(active[1].media.map(|m| m.kind), Some(MediaKind::Video));
    }

    #[test]
    fn test_inactive_hidden_and_missing_are_skipped() {
        let mut hidden = TimelineElement::media("hidden", "i", 0.0, 5.0);
        hidden.hidden = true;
        let timeline = Timeline::new().with_track(
            Track::new(TrackKind::Media)
                .with_element(TimelineElement::media("later", "i", 2.0, 1.0))
                .with_element(hidden)
                .with_element(TimelineElement::media("ghost", "nope", 0.0, 5.0))
                .with_element(TimelineElement::media("now", "v", 0.5, 1.0)),
        );

        let media = catalog();
        assert_eq!(ids(&resolve_active_elements(&timeline, &media, 1.0)), vec!["now"]);
        assert_eq!(ids(&resolve_active_elements(&timeline, &media, 2.0)), vec!["later"]);
        assert!(resolve_active_elements(&timeline, &media, 3.0).is_empty());
    }
}
