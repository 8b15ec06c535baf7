//! Show snapshot information.

use std::path::PathBuf;

use reelforge_common::clock::total_frames;
use reelforge_timeline::ExportSnapshot;

pub fn run(path: PathBuf, fps: u32) -> anyhow::Result<()> {
    let snapshot =
        ExportSnapshot::load(&path).map_err(|e| anyhow::anyhow!("Failed to load snapshot: {e}"))?;

    let s = &snapshot.settings;
    println!("Snapshot: {}", path.display());
    println!();

    println!("Output:");
    println!("  Resolution: {}x{}", s.width, s.height);
    println!(
        "  Format: {} ({}, {})",
        s.format.extension(),
        s.format.mime_type(),
        s.format.video_codec()
    );
    println!(
        "  Quality: {:?} ({} kbps)",
        s.quality,
        s.quality.video_bitrate_kbps()
    );
    println!("  Purpose: {:?}", s.purpose);
    println!("  Background: {}", s.background_color);
    println!("  Filename: {}", s.output_filename());
    println!();

    let duration = snapshot.timeline.duration_secs();
    println!("Timeline:");
    println!("  Duration: {duration:.2}s");
    println!("  Frames: {} @ {fps}fps", total_frames(duration, fps));
    for track in &snapshot.timeline.tracks {
        let label = if track.name.is_empty() {
            track.kind.as_str()
        } else {
            track.name.as_str()
        };
        println!(
            "  Track {label} ({}): {} element(s){}",
            track.kind.as_str(),
            track.elements.len(),
            if track.muted { " [muted]" } else { "" }
        );
    }
    println!();

    println!("Media: {} item(s)", snapshot.media.len());
    for item in snapshot.media.iter() {
        match item.duration_secs {
            Some(d) => println!(
                "  {} {:?} {}x{} {:.1}s  {}",
                item.id, item.kind, item.width, item.height, d, item.url
            ),
            None => println!(
                "  {} {:?} {}x{}  {}",
                item.id, item.kind, item.width, item.height, item.url
            ),
        }
    }
    println!();

    println!("Effects: {} element(s)", snapshot.effects.element_count());
    println!("Stickers: {}", snapshot.stickers.len());

    Ok(())
}
