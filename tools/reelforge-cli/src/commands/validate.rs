//! Validate a timeline snapshot.

use std::path::PathBuf;

use reelforge_timeline::ExportSnapshot;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating snapshot: {}", path.display());

    let snapshot =
        ExportSnapshot::load(&path).map_err(|e| anyhow::anyhow!("Failed to load snapshot: {e}"))?;

    println!(
        "  Resolution: {}x{}",
        snapshot.settings.width, snapshot.settings.height
    );
    println!("  Tracks: {}", snapshot.timeline.tracks.len());
    println!("  Elements: {}", snapshot.timeline.element_count());
    println!("  Media items: {}", snapshot.media.len());

    let issues = snapshot.validate();
    if issues.is_empty() {
        println!("\nSnapshot is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for issue in &issues {
        println!("  - {issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}
