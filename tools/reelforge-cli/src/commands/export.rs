//! Render a snapshot to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use reelforge_common::config::ExportDefaults;
use reelforge_export::{ExportEngine, ExportProgress};
use reelforge_timeline::ExportSnapshot;

pub async fn run(
    snapshot_path: PathBuf,
    output: Option<PathBuf>,
    defaults: ExportDefaults,
    write_report: bool,
) -> anyhow::Result<()> {
    println!("Exporting snapshot: {}", snapshot_path.display());

    let snapshot = ExportSnapshot::load(&snapshot_path)
        .map_err(|e| anyhow::anyhow!("Failed to load snapshot: {e}"))?;

    let issues = snapshot.validate();
    for issue in &issues {
        println!("  [WARN] {issue}");
    }

    let output_path = output.unwrap_or_else(|| {
        snapshot_path
            .parent()
            .map(|dir| dir.join(snapshot.settings.output_filename()))
            .unwrap_or_else(|| PathBuf::from(snapshot.settings.output_filename()))
    });

    let settings = &snapshot.settings;
    println!("  Output: {}", output_path.display());
    println!(
        "  Format: {} ({:?} quality, {:?})",
        settings.format.extension(),
        settings.quality,
        settings.purpose
    );
    println!(
        "  Resolution: {}x{} @ {}fps",
        settings.width, settings.height, defaults.fps
    );
    println!("  Backend: {}", defaults.backend.as_str());

    let engine = Arc::new(ExportEngine::from_config(&defaults));

    let canceller = engine.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let progress_cb: Box<dyn Fn(ExportProgress) + Send + Sync> = Box::new(|p| {
        match p.advanced {
            Some(a) => print!(
                "\r  Progress: {:.1}% ({}/{} frames, {:.1} fps, ETA: {:.0}s)  ",
                p.percent,
                a.current_frame,
                a.total_frames,
                a.encoding_speed_fps,
                a.estimated_secs_remaining,
            ),
            None => print!("\r  Progress: {:.1}% {}  ", p.percent, p.status),
        }
        let _ = std::io::stdout().flush();
    });

    let result = engine.export_with_report(&snapshot, Some(progress_cb)).await;
    ctrl_c.abort();

    let (bytes, report) = match result {
        Ok(done) => done,
        Err(e) => {
            println!("\nExport failed: {e}");
            return Err(e.into());
        }
    };

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&output_path, &bytes).await?;

    println!("\nExport complete: {}", output_path.display());
    println!(
        "  {} frames in {:.1}s, {} bytes ({})",
        report.frames_rendered, report.elapsed_secs, report.output_bytes, report.mime_type
    );
    if report.skipped_elements > 0 {
        println!("  [WARN] {} element draws skipped", report.skipped_elements);
    }

    if write_report {
        let report_path = output_path.with_extension("report.json");
        tokio::fs::write(&report_path, serde_json::to_string_pretty(&report)?).await?;
        tracing::info!(report = %report_path.display(), "Wrote export report");
    }

    Ok(())
}
