//! Check encoder tooling and configuration.

use std::path::Path;

use reelforge_common::config::{config_file_path, AppConfig};
use reelforge_export::capture::command_exists;

fn binary_available(binary: &str) -> bool {
    command_exists(binary) || Path::new(binary).is_file()
}

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelforge System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: defaults ({} not found)", config_path.display());
    }

    let export = &config.export;
    let mut ready = true;
    for (label, binary) in [("ffmpeg", &export.ffmpeg_binary), ("ffprobe", &export.ffprobe_binary)] {
        if binary_available(binary) {
            println!("[OK] {label}: {binary}");
        } else {
            println!("[MISSING] {label}: {binary} not found in PATH");
            ready = false;
        }
    }

    match &export.font_path {
        Some(font) if font.is_file() => println!("[OK] Font: {}", font.display()),
        Some(font) => println!("[WARN] Font: {} not found; text will be skipped", font.display()),
        None => println!("[WARN] Font: none configured; text will be skipped"),
    }

    println!("[OK] Backend: {} @ {}fps", export.backend.as_str(), export.fps);

    println!();
    if ready {
        println!("All required tools are available. Reelforge is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set its path in the config.");
    }

    Ok(())
}
