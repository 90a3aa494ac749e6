//! Check the encoder installation.

use dolly_common::config::{config_file_path, AppConfig};
use dolly_common::ffmpeg::{command_exists, ffmpeg_version, resolve_ffmpeg_binary, FFMPEG_PATH_ENV};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Dolly System Check");
    println!("{}", "=".repeat(50));

    println!("Config file: {}", config_file_path().display());
    println!("Default backend: {:?}", config.export.backend);
    if std::env::var_os(FFMPEG_PATH_ENV).is_some() {
        println!("{FFMPEG_PATH_ENV} is set");
    }

    let binary = resolve_ffmpeg_binary(config.ffmpeg_path.as_deref());
    println!("Resolved ffmpeg: {}", binary.display());

    if !command_exists(&binary) {
        println!("[FAIL] ffmpeg not found");
        anyhow::bail!("ffmpeg is required for capture and export");
    }
    match ffmpeg_version(&binary) {
        Some(version) => println!("[OK] {version}"),
        None => println!("[WARN] ffmpeg found but `-version` failed"),
    }

    println!();
    println!("Dolly is ready.");
    Ok(())
}
