//! Write default post-production settings.

use std::path::PathBuf;

use dolly_project_model::{PostProductionConfig, RecordingDir};

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    let dir = RecordingDir::create(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open recording directory: {e}"))?;
    let target = dir.post_production_path();

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    dir.save_post_production(&PostProductionConfig::default())
        .map_err(|e| anyhow::anyhow!("Failed to write settings: {e}"))?;
    println!("Wrote {}", target.display());
    Ok(())
}
