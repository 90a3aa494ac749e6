//! Export a recording to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use dolly_common::config::{AppConfig, CompositorKind};
use dolly_render_engine::{export_recording, ExportOptions, ExportProgress, ExportStage, ProgressCallback};
use tokio_util::sync::CancellationToken;

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    backend: Option<CompositorKind>,
    fps: Option<u32>,
) -> anyhow::Result<()> {
    println!("Exporting recording at: {}", path.display());

    let mut options = ExportOptions::from_app_config(config);
    options.output = output;
    options.fps = fps;
    if let Some(backend) = backend {
        options.backend = backend;
    }
    println!("  Backend: {:?}", options.backend);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let progress: ProgressCallback = Arc::new(|p: ExportProgress| {
        let label = match p.stage {
            ExportStage::Preparing => "Preparing",
            ExportStage::Rendering => "Rendering",
            ExportStage::Encoding => "Encoding",
            ExportStage::Complete => "Complete",
        };
        print!(
            "\r  {label}: {:.1}% ({}/{} frames)  ",
            p.progress * 100.0,
            p.frame,
            p.total_frames,
        );
        let _ = std::io::stdout().flush();
    });

    let output_path = export_recording(&path, &options, Some(cancel), Some(progress))
        .await
        .map_err(|e| {
            println!();
            anyhow::anyhow!("Export failed: {e}")
        })?;

    println!("\nExport complete: {}", output_path.display());
    Ok(())
}
