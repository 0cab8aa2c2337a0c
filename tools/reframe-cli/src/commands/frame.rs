//! Render a single preview frame to PNG.

use std::path::PathBuf;

use reframe_project_model::ProjectStore;
use reframe_render_engine::{DecodeSource, FfmpegSource, PlaybackDriver, Session};

pub async fn run(store: &ProjectStore, id: &str, time: f64, out: PathBuf) -> anyhow::Result<()> {
    let loaded = store
        .load(id)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let project = &loaded.project;

    let mut source = FfmpegSource::open(loaded.media_path())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open media: {e}"))?;
    let ack = source
        .seek(time)
        .await
        .map_err(|e| anyhow::anyhow!("Seek to {time:.3}s failed: {e}"))?;

    let output = project.export.quality.preset().output_size(source.size());
    let session = Session::new(
        project.segment.clone(),
        project.background.clone(),
        loaded.cursor.clone(),
        output,
        project.export.speed,
    )?;

    let frame = source.current_frame();
    let result = PlaybackDriver::default()
        .preview_frame(&session, frame.as_ref(), ack.landed)?
        .ok_or_else(|| anyhow::anyhow!("No frame decoded at {:.3}s", ack.landed))?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    result
        .frame
        .save(&out)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", out.display()))?;

    println!(
        "Wrote {} ({}x{}, t={:.3}s, zoom {:.2})",
        out.display(),
        output.width,
        output.height,
        result.time,
        result.camera.zoom_factor
    );
    Ok(())
}
