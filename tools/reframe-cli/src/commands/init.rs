//! Create a project from a recording and its cursor telemetry.

use std::path::PathBuf;

use reframe_common::config::{AppConfig, ExportDefaults};
use reframe_project_model::{
    is_time_ordered, parse_samples, ExportSettings, ProjectStore, SourceMedia,
};
use reframe_render_engine::probe_media;

pub async fn run(
    store: &ProjectStore,
    config: &AppConfig,
    name: String,
    media: PathBuf,
    cursor: PathBuf,
) -> anyhow::Result<()> {
    let info = probe_media(&media)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", media.display()))?;

    let content = std::fs::read_to_string(&cursor)
        .map_err(|e| anyhow::anyhow!("Failed to read cursor file {}: {e}", cursor.display()))?;
    let samples =
        parse_samples(&content).map_err(|e| anyhow::anyhow!("Failed to parse cursor samples: {e}"))?;
    if !is_time_ordered(&samples) {
        anyhow::bail!("Cursor samples in {} are not ordered by time", cursor.display());
    }

    let source = SourceMedia {
        path: media.to_string_lossy().into_owned(),
        width: info.size.width,
        height: info.size.height,
        duration_secs: info.duration_secs,
    };
    let mut loaded = store
        .create(name, source, samples)
        .map_err(|e| anyhow::anyhow!("Failed to create project: {e}"))?;
    loaded.project.export = export_settings(&config.export);
    store
        .save(&mut loaded)
        .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;

    tracing::info!(id = %loaded.project.id, root = %loaded.root.display(), "Project created");
    println!("Created project {}", loaded.project.id);
    println!("  Name: {}", loaded.project.name);
    println!(
        "  Source: {}x{}, {:.2}s",
        info.size.width, info.size.height, info.duration_secs
    );
    println!("  Cursor samples: {}", loaded.cursor.len());
    println!("  Location: {}", loaded.root.display());
    Ok(())
}

/// Seed a new project's export settings from the configured defaults.
fn export_settings(defaults: &ExportDefaults) -> ExportSettings {
    let fallback = ExportSettings::default();
    let quality = defaults.quality.parse().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring configured export quality");
        fallback.quality
    });
    let codec = defaults.video_codec.parse().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring configured video codec");
        fallback.codec
    });
    ExportSettings {
        quality,
        speed: defaults.speed.clamp(0.5, 2.0),
        codec,
    }
}
