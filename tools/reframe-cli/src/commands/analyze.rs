//! Generate zoom keyframes from cursor activity.

use std::path::PathBuf;

use reframe_common::config::AppConfig;
use reframe_processing_core::{AutoZoomConfig, AutoZoomGenerator, AUTO_ZOOM_CONFIG_VERSION};
use reframe_project_model::ProjectStore;

pub fn run(
    store: &ProjectStore,
    config: &AppConfig,
    id: &str,
    profile: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    println!("Analyzing project: {id}");

    let mut loaded = store
        .load(id)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    println!("  Loaded {} cursor samples", loaded.cursor.len());

    let zoom_config = match profile.or_else(|| config.auto_zoom_profile.clone()) {
        Some(path) => load_profile(&path)?,
        None => AutoZoomConfig::default(),
    };

    let generator = AutoZoomGenerator::new(zoom_config);
    let (keyframes, candidates) = generator.generate_with_candidates(
        &loaded.project.segment,
        &loaded.cursor,
        loaded.project.source.size(),
    );
    println!(
        "  {} click clusters -> {} keyframes",
        candidates.len(),
        keyframes.len()
    );
    for c in &candidates {
        println!(
            "    {:>7.2}s  ({:.0}, {:.0})  zoom {:.2}",
            c.time, c.point.x, c.point.y, c.zoom_factor
        );
    }

    if dry_run {
        println!("\nDry run, keyframes not saved.");
        return Ok(());
    }

    loaded
        .project
        .segment
        .replace_keyframes(keyframes)
        .map_err(|e| anyhow::anyhow!("Generated keyframes rejected: {e}"))?;
    store
        .save(&mut loaded)
        .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;

    println!("\nAnalysis complete.");
    Ok(())
}

fn load_profile(path: &std::path::Path) -> anyhow::Result<AutoZoomConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read auto-zoom profile {}: {e}", path.display()))?;
    let profile: AutoZoomConfig = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse auto-zoom profile {}: {e}", path.display()))?;
    if profile.version != AUTO_ZOOM_CONFIG_VERSION {
        tracing::warn!(
            path = %path.display(),
            found = profile.version,
            expected = AUTO_ZOOM_CONFIG_VERSION,
            "Auto-zoom profile version mismatch, missing fields use defaults"
        );
    }
    println!("  Using auto-zoom profile: {}", path.display());
    Ok(profile)
}
