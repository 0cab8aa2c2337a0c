//! Show project information.

use reframe_project_model::ProjectStore;

pub fn run(store: &ProjectStore, id: &str) -> anyhow::Result<()> {
    let loaded = store
        .load(id)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let p = &loaded.project;

    println!("Project: {}", p.name);
    println!("  ID: {}", p.id);
    println!("  Created: {}", p.created_at);
    println!("  Modified: {}", p.modified_at);
    println!();

    println!("Source:");
    println!("  Media: {}", p.source.path);
    println!(
        "  Resolution: {}x{} ({:.2}s)",
        p.source.width, p.source.height, p.source.duration_secs
    );
    println!("  Cursor samples: {}", loaded.cursor.len());
    println!(
        "  Clicks: {}",
        loaded.cursor.iter().filter(|s| s.clicked).count()
    );
    println!();

    println!("Segment:");
    println!(
        "  Trim: {:.2}s - {:.2}s ({:.2}s)",
        p.segment.trim_start,
        p.segment.trim_end,
        p.segment.duration()
    );
    println!("  Keyframes: {}", p.segment.keyframes.len());
    for k in &p.segment.keyframes {
        println!(
            "    {:>7.2}s  zoom {:.2}  at ({:.2}, {:.2})  {:?} {:.2}s",
            k.time, k.zoom_factor, k.position_x, k.position_y, k.easing, k.duration
        );
    }
    println!();

    println!("Background:");
    println!(
        "  Style: {:?}, scale {}%, radius {}px, shadow {}px",
        p.background.style,
        p.background.scale,
        p.background.effective_corner_radius(),
        p.background.effective_shadow()
    );
    println!();

    println!("Export:");
    println!(
        "  Quality: {}, speed {}x, codec {}",
        p.export.quality.as_str(),
        p.export.speed,
        p.export.codec.tag()
    );

    Ok(())
}

pub fn list(store: &ProjectStore) -> anyhow::Result<()> {
    let projects = store
        .list()
        .map_err(|e| anyhow::anyhow!("Failed to list projects: {e}"))?;
    if projects.is_empty() {
        println!("No projects in {}", store.root().display());
        return Ok(());
    }
    for p in projects {
        println!(
            "{}  {:<24}  {:>7.2}s  {} keyframes",
            p.id,
            p.name,
            p.segment.duration(),
            p.segment.keyframes.len()
        );
    }
    Ok(())
}
