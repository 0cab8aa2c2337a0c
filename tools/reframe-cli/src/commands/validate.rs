//! Validate a project.

use reframe_project_model::ProjectStore;

pub fn run(store: &ProjectStore, id: &str) -> anyhow::Result<()> {
    println!("Validating project: {id}");

    let loaded = store
        .load(id)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    println!("  Project: {} (v{})", loaded.project.name, loaded.project.version);

    let errors = loaded.validate_sources();
    if errors.is_empty() {
        println!("  All checks passed.");
        Ok(())
    } else {
        for err in &errors {
            println!("  ERROR: {err}");
        }
        anyhow::bail!("Validation failed with {} error(s)", errors.len())
    }
}
