use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::orchestrator::Stage;

/// Location of the rules file for a stage: `<rules_dir>/rules-<slug>.md`.
pub fn rules_path(rules_dir: &Path, stage: Stage) -> PathBuf {
    rules_dir.join(format!("rules-{}.md", stage.slug()))
}

/// Load the rules for a stage. A missing file means the stage has no rules.
pub fn load_stage_rules(rules_dir: &Path, stage: Stage) -> Result<Option<(PathBuf, String)>> {
    let path = rules_path(rules_dir, stage);
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
    Ok(Some((path, content)))
}
