//! Build command implementation.

use anyhow::{Context, Result};
use sandpit_core::{Config, Workspace};
use sandpit_render::DocumentBuilder;
use sandpit_types::ExecutionMode;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Load the config (or defaults) and the workspace it points at
pub(crate) fn load_workspace(config_path: &Path) -> Result<(Config, Workspace)> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    let workspace = Workspace::new(config.workspace_dir());
    Ok((config, workspace))
}

/// Assemble the executable document and write it to `output` or stdout
pub fn build_document(
    config_path: &Path,
    mode: Option<ExecutionMode>,
    output: Option<&Path>,
) -> Result<()> {
    let (config, workspace) = load_workspace(config_path)?;
    let mode = mode.unwrap_or(config.default_mode);

    let files = workspace
        .load_files()
        .with_context(|| format!("Failed to read sources from {:?}", workspace.root()))?;
    let stdin = workspace.load_stdin().context("Failed to read stdin.txt")?;

    let document = DocumentBuilder::new().build(mode, &files, &stdin);
    tracing::info!(%mode, bytes = document.len(), "Built executable document");

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            fs::write(path, document.as_str())
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("✓ Wrote {:?}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document.as_str().as_bytes())
                .context("Failed to write document to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
