//! Export command implementation.

use super::build::load_workspace;
use anyhow::{Context, Result};
use sandpit_core::Download;
use sandpit_render::DocumentBuilder;
use sandpit_types::ExecutionMode;
use std::fs;
use std::path::{Path, PathBuf};

/// Write the downloadable file for `mode` into `output` (or the current directory)
pub fn export_download(
    config_path: &Path,
    mode: Option<ExecutionMode>,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let (config, workspace) = load_workspace(config_path)?;
    let mode = mode.unwrap_or(config.default_mode);

    let files = workspace
        .load_files()
        .with_context(|| format!("Failed to read sources from {:?}", workspace.root()))?;
    let stdin = workspace.load_stdin().context("Failed to read stdin.txt")?;
    let download = Download::for_mode(&DocumentBuilder::new(), mode, &files, &stdin);

    let dir = output.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let target = dir.join(&download.filename);
    fs::write(&target, &download.body).with_context(|| format!("Failed to write {:?}", target))?;

    tracing::info!(%mode, content_type = %download.content_type, "Exported download");
    println!("✓ Exported {:?}", target);
    Ok(target)
}
