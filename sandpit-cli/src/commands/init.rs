//! Init command implementation.

use anyhow::{Context, Result};
use sandpit_core::{Config, Workspace, CONFIG_FILENAME};
use std::fs;
use std::path::Path;

/// Initialize a new sandpit workspace
pub fn init_project(path: Option<&Path>) -> Result<()> {
    let root = path.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    write_config(root)?;

    let written = Workspace::new(root)
        .init_defaults()
        .with_context(|| format!("Failed to scaffold workspace in {:?}", root))?;
    for path in &written {
        println!("Created {:?}", path);
    }

    println!("✓ sandpit initialized in {:?}", root);
    println!("  - Edit index.html, styles.css and script.js, or main.js for script mode");
    println!("  - Put answers for prompt() in stdin.txt, one per line");
    println!("  - Run `sandpit serve` to open the playground");
    Ok(())
}

fn write_config(root: &Path) -> Result<()> {
    let config_path = root.join(CONFIG_FILENAME);
    if config_path.exists() {
        println!("{} already exists at {:?}", CONFIG_FILENAME, config_path);
        return Ok(());
    }

    let yaml = Config::default()
        .to_yaml()
        .context("Failed to serialize default config")?;
    fs::write(&config_path, yaml).with_context(|| format!("Failed to write {:?}", config_path))?;
    println!("Created {:?}", config_path);
    Ok(())
}
