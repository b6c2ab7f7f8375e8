//! Project initialization: `taskboard init`.

use std::path::Path;

use anyhow::{Context, Result};
use taskboard::board::db::BoardDb;
use taskboard::config::TaskboardToml;

pub fn cmd_init(config_path: &Path, toml: &TaskboardToml) -> Result<()> {
    let db_path = &toml.server.db_path;
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    BoardDb::new(db_path).context("Failed to initialize board database")?;
    println!("Board database initialized at {}", db_path.display());

    if config_path.exists() {
        println!("Config already present at {}", config_path.display());
    } else {
        toml.save(config_path)?;
        println!("Wrote default config to {}", config_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Run `taskboard board add <title>` to create a board");
    println!("  2. Run `taskboard serve` to start the API");
    Ok(())
}
