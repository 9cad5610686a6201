use std::fs;
use std::path::Path;

use color_eyre::{eyre::eyre, Result};
use tracing::info;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size with base-1024 units and two decimals, e.g. "1.23 MB"
pub fn format_byte_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Create the output directory if needed
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(eyre!("{} exists but is not a directory", path.display()));
        }
        return Ok(());
    }

    fs::create_dir_all(path)
        .map_err(|e| eyre!("Failed to create directory {}: {}", path.display(), e))?;
    info!("Created output directory {}", path.display());
    Ok(())
}
