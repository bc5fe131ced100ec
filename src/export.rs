use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::grouping::LogoGroup;
use crate::hash_store::PerceptualHash;

/// Write the hostname -> hex hash map as a JSON object in store order
pub fn write_hashes(hashes: &IndexMap<String, PerceptualHash>, output_path: &Path) -> Result<()> {
    debug!("Exporting {} hashes to {}", hashes.len(), output_path.display());

    let json = serde_json::to_string(hashes).context("Failed to serialize logo hashes")?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write hashes to: {}", output_path.display()))?;

    info!("Exported {} hashes to {}", hashes.len(), output_path.display());
    Ok(())
}

/// Load a hash file written by [`write_hashes`]
pub fn load_hashes(input_path: &Path) -> Result<IndexMap<String, PerceptualHash>> {
    let content = fs::read_to_string(input_path)
        .with_context(|| format!("Failed to read hash file: {}", input_path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse hash file: {}", input_path.display()))
}

/// Write the numbered groups as pretty-printed JSON
pub fn write_groups(groups: &[LogoGroup], output_path: &Path) -> Result<()> {
    debug!("Exporting {} groups to {}", groups.len(), output_path.display());

    let json = serde_json::to_string_pretty(groups).context("Failed to serialize logo groups")?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write groups to: {}", output_path.display()))?;

    info!("Exported {} groups to {}", groups.len(), output_path.display());
    Ok(())
}

/// Write the failed hostnames, one per line
pub fn write_failed(failed: &[String], output_path: &Path) -> Result<()> {
    write_lines(failed, output_path)
}

/// Write the accumulated diagnostic log, one line per entry
pub fn write_log(lines: &[String], output_path: &Path) -> Result<()> {
    write_lines(lines, output_path)
}

fn write_lines(lines: &[String], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
