//! Domain list loading from CSV/JSON files
//!
//! Supports:
//! - CSV files with a header row naming the domain column (other columns ignored)
//! - Header-less files with one domain per line (first comma-separated field)
//! - JSON arrays of domain strings or of objects carrying the domain column
//! - JSON objects with a "domains" array
//!
//! Values are trimmed, empty values are dropped and duplicates are removed
//! keeping the first occurrence.

use anyhow::{bail, Context, Result};
use indexmap::IndexSet;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Input format for domain list files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect format from file extension; anything that is not `.json` is
    /// read as CSV / plain text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Read the domain list from `path`, using `column` as the CSV header /
/// JSON object field that holds the domain.
pub fn load_domains(path: &Path, column: &str) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let domains = match InputFormat::from_path(path) {
        InputFormat::Csv => parse_csv_domains(&content, column),
        InputFormat::Json => parse_json_domains(&content, column),
    }
    .with_context(|| format!("Failed to parse input file: {}", path.display()))?;

    Ok(dedup_domains(domains))
}

/// Trim, drop empties and remove duplicates keeping first-seen order
pub fn dedup_domains<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    domains
        .into_iter()
        .map(|d| d.as_ref().trim().to_string())
        .filter(|d| !d.is_empty())
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// Parse domains from CSV content.
///
/// When the first row contains `column` (case-insensitive) it is treated as
/// a header and only that column is read. A first row without any `.` is a
/// header too, and fails when it lacks the column. Otherwise every
/// non-comment line contributes its first field.
pub fn parse_csv_domains(content: &str, column: &str) -> Result<Vec<String>> {
    let Some(first_line) = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
    else {
        return Ok(Vec::new());
    };

    let column = column.trim().to_lowercase();
    let has_header = first_line
        .split(',')
        .any(|field| field.trim().trim_matches('"').to_lowercase() == column);

    if !has_header && !first_line.contains('.') {
        bail!("CSV header '{}' has no '{}' column", first_line, column);
    }

    let mut domains = Vec::new();

    if has_header {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = reader.headers().context("Failed to read CSV headers")?.clone();
        let domain_idx = headers
            .iter()
            .position(|h| h.to_lowercase() == column)
            .with_context(|| format!("CSV must have a '{}' column", column))?;

        for result in reader.records() {
            let record = result.context("Failed to parse CSV record")?;
            if let Some(domain) = record.get(domain_idx) {
                domains.push(domain.to_string());
            }
        }
    } else {
        for line in content.lines() {
            let domain = line.split(',').next().unwrap_or(line).trim().trim_matches('"');
            if domain.is_empty() || domain.starts_with('#') {
                continue;
            }
            domains.push(domain.to_string());
        }
    }

    Ok(domains)
}

/// Parse domains from JSON content
///
/// Supports three formats:
/// 1. Array of domain strings: ["example.com", "test.org"]
/// 2. Array of objects with the domain field: [{"domain": "example.com"}]
/// 3. Object with "domains" array: {"domains": ["example.com", "test.org"]}
pub fn parse_json_domains(content: &str, column: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(content).context("Failed to parse JSON content")?;

    match &value {
        Value::Array(arr) => Ok(parse_json_array(arr, column)),
        Value::Object(obj) => match obj.get("domains") {
            Some(Value::Array(arr)) => Ok(parse_json_array(arr, column)),
            Some(_) => bail!("'domains' field must be an array"),
            None => bail!("JSON object must have a 'domains' array field"),
        },
        _ => bail!("JSON must be an array of domains or an object with 'domains' field"),
    }
}

/// Strings and objects carrying a string `column` field; anything else
/// (numbers, nulls) is skipped.
fn parse_json_array(arr: &[Value], column: &str) -> Vec<String> {
    arr.iter()
        .filter_map(|item| match item {
            Value::String(domain) => Some(domain.clone()),
            Value::Object(obj) => obj.get(column).and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}
