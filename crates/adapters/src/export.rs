use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use datalink_core::result_set::{CellValue, TabularResult};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create export directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write export file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub rows: usize,
}

fn ordered_rows<'a>(
    result: &'a TabularResult,
    order: &'a [usize],
) -> impl Iterator<Item = &'a [CellValue]> + 'a {
    order.iter().filter_map(|&index| result.row(index))
}

/// CSV text for the rows of `result` in `order`. Header names are written as
/// is; a cell is quoted only when it contains a comma, a quote or a newline.
#[must_use]
pub fn render_csv(result: &TabularResult, order: &[usize]) -> String {
    let mut lines = Vec::with_capacity(order.len() + 1);
    lines.push(result.columns().join(","));

    for row in ordered_rows(result, order) {
        lines.push(
            row.iter()
                .map(|cell| csv_escape(&cell.export_text()))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n")
}

/// Pretty JSON array with one object per row, keyed by column name in column
/// order. A repeated column name keeps its first position and the last value.
pub fn render_json(result: &TabularResult, order: &[usize]) -> Result<String, ExportError> {
    let mut records = Vec::with_capacity(order.len());
    for row in ordered_rows(result, order) {
        let mut object = Map::with_capacity(result.column_count());
        for (column, cell) in result.columns().iter().zip(row) {
            object.insert(column.clone(), serde_json::to_value(cell)?);
        }
        records.push(Value::Object(object));
    }

    Ok(serde_json::to_string_pretty(&records)?)
}

#[must_use]
pub fn to_csv_bytes(result: &TabularResult, order: &[usize]) -> Vec<u8> {
    render_csv(result, order).into_bytes()
}

pub fn to_json_bytes(result: &TabularResult, order: &[usize]) -> Result<Vec<u8>, ExportError> {
    render_json(result, order).map(String::into_bytes)
}

#[must_use]
pub fn export_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "query_results_{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

/// Renders in memory, then writes a single timestamped file into `dir`.
pub fn export_to_dir(
    dir: &Path,
    format: ExportFormat,
    result: &TabularResult,
    order: &[usize],
    now: DateTime<Utc>,
) -> Result<ExportSummary, ExportError> {
    let payload = match format {
        ExportFormat::Csv => to_csv_bytes(result, order),
        ExportFormat::Json => to_json_bytes(result, order)?,
    };

    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(export_file_name(format, now));
    fs::write(&path, payload).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;

    let rows = ordered_rows(result, order).count();
    info!(path = %path.display(), rows, format = format.label(), "results exported");
    Ok(ExportSummary { path, format, rows })
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
