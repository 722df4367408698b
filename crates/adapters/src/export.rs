use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use sqlb_core::results::ResultSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no result columns to export")]
    NoColumns,
    #[error("failed to write export file at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes a header line plus one line per buffered row; `NULL` becomes an
/// empty field.
pub fn export_results_to_csv(path: &Path, results: &ResultSet) -> Result<usize, ExportError> {
    let headers = results.columns();
    if headers.is_empty() {
        return Err(ExportError::NoColumns);
    }

    let mut content = String::new();
    content.push_str(
        &headers
            .iter()
            .map(|header| csv_escape(header))
            .collect::<Vec<_>>()
            .join(","),
    );
    content.push('\n');

    for row in results.rows() {
        let values = (0..headers.len())
            .map(|index| {
                row.values
                    .get(index)
                    .and_then(Option::as_deref)
                    .map_or_else(String::new, csv_escape)
            })
            .collect::<Vec<_>>();
        content.push_str(&values.join(","));
        content.push('\n');
    }

    write_export(path, &content)?;
    tracing::info!(path = %path.display(), rows = results.len(), "exported CSV");
    Ok(results.len())
}

/// Writes an array of objects keyed by column name; `NULL` becomes JSON `null`.
pub fn export_results_to_json(path: &Path, results: &ResultSet) -> Result<usize, ExportError> {
    let headers = results.columns();
    if headers.is_empty() {
        return Err(ExportError::NoColumns);
    }

    let records = results
        .rows()
        .map(|row| {
            let mut object = Map::with_capacity(headers.len());
            for (index, header) in headers.iter().enumerate() {
                let value = row
                    .values
                    .get(index)
                    .and_then(Option::clone)
                    .map_or(Value::Null, Value::String);
                object.insert(header.clone(), value);
            }
            Value::Object(object)
        })
        .collect::<Vec<_>>();

    let payload = serde_json::to_string_pretty(&records)?;
    write_export(path, &payload)?;
    tracing::info!(path = %path.display(), rows = records.len(), "exported JSON");
    Ok(records.len())
}

fn write_export(path: &Path, content: &str) -> Result<(), ExportError> {
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| ExportError::Write {
            path: parent_dir.display().to_string(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sqlb_core::query_runner::QueryRow;
    use sqlb_core::results::ResultSet;
    use tempfile::TempDir;

    use super::{export_results_to_csv, export_results_to_json, ExportError};

    fn sample_results() -> ResultSet {
        let mut results = ResultSet::new(10);
        results.reset(vec!["id".to_string(), "name".to_string()]);
        results.push_row(QueryRow::from_text(["1", "alpha"]));
        results.push_row(QueryRow::from_text(["2", "quote \"name\", here"]));
        results.push_row(QueryRow::new(vec![Some("3".to_string()), None]));
        results
    }

    #[test]
    fn exports_rows_to_csv_with_header_and_escaping() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("result.csv");

        let written = export_results_to_csv(&path, &sample_results()).expect("csv export failed");
        assert_eq!(written, 3);
        let output = fs::read_to_string(path).expect("failed to read csv output");
        assert_eq!(
            output,
            "id,name\n1,alpha\n2,\"quote \"\"name\"\", here\"\n3,\n"
        );
    }

    #[test]
    fn exports_rows_to_json_objects_by_header() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("result.json");

        let written =
            export_results_to_json(&path, &sample_results()).expect("json export failed");
        assert_eq!(written, 3);
        let output = fs::read_to_string(path).expect("failed to read json output");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("invalid json");
        assert_eq!(parsed[0]["id"], "1");
        assert_eq!(parsed[0]["name"], "alpha");
        assert!(parsed[2]["name"].is_null());
    }

    #[test]
    fn refuses_to_export_without_columns() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let err = export_results_to_csv(&temp_dir.path().join("empty.csv"), &ResultSet::new(1))
            .expect_err("empty result should not export");
        assert!(matches!(err, ExportError::NoColumns));
    }
}
