//! Tabular data parsing.
//!
//! Turns uploaded CSV files into [`Table`] records: header row as the field
//! list, every record as a row keyed by field name, and the first few rows
//! kept aside as samples for match scoring and the preview pane.

use std::path::Path;

use thiserror::Error;

use crate::model::{DataParseResponse, Row, Table};

/// Rows kept as the sample set.
const SAMPLE_ROWS: usize = 5;

#[derive(Error, Debug)]
pub enum TabularError {
    #[error("no data files provided")]
    NoFiles,

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to parse {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
}

/// Parse a batch of uploaded `(filename, bytes)` pairs into tables.
pub fn parse_tabular_files(files: &[(String, Vec<u8>)]) -> Result<DataParseResponse, TabularError> {
    if files.is_empty() {
        return Err(TabularError::NoFiles);
    }

    let mut tables = Vec::with_capacity(files.len());
    for (filename, content) in files {
        if !filename.to_lowercase().ends_with(".csv") {
            return Err(TabularError::Unsupported(filename.clone()));
        }
        tables.push(parse_csv(filename, content)?);
    }

    Ok(DataParseResponse {
        file_count: files.len(),
        table_count: tables.len(),
        tables,
    })
}

fn parse_csv(filename: &str, content: &[u8]) -> Result<Table, TabularError> {
    let to_error = |source: csv::Error| TabularError::Csv {
        file: filename.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content);

    let fields: Vec<String> = reader
        .headers()
        .map_err(to_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows: Vec<Row> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(to_error)?;
        let mut row = Row::new();
        for (index, field) in fields.iter().enumerate() {
            let value = match record.get(index) {
                // Blank cells come back as null, like the original's NaN
                // normalization.
                Some("") | None => serde_json::Value::Null,
                Some(cell) => serde_json::Value::String(cell.to_string()),
            };
            row.insert(field.clone(), value);
        }
        rows.push(row);
    }

    Ok(Table {
        name: table_name_from_file(filename),
        fields,
        sample_rows: rows.iter().take(SAMPLE_ROWS).cloned().collect(),
        rows,
    })
}

/// Table name: the file stem, or the full name when there is no stem.
fn table_name_from_file(filename: &str) -> String {
    let path = Path::new(filename);
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
