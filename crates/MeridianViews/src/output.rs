//! Row output serialization: CSV (with or without headers), JSON array,
//! and newline-delimited JSON.

use serde_json::Value as Json;

use crate::error::ViewError;
use crate::eval::ViewOutput;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Csv,
    CsvWithHeader,
    Json,
    NdJson,
}

impl ContentType {
    /// Parses a shortened format name or MIME type string.
    pub fn from_string(s: &str) -> Result<ContentType, ViewError> {
        match s {
            "csv" => Ok(ContentType::CsvWithHeader),
            "json" => Ok(ContentType::Json),
            "ndjson" => Ok(ContentType::NdJson),
            "text/csv;header=false" => Ok(ContentType::Csv),
            "text/csv" | "text/csv;header=true" => Ok(ContentType::CsvWithHeader),
            "application/json" => Ok(ContentType::Json),
            "application/ndjson" | "application/x-ndjson" => Ok(ContentType::NdJson),
            _ => Err(ViewError::UnsupportedContentType(s.to_string())),
        }
    }
}

/// Serializes evaluated rows in the requested format.
pub fn write_output(output: &ViewOutput, content_type: ContentType) -> Result<Vec<u8>, ViewError> {
    match content_type {
        ContentType::Csv => write_csv(output, false),
        ContentType::CsvWithHeader => write_csv(output, true),
        ContentType::Json => write_json(output),
        ContentType::NdJson => write_ndjson(output),
    }
}

fn write_csv(output: &ViewOutput, header: bool) -> Result<Vec<u8>, ViewError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if header {
        writer.write_record(&output.columns)?;
    }
    for row in &output.rows {
        let record: Vec<String> = output
            .columns
            .iter()
            .map(|column| csv_cell(row.get(column).unwrap_or(&Json::Null)))
            .collect();
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|e| ViewError::InvalidDefinition(format!("CSV writer error: {}", e)))
}

/// Null renders as an empty cell; strings render bare; arrays and objects
/// render as JSON text.
fn csv_cell(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_json(output: &ViewOutput) -> Result<Vec<u8>, ViewError> {
    let rows: Vec<Json> = output.rows.iter().map(|r| Json::Object(r.clone())).collect();
    Ok(serde_json::to_vec_pretty(&rows)?)
}

fn write_ndjson(output: &ViewOutput) -> Result<Vec<u8>, ViewError> {
    let mut buffer = Vec::new();
    for row in &output.rows {
        serde_json::to_writer(&mut buffer, &Json::Object(row.clone()))?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}
