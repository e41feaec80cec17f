//! Tabular change-set read from CSV or built in memory

use crate::error::UpdateError;
use anyhow::Context;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Column that identifies each company record
pub const ID_COLUMN: &str = "id";

/// Rows of field values to write, one row per company
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ChangeSet {
    /// Build a change-set; every row must have one cell per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, UpdateError> {
        if let Some((position, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(UpdateError::configuration(format!(
                "row {} has {} cell(s), expected {}",
                position + 1,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Read a change-set from CSV with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()
            .context("Failed to read CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (position, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", position + 1))?;
            rows.push(record.iter().map(parse_cell).collect());
        }

        Ok(Self::new(columns, rows)?)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open change-set file: {:?}", path))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("Failed to parse change-set file: {:?}", path))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Type a raw CSV cell: empty → null, integers and floats → number,
/// `true`/`false` → bool, anything else stays a string
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    match raw {
        "true" | "TRUE" | "True" => Value::Bool(true),
        "false" | "FALSE" | "False" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
