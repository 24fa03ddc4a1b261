use crate::common::constants::{META_BATCH_ID, META_INGESTED_AT, META_SOURCE_URL, METADATA_COLUMNS};
use crate::common::error::Result;
use crate::pipeline::ingestion::envelope::{BronzeEnvelope, RawRecord};
use crate::pipeline::processing::table::{Column, ColumnData, Table};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Snake-case a source column name: trim, lower-case, whitespace and hyphens to `_`.
///
/// Applying it twice gives the same result as applying it once.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

/// Outcome of parsing one cell as a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedCell {
    /// Empty, whitespace-only or `NaN`: a missing value, not a failure.
    Missing,
    Int(i64),
    Float(f64),
    Invalid,
}

pub fn parse_cell(raw: &str) -> ParsedCell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedCell::Missing;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return ParsedCell::Int(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_nan() => ParsedCell::Missing,
        Ok(f) if f.is_finite() => ParsedCell::Float(f),
        _ => ParsedCell::Invalid,
    }
}

/// Result of the column-wide numeric conversion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Numeric(ColumnData),
    Text(Vec<Option<String>>),
}

impl Coerced {
    pub fn into_data(self) -> ColumnData {
        match self {
            Coerced::Numeric(data) => data,
            Coerced::Text(values) => ColumnData::Utf8(values),
        }
    }
}

/// All-or-nothing conversion of a text column.
///
/// Every present value must parse for the column to become numeric: Int64
/// when all of them are integral, Float64 otherwise. A single unparseable
/// value keeps the whole column as its original text.
pub fn coerce_column(values: Vec<Option<String>>) -> Coerced {
    let parsed: Vec<ParsedCell> = values
        .iter()
        .map(|v| v.as_deref().map_or(ParsedCell::Missing, parse_cell))
        .collect();

    if parsed.iter().any(|p| matches!(p, ParsedCell::Invalid)) {
        return Coerced::Text(values);
    }

    let all_int = parsed.iter().all(|p| !matches!(p, ParsedCell::Float(_)));
    let any_present = parsed.iter().any(|p| !matches!(p, ParsedCell::Missing));
    if all_int && any_present {
        return Coerced::Numeric(ColumnData::Int64(
            parsed
                .iter()
                .map(|p| match p {
                    ParsedCell::Int(n) => Some(*n),
                    _ => None,
                })
                .collect(),
        ));
    }

    Coerced::Numeric(ColumnData::Float64(
        parsed
            .iter()
            .map(|p| match p {
                ParsedCell::Int(n) => Some(*n as f64),
                ParsedCell::Float(f) => Some(*f),
                _ => None,
            })
            .collect(),
    ))
}

/// Cell-by-cell conversion used on the value column before aggregation.
/// Returns the numbers plus how many present cells failed to parse.
pub fn coerce_cells(data: &ColumnData) -> (Vec<Option<f64>>, usize) {
    match data {
        ColumnData::Int64(values) => (values.iter().map(|v| v.map(|n| n as f64)).collect(), 0),
        ColumnData::Float64(values) => (
            values.iter().map(|v| v.filter(|f| !f.is_nan())).collect(),
            0,
        ),
        ColumnData::Utf8(values) => {
            let mut invalid = 0;
            let numbers: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v.as_deref().map(parse_cell) {
                    Some(ParsedCell::Int(n)) => Some(n as f64),
                    Some(ParsedCell::Float(f)) => Some(f),
                    Some(ParsedCell::Invalid) => {
                        invalid += 1;
                        None
                    }
                    Some(ParsedCell::Missing) | None => None,
                })
                .collect();
            (numbers, invalid)
        }
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// One text row per record; columns are the union of keys in first-seen order.
pub fn flatten_records(records: &[RawRecord]) -> Result<Table> {
    let mut raw_keys: Vec<&str> = Vec::new();
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for record in records {
        for key in record.keys() {
            if !index_of.contains_key(key.as_str()) {
                index_of.insert(key.as_str(), raw_keys.len());
                raw_keys.push(key.as_str());
            }
        }
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![vec![None; records.len()]; raw_keys.len()];
    for (row, record) in records.iter().enumerate() {
        for (key, value) in record {
            cells[index_of[key.as_str()]][row] = cell_text(value);
        }
    }

    let mut taken: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(raw_keys.len());
    for (raw, values) in raw_keys.iter().zip(cells) {
        let base = normalize_column_name(raw);
        let mut name = base.clone();
        let mut suffix = 2;
        while taken.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        if name != base {
            warn!("Column '{}' collides after normalization; stored as '{}'", raw, name);
        }
        taken.insert(name.clone());
        columns.push(Column::new(name, ColumnData::Utf8(values)));
    }

    Table::from_columns(records.len(), columns)
}

/// Build the silver table for one bronze envelope.
pub fn build_silver_table(envelope: &BronzeEnvelope) -> Result<Table> {
    let mut table = flatten_records(&envelope.data)?;
    let rows = table.num_rows();
    let meta = &envelope.meta;

    for (name, value) in [
        (META_BATCH_ID, meta.batch_id.as_str()),
        (META_INGESTED_AT, meta.ingested_at_utc.as_str()),
        (META_SOURCE_URL, meta.source_url.as_str()),
    ] {
        if table.column(name).is_some() {
            warn!("Source column '{}' is replaced by batch metadata", name);
        }
        table.set_column(Column::new(
            name,
            ColumnData::Utf8(vec![Some(value.to_string()); rows]),
        ))?;
    }

    let data_columns: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|name| !METADATA_COLUMNS.contains(&name.as_str()))
        .collect();

    for name in data_columns {
        let Some(column) = table.column(&name) else { continue };
        let ColumnData::Utf8(values) = column.data.clone() else { continue };
        let coerced = coerce_column(values);
        if matches!(coerced, Coerced::Text(_)) {
            debug!("Column '{}' kept as text", name);
        }
        table.set_column(Column::new(name, coerced.into_data()))?;
    }

    Ok(table)
}
