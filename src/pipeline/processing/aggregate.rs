use crate::common::constants::{
    DEFAULT_LOCALITY_COLUMN, DEFAULT_PERIOD_COLUMN, DEFAULT_VALUE_COLUMN, GOLD_CATEGORY,
    GOLD_LOCALITY, GOLD_PERIOD, GOLD_VALUE_TOTAL, META_BATCH_ID, PERIOD_ABSENT, SENTINEL_LABEL,
};
use crate::common::error::Result;
use crate::pipeline::ingestion::batch::BatchId;
use crate::pipeline::processing::normalize::{coerce_cells, normalize_column_name};
use crate::pipeline::processing::table::{Column, ColumnData, Table};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Which silver columns play which role in the gold tables.
///
/// Names go through [`normalize_column_name`] before lookup, so the raw API
/// spelling (`D3N`) works as well as the silver one (`d3n`). An empty
/// `category`, `period` or `sentinel_column` turns that role off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionColumns {
    pub category: Option<String>,
    pub locality: String,
    pub period: Option<String>,
    pub value: String,
    pub sentinel_column: Option<String>,
    pub sentinel_label: String,
}

impl Default for DimensionColumns {
    fn default() -> Self {
        Self {
            category: None,
            locality: DEFAULT_LOCALITY_COLUMN.to_string(),
            period: Some(DEFAULT_PERIOD_COLUMN.to_string()),
            value: DEFAULT_VALUE_COLUMN.to_string(),
            sentinel_column: Some(DEFAULT_LOCALITY_COLUMN.to_string()),
            sentinel_label: SENTINEL_LABEL.to_string(),
        }
    }
}

impl DimensionColumns {
    fn normalized(&self) -> Self {
        Self {
            category: optional_column(&self.category),
            locality: normalize_column_name(&self.locality),
            period: optional_column(&self.period),
            value: normalize_column_name(&self.value),
            sentinel_column: optional_column(&self.sentinel_column),
            sentinel_label: self.sentinel_label.clone(),
        }
    }
}

fn optional_column(name: &Option<String>) -> Option<String> {
    name.as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(normalize_column_name)
}

/// Float grouping key with a total order.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One grouping-key cell, ordered by value in the silver column's type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Float(FloatKey),
    Text(String),
}

impl KeyValue {
    fn at(data: &ColumnData, row: usize) -> Option<KeyValue> {
        match data {
            ColumnData::Int64(v) => v[row].map(KeyValue::Int),
            ColumnData::Float64(v) => v[row].map(|f| KeyValue::Float(FloatKey(f))),
            ColumnData::Utf8(v) => v[row].clone().map(KeyValue::Text),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(text: &str) -> Self {
        KeyValue::Text(text.to_string())
    }
}

/// Arrow type a gold key column is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyKind {
    Int,
    Float,
    #[default]
    Text,
}

impl KeyKind {
    fn of(data: &ColumnData) -> Self {
        match data {
            ColumnData::Int64(_) => KeyKind::Int,
            ColumnData::Float64(_) => KeyKind::Float,
            ColumnData::Utf8(_) => KeyKind::Text,
        }
    }

    fn column<'a>(self, keys: impl Iterator<Item = &'a Option<KeyValue>>) -> ColumnData {
        match self {
            KeyKind::Int => ColumnData::Int64(
                keys.map(|k| match k {
                    Some(KeyValue::Int(n)) => Some(*n),
                    _ => None,
                })
                .collect(),
            ),
            KeyKind::Float => ColumnData::Float64(
                keys.map(|k| match k {
                    Some(KeyValue::Float(f)) => Some(f.0),
                    _ => None,
                })
                .collect(),
            ),
            KeyKind::Text => ColumnData::Utf8(
                keys.map(|k| match k {
                    Some(KeyValue::Text(s)) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            ),
        }
    }
}

/// Column types of the grouping keys, carried over from silver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyKinds {
    pub category: KeyKind,
    pub locality: KeyKind,
    pub period: KeyKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalityTotal {
    pub category: Option<KeyValue>,
    pub locality: Option<KeyValue>,
    pub period: Option<KeyValue>,
    pub value_total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NationwideTotal {
    pub category: Option<KeyValue>,
    pub period: Option<KeyValue>,
    pub value_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    pub input_rows: usize,
    pub sentinel_rows_dropped: usize,
    pub values_coerced_to_missing: usize,
    pub period_present: bool,
}

/// Both gold aggregates for one silver table, rows sorted by key (nulls first).
#[derive(Debug, Clone, PartialEq)]
pub struct GoldTables {
    pub by_locality: Vec<LocalityTotal>,
    pub nationwide: Vec<NationwideTotal>,
    pub with_category: bool,
    pub key_kinds: KeyKinds,
    pub stats: AggregateStats,
}

impl GoldTables {
    pub fn locality_table(&self) -> Result<Table> {
        let rows = &self.by_locality;
        let kinds = self.key_kinds;
        let mut columns = Vec::new();
        if self.with_category {
            columns.push(Column::new(
                GOLD_CATEGORY,
                kinds.category.column(rows.iter().map(|r| &r.category)),
            ));
        }
        columns.push(Column::new(
            GOLD_LOCALITY,
            kinds.locality.column(rows.iter().map(|r| &r.locality)),
        ));
        columns.push(Column::new(
            GOLD_PERIOD,
            kinds.period.column(rows.iter().map(|r| &r.period)),
        ));
        columns.push(Column::new(
            GOLD_VALUE_TOTAL,
            ColumnData::Float64(rows.iter().map(|r| Some(r.value_total)).collect()),
        ));
        Table::from_columns(rows.len(), columns)
    }

    pub fn nationwide_table(&self) -> Result<Table> {
        let rows = &self.nationwide;
        let kinds = self.key_kinds;
        let mut columns = Vec::new();
        if self.with_category {
            columns.push(Column::new(
                GOLD_CATEGORY,
                kinds.category.column(rows.iter().map(|r| &r.category)),
            ));
        }
        columns.push(Column::new(
            GOLD_PERIOD,
            kinds.period.column(rows.iter().map(|r| &r.period)),
        ));
        columns.push(Column::new(
            GOLD_VALUE_TOTAL,
            ColumnData::Float64(rows.iter().map(|r| Some(r.value_total)).collect()),
        ));
        Table::from_columns(rows.len(), columns)
    }
}

/// Rows to keep: false where `column` holds the sentinel label
/// (trimmed, case-insensitive). Missing cells are kept.
pub fn sentinel_mask(column: &ColumnData, label: &str) -> Vec<bool> {
    let label = label.trim().to_lowercase();
    (0..column.len())
        .map(|row| match column.text_at(row) {
            Some(text) => text.trim().to_lowercase() != label,
            None => true,
        })
        .collect()
}

/// The batch id the gold files are named after.
///
/// Prefers the most frequent `batch_id` value in the table (ties go to the
/// latest id) and falls back to the id parsed from the input filename.
pub fn resolve_batch_id(table: &Table, from_filename: &BatchId) -> BatchId {
    let Some(column) = table.column(META_BATCH_ID) else {
        debug!("No batch_id column; using batch id from filename");
        return from_filename.clone();
    };

    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in 0..column.data.len() {
        if let Some(value) = column.data.text_at(row) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let most_frequent = counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| a.cmp(b)))
        .map(|(value, _)| value);

    match most_frequent {
        Some(value) => BatchId::parse(&value).unwrap_or_else(|| {
            warn!("batch_id value '{}' is not a valid batch id; using filename", value);
            from_filename.clone()
        }),
        None => from_filename.clone(),
    }
}

/// Sum the value column by (category, locality, period) and by (category, period).
///
/// Non-numeric values count as missing and missing values are skipped, so a
/// group with nothing numeric totals 0. Sums accumulate in row order. Keys
/// sort by value in the silver column's type, nulls first. The
/// nationwide table is rolled up from the locality groups in key order,
/// which makes it reconcile exactly with the locality table.
pub fn aggregate(table: &Table, dims: &DimensionColumns) -> Result<GoldTables> {
    let dims = dims.normalized();

    let value_column = table.require(&dims.value)?;
    table.require(&dims.locality)?;
    if let Some(category) = &dims.category {
        table.require(category)?;
    }
    debug!(value = %value_column.name, "Dimension columns validated");

    let mut stats = AggregateStats {
        input_rows: table.num_rows(),
        ..Default::default()
    };

    let filtered = match dims.sentinel_column.as_deref() {
        Some(name) => match table.column(name) {
            Some(column) => {
                let keep = sentinel_mask(&column.data, &dims.sentinel_label);
                let filtered = table.filter_rows(&keep);
                stats.sentinel_rows_dropped = table.num_rows() - filtered.num_rows();
                filtered
            }
            None => {
                warn!("Sentinel column '{}' not found; no rows filtered", name);
                table.clone()
            }
        },
        None => table.clone(),
    };

    let (values, invalid) = coerce_cells(&filtered.require(&dims.value)?.data);
    stats.values_coerced_to_missing = invalid;

    let locality = &filtered.require(&dims.locality)?.data;
    let category = match &dims.category {
        Some(name) => Some(&filtered.require(name)?.data),
        None => None,
    };
    let period = dims
        .period
        .as_deref()
        .and_then(|name| filtered.column(name))
        .map(|c| &c.data)
        .filter(|data| data.null_count() < data.len());
    stats.period_present = period.is_some();

    let key_kinds = KeyKinds {
        category: category.map(KeyKind::of).unwrap_or_default(),
        locality: KeyKind::of(locality),
        period: period.map(KeyKind::of).unwrap_or_default(),
    };

    type GroupKey = (Option<KeyValue>, Option<KeyValue>, Option<KeyValue>);
    let mut groups: BTreeMap<GroupKey, f64> = BTreeMap::new();
    for (row, value) in values.iter().enumerate() {
        let key = (
            category.and_then(|c| KeyValue::at(c, row)),
            KeyValue::at(locality, row),
            match period {
                Some(p) => KeyValue::at(p, row),
                None => Some(KeyValue::from(PERIOD_ABSENT)),
            },
        );
        let total = groups.entry(key).or_insert(0.0);
        if let Some(v) = value {
            *total += v;
        }
    }

    let mut rollup: BTreeMap<(Option<KeyValue>, Option<KeyValue>), f64> = BTreeMap::new();
    for ((category, _, period), total) in &groups {
        *rollup.entry((category.clone(), period.clone())).or_insert(0.0) += total;
    }
    if rollup.is_empty() && category.is_none() && period.is_none() {
        rollup.insert((None, Some(KeyValue::from(PERIOD_ABSENT))), 0.0);
    }

    Ok(GoldTables {
        by_locality: groups
            .into_iter()
            .map(|((category, locality, period), value_total)| LocalityTotal {
                category,
                locality,
                period,
                value_total,
            })
            .collect(),
        nationwide: rollup
            .into_iter()
            .map(|((category, period), value_total)| NationwideTotal {
                category,
                period,
                value_total,
            })
            .collect(),
        with_category: dims.category.is_some(),
        key_kinds,
        stats,
    })
}
