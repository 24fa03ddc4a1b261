use crate::common::error::{PipelineError, Result};
use std::fmt;

/// Typed values of one column. `None` is a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnData::Utf8(_))
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Int64(v) => v[row].is_none(),
            ColumnData::Float64(v) => v[row].is_none(),
            ColumnData::Utf8(v) => v[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    /// Text form of a cell, used for sentinel matching and CSV output.
    pub fn text_at(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Int64(v) => v[row].map(|n| n.to_string()),
            ColumnData::Float64(v) => v[row].map(|n| n.to_string()),
            ColumnData::Utf8(v) => v[row].clone(),
        }
    }

    fn take(&self, keep: &[bool]) -> ColumnData {
        fn pick<T: Clone>(values: &[Option<T>], keep: &[bool]) -> Vec<Option<T>> {
            values
                .iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v.clone())
                .collect()
        }
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(pick(v, keep)),
            ColumnData::Float64(v) => ColumnData::Float64(pick(v, keep)),
            ColumnData::Utf8(v) => ColumnData::Utf8(pick(v, keep)),
        }
    }

    fn head(&self, n: usize) -> ColumnData {
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(v.iter().take(n).cloned().collect()),
            ColumnData::Float64(v) => ColumnData::Float64(v.iter().take(n).cloned().collect()),
            ColumnData::Utf8(v) => ColumnData::Utf8(v.iter().take(n).cloned().collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Minimal columnar table shared by the silver and gold stages.
/// All columns always have `num_rows` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    pub fn new(num_rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            num_rows,
        }
    }

    pub fn from_columns(num_rows: usize, columns: Vec<Column>) -> Result<Self> {
        let mut table = Self::new(num_rows);
        for column in columns {
            table.set_column(column)?;
        }
        Ok(table)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Table::column`] but a missing column is a schema violation.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| PipelineError::MissingColumn {
            column: name.to_string(),
            available: self.column_names(),
        })
    }

    /// Replace the column with the same name in place, or append it.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if column.data.len() != self.num_rows {
            return Err(PipelineError::InvalidPayload(format!(
                "column '{}' has {} cells, table has {} rows",
                column.name,
                column.data.len(),
                self.num_rows
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn filter_rows(&self, keep: &[bool]) -> Table {
        let num_rows = keep.iter().filter(|k| **k).count();
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(keep)))
                .collect(),
            num_rows,
        }
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.head(n)))
                .collect(),
            num_rows: self.num_rows.min(n),
        }
    }
}

/// Plain-text grid used for run-summary previews. Missing cells print as `null`.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .columns
            .iter()
            .map(|c| {
                (0..self.num_rows)
                    .map(|row| c.data.text_at(row).unwrap_or_else(|| "null".to_string()))
                    .collect()
            })
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .zip(&cells)
            .map(|(c, values)| {
                values
                    .iter()
                    .map(|v| v.chars().count())
                    .chain(std::iter::once(c.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c.name, w = *w))
            .collect();
        writeln!(f, "{}", header.join("  ").trim_end())?;
        for row in 0..self.num_rows {
            let line: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(values, w)| format!("{:<w$}", values[row], w = *w))
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }
        Ok(())
    }
}
