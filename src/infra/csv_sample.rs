use crate::common::error::Result;
use crate::pipeline::processing::table::Table;
use csv::WriterBuilder;
use std::fs;
use std::path::Path;

/// Write the first `limit` rows of `table` as a CSV sample with a header row.
/// Missing cells are empty fields. Returns the number of data rows written.
pub fn write_head_csv(path: &Path, table: &Table, limit: usize) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let head = table.head(limit);
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(head.column_names())?;
    for row in 0..head.num_rows() {
        let record: Vec<String> = head
            .columns()
            .iter()
            .map(|c| c.data.text_at(row).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(head.num_rows())
}
