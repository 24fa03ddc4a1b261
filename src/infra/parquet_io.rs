use crate::common::error::{PipelineError, Result};
use crate::pipeline::processing::table::{Column, ColumnData, Table};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const ZSTD_LEVEL: i32 = 3;

fn writer_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(ZSTD_LEVEL)?))
        .build())
}

fn to_arrow(data: &ColumnData) -> (DataType, ArrayRef) {
    match data {
        ColumnData::Int64(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone())) as ArrayRef),
        ColumnData::Float64(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone())) as ArrayRef),
        ColumnData::Utf8(v) => (
            DataType::Utf8,
            Arc::new(v.iter().map(|s| s.as_deref()).collect::<StringArray>()) as ArrayRef,
        ),
    }
}

/// Write `table` as a single-row-group parquet file, replacing any existing file.
/// All fields are nullable.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays = Vec::with_capacity(table.num_columns());
    for column in table.columns() {
        let (data_type, array) = to_arrow(&column.data);
        fields.push(Field::new(column.name.as_str(), data_type, true));
        arrays.push(array);
    }
    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_properties()?))?;
    writer.write(&batch)?;
    writer.close()?;

    debug!(
        "Wrote {} rows x {} columns to {}",
        table.num_rows(),
        table.num_columns(),
        path.display()
    );
    Ok(())
}

/// Read a parquet file back into a [`Table`].
///
/// Integer columns come back as Int64, floating point as Float64 and
/// everything else is cast to text.
pub fn read_table(path: &Path) -> Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|field| Column::new(field.name().clone(), empty_like(field.data_type())))
        .collect();

    let mut num_rows = 0;
    for batch in reader {
        let batch = batch?;
        num_rows += batch.num_rows();
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            append(&mut column.data, array)?;
        }
    }

    Table::from_columns(num_rows, columns)
}

fn empty_like(data_type: &DataType) -> ColumnData {
    if data_type.is_integer() {
        ColumnData::Int64(Vec::new())
    } else if data_type.is_floating() {
        ColumnData::Float64(Vec::new())
    } else {
        ColumnData::Utf8(Vec::new())
    }
}

fn append(target: &mut ColumnData, array: &ArrayRef) -> Result<()> {
    match target {
        ColumnData::Int64(values) => {
            let cast_array = cast(array, &DataType::Int64)?;
            let ints = downcast::<Int64Array>(&cast_array)?;
            values.extend(ints.iter());
        }
        ColumnData::Float64(values) => {
            let cast_array = cast(array, &DataType::Float64)?;
            let floats = downcast::<Float64Array>(&cast_array)?;
            values.extend(floats.iter());
        }
        ColumnData::Utf8(values) => {
            let cast_array = cast(array, &DataType::Utf8)?;
            let strings = downcast::<StringArray>(&cast_array)?;
            values.extend(strings.iter().map(|s| s.map(str::to_string)));
        }
    }
    Ok(())
}

fn downcast<T: Array + 'static>(array: &ArrayRef) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        PipelineError::InvalidPayload(format!(
            "unexpected parquet column type {}",
            array.data_type()
        ))
    })
}
