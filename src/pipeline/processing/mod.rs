// Pipeline processing: table model, silver normalization and gold aggregation

pub mod aggregate;
pub mod normalize;
pub mod table;

pub use aggregate::{aggregate, DimensionColumns, GoldTables, KeyValue};
pub use normalize::{build_silver_table, normalize_column_name};
pub use table::{Column, ColumnData, Table};
