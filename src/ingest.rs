//! CSV ingestion into a [`Table`]

use crate::error::{AutoMLError, Result};
use crate::table::{Column, Table, Value};
use polars::prelude::{CsvParseOptions, CsvReadOptions, DataFrame, DataType, SerReader, Series};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// What was read, for reporting alongside the profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: String,
    pub size_bytes: u64,
    pub n_rows: usize,
    pub n_cols: usize,
    /// Column name and the dtype polars inferred for it
    pub columns: Vec<(String, String)>,
}

/// Reads delimited files with polars and converts them cell by cell
#[derive(Debug, Clone)]
pub struct CsvIngestor {
    delimiter: u8,
    has_header: bool,
    infer_schema_length: usize,
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            infer_schema_length: 100,
        }
    }
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load `path`; `.tsv` files switch to tab separation
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(Table, FileMetadata)> {
        let path = path.as_ref();
        let size_bytes = std::fs::metadata(path)?.len();
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => self.delimiter,
        };

        let file = File::open(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(self.has_header)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(CsvParseOptions::default().with_separator(delimiter))
            .into_reader_with_file_handle(file)
            .finish()?;

        let table = Self::from_dataframe(&df)?;
        let metadata = FileMetadata {
            path: path.display().to_string(),
            size_bytes,
            n_rows: df.height(),
            n_cols: df.width(),
            columns: df
                .get_columns()
                .iter()
                .map(|c| (c.name().to_string(), c.dtype().to_string()))
                .collect(),
        };
        info!(
            path = %metadata.path,
            rows = metadata.n_rows,
            cols = metadata.n_cols,
            "CSV ingested"
        );
        Ok((table, metadata))
    }

    /// Numbers become `Number`, booleans `Bool`, nulls `Missing`, anything else `Text`
    pub fn from_dataframe(df: &DataFrame) -> Result<Table> {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| convert_series(c.as_materialized_series()))
            .collect::<Result<Vec<_>>>()?;
        Table::new(columns)
    }
}

fn convert_series(series: &Series) -> Result<Column> {
    let name = series.name().to_string();
    let dtype = series.dtype();
    let values: Vec<Value> = match dtype {
        DataType::Null => vec![Value::Missing; series.len()],
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Bool))
            .collect(),
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, |s| Value::Text(s.to_string())))
            .collect(),
        dt if dt.is_primitive_numeric() => {
            let cast = series.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map_or(Value::Missing, Value::Number))
                .collect()
        }
        // Dates and other logical types keep their textual rendering
        _ => {
            let cast = series.cast(&DataType::String).map_err(|e| {
                AutoMLError::IngestionError(format!(
                    "column '{}' of type {} is not readable: {}",
                    name, dtype, e
                ))
            })?;
            cast.str()?
                .into_iter()
                .map(|v| v.map_or(Value::Missing, |s| Value::Text(s.to_string())))
                .collect()
        }
    };
    Ok(Column::new(name, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "customers.csv",
            "age,plan,active\n31,pro,true\n,basic,false\n45,pro,true\n",
        );
        let (table, meta) = CsvIngestor::new().load(&path).unwrap();

        assert_eq!(meta.n_rows, 3);
        assert_eq!(meta.n_cols, 3);
        assert_eq!(table.column_names(), vec!["age", "plan", "active"]);

        let age = table.column("age").unwrap();
        assert_eq!(age.values()[0], Value::Number(31.0));
        assert!(age.values()[1].is_missing());
        assert_eq!(table.column("plan").unwrap().values()[1], Value::Text("basic".into()));
        assert_eq!(table.column("active").unwrap().values()[2], Value::Bool(true));
    }

    #[test]
    fn test_tsv_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "scores.tsv", "x\ty\n1\t2\n3\t4\n");
        let (table, _) = CsvIngestor::new().load(&path).unwrap();
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.column("y").unwrap().values()[1], Value::Number(4.0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvIngestor::new().load("/nonexistent/data.csv").unwrap_err();
        assert!(matches!(err, AutoMLError::IoError(_)));
    }
}
