//! Parse CSV bytes into an all-text Arrow table.

use std::{collections::HashSet, io::Cursor, sync::Arc};

use arrow::{
    array::{Array, AsArray, StringArray},
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use thiserror::Error;

/// Reasons a CSV object cannot be used.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("file contains no data")]
    EmptyData,
    #[error("malformed csv: {0}")]
    Malformed(#[from] ArrowError),
    #[error("missing column `{0}`")]
    MissingColumn(String),
}

/// A CSV file held as one record batch of nullable text columns.
///
/// Header names are trimmed. Cells are trimmed on access and blank cells read as missing.
#[derive(Debug, Clone)]
pub struct CsvTable {
    batch: RecordBatch,
}

impl CsvTable {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TableError> {
        let (inferred, _) = Format::default()
            .with_header(true)
            .infer_schema(Cursor::new(bytes), Some(0))?;

        if inferred.fields().iter().all(|f| f.name().trim().is_empty()) {
            return Err(TableError::EmptyData);
        }

        let schema = Arc::new(Schema::new(
            inferred
                .fields()
                .iter()
                .map(|f| Field::new(f.name().trim(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));

        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .build(Cursor::new(bytes))?;
        let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
        let batch = concat_batches(&schema, &batches)?;

        if batch.num_rows() == 0 {
            return Err(TableError::EmptyData);
        }

        Ok(CsvTable { batch })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn column(&self, name: &str) -> Result<&StringArray, TableError> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_string_opt::<i32>())
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Trimmed cell values of a column, `None` where the cell is blank.
    pub fn values<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = Option<&'a str>> + 'a, TableError> {
        let column = self.column(name)?;
        Ok(column.iter().map(|v| v.map(str::trim).filter(|v| !v.is_empty())))
    }

    pub fn value(&self, name: &str, row: usize) -> Result<Option<&str>, TableError> {
        let column = self.column(name)?;
        if row >= column.len() || column.is_null(row) {
            return Ok(None);
        }
        let value = column.value(row).trim();
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    /// Number of distinct values in a column. A blank cell counts as one value of its own.
    pub fn distinct_count(&self, name: &str) -> Result<usize, TableError> {
        Ok(self.values(name)?.collect::<HashSet<_>>().len())
    }

    pub fn has_missing(&self, name: &str) -> Result<bool, TableError> {
        Ok(self.values(name)?.any(|v| v.is_none()))
    }

    pub fn first_value(&self, name: &str) -> Result<Option<&str>, TableError> {
        Ok(self.values(name)?.flatten().next())
    }

    /// Numeric values of a column, skipping blanks, unparsable cells and the sentinel.
    pub fn numbers(&self, name: &str, sentinel: Option<f64>) -> Result<Vec<f64>, TableError> {
        Ok(self
            .values(name)?
            .flatten()
            .filter_map(|v| parse_and_filter_f64(v, sentinel))
            .collect())
    }

    pub fn mean(&self, name: &str, sentinel: Option<f64>) -> Result<Option<f64>, TableError> {
        let numbers = self.numbers(name, sentinel)?;
        if numbers.is_empty() {
            return Ok(None);
        }
        Ok(Some(numbers.iter().sum::<f64>() / numbers.len() as f64))
    }
}

pub fn parse_and_filter_f64(s: &str, sentinel: Option<f64>) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .filter(|&v| sentinel.map_or(true, |s| (v - s).abs() > 1e-9))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::reading::fixtures;

    #[test]
    fn should_read_all_rows_with_trimmed_headers() {
        let csv = " STATION , TEMP \n\"A\",\" 1.5\"\n\"A\",\"2.5 \"\n";
        let table = CsvTable::from_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.value("STATION", 1).unwrap(), Some("A"));
        assert_eq!(table.value("TEMP", 0).unwrap(), Some("1.5"));
        assert_eq!(table.mean("TEMP", None).unwrap(), Some(2.0));
    }

    #[test]
    fn should_keep_quoted_commas_in_one_cell() {
        let table = CsvTable::from_bytes(fixtures::good_site().as_bytes()).unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(
            table.first_value("NAME").unwrap(),
            Some("JAN MAYEN NOR NAVY, NO")
        );
    }

    #[test]
    fn should_report_empty_data() {
        assert!(matches!(CsvTable::from_bytes(b""), Err(TableError::EmptyData)));
        assert!(matches!(
            CsvTable::from_bytes(b"STATION,TEMP\n"),
            Err(TableError::EmptyData)
        ));
    }

    #[test]
    fn should_report_ragged_rows_as_malformed() {
        let csv = "STATION,TEMP\nA,1.0\nA,2.0,3.0\n";
        assert!(matches!(
            CsvTable::from_bytes(csv.as_bytes()),
            Err(TableError::Malformed(_))
        ));
    }

    #[test]
    fn should_report_missing_column() {
        let table = CsvTable::from_bytes(b"STATION\nA\n").unwrap();
        match table.distinct_count("LATITUDE") {
            Err(TableError::MissingColumn(name)) => assert_eq!(name, "LATITUDE"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn should_count_blank_as_its_own_value() {
        let csv = "STATION,LATITUDE\nA,1.0\nA,\nA,1.0\nA,\"  \"\n";
        let table = CsvTable::from_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.distinct_count("LATITUDE").unwrap(), 2);
        assert!(table.has_missing("LATITUDE").unwrap());
    }

    #[test]
    fn should_filter_sentinel() {
        assert_eq!(parse_and_filter_f64(" 9999.9", Some(9999.9)), None);
        assert_eq!(parse_and_filter_f64("  28.1 ", Some(9999.9)), Some(28.1));
        assert_eq!(parse_and_filter_f64("abc", None), None);
    }
}
