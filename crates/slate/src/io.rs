// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::error::{DataError, DataResult, Result};
use crate::model::{ColumnRef, Dataset, Record, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Builds the `{columns, rows}` shape the pipeline consumes from CSV
/// input. Cells ingest as text (blank cells as [`Value::Empty`]); numeric
/// promotion is deliberately deferred to projection time.
#[derive(Debug, Clone)]
pub struct CsvIngestor {
    has_headers: bool,
    delimiter: u8,
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self {
            has_headers: true,
            delimiter: b',',
        }
    }
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn read_file<P: AsRef<Path>>(&self, path: P, dataset_name: &str) -> Result<Dataset> {
        let file = File::open(path.as_ref())?;
        Ok(self.read_from(file, dataset_name)?)
    }

    pub fn read_str(&self, content: &str, dataset_name: &str) -> DataResult<Dataset> {
        self.read_from(content.as_bytes(), dataset_name)
    }

    fn read_from<R: Read>(&self, input: R, dataset_name: &str) -> DataResult<Dataset> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(input);
        let mut columns: Vec<String> = if self.has_headers {
            reader
                .headers()
                .map_err(|e| DataError::CsvParse(e.to_string()))?
                .iter()
                .map(|h| h.trim().to_string())
                .collect()
        } else {
            Vec::new()
        };
        let mut rows: Vec<Record> = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| DataError::CsvParse(e.to_string()))?;
            if columns.is_empty() {
                columns = (0..record.len()).map(|i| format!("column_{i}")).collect();
            }
            let mut row = Record::new();
            for (column, field) in columns.iter().zip(record.iter()) {
                row.insert(column.clone(), Value::from(field.trim().to_string()));
            }
            rows.push(row);
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(DataError::DuplicateHeader {
                    name: column.clone(),
                });
            }
        }
        debug!(
            name = dataset_name,
            columns = columns.len(),
            rows = rows.len(),
            "ingested CSV"
        );
        Ok(Dataset::new(
            dataset_name,
            columns.into_iter().map(ColumnRef::Name).collect(),
            rows,
        ))
    }
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_headers_and_rows_in_order() {
        let csv = "region,sales\neast,10\nwest,20\n";
        let ds = CsvIngestor::new().read_str(csv, "sales").unwrap();
        assert_eq!(
            ds.column_names().collect::<Vec<_>>(),
            vec!["region", "sales"]
        );
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.cell(0, "region"), &Value::Text("east".into()));
        assert_eq!(ds.cell(1, "sales"), &Value::Text("20".into()));
        assert!(ds.validate().is_ok());
    }

    #[test]
    fn blank_cells_ingest_as_empty() {
        let csv = "a,b\n1,\n,2\n";
        let ds = CsvIngestor::new().read_str(csv, "t").unwrap();
        assert_eq!(ds.cell(0, "b"), &Value::Empty);
        assert_eq!(ds.cell(1, "a"), &Value::Empty);
    }

    #[test]
    fn numbers_stay_text_until_projection() {
        let csv = "a\n42\n";
        let ds = CsvIngestor::new().read_str(csv, "t").unwrap();
        assert_eq!(ds.cell(0, "a"), &Value::Text("42".into()));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let csv = "a,a\n1,2\n";
        let err = CsvIngestor::new().read_str(csv, "t").unwrap_err();
        assert!(matches!(err, DataError::DuplicateHeader { .. }));
    }

    #[test]
    fn headerless_input_synthesises_column_names() {
        let csv = "1,2\n3,4\n";
        let ds = CsvIngestor::new()
            .with_headers(false)
            .read_str(csv, "t")
            .unwrap();
        assert_eq!(
            ds.column_names().collect::<Vec<_>>(),
            vec!["column_0", "column_1"]
        );
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn ragged_rows_read_missing_cells_as_empty() {
        let csv = "a,b,c\n1,2\n";
        let ds = CsvIngestor::new().read_str(csv, "t").unwrap();
        assert_eq!(ds.cell(0, "c"), &Value::Empty);
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "1,2").unwrap();
        let ds = CsvIngestor::new().read_file(file.path(), "disk").unwrap();
        assert_eq!(ds.row_count(), 1);
        assert_eq!(ds.name, "disk");
    }
}
