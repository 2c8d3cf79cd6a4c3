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

use crate::aggregation::{aggregate, coerce_numeric, output_column, AggregateMode, UNKNOWN_KEY};
use crate::chart_schema::{ChartKind, Role};
use crate::mapping_resolver::ColumnMapping;
use crate::model::{AggregationConfig, Dataset, Record, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Charts on the unaggregated path show at most this many rows; the table
/// path never truncates (its consumer paginates for display).
pub const PASSTHROUGH_ROW_LIMIT: usize = 10;

pub const NAME_FIELD: &str = "name";
pub const VALUE_FIELD: &str = "value";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// The exact tabular shape the presentation layer consumes: `{name,
/// value}` (or `value_<mode>`) records for charts, a column-filtered row
/// list for tables. An empty result is the "configure columns first"
/// sentinel, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartData {
    Series(Vec<Record>),
    Table(TableData),
}

impl ChartData {
    pub fn empty(kind: ChartKind) -> Self {
        match kind {
            ChartKind::Table => Self::Table(TableData::default()),
            _ => Self::Series(Vec::new()),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
    pub fn row_count(&self) -> usize {
        match self {
            Self::Series(rows) => rows.len(),
            Self::Table(table) => table.rows.len(),
        }
    }
    pub fn rows(&self) -> &[Record] {
        match self {
            Self::Series(rows) => rows,
            Self::Table(table) => &table.rows,
        }
    }
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Numeric value of a series record: the renamed `value_<mode>` column is
/// probed first, then the plain `value` column.
pub fn series_value(record: &Record) -> Option<f64> {
    let renamed = record
        .iter()
        .find(|(key, _)| key.starts_with("value_"))
        .map(|(_, v)| v);
    renamed
        .or_else(|| record.get(VALUE_FIELD))
        .map(coerce_numeric)
}

/// Transform resolved rows into the shape `kind` expects, honouring the
/// column mapping and the configured aggregation.
pub fn project(
    dataset: &Dataset,
    mapping: &ColumnMapping,
    kind: ChartKind,
    aggregation: &AggregationConfig,
) -> ChartData {
    let promoted = promote_rows(dataset);
    match kind {
        ChartKind::Pie => project_series(&promoted, mapping, Role::Label, aggregation, kind),
        ChartKind::Bar | ChartKind::Line => {
            project_series(&promoted, mapping, Role::Category, aggregation, kind)
        }
        ChartKind::Table => project_table(&promoted, mapping),
    }
}

/// The promotion pass every path shares: text cells that parse wholly as a
/// finite number become numbers, everything else is carried unchanged.
/// Cells missing from a record materialise as [`Value::Empty`].
fn promote_rows(dataset: &Dataset) -> Vec<Record> {
    dataset
        .rows
        .iter()
        .map(|row| {
            dataset
                .column_names()
                .map(|col| {
                    let cell = row.get(col).cloned().unwrap_or(Value::Empty);
                    let promoted = if matches!(cell, Value::Text(_)) {
                        cell.as_f64().map(Value::Number).unwrap_or(cell)
                    } else {
                        cell
                    };
                    (col.to_string(), promoted)
                })
                .collect()
        })
        .collect()
}

fn project_series(
    rows: &[Record],
    mapping: &ColumnMapping,
    key_role: Role,
    aggregation: &AggregationConfig,
    kind: ChartKind,
) -> ChartData {
    let (Some(key_column), Some(value_column)) =
        (mapping.column(key_role), mapping.column(Role::Value))
    else {
        debug!(%kind, "required role unmapped, returning empty chart data");
        return ChartData::empty(kind);
    };
    let mode = aggregation.value_mode();
    if mode.is_none() {
        let points = rows
            .iter()
            .take(PASSTHROUGH_ROW_LIMIT)
            .map(|row| {
                let name = match row.get(key_column) {
                    Some(value) if !value.is_empty() => value.clone(),
                    _ => Value::Text(UNKNOWN_KEY.to_string()),
                };
                let value = coerce_numeric(row.get(value_column).unwrap_or(&Value::Empty));
                let mut point = Record::new();
                point.insert(NAME_FIELD.to_string(), name);
                point.insert(VALUE_FIELD.to_string(), Value::Number(value));
                point
            })
            .collect();
        return ChartData::Series(points);
    }
    let grouped = aggregate(rows, key_column, value_column, mode);
    let aggregated_column = output_column(value_column, mode);
    let value_field = output_column(VALUE_FIELD, mode);
    let points = grouped
        .into_iter()
        .map(|mut record| {
            let name = record
                .shift_remove(key_column)
                .unwrap_or(Value::Text(UNKNOWN_KEY.to_string()));
            let value = record
                .shift_remove(&aggregated_column)
                .unwrap_or(Value::Number(0.0));
            let mut point = Record::new();
            point.insert(NAME_FIELD.to_string(), name);
            point.insert(value_field.clone(), value);
            point
        })
        .collect();
    ChartData::Series(points)
}

fn project_table(rows: &[Record], mapping: &ColumnMapping) -> ChartData {
    let Some(columns) = mapping.columns(Role::Columns) else {
        return ChartData::empty(ChartKind::Table);
    };
    let projected = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    (
                        (*col).to_string(),
                        row.get(*col).cloned().unwrap_or(Value::Empty),
                    )
                })
                .collect()
        })
        .collect();
    ChartData::Table(TableData {
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
        rows: projected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnRef;

    fn dataset(columns: &[&str], rows: Vec<Vec<&str>>) -> Dataset {
        let records = rows
            .into_iter()
            .map(|cells| {
                columns
                    .iter()
                    .zip(cells)
                    .map(|(col, cell)| ((*col).to_string(), Value::from(cell)))
                    .collect::<Record>()
            })
            .collect();
        Dataset::new(
            "test",
            columns.iter().map(|c| ColumnRef::from(*c)).collect(),
            records,
        )
    }

    fn bar_mapping() -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        mapping.bind(Role::Category, "region");
        mapping.bind(Role::Value, "sales");
        mapping
    }

    #[test]
    fn none_path_truncates_to_first_ten_rows() {
        let rows: Vec<Vec<&str>> = (0..15).map(|_| vec!["east", "10"]).collect();
        let ds = dataset(&["region", "sales"], rows);
        let data = project(
            &ds,
            &bar_mapping(),
            ChartKind::Bar,
            &AggregationConfig::default(),
        );
        assert_eq!(data.row_count(), PASSTHROUGH_ROW_LIMIT);
        let first = &data.rows()[0];
        assert_eq!(first.get(NAME_FIELD), Some(&Value::Text("east".into())));
        assert_eq!(first.get(VALUE_FIELD), Some(&Value::Number(10.0)));
    }

    #[test]
    fn aggregated_path_renames_value_field() {
        let ds = dataset(
            &["region", "sales"],
            vec![vec!["east", "10"], vec!["east", "20"], vec!["west", "5"]],
        );
        let data = project(
            &ds,
            &bar_mapping(),
            ChartKind::Bar,
            &AggregationConfig::with_value_mode(AggregateMode::Sum),
        );
        let rows = data.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(NAME_FIELD), Some(&Value::Text("east".into())));
        assert_eq!(rows[0].get("value_sum"), Some(&Value::Number(30.0)));
        assert!(rows[0].get(VALUE_FIELD).is_none());
        assert_eq!(series_value(&rows[0]), Some(30.0));
    }

    #[test]
    fn pie_uses_label_role() {
        let ds = dataset(
            &["segment", "share"],
            vec![vec!["retail", "60"], vec!["b2b", "40"]],
        );
        let mut mapping = ColumnMapping::default();
        mapping.bind(Role::Label, "segment");
        mapping.bind(Role::Value, "share");
        let data = project(&ds, &mapping, ChartKind::Pie, &AggregationConfig::default());
        assert_eq!(data.row_count(), 2);
        assert_eq!(
            data.rows()[0].get(NAME_FIELD),
            Some(&Value::Text("retail".into()))
        );
    }

    #[test]
    fn missing_required_role_short_circuits_empty() {
        let ds = dataset(&["region", "sales"], vec![vec!["east", "10"]]);
        let mut mapping = ColumnMapping::default();
        mapping.bind(Role::Value, "sales");
        let data = project(&ds, &mapping, ChartKind::Bar, &AggregationConfig::default());
        assert!(data.is_empty());
    }

    #[test]
    fn table_projects_all_rows_with_selected_columns_only() {
        let rows: Vec<Vec<&str>> = (0..500)
            .map(|_| vec!["x", "y", "z"])
            .collect();
        let ds = dataset(&["A", "B", "C"], rows);
        let mut mapping = ColumnMapping::default();
        mapping.bind_columns(Role::Columns, vec!["A".into(), "B".into()]);
        let data = project(
            &ds,
            &mapping,
            ChartKind::Table,
            &AggregationConfig::default(),
        );
        assert_eq!(data.row_count(), 500);
        let ChartData::Table(table) = &data else {
            panic!("expected table data");
        };
        assert_eq!(table.columns, vec!["A".to_string(), "B".to_string()]);
        for row in &table.rows {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        }
    }

    #[test]
    fn table_without_columns_is_empty_not_error() {
        let ds = dataset(&["A"], vec![vec!["x"]]);
        let data = project(
            &ds,
            &ColumnMapping::default(),
            ChartKind::Table,
            &AggregationConfig::default(),
        );
        assert!(data.is_empty());
    }

    #[test]
    fn unparseable_chart_values_coerce_to_zero() {
        let ds = dataset(&["region", "sales"], vec![vec!["east", "abc"]]);
        let data = project(
            &ds,
            &bar_mapping(),
            ChartKind::Bar,
            &AggregationConfig::default(),
        );
        assert_eq!(data.rows()[0].get(VALUE_FIELD), Some(&Value::Number(0.0)));
    }

    #[test]
    fn empty_label_falls_back_to_unknown() {
        let ds = dataset(&["region", "sales"], vec![vec!["", "10"]]);
        let data = project(
            &ds,
            &bar_mapping(),
            ChartKind::Bar,
            &AggregationConfig::default(),
        );
        assert_eq!(
            data.rows()[0].get(NAME_FIELD),
            Some(&Value::Text(UNKNOWN_KEY.into()))
        );
    }

    #[test]
    fn numeric_category_survives_aggregation_as_key_string() {
        let ds = dataset(
            &["year", "sales"],
            vec![vec!["2023", "10"], vec!["2023", "20"], vec!["2024", "5"]],
        );
        let mut mapping = ColumnMapping::default();
        mapping.bind(Role::Category, "year");
        mapping.bind(Role::Value, "sales");
        let data = project(
            &ds,
            &mapping,
            ChartKind::Line,
            &AggregationConfig::with_value_mode(AggregateMode::Avg),
        );
        assert_eq!(data.rows()[0].get(NAME_FIELD), Some(&Value::Text("2023".into())));
        assert_eq!(data.rows()[0].get("value_avg"), Some(&Value::Number(15.0)));
    }
}
