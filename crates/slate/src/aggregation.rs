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

use crate::model::{Record, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNKNOWN_KEY: &str = "Unknown";

/// Reduction applied within a group. `None` on a grouped path means the
/// per-group mean; the pure passthrough reading of `None` (no grouping at
/// all) lives in the projector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMode {
    #[default]
    None,
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for AggregateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Numeric coercion shared by every aggregation and projection path:
/// unparseable and empty values become 0.0. Lossy on purpose — the host
/// cannot distinguish "missing" from "legitimately zero" and downstream
/// consumers rely on never seeing NaN.
pub fn coerce_numeric(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// Output column name for an aggregated value. The column is renamed to
/// `<column>_<mode>` whenever a real reduction ran, so consumers probe the
/// renamed column first and fall back to the original name.
pub fn output_column(value_column: &str, mode: AggregateMode) -> String {
    if mode.is_none() {
        value_column.to_string()
    } else {
        format!("{value_column}_{mode}")
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupAccumulator {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl GroupAccumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
    fn mean(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }
    fn reduce(&self, mode: AggregateMode) -> f64 {
        match mode {
            AggregateMode::Sum => self.sum,
            AggregateMode::Avg | AggregateMode::None => self.mean(),
            AggregateMode::Count => self.count as f64,
            AggregateMode::Min => {
                if self.count > 0 {
                    self.min
                } else {
                    0.0
                }
            }
            AggregateMode::Max => {
                if self.count > 0 {
                    self.max
                } else {
                    0.0
                }
            }
        }
    }
}

/// Group `rows` by `key_column` and reduce `value_column` with `mode`,
/// producing one output row per distinct key.
///
/// Single pass with running per-group state. Missing or empty keys group
/// under `"Unknown"`; values go through [`coerce_numeric`]. Output order is
/// first-seen key order, exactly — golden-output tests depend on it.
pub fn aggregate(
    rows: &[Record],
    key_column: &str,
    value_column: &str,
    mode: AggregateMode,
) -> Vec<Record> {
    if rows.is_empty() {
        return Vec::new();
    }
    let mut groups: IndexMap<String, GroupAccumulator> = IndexMap::new();
    for row in rows {
        let key = match row.get(key_column) {
            Some(value) if !value.is_empty() => value.key_string(),
            _ => UNKNOWN_KEY.to_string(),
        };
        let value = coerce_numeric(row.get(value_column).unwrap_or(&Value::Empty));
        groups.entry(key).or_insert_with(GroupAccumulator::new).push(value);
    }
    let out_column = output_column(value_column, mode);
    groups
        .into_iter()
        .map(|(key, acc)| {
            let mut record = Record::new();
            record.insert(key_column.to_string(), Value::Text(key));
            record.insert(out_column.clone(), Value::Number(acc.reduce(mode)));
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(key: &str, value: impl Into<Value>) -> Record {
        let mut record = Record::new();
        record.insert("K".to_string(), key.into());
        record.insert("V".to_string(), value.into());
        record
    }

    fn rows() -> Vec<Record> {
        vec![row("a", 10.0), row("a", 20.0), row("b", 5.0)]
    }

    #[test]
    fn sum_groups_in_first_seen_order() {
        let result = aggregate(&rows(), "K", "V", AggregateMode::Sum);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].get("K"), Some(&Value::Text("a".into())));
        assert_eq!(result[0].get("V_sum"), Some(&Value::Number(30.0)));
        assert_eq!(result[1].get("K"), Some(&Value::Text("b".into())));
        assert_eq!(result[1].get("V_sum"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn avg_divides_by_group_count() {
        let result = aggregate(&rows(), "K", "V", AggregateMode::Avg);
        assert_eq!(result[0].get("V_avg"), Some(&Value::Number(15.0)));
        assert_eq!(result[1].get("V_avg"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn count_includes_coerced_zeros() {
        let mut input = rows();
        input.push(row("a", "not-a-number"));
        let result = aggregate(&input, "K", "V", AggregateMode::Count);
        assert_eq!(result[0].get("V_count"), Some(&Value::Number(3.0)));
        assert_eq!(result[1].get("V_count"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn min_max_over_coerced_values() {
        let result = aggregate(&rows(), "K", "V", AggregateMode::Min);
        assert_eq!(result[0].get("V_min"), Some(&Value::Number(10.0)));
        let result = aggregate(&rows(), "K", "V", AggregateMode::Max);
        assert_eq!(result[0].get("V_max"), Some(&Value::Number(20.0)));
    }

    #[test]
    fn unparseable_values_contribute_zero_not_nan() {
        let input = vec![row("a", "abc"), row("a", 10.0)];
        let result = aggregate(&input, "K", "V", AggregateMode::Sum);
        assert_eq!(result[0].get("V_sum"), Some(&Value::Number(10.0)));
        let result = aggregate(&input, "K", "V", AggregateMode::Avg);
        assert_eq!(result[0].get("V_avg"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn missing_key_groups_under_unknown() {
        let mut keyless = Record::new();
        keyless.insert("V".to_string(), Value::Number(7.0));
        let input = vec![keyless];
        let result = aggregate(&input, "K", "V", AggregateMode::Sum);
        assert_eq!(result[0].get("K"), Some(&Value::Text(UNKNOWN_KEY.into())));
        assert_eq!(result[0].get("V_sum"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn none_mode_keeps_original_column_name() {
        let result = aggregate(&rows(), "K", "V", AggregateMode::None);
        assert_eq!(result[0].get("V"), Some(&Value::Number(15.0)));
        assert!(result[0].get("V_none").is_none());
    }

    #[test]
    fn empty_rows_yield_empty_output() {
        assert!(aggregate(&[], "K", "V", AggregateMode::Sum).is_empty());
    }

    proptest! {
        // Grouped "none" is defined as the per-group mean; this pins the
        // documented semantic so it cannot drift.
        #[test]
        fn grouped_none_equals_avg(values in proptest::collection::vec((0u8..4, -1000.0f64..1000.0), 0..64)) {
            let input: Vec<Record> = values
                .iter()
                .map(|(k, v)| row(&format!("k{k}"), *v))
                .collect();
            let none = aggregate(&input, "K", "V", AggregateMode::None);
            let avg = aggregate(&input, "K", "V", AggregateMode::Avg);
            prop_assert_eq!(none.len(), avg.len());
            for (n, a) in none.iter().zip(avg.iter()) {
                prop_assert_eq!(n.get("K"), a.get("K"));
                prop_assert_eq!(n.get("V"), a.get("V_avg"));
            }
        }

        #[test]
        fn aggregation_is_deterministic(values in proptest::collection::vec((0u8..6, -100.0f64..100.0), 0..48)) {
            let input: Vec<Record> = values
                .iter()
                .map(|(k, v)| row(&format!("k{k}"), *v))
                .collect();
            let first = aggregate(&input, "K", "V", AggregateMode::Sum);
            let second = aggregate(&input, "K", "V", AggregateMode::Sum);
            prop_assert_eq!(first, second);
        }
    }
}
