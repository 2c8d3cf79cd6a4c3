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

use crate::chart_schema::{ChartKind, Role};
use crate::model::{Dataset, Value};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal date shapes the inference accepts. Strict full-string matches;
/// the two loose forms cover single-digit day/month and two-digit years.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{4}-\d{2}-\d{2}$",
        r"^\d{2}/\d{2}/\d{4}$",
        r"^\d{2}-\d{2}-\d{4}$",
        r"^\d{4}/\d{2}/\d{2}$",
        r"^\d{1,2}/\d{1,2}/\d{2,4}$",
        r"^\d{1,2}-\d{1,2}-\d{2,4}$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("date pattern is a valid regex"))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum InferredType {
    Numeric,
    Date,
    Categorical,
    Unknown,
}

impl InferredType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric)
    }
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date)
    }
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical)
    }
}

#[derive(Debug, Clone)]
pub struct ProfilingConfig {
    pub max_sample_values: usize,
    pub date_threshold: f64,
    pub numeric_threshold: f64,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            max_sample_values: 100,
            date_threshold: 0.6,
            numeric_threshold: 0.7,
        }
    }
}

impl ProfilingConfig {
    pub fn for_large_datasets() -> Self {
        Self {
            max_sample_values: 50,
            ..Default::default()
        }
    }
    /// The lenient variant used where a rough split is enough.
    pub fn lenient() -> Self {
        Self {
            numeric_threshold: 0.6,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: InferredType,
    pub total_count: usize,
    pub non_empty_count: usize,
    pub distinct_count: usize,
    pub sample_values: Vec<String>,
    pub numeric_stats: Option<NumericStats>,
}

impl ColumnProfile {
    /// Roles a column of this type is a sensible candidate for, in the
    /// order an editor should offer them.
    pub fn suggested_roles(&self) -> Vec<Role> {
        match self.inferred_type {
            InferredType::Numeric => vec![Role::Value, Role::Columns],
            InferredType::Date => vec![Role::Category, Role::Columns],
            InferredType::Categorical => {
                vec![Role::Category, Role::Label, Role::Series, Role::Group, Role::Columns]
            }
            InferredType::Unknown => vec![Role::Columns],
        }
    }
}

impl fmt::Display for ColumnProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {} distinct / {} rows)",
            self.name, self.inferred_type, self.distinct_count, self.total_count
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_columns: usize,
    pub numeric_count: usize,
    pub date_count: usize,
    pub categorical_count: usize,
    pub unknown_count: usize,
}

impl DatasetSummary {
    /// Chart kinds the column mix can feed, most specific first.
    pub fn recommended_chart_kinds(&self) -> Vec<ChartKind> {
        let mut kinds = Vec::new();
        if self.date_count >= 1 && self.numeric_count >= 1 {
            kinds.push(ChartKind::Line);
        }
        if self.categorical_count >= 1 && self.numeric_count >= 1 {
            kinds.push(ChartKind::Bar);
            kinds.push(ChartKind::Pie);
        }
        if self.total_columns >= 1 {
            kinds.push(ChartKind::Table);
        }
        kinds
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} columns ({} numeric, {} date, {} categorical, {} unknown)",
            self.total_columns,
            self.numeric_count,
            self.date_count,
            self.categorical_count,
            self.unknown_count
        )
    }
}

/// Classifies columns from a bounded sample of their values. Pure: two
/// profiles of the same data are always identical, so nothing here is
/// worth persisting.
#[derive(Debug, Clone, Default)]
pub struct ColumnProfiler {
    config: ProfilingConfig,
}

impl ColumnProfiler {
    pub fn new() -> Self {
        Self {
            config: ProfilingConfig::default(),
        }
    }
    pub fn with_config(config: ProfilingConfig) -> Self {
        Self { config }
    }

    /// Classify a column from a sample of its raw values.
    ///
    /// The first `max_sample_values` non-empty values form the sample. The
    /// date test runs before the numeric test so that date-shaped strings
    /// never classify as numbers.
    pub fn infer_type<'a, I>(&self, values: I) -> InferredType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let sample: Vec<String> = values
            .into_iter()
            .filter(|v| !v.is_empty())
            .take(self.config.max_sample_values)
            .map(Value::key_string)
            .collect();
        if sample.is_empty() {
            return InferredType::Unknown;
        }
        let total = sample.len() as f64;
        let date_count = sample
            .iter()
            .filter(|s| DATE_PATTERNS.iter().any(|p| p.is_match(s)))
            .count();
        if date_count as f64 / total >= self.config.date_threshold {
            return InferredType::Date;
        }
        let numeric_count = sample.iter().filter(|s| is_numeric_literal(s)).count();
        if numeric_count as f64 / total > self.config.numeric_threshold {
            return InferredType::Numeric;
        }
        InferredType::Categorical
    }

    pub fn profile_column(&self, dataset: &Dataset, column: &str) -> ColumnProfile {
        let inferred_type = self.infer_type(dataset.column_values(column));
        let non_empty_count = dataset
            .column_values(column)
            .filter(|v| !v.is_empty())
            .count();
        let distinct_count = dataset
            .column_values(column)
            .map(Value::key_string)
            .unique()
            .count();
        let sample_values: Vec<String> = dataset
            .column_values(column)
            .filter(|v| !v.is_empty())
            .map(Value::key_string)
            .unique()
            .take(self.config.max_sample_values.min(20))
            .collect();
        let numeric_stats = if inferred_type.is_numeric() {
            numeric_stats(dataset, column)
        } else {
            None
        };
        ColumnProfile {
            name: column.to_string(),
            inferred_type,
            total_count: dataset.row_count(),
            non_empty_count,
            distinct_count,
            sample_values,
            numeric_stats,
        }
    }

    /// Profile every column of a dataset, fanning out across columns.
    pub fn profile_dataset(&self, dataset: &Dataset) -> Vec<ColumnProfile> {
        let names: Vec<&str> = dataset.column_names().collect();
        names
            .par_iter()
            .map(|name| self.profile_column(dataset, name))
            .collect()
    }

    pub fn summarize(&self, profiles: &[ColumnProfile]) -> DatasetSummary {
        let count_of = |t: InferredType| profiles.iter().filter(|p| p.inferred_type == t).count();
        DatasetSummary {
            total_columns: profiles.len(),
            numeric_count: count_of(InferredType::Numeric),
            date_count: count_of(InferredType::Date),
            categorical_count: count_of(InferredType::Categorical),
            unknown_count: count_of(InferredType::Unknown),
        }
    }

    pub fn export_profiles_json(&self, profiles: &[ColumnProfile]) -> serde_json::Result<String> {
        serde_json::to_string_pretty(profiles)
    }
}

/// The numeric test behind the inference threshold: no `-` or `/`
/// anywhere (those belong to dates), and the whole string must parse to a
/// finite number, which rules out partial parses like `"12abc"`.
fn is_numeric_literal(s: &str) -> bool {
    if s.contains('-') || s.contains('/') {
        return false;
    }
    s.parse::<f64>().map(|n| n.is_finite()).unwrap_or(false)
}

fn numeric_stats(dataset: &Dataset, column: &str) -> Option<NumericStats> {
    let values: Vec<f64> = dataset
        .column_values(column)
        .filter_map(Value::as_f64)
        .collect();
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(NumericStats {
        min,
        max,
        mean,
        count: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnRef, Record};
    use proptest::prelude::*;

    fn values(raw: &[&str]) -> Vec<Value> {
        raw.iter().map(|s| Value::from(*s)).collect()
    }

    fn dataset(column: &str, raw: &[&str]) -> Dataset {
        let rows = raw
            .iter()
            .map(|v| {
                let mut record = Record::new();
                record.insert(column.to_string(), Value::from(*v));
                record
            })
            .collect();
        Dataset::new("test", vec![ColumnRef::from(column)], rows)
    }

    #[test]
    fn empty_sample_is_unknown() {
        let profiler = ColumnProfiler::new();
        assert_eq!(profiler.infer_type(&values(&["", "", ""])), InferredType::Unknown);
        assert_eq!(
            profiler.infer_type(std::iter::empty::<&Value>()),
            InferredType::Unknown
        );
    }

    #[test]
    fn mostly_numbers_infer_numeric() {
        let profiler = ColumnProfiler::new();
        let sample = values(&["1", "2.5", "3", "4", "x"]);
        assert_eq!(profiler.infer_type(&sample), InferredType::Numeric);
    }

    #[test]
    fn date_check_precedes_numeric() {
        // 70% ISO dates, 30% pure numbers: must be a date column.
        let profiler = ColumnProfiler::new();
        let sample = values(&[
            "2024-01-01",
            "2024-01-02",
            "2024-01-03",
            "2024-01-04",
            "2024-01-05",
            "2024-01-06",
            "2024-01-07",
            "1",
            "2",
            "3",
        ]);
        assert_eq!(profiler.infer_type(&sample), InferredType::Date);
    }

    #[test]
    fn loose_date_forms_match() {
        let profiler = ColumnProfiler::new();
        assert_eq!(
            profiler.infer_type(&values(&["1/5/24", "2/6/24", "12/31/2024"])),
            InferredType::Date
        );
        assert_eq!(
            profiler.infer_type(&values(&["1-5-24", "2-6-24", "3-7-24"])),
            InferredType::Date
        );
    }

    #[test]
    fn negative_numbers_fail_the_dash_guard() {
        // The `-`/`/` guard protects dates at the cost of negatives; a
        // column of negatives therefore reads categorical.
        let profiler = ColumnProfiler::new();
        assert_eq!(
            profiler.infer_type(&values(&["-1", "-2", "-3"])),
            InferredType::Categorical
        );
    }

    #[test]
    fn partial_parses_are_not_numeric() {
        let profiler = ColumnProfiler::new();
        assert_eq!(
            profiler.infer_type(&values(&["12abc", "34xy", "5z"])),
            InferredType::Categorical
        );
    }

    #[test]
    fn mixed_text_infers_categorical() {
        let profiler = ColumnProfiler::new();
        assert_eq!(
            profiler.infer_type(&values(&["east", "west", "1", "north"])),
            InferredType::Categorical
        );
    }

    #[test]
    fn sample_is_capped_at_config_limit() {
        let profiler = ColumnProfiler::with_config(ProfilingConfig {
            max_sample_values: 10,
            ..Default::default()
        });
        // First ten values are numeric; the text tail is beyond the sample.
        let mut raw: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        raw.extend((0..90).map(|_| "text".to_string()));
        let sample: Vec<Value> = raw.into_iter().map(Value::from).collect();
        assert_eq!(profiler.infer_type(&sample), InferredType::Numeric);
    }

    #[test]
    fn profile_reports_counts_and_stats() {
        let ds = dataset("sales", &["10", "20", "", "30"]);
        let profiler = ColumnProfiler::new();
        let profile = profiler.profile_column(&ds, "sales");
        assert_eq!(profile.inferred_type, InferredType::Numeric);
        assert_eq!(profile.total_count, 4);
        assert_eq!(profile.non_empty_count, 3);
        let stats = profile.numeric_stats.expect("numeric stats");
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.mean, 20.0);
    }

    #[test]
    fn summary_counts_types_and_recommends() {
        let profiler = ColumnProfiler::new();
        let region = profiler.profile_column(&dataset("region", &["east", "west"]), "region");
        let sales = profiler.profile_column(&dataset("sales", &["1", "2"]), "sales");
        let summary = profiler.summarize(&[region, sales]);
        assert_eq!(summary.categorical_count, 1);
        assert_eq!(summary.numeric_count, 1);
        let kinds = summary.recommended_chart_kinds();
        assert!(kinds.contains(&ChartKind::Bar));
        assert!(kinds.contains(&ChartKind::Table));
        assert!(!kinds.contains(&ChartKind::Line));
    }

    proptest! {
        #[test]
        fn inference_is_deterministic(raw in proptest::collection::vec("[a-z0-9/-]{0,12}", 0..120)) {
            let sample: Vec<Value> = raw.iter().map(|s| Value::from(s.clone())).collect();
            let profiler = ColumnProfiler::new();
            prop_assert_eq!(profiler.infer_type(&sample), profiler.infer_type(&sample));
        }
    }
}
