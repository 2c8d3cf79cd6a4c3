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

use crate::aggregation::AggregateMode;
use crate::chart_schema::{ChartKind, Role};
use crate::relationship::RelationshipKind;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type Record = IndexMap<String, Value>;

/// A raw cell as delivered by the file-parsing collaborator: either a
/// number, a piece of text, or nothing at all. Untagged so that persisted
/// rows round-trip as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Empty,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
        }
    }
    /// Strict numeric view: whole-string parses only, no default.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
    /// String form used for group keys and distinct-value counting.
    pub fn key_string(&self) -> String {
        match self {
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Empty => String::new(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_string())
    }
}

/// Integral floats print without a trailing fraction, matching how the
/// host's persistence layer stringifies numbers.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A column as stored in a dataset or a column mapping: either a bare name
/// or a descriptor object carrying a `name` field. Normalised through
/// [`ColumnRef::name`] once at every entry point instead of being
/// re-checked throughout the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Name(String),
    Descriptor {
        name: String,
        #[serde(flatten)]
        extra: IndexMap<String, serde_json::Value>,
    },
}

impl ColumnRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Descriptor { name, .. } => name,
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn from_string(id: String) -> Self {
        Self(id)
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipId(String);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn from_string(id: String) -> Self {
        Self(id)
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RelationshipId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualizationId(String);

impl VisualizationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn from_string(id: String) -> Self {
        Self(id)
    }
}

impl Default for VisualizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VisualizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VisualizationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A named table of rows sharing a column schema. Rows are mutated only by
/// wholesale replacement; records may omit columns, which read as
/// [`Value::Empty`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub columns: Vec<ColumnRef>,
    pub rows: Vec<Record>,
    pub created_at: DateTime<Utc>,
}

static EMPTY_CELL: Value = Value::Empty;

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnRef>, rows: Vec<Record>) -> Self {
        Self {
            id: DatasetId::new(),
            name: name.into(),
            columns,
            rows,
            created_at: Utc::now(),
        }
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(ColumnRef::name)
    }
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
    }
    pub fn cell(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY_CELL)
    }
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&EMPTY_CELL))
    }
    /// Every record's key set must be a subset of the declared columns.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(format!("Duplicate column name: {}", column.name()));
            }
        }
        for (idx, row) in self.rows.iter().enumerate() {
            for key in row.keys() {
                if !seen.contains(key.as_str()) {
                    return Err(format!("Row {idx} has undeclared column '{key}'"));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} columns, {} rows)",
            self.name,
            self.column_count(),
            self.row_count()
        )
    }
}

/// A declared join between a column in one dataset and a column in another,
/// tagged with the detected cardinality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source_dataset: DatasetId,
    pub source_column: String,
    pub target_dataset: DatasetId,
    pub target_column: String,
    pub kind: RelationshipKind,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn endpoints_match(
        &self,
        source_dataset: &DatasetId,
        source_column: &str,
        target_dataset: &DatasetId,
        target_column: &str,
    ) -> bool {
        let forward = self.source_dataset == *source_dataset
            && self.source_column == source_column
            && self.target_dataset == *target_dataset
            && self.target_column == target_column;
        let reverse = self.source_dataset == *target_dataset
            && self.source_column == target_column
            && self.target_dataset == *source_dataset
            && self.target_column == source_column;
        forward || reverse
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 300.0,
        }
    }
}

/// Per-visualization configuration as edited in the properties dialog. The
/// presentation properties (colours, borders, shadows) are host concerns
/// and pass through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizationConfig {
    #[serde(default)]
    pub column_mapping: crate::mapping_resolver::ColumnMapping,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(flatten)]
    pub presentation: IndexMap<String, serde_json::Value>,
}

/// Role-keyed aggregation selection; only the `value` role carries a mode
/// in practice, and an absent entry reads as [`AggregateMode::None`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default)]
    pub modes: IndexMap<Role, AggregateMode>,
}

impl AggregationConfig {
    pub fn for_role(&self, role: Role) -> AggregateMode {
        self.modes.get(&role).copied().unwrap_or(AggregateMode::None)
    }
    pub fn value_mode(&self) -> AggregateMode {
        self.for_role(Role::Value)
    }
    pub fn with_value_mode(mode: AggregateMode) -> Self {
        let mut modes = IndexMap::new();
        modes.insert(Role::Value, mode);
        Self { modes }
    }
}

/// A configured chart or table on the canvas, bound to a dataset either
/// directly or indirectly through its column mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub id: VisualizationId,
    pub kind: ChartKind,
    #[serde(default)]
    pub dataset_id: Option<DatasetId>,
    #[serde(default)]
    pub config: VisualizationConfig,
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    pub created_at: DateTime<Utc>,
}

impl Visualization {
    pub fn new(kind: ChartKind, position: Position) -> Self {
        Self {
            id: VisualizationId::new(),
            kind,
            dataset_id: None,
            config: VisualizationConfig::default(),
            position,
            size: Size::default(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_numeric_views() {
        assert_eq!(Value::Number(3.5).as_f64(), Some(3.5));
        assert_eq!(Value::Text("42".into()).as_f64(), Some(42.0));
        assert_eq!(Value::Text("12abc".into()).as_f64(), None);
        assert_eq!(Value::Empty.as_f64(), None);
    }

    #[test]
    fn value_key_string_trims_integral_floats() {
        assert_eq!(Value::Number(5.0).key_string(), "5");
        assert_eq!(Value::Number(5.5).key_string(), "5.5");
        assert_eq!(Value::Text("east".into()).key_string(), "east");
    }

    #[test]
    fn column_ref_normalises_both_representations() {
        let bare: ColumnRef = "region".into();
        let descriptor: ColumnRef = serde_json::from_str(r#"{"name":"region","type":"text"}"#)
            .expect("descriptor form should deserialise");
        assert_eq!(bare.name(), "region");
        assert_eq!(descriptor.name(), "region");
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let mut row = Record::new();
        row.insert("a".to_string(), Value::Number(1.0));
        let ds = Dataset::new("t", vec!["a".into(), "b".into()], vec![row]);
        assert_eq!(ds.cell(0, "b"), &Value::Empty);
        assert_eq!(ds.cell(7, "a"), &Value::Empty);
    }

    #[test]
    fn validate_rejects_undeclared_row_keys() {
        let mut row = Record::new();
        row.insert("ghost".to_string(), Value::Number(1.0));
        let ds = Dataset::new("t", vec!["a".into()], vec![row]);
        assert!(ds.validate().is_err());
    }
}
