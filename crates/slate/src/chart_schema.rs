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

use crate::mapping_resolver::ColumnMapping;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    #[serde(rename = "bar-chart")]
    Bar,
    #[serde(rename = "line-chart")]
    Line,
    #[serde(rename = "pie-chart")]
    Pie,
    #[serde(rename = "data-table", alias = "table")]
    Table,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar-chart",
            Self::Line => "line-chart",
            Self::Pie => "pie-chart",
            Self::Table => "data-table",
        }
    }
    pub fn all() -> [Self; 4] {
        [Self::Bar, Self::Line, Self::Pie, Self::Table]
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = crate::error::SchemaError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bar-chart" => Ok(Self::Bar),
            "line-chart" => Ok(Self::Line),
            "pie-chart" => Ok(Self::Pie),
            "data-table" | "table" => Ok(Self::Table),
            other => Err(crate::error::SchemaError::UnknownChartKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Visual roles a column can be mapped onto. The string forms are the
/// config keys the host persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Category,
    Value,
    Label,
    Series,
    Group,
    Columns,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Value => "value",
            Self::Label => "label",
            Self::Series => "series",
            Self::Group => "group",
            Self::Columns => "columns",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column type a role will accept. Advisory for editors; the projector
/// coerces rather than rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowedType {
    Numeric,
    Categorical,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub role: Role,
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default = "AllowedType::any")]
    pub allowed: AllowedType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AllowedType {
    fn any() -> Self {
        Self::Any
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSchema {
    pub kind: ChartKind,
    pub roles: Vec<RoleSpec>,
}

impl ChartSchema {
    pub fn role(&self, role: Role) -> Option<&RoleSpec> {
        self.roles.iter().find(|spec| spec.role == role)
    }
    pub fn required_roles(&self) -> impl Iterator<Item = &RoleSpec> {
        self.roles.iter().filter(|spec| spec.required)
    }
    pub fn optional_roles(&self) -> impl Iterator<Item = &RoleSpec> {
        self.roles.iter().filter(|spec| !spec.required)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryConfig {
    charts: Vec<ChartSchema>,
}

/// Catalogue of role requirements per chart kind. The built-in table is
/// authoritative; a YAML override exists for hosts that extend the chart
/// palette.
#[derive(Debug, Clone)]
pub struct ChartSchemaRegistry {
    schemas: IndexMap<ChartKind, ChartSchema>,
}

impl ChartSchemaRegistry {
    pub fn builtin() -> Self {
        let charts = vec![
            ChartSchema {
                kind: ChartKind::Bar,
                roles: vec![
                    role_spec(Role::Category, true, false, AllowedType::Categorical),
                    role_spec(Role::Value, true, false, AllowedType::Numeric),
                    role_spec(Role::Series, false, false, AllowedType::Categorical),
                    role_spec(Role::Group, false, false, AllowedType::Categorical),
                ],
            },
            ChartSchema {
                kind: ChartKind::Line,
                roles: vec![
                    role_spec(Role::Category, true, false, AllowedType::Categorical),
                    role_spec(Role::Value, true, false, AllowedType::Numeric),
                    role_spec(Role::Series, false, false, AllowedType::Categorical),
                ],
            },
            ChartSchema {
                kind: ChartKind::Pie,
                roles: vec![
                    role_spec(Role::Label, true, false, AllowedType::Categorical),
                    role_spec(Role::Value, true, false, AllowedType::Numeric),
                    role_spec(Role::Series, false, false, AllowedType::Categorical),
                ],
            },
            ChartSchema {
                kind: ChartKind::Table,
                roles: vec![role_spec(Role::Columns, true, true, AllowedType::Any)],
            },
        ];
        let mut schemas = IndexMap::new();
        for chart in charts {
            schemas.insert(chart.kind, chart);
        }
        Self { schemas }
    }
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read chart schema file: {}",
                path.as_ref().display()
            )
        })?;
        Self::from_yaml_str(&content)
    }
    pub fn from_yaml_str(yaml_content: &str) -> Result<Self> {
        let config: RegistryConfig =
            serde_yaml::from_str(yaml_content).context("Failed to parse chart schema YAML")?;
        let mut schemas = IndexMap::new();
        for chart in config.charts {
            if schemas.insert(chart.kind, chart).is_some() {
                anyhow::bail!("Duplicate chart schema for kind");
            }
        }
        let registry = Self { schemas };
        registry
            .validate()
            .map_err(|reason| anyhow::anyhow!("Invalid chart schema registry: {reason}"))?;
        Ok(registry)
    }
    pub fn schema(&self, kind: ChartKind) -> Option<&ChartSchema> {
        self.schemas.get(&kind)
    }
    pub fn all_schemas(&self) -> impl Iterator<Item = &ChartSchema> {
        self.schemas.values()
    }
    pub fn validate(&self) -> std::result::Result<(), String> {
        for schema in self.schemas.values() {
            if schema.roles.is_empty() {
                return Err(format!("Chart '{}' declares no roles", schema.kind));
            }
            if !schema.roles.iter().any(|spec| spec.required) {
                return Err(format!("Chart '{}' has no required role", schema.kind));
            }
            let mut seen = std::collections::HashSet::new();
            for spec in &schema.roles {
                if !seen.insert(spec.role) {
                    return Err(format!(
                        "Chart '{}' declares role '{}' twice",
                        schema.kind, spec.role
                    ));
                }
            }
        }
        Ok(())
    }
    /// Required roles of `kind` that the mapping has not bound yet. An
    /// unknown kind reports every role as missing by returning `None`.
    pub fn missing_roles(&self, kind: ChartKind, mapping: &ColumnMapping) -> Option<Vec<Role>> {
        let schema = self.schema(kind)?;
        Some(
            schema
                .required_roles()
                .filter(|spec| !mapping.is_role_mapped(spec.role))
                .map(|spec| spec.role)
                .collect(),
        )
    }
    /// A visualization is renderable only once every required role of its
    /// kind is bound to a non-empty selection.
    pub fn is_complete(&self, kind: ChartKind, mapping: &ColumnMapping) -> bool {
        self.missing_roles(kind, mapping)
            .is_some_and(|missing| missing.is_empty())
    }
}

impl Default for ChartSchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn role_spec(role: Role, required: bool, multiple: bool, allowed: AllowedType) -> RoleSpec {
    RoleSpec {
        role,
        required,
        multiple,
        allowed,
        description: None,
    }
}
