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

use crate::chart_schema::Role;
use crate::model::{ColumnRef, Dataset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A role's column selection: one column, or an ordered list for the
/// table's `columns` role. Untagged so that persisted configs holding a
/// bare string, a `{name}` descriptor or an array all load uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingSlot {
    Multiple(Vec<ColumnRef>),
    Single(ColumnRef),
}

impl MappingSlot {
    pub fn is_bound(&self) -> bool {
        match self {
            Self::Single(column) => !column.name().is_empty(),
            Self::Multiple(columns) => !columns.is_empty(),
        }
    }
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            Self::Single(column) => vec![column.name()],
            Self::Multiple(columns) => columns.iter().map(ColumnRef::name).collect(),
        }
    }
}

/// Assignment of visualization roles to concrete dataset column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(flatten)]
    slots: IndexMap<Role, MappingSlot>,
}

impl ColumnMapping {
    pub fn bind(&mut self, role: Role, column: impl Into<ColumnRef>) {
        self.slots.insert(role, MappingSlot::Single(column.into()));
    }
    pub fn bind_columns(&mut self, role: Role, columns: Vec<ColumnRef>) {
        self.slots.insert(role, MappingSlot::Multiple(columns));
    }
    pub fn unbind(&mut self, role: Role) {
        self.slots.shift_remove(&role);
    }
    pub fn slot(&self, role: Role) -> Option<&MappingSlot> {
        self.slots.get(&role)
    }
    /// Normalised single-column binding for `role`, if one is set.
    pub fn column(&self, role: Role) -> Option<&str> {
        match self.slots.get(&role)? {
            MappingSlot::Single(column) if !column.name().is_empty() => Some(column.name()),
            _ => None,
        }
    }
    /// Normalised multi-column binding for `role`, if a non-empty list is
    /// set.
    pub fn columns(&self, role: Role) -> Option<Vec<&str>> {
        match self.slots.get(&role)? {
            MappingSlot::Multiple(columns) if !columns.is_empty() => {
                Some(columns.iter().map(ColumnRef::name).collect())
            }
            _ => None,
        }
    }
    pub fn is_role_mapped(&self, role: Role) -> bool {
        self.slots.get(&role).is_some_and(MappingSlot::is_bound)
    }
    pub fn is_empty(&self) -> bool {
        !self.slots.values().any(MappingSlot::is_bound)
    }
    pub fn mapped_column_names(&self) -> impl Iterator<Item = &str> {
        self.slots
            .values()
            .filter(|slot| slot.is_bound())
            .flat_map(|slot| slot.column_names())
    }
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.slots.keys().copied()
    }
}

/// Locate the dataset satisfying every currently mapped role.
///
/// Candidates are tried in the order provided; the first whose column set
/// contains every mapped column name wins, so resolution is deterministic
/// but intentionally not a best-match search. An empty mapping resolves to
/// nothing: the caller must ask the user to map columns first.
pub fn resolve_dataset<'a, I>(mapping: &ColumnMapping, candidates: I) -> Option<&'a Dataset>
where
    I: IntoIterator<Item = &'a Dataset>,
{
    if mapping.is_empty() {
        return None;
    }
    let resolved = candidates.into_iter().find(|dataset| {
        mapping
            .mapped_column_names()
            .all(|name| dataset.has_column(name))
    });
    match resolved {
        Some(dataset) => debug!(dataset = %dataset.id, "resolved mapping to dataset"),
        None => debug!("no candidate dataset satisfies mapping"),
    }
    resolved
}
