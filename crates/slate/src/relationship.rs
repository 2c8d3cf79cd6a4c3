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

use crate::model::Dataset;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Join cardinality between two columns, classified from the data at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    #[serde(rename = "one-to-one")]
    OneToOne,
    #[serde(rename = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-one")]
    ManyToOne,
    #[serde(rename = "many-to-many")]
    ManyToMany,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one-to-one",
            Self::OneToMany => "one-to-many",
            Self::ManyToOne => "many-to-one",
            Self::ManyToMany => "many-to-many",
        }
    }
    /// Short chip label shown next to a relationship edge.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OneToOne => "1:1",
            Self::OneToMany => "1:N",
            Self::ManyToOne => "N:1",
            Self::ManyToMany => "N:N",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every row carries a distinct value — a potential key column. Empty
/// cells count as one distinct value like any other; nothing is
/// deduplicated specially.
pub fn is_column_unique(dataset: &Dataset, column: &str) -> bool {
    let distinct = dataset
        .column_values(column)
        .map(|value| value.key_string())
        .unique()
        .count();
    distinct == dataset.row_count()
}

/// Classify the join cardinality between `source_column` of `source` and
/// `target_column` of `target` by uniqueness analysis.
///
/// A heuristic over the rows as they are right now, not a declared schema
/// constraint — callers must re-run it after either dataset's rows change;
/// nothing is cached here.
pub fn detect_relationship_type(
    source: &Dataset,
    source_column: &str,
    target: &Dataset,
    target_column: &str,
) -> RelationshipKind {
    let source_unique = is_column_unique(source, source_column);
    let target_unique = is_column_unique(target, target_column);
    match (source_unique, target_unique) {
        (true, false) => RelationshipKind::OneToMany,
        (false, true) => RelationshipKind::ManyToOne,
        (true, true) => RelationshipKind::OneToOne,
        (false, false) => RelationshipKind::ManyToMany,
    }
}
