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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlateError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Column '{column}' not found in dataset '{dataset}'")]
    ColumnNotFound { dataset: String, column: String },
    #[error("Dataset '{name}' failed validation: {reason}")]
    InvalidDataset { name: String, reason: String },
    #[error("CSV parse error: {0}")]
    CsvParse(String),
    #[error("Duplicate column name '{name}' in CSV header")]
    DuplicateHeader { name: String },
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown chart kind: '{kind}'")]
    UnknownChartKind { kind: String },
    #[error("Role '{role}' is not part of the '{kind}' schema")]
    UnknownRole { kind: String, role: String },
    #[error("Role '{role}' expects {expected} column selection")]
    RoleShapeMismatch { role: String, expected: &'static str },
    #[error("Chart schema registry failed validation: {reason}")]
    InvalidRegistry { reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dataset '{id}' not found")]
    DatasetNotFound { id: String },
    #[error("Relationship '{id}' not found")]
    RelationshipNotFound { id: String },
    #[error("Visualization '{id}' not found")]
    VisualizationNotFound { id: String },
}

pub type Result<T> = std::result::Result<T, SlateError>;
pub type DataResult<T> = std::result::Result<T, DataError>;
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl SlateError {
    /// Errors a host can surface as a non-fatal notice rather than a
    /// failure. Expected misconfiguration never reaches this type at all;
    /// those paths return empty sentinel results instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Data(DataError::ColumnNotFound { .. }) | Self::Store(_)
        )
    }
    pub fn category(&self) -> &'static str {
        match self {
            Self::Data(_) => "Data",
            Self::Schema(_) => "Schema",
            Self::Store(_) => "Store",
            Self::Io(_) => "I/O",
            Self::Serialisation(_) => "Serialisation",
        }
    }
}
