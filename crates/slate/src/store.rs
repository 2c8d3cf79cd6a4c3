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

use crate::error::{DataError, Result, StoreError, StoreResult};
use crate::model::{
    ColumnRef, Dataset, DatasetId, Position, Record, Relationship, RelationshipId, Size,
    Visualization, VisualizationConfig, VisualizationId,
};
use crate::chart_schema::ChartKind;
use crate::relationship::detect_relationship_type;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

const HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub operation_type: String,
    pub entity_id: String,
    pub parameters: IndexMap<String, String>,
}

/// Owner of the dashboard's entity collections. The host serialises edits,
/// so mutation goes through `&mut self`; every read recomputes from
/// current rows and nothing derived is cached here.
#[derive(Debug, Default)]
pub struct DashboardStore {
    datasets: IndexMap<DatasetId, Dataset>,
    relationships: IndexMap<RelationshipId, Relationship>,
    visualizations: IndexMap<VisualizationId, Visualization>,
    history: Vec<OperationRecord>,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&mut self, dataset: Dataset) -> Result<DatasetId> {
        dataset.validate().map_err(|reason| {
            DataError::InvalidDataset {
                name: dataset.name.clone(),
                reason,
            }
        })?;
        let id = dataset.id.clone();
        debug!(dataset = %id, name = %dataset.name, "inserting dataset");
        self.datasets.insert(id.clone(), dataset);
        self.record("insert_dataset", id.as_ref(), &[]);
        Ok(id)
    }

    /// Wholesale replacement of a dataset's schema and rows — the only row
    /// mutation there is. Relationship kinds touching this dataset are
    /// re-detected against the new rows.
    pub fn replace_dataset(
        &mut self,
        id: &DatasetId,
        columns: Vec<ColumnRef>,
        rows: Vec<Record>,
    ) -> Result<()> {
        let dataset = self
            .datasets
            .get_mut(id)
            .ok_or_else(|| StoreError::DatasetNotFound { id: id.to_string() })?;
        let candidate = Dataset {
            id: dataset.id.clone(),
            name: dataset.name.clone(),
            columns,
            rows,
            created_at: dataset.created_at,
        };
        candidate.validate().map_err(|reason| DataError::InvalidDataset {
            name: candidate.name.clone(),
            reason,
        })?;
        *dataset = candidate;
        self.redetect_relationship_kinds(id);
        self.record("replace_dataset", id.as_ref(), &[]);
        Ok(())
    }

    pub fn rename_dataset(&mut self, id: &DatasetId, name: impl Into<String>) -> StoreResult<()> {
        let dataset = self
            .datasets
            .get_mut(id)
            .ok_or_else(|| StoreError::DatasetNotFound { id: id.to_string() })?;
        dataset.name = name.into();
        Ok(())
    }

    /// Delete a dataset, cascading to every relationship touching it and
    /// every visualization bound to it by id. Visualizations bound only
    /// through their column mapping stay and re-resolve on next read.
    pub fn remove_dataset(&mut self, id: &DatasetId) -> StoreResult<Dataset> {
        let dataset = self
            .datasets
            .shift_remove(id)
            .ok_or_else(|| StoreError::DatasetNotFound { id: id.to_string() })?;
        let before = self.relationships.len();
        self.relationships
            .retain(|_, r| r.source_dataset != *id && r.target_dataset != *id);
        let dropped_relationships = before - self.relationships.len();
        let before = self.visualizations.len();
        self.visualizations
            .retain(|_, v| v.dataset_id.as_ref() != Some(id));
        let dropped_visualizations = before - self.visualizations.len();
        debug!(
            dataset = %id,
            dropped_relationships,
            dropped_visualizations,
            "removed dataset with cascade"
        );
        self.record(
            "remove_dataset",
            id.as_ref(),
            &[
                ("relationships", dropped_relationships.to_string()),
                ("visualizations", dropped_visualizations.to_string()),
            ],
        );
        Ok(dataset)
    }

    pub fn dataset(&self, id: &DatasetId) -> Option<&Dataset> {
        self.datasets.get(id)
    }

    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }

    /// Connect two columns. Self-relationships (same dataset and column on
    /// both ends) and duplicates (either direction) are rejected as a
    /// no-op `None` — caller-visible as "nothing happened", not an error.
    /// The cardinality is detected from the rows at creation time.
    pub fn create_relationship(
        &mut self,
        source_dataset: &DatasetId,
        source_column: &str,
        target_dataset: &DatasetId,
        target_column: &str,
    ) -> Result<Option<RelationshipId>> {
        let source = self
            .datasets
            .get(source_dataset)
            .ok_or_else(|| StoreError::DatasetNotFound {
                id: source_dataset.to_string(),
            })?;
        let target = self
            .datasets
            .get(target_dataset)
            .ok_or_else(|| StoreError::DatasetNotFound {
                id: target_dataset.to_string(),
            })?;
        if source_dataset == target_dataset && source_column == target_column {
            debug!("self-relationship rejected");
            return Ok(None);
        }
        let exists = self.relationships.values().any(|r| {
            r.endpoints_match(source_dataset, source_column, target_dataset, target_column)
        });
        if exists {
            debug!("duplicate relationship rejected");
            return Ok(None);
        }
        let kind = detect_relationship_type(source, source_column, target, target_column);
        let relationship = Relationship {
            id: RelationshipId::new(),
            source_dataset: source_dataset.clone(),
            source_column: source_column.to_string(),
            target_dataset: target_dataset.clone(),
            target_column: target_column.to_string(),
            kind,
            visible: true,
            created_at: Utc::now(),
        };
        let id = relationship.id.clone();
        debug!(relationship = %id, kind = %kind, "created relationship");
        self.relationships.insert(id.clone(), relationship);
        self.record(
            "create_relationship",
            id.as_ref(),
            &[("kind", kind.as_str().to_string())],
        );
        Ok(Some(id))
    }

    pub fn toggle_relationship(&mut self, id: &RelationshipId) -> StoreResult<bool> {
        let relationship = self
            .relationships
            .get_mut(id)
            .ok_or_else(|| StoreError::RelationshipNotFound { id: id.to_string() })?;
        relationship.visible = !relationship.visible;
        Ok(relationship.visible)
    }

    pub fn remove_relationship(&mut self, id: &RelationshipId) -> StoreResult<Relationship> {
        self.relationships
            .shift_remove(id)
            .ok_or_else(|| StoreError::RelationshipNotFound { id: id.to_string() })
    }

    pub fn relationship(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn create_visualization(
        &mut self,
        kind: ChartKind,
        position: Position,
    ) -> VisualizationId {
        let visualization = Visualization::new(kind, position);
        let id = visualization.id.clone();
        debug!(visualization = %id, kind = %kind, "created visualization");
        self.visualizations.insert(id.clone(), visualization);
        self.record(
            "create_visualization",
            id.as_ref(),
            &[("kind", kind.as_str().to_string())],
        );
        id
    }

    pub fn update_visualization_config(
        &mut self,
        id: &VisualizationId,
        config: VisualizationConfig,
    ) -> StoreResult<()> {
        let visualization = self
            .visualizations
            .get_mut(id)
            .ok_or_else(|| StoreError::VisualizationNotFound { id: id.to_string() })?;
        visualization.config = config;
        self.record("update_visualization_config", id.as_ref(), &[]);
        Ok(())
    }

    pub fn bind_visualization_dataset(
        &mut self,
        id: &VisualizationId,
        dataset_id: Option<DatasetId>,
    ) -> StoreResult<()> {
        let visualization = self
            .visualizations
            .get_mut(id)
            .ok_or_else(|| StoreError::VisualizationNotFound { id: id.to_string() })?;
        visualization.dataset_id = dataset_id;
        Ok(())
    }

    pub fn move_visualization(
        &mut self,
        id: &VisualizationId,
        position: Position,
        size: Option<Size>,
    ) -> StoreResult<()> {
        let visualization = self
            .visualizations
            .get_mut(id)
            .ok_or_else(|| StoreError::VisualizationNotFound { id: id.to_string() })?;
        visualization.position = position;
        if let Some(size) = size {
            visualization.size = size;
        }
        Ok(())
    }

    pub fn remove_visualization(&mut self, id: &VisualizationId) -> StoreResult<Visualization> {
        let removed = self
            .visualizations
            .shift_remove(id)
            .ok_or_else(|| StoreError::VisualizationNotFound { id: id.to_string() })?;
        self.record("remove_visualization", id.as_ref(), &[]);
        Ok(removed)
    }

    pub fn visualization(&self, id: &VisualizationId) -> Option<&Visualization> {
        self.visualizations.get(id)
    }

    pub fn visualizations(&self) -> impl Iterator<Item = &Visualization> {
        self.visualizations.values()
    }

    pub fn history(&self) -> &[OperationRecord] {
        &self.history
    }

    fn redetect_relationship_kinds(&mut self, changed: &DatasetId) {
        let updates: Vec<(RelationshipId, crate::relationship::RelationshipKind)> = self
            .relationships
            .values()
            .filter(|r| r.source_dataset == *changed || r.target_dataset == *changed)
            .filter_map(|r| {
                let source = self.datasets.get(&r.source_dataset)?;
                let target = self.datasets.get(&r.target_dataset)?;
                let kind = detect_relationship_type(
                    source,
                    &r.source_column,
                    target,
                    &r.target_column,
                );
                Some((r.id.clone(), kind))
            })
            .collect();
        for (id, kind) in updates {
            if let Some(relationship) = self.relationships.get_mut(&id) {
                relationship.kind = kind;
            }
        }
    }

    fn record(&mut self, operation_type: &str, entity_id: &str, parameters: &[(&str, String)]) {
        self.history.push(OperationRecord {
            timestamp: Utc::now(),
            operation_type: operation_type.to_string(),
            entity_id: entity_id.to_string(),
            parameters: parameters
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(0..excess);
        }
    }
}
