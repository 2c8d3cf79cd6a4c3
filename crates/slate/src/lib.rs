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

pub mod aggregation;
pub mod chart_projector;
pub mod chart_schema;
pub mod data_profiler;
pub mod error;
pub mod io;
pub mod mapping_resolver;
pub mod model;
pub mod relationship;
pub mod store;

pub use aggregation::{aggregate, coerce_numeric, output_column, AggregateMode};
pub use chart_projector::{project, series_value, ChartData, TableData, PASSTHROUGH_ROW_LIMIT};
pub use chart_schema::{AllowedType, ChartKind, ChartSchema, ChartSchemaRegistry, Role, RoleSpec};
pub use data_profiler::{
    ColumnProfile, ColumnProfiler, DatasetSummary, InferredType, NumericStats, ProfilingConfig,
};
pub use error::{Result, SlateError};
pub use io::CsvIngestor;
pub use mapping_resolver::{resolve_dataset, ColumnMapping, MappingSlot};
pub use model::{
    AggregationConfig, ColumnRef, Dataset, DatasetId, Position, Record, Relationship,
    RelationshipId, Size, Value, Visualization, VisualizationConfig, VisualizationId,
};
pub use relationship::{detect_relationship_type, is_column_unique, RelationshipKind};
pub use store::DashboardStore;

use crate::error::SchemaError;

/// Wires the pipeline end to end: profile columns, resolve a
/// visualization's dataset from its column mapping, and project the rows
/// into the shape its chart kind expects. Every method recomputes from the
/// inputs it is handed; there is no cached state to invalidate between
/// configuration edits.
pub struct VisualizationPipeline {
    profiler: ColumnProfiler,
    registry: ChartSchemaRegistry,
}

impl VisualizationPipeline {
    pub fn new() -> Self {
        Self {
            profiler: ColumnProfiler::new(),
            registry: ChartSchemaRegistry::builtin(),
        }
    }
    pub fn with_config(profiling_config: ProfilingConfig, registry: ChartSchemaRegistry) -> Self {
        Self {
            profiler: ColumnProfiler::with_config(profiling_config),
            registry,
        }
    }
    pub fn with_schema_file(path: &str) -> Result<Self> {
        let registry = ChartSchemaRegistry::from_yaml_file(path).map_err(|e| {
            SchemaError::InvalidRegistry {
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            profiler: ColumnProfiler::new(),
            registry,
        })
    }
    pub fn registry(&self) -> &ChartSchemaRegistry {
        &self.registry
    }
    pub fn profiler(&self) -> &ColumnProfiler {
        &self.profiler
    }

    pub fn profile(&self, dataset: &Dataset) -> Vec<ColumnProfile> {
        self.profiler.profile_dataset(dataset)
    }
    pub fn summarize(&self, dataset: &Dataset) -> DatasetSummary {
        self.profiler.summarize(&self.profile(dataset))
    }

    /// Required roles of the visualization's kind still waiting for a
    /// column.
    pub fn missing_roles(&self, visualization: &Visualization) -> Vec<Role> {
        self.registry
            .missing_roles(visualization.kind, &visualization.config.column_mapping)
            .unwrap_or_default()
    }
    pub fn is_complete(&self, visualization: &Visualization) -> bool {
        self.registry
            .is_complete(visualization.kind, &visualization.config.column_mapping)
    }

    /// The dataset a visualization reads from: its direct binding when one
    /// is set and still present, otherwise the first candidate satisfying
    /// its column mapping.
    pub fn resolve<'a>(
        &self,
        visualization: &Visualization,
        candidates: &'a [Dataset],
    ) -> Option<&'a Dataset> {
        if let Some(dataset_id) = &visualization.dataset_id {
            if let Some(dataset) = candidates.iter().find(|d| d.id == *dataset_id) {
                return Some(dataset);
            }
        }
        resolve_dataset(&visualization.config.column_mapping, candidates)
    }

    /// Chart data for a visualization against an explicit candidate list.
    /// Incomplete configuration and unresolvable mappings produce the
    /// empty sentinel the host renders as a "configure columns"
    /// placeholder.
    pub fn chart_data(&self, visualization: &Visualization, candidates: &[Dataset]) -> ChartData {
        if !self.is_complete(visualization) {
            return ChartData::empty(visualization.kind);
        }
        let Some(dataset) = self.resolve(visualization, candidates) else {
            return ChartData::empty(visualization.kind);
        };
        project(
            dataset,
            &visualization.config.column_mapping,
            visualization.kind,
            &visualization.config.aggregation,
        )
    }

    /// Same as [`Self::chart_data`], reading the visualization and the
    /// candidate datasets from a store. Unknown ids are errors; incomplete
    /// configuration still resolves to the empty sentinel.
    pub fn chart_data_for(
        &self,
        store: &DashboardStore,
        id: &VisualizationId,
    ) -> Result<ChartData> {
        let visualization = store.visualization(id).ok_or_else(|| {
            crate::error::StoreError::VisualizationNotFound { id: id.to_string() }
        })?;
        if !self.is_complete(visualization) {
            return Ok(ChartData::empty(visualization.kind));
        }
        let resolved = visualization
            .dataset_id
            .as_ref()
            .and_then(|dataset_id| store.dataset(dataset_id))
            .or_else(|| {
                resolve_dataset(&visualization.config.column_mapping, store.datasets())
            });
        let Some(dataset) = resolved else {
            return Ok(ChartData::empty(visualization.kind));
        };
        Ok(project(
            dataset,
            &visualization.config.column_mapping,
            visualization.kind,
            &visualization.config.aggregation,
        ))
    }
}

impl Default for VisualizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}
