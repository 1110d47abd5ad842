//! Two-phase pivot execution: run the discovery query against a live
//! connection, then render a static pivot with one column per value.

use async_trait::async_trait;

use crate::axis::QueryAxis;
use crate::engine::Engine;
use crate::error::Result;
use crate::fragment::CustomLine;

/// Anything that can run a discovery query and return its `piv` column.
#[async_trait]
pub trait PivotValueSource: Send + Sync {
    async fn fetch_pivot_values(&self, sql: &str) -> Result<Vec<String>>;
}

/// Fixed values, for callers that already know the pivot headers.
#[derive(Debug, Clone, Default)]
pub struct StaticPivotValues(pub Vec<String>);

#[async_trait]
impl PivotValueSource for StaticPivotValues {
    async fn fetch_pivot_values(&self, _sql: &str) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Discover pivot values through `source` and build the pivoted query.
pub async fn build_with_discovered_values(
    engine: &Engine,
    lines: Vec<CustomLine>,
    axis: Option<QueryAxis>,
    source: &dyn PivotValueSource,
) -> Result<String> {
    let request = engine.request(lines, axis)?;
    let builder = engine.aggregates();

    let discovery = builder.pivot_values_sql(&request)?;
    tracing::debug!(database_type = %engine.database_type(), "discovering pivot values");
    let values = source.fetch_pivot_values(&discovery).await?;
    tracing::debug!(values = values.len(), "pivot values discovered");

    builder.build_pivot_with_values(&request, &values)
}
