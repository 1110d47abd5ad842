pub mod aggregate;
pub mod axis;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod request;
pub mod syntax;

use crate::error::Result;

/// Build aggregate SQL for `lines` with the shared default engine for `database_type`.
pub fn build_aggregate(
    database_type: DatabaseType,
    lines: Vec<CustomLine>,
    axis: Option<QueryAxis>,
) -> Result<String> {
    engine::engine(database_type).build_aggregate(lines, axis)
}

pub use aggregate::{AggregateBuilder, AggregateStrategy};
pub use axis::{AxisIncrement, QueryAxis};
pub use catalog::{AggregateCatalog, AggregateDefinition};
pub use config::AggsynthConfig;
pub use discovery::{build_with_discovered_values, PivotValueSource, StaticPivotValues};
pub use engine::{DatabaseType, Engine};
pub use error::AggsynthError;
pub use fragment::{CustomLine, CustomLineRole, QueryComponent, SelectItem};
pub use request::{AggregateRequest, Slot};
pub use syntax::QuerySyntaxHelper;
