//! PostgreSQL aggregates. The calendar comes from `generate_series`; pivots
//! are not supported.

use super::layout::CalendarSql;
use super::AggregateBuilder;
use crate::axis::{AxisIncrement, QueryAxis};
use crate::config::{AggregateDefaults, ResolvedEngineConfig};
use crate::engine::DatabaseType;

#[derive(Debug, Clone)]
pub struct PostgresAggregateBuilder {
    defaults: AggregateDefaults,
}

impl PostgresAggregateBuilder {
    pub fn new(config: &ResolvedEngineConfig) -> Self {
        Self {
            defaults: config.aggregate.clone(),
        }
    }
}

fn interval(increment: AxisIncrement) -> &'static str {
    match increment {
        AxisIncrement::Day => "1 day",
        AxisIncrement::Month => "1 month",
        AxisIncrement::Year => "1 year",
        AxisIncrement::Quarter => "3 months",
    }
}

impl AggregateBuilder for PostgresAggregateBuilder {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSql
    }

    fn defaults(&self) -> &AggregateDefaults {
        &self.defaults
    }

    fn date_part_of_column(&self, increment: AxisIncrement, column: &str) -> String {
        match increment {
            AxisIncrement::Day => format!("CAST({column} AS DATE)"),
            AxisIncrement::Month => format!("TO_CHAR({column}, 'YYYY-MM')"),
            AxisIncrement::Year => format!("TO_CHAR({column}, 'YYYY')"),
            AxisIncrement::Quarter => format!("TO_CHAR({column}, 'YYYY\"Q\"Q')"),
        }
    }

    fn calendar(&self, axis: &QueryAxis) -> CalendarSql {
        CalendarSql {
            declaration: String::new(),
            relation: format!(
                "generate_series(CAST({} AS TIMESTAMP), CAST({} AS TIMESTAMP), INTERVAL '{}') AS axis(dt)",
                axis.start_date.trim(),
                axis.end_date.trim(),
                interval(axis.increment)
            ),
            column: "axis.dt".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_parts() {
        let b = PostgresAggregateBuilder::new(&ResolvedEngineConfig::default());
        assert_eq!(b.date_part_of_column(AxisIncrement::Day, "dt"), "CAST(dt AS DATE)");
        assert_eq!(
            b.date_part_of_column(AxisIncrement::Month, "dt"),
            "TO_CHAR(dt, 'YYYY-MM')"
        );
        assert_eq!(
            b.date_part_of_column(AxisIncrement::Year, "dt"),
            "TO_CHAR(dt, 'YYYY')"
        );
    }

    #[test]
    fn quarter_labels_match_axis_buckets() {
        let builder = PostgresAggregateBuilder::new(&ResolvedEngineConfig::default());
        assert_eq!(
            builder.date_part_of_column(AxisIncrement::Quarter, "axis.dt"),
            "TO_CHAR(axis.dt, 'YYYY\"Q\"Q')"
        );
        let calendar = builder.calendar(&QueryAxis::new(
            "'2015-01-01'",
            "now()",
            AxisIncrement::Quarter,
        ));
        assert_eq!(
            calendar.relation,
            "generate_series(CAST('2015-01-01' AS TIMESTAMP), CAST(now() AS TIMESTAMP), INTERVAL '3 months') AS axis(dt)"
        );
        assert!(calendar.declaration.is_empty());
    }
}
