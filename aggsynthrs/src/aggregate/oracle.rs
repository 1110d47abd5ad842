//! Oracle aggregates. The calendar is a `CONNECT BY LEVEL` row generator in a
//! CTE; pivots are not supported.

use super::layout::CalendarSql;
use super::AggregateBuilder;
use crate::axis::{AxisIncrement, QueryAxis};
use crate::config::{AggregateDefaults, ResolvedEngineConfig};
use crate::engine::DatabaseType;

#[derive(Debug, Clone)]
pub struct OracleAggregateBuilder {
    defaults: AggregateDefaults,
}

impl OracleAggregateBuilder {
    pub fn new(config: &ResolvedEngineConfig) -> Self {
        Self {
            defaults: config.aggregate.clone(),
        }
    }
}

/// Date literals become `TO_DATE`; expressions are truncated to midnight.
fn oracle_date(sql: &str) -> String {
    match QueryAxis::parse_literal(sql) {
        Some(date) => format!("TO_DATE('{}', 'YYYYMMDD')", date.format("%Y%m%d")),
        None => format!("TRUNC({})", sql.trim()),
    }
}

impl AggregateBuilder for OracleAggregateBuilder {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn defaults(&self) -> &AggregateDefaults {
        &self.defaults
    }

    fn date_part_of_column(&self, increment: AxisIncrement, column: &str) -> String {
        match increment {
            AxisIncrement::Day => format!("TRUNC({column})"),
            AxisIncrement::Month => format!("TO_CHAR({column}, 'YYYY-MM')"),
            AxisIncrement::Year => format!("TO_NUMBER(TO_CHAR({column}, 'YYYY'))"),
            AxisIncrement::Quarter => {
                format!("TO_CHAR({column}, 'YYYY') || 'Q' || TO_CHAR({column}, 'Q')")
            }
        }
    }

    fn calendar(&self, axis: &QueryAxis) -> CalendarSql {
        let start = oracle_date(&axis.start_date);
        let end = oracle_date(&axis.end_date);
        let (generator, rows) = match axis.increment.months() {
            None => (
                format!("{start} + (LEVEL - 1)"),
                format!("FLOOR({end} - {start}) + 1"),
            ),
            Some(months) => (
                format!("ADD_MONTHS({start}, {months} * (LEVEL - 1))"),
                format!("FLOOR(MONTHS_BETWEEN({end}, {start}) / {months}) + 1"),
            ),
        };
        CalendarSql {
            declaration: format!(
                "WITH calendar AS (\n    SELECT {generator} AS dt\n    FROM dual\n    CONNECT BY LEVEL <= {rows}\n)"
            ),
            relation: "calendar axis".to_string(),
            column: "axis.dt".to_string(),
        }
    }
}
