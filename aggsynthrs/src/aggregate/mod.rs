//! GROUP BY synthesis with optional calendar axis and dynamic pivot.
//!
//! [`build_aggregate`] classifies a validated request into one of four
//! strategies and hands it to the dialect's [`AggregateBuilder`]. The axis
//! join layout is shared; dialects supply the calendar relation and the
//! date-part expressions.

use crate::axis::{AxisIncrement, QueryAxis};
use crate::config::AggregateDefaults;
use crate::engine::DatabaseType;
use crate::error::{AggsynthError, Result};
use crate::fragment::{CustomLine, CustomLineRole, QueryComponent};
use crate::request::AggregateRequest;

mod layout;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod rewrite;

pub use layout::CalendarSql;
pub use mssql::MsSqlAggregateBuilder;
pub use mysql::MySqlAggregateBuilder;
pub use oracle::OracleAggregateBuilder;
pub use postgres::PostgresAggregateBuilder;
pub use rewrite::{realias_line, rewrite_axis_column, AggregateCall};

/// Which of the four build paths a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateStrategy {
    Plain,
    AxisOnly,
    PivotOnly,
    AxisAndPivot,
}

impl AggregateStrategy {
    pub fn classify(request: &AggregateRequest<'_>) -> Result<Self> {
        let axis = request.axis_select()?.is_some();
        let pivot = request.pivot_select()?.is_some();
        Ok(match (axis, pivot) {
            (false, false) => AggregateStrategy::Plain,
            (true, false) => AggregateStrategy::AxisOnly,
            (false, true) => AggregateStrategy::PivotOnly,
            (true, true) => AggregateStrategy::AxisAndPivot,
        })
    }
}

/// Dialect-specific aggregate SQL generation.
///
/// Builders are stateless apart from their configured defaults and are
/// shared freely between threads.
pub trait AggregateBuilder: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    fn defaults(&self) -> &AggregateDefaults;

    /// `column` truncated to the bucket granularity of `increment`.
    fn date_part_of_column(&self, increment: AxisIncrement, column: &str) -> String;

    /// The generated relation holding one row per axis bucket.
    fn calendar(&self, axis: &QueryAxis) -> CalendarSql;

    fn build_basic(&self, request: &AggregateRequest<'_>) -> Result<String> {
        Ok(request.join_lines(|_| true))
    }

    fn build_axis(&self, request: &AggregateRequest<'_>) -> Result<String> {
        let layout = layout::prepare_axis(request, self)?;
        let calendar = self.calendar(&layout.axis);
        Ok(layout::render_axis_join(&layout, &calendar, self))
    }

    fn build_pivot_only(
        &self,
        _request: &AggregateRequest<'_>,
        _non_pivot: &CustomLine,
    ) -> Result<String> {
        Err(self.unsupported("pivot aggregates"))
    }

    fn build_pivot_and_axis(&self, _request: &AggregateRequest<'_>) -> Result<String> {
        Err(self.unsupported("pivot aggregates with a calendar axis"))
    }

    /// Phase one of the explicit pivot protocol: a query returning the
    /// distinct pivot values, most significant first, in a column `piv`.
    fn pivot_values_sql(&self, _request: &AggregateRequest<'_>) -> Result<String> {
        Err(self.unsupported("pivot value discovery"))
    }

    /// Phase two: the pivoted query for already discovered `values`.
    fn build_pivot_with_values(
        &self,
        _request: &AggregateRequest<'_>,
        _values: &[String],
    ) -> Result<String> {
        Err(self.unsupported("pivot aggregates"))
    }

    fn unsupported(&self, operation: &'static str) -> AggsynthError {
        AggsynthError::NotImplemented {
            database_type: self.database_type(),
            operation,
        }
    }
}

/// Build the SQL for `request` using the strategy its slots call for.
pub fn build_aggregate<B: AggregateBuilder + ?Sized>(
    builder: &B,
    request: &AggregateRequest<'_>,
) -> Result<String> {
    let strategy = AggregateStrategy::classify(request)?;
    tracing::debug!(
        database_type = %builder.database_type(),
        strategy = ?strategy,
        lines = request.lines().len(),
        "building aggregate"
    );

    let sql = match strategy {
        AggregateStrategy::Plain => builder.build_basic(request)?,
        AggregateStrategy::AxisOnly => builder.build_axis(request)?,
        AggregateStrategy::PivotOnly => {
            let non_pivot = non_pivot_column(request)?;
            builder.build_pivot_only(request, non_pivot)?
        }
        AggregateStrategy::AxisAndPivot => builder.build_pivot_and_axis(request)?,
    };

    tracing::trace!(sql = %sql, "generated aggregate sql");
    Ok(sql)
}

/// The single plain SELECT-list column a pivot-only aggregate groups by.
pub fn non_pivot_column<'r>(request: &'r AggregateRequest<'_>) -> Result<&'r CustomLine> {
    let candidates: Vec<&CustomLine> = request
        .lines()
        .iter()
        .filter(|line| line.is_in(QueryComponent::QueryTimeColumn, CustomLineRole::None))
        .collect();
    match candidates.as_slice() {
        [line] => Ok(*line),
        other => Err(AggsynthError::Validation(format!(
            "pivot aggregates without an axis need exactly one SELECT column besides the count and pivot columns, found {}{}",
            other.len(),
            if other.is_empty() {
                String::new()
            } else {
                format!(
                    ": {}",
                    other.iter().map(|l| l.text()).collect::<Vec<_>>().join(" | ")
                )
            }
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::MySqlSyntax;

    fn line(text: &str, location: QueryComponent, role: CustomLineRole) -> CustomLine {
        CustomLine::new(text, location).with_role(role)
    }

    fn pivot_lines(extra: &[&str]) -> Vec<CustomLine> {
        let mut lines = vec![
            line("SELECT", QueryComponent::Select, CustomLineRole::None),
            line("count(*) AS n,", QueryComponent::QueryTimeColumn, CustomLineRole::CountFunction),
            line("cat AS c,", QueryComponent::QueryTimeColumn, CustomLineRole::Pivot),
        ];
        for text in extra {
            lines.push(line(text, QueryComponent::QueryTimeColumn, CustomLineRole::None));
        }
        lines.push(line("FROM t", QueryComponent::From, CustomLineRole::None));
        lines
    }

    #[test]
    fn classifies_by_axis_and_pivot_slots() {
        let syntax = MySqlSyntax;
        let request = AggregateRequest::new(pivot_lines(&["region"]), None, &syntax).unwrap();
        assert_eq!(
            AggregateStrategy::classify(&request).unwrap(),
            AggregateStrategy::PivotOnly
        );

        let plain = AggregateRequest::new(
            vec![line("SELECT 1", QueryComponent::Select, CustomLineRole::None)],
            None,
            &syntax,
        )
        .unwrap();
        assert_eq!(
            AggregateStrategy::classify(&plain).unwrap(),
            AggregateStrategy::Plain
        );
    }

    #[test]
    fn non_pivot_column_must_be_unique() {
        let syntax = MySqlSyntax;
        let one = AggregateRequest::new(pivot_lines(&["region"]), None, &syntax).unwrap();
        assert_eq!(non_pivot_column(&one).unwrap().text(), "region");

        let none = AggregateRequest::new(pivot_lines(&[]), None, &syntax).unwrap();
        assert!(matches!(
            non_pivot_column(&none),
            Err(AggsynthError::Validation(m)) if m.contains("found 0")
        ));

        let two = AggregateRequest::new(pivot_lines(&["region,", "city"]), None, &syntax).unwrap();
        assert!(matches!(
            non_pivot_column(&two),
            Err(AggsynthError::Validation(m)) if m.contains("found 2")
        ));
    }
}
