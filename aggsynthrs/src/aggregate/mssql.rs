//! Microsoft SQL Server aggregates.
//!
//! The calendar is a table variable filled by a WHILE loop. Dynamic pivots
//! collect the discovered values into a second table variable and build the
//! column lists with `STRING_AGG` before running the final query through
//! `EXECUTE`. Table variables do not cross the `EXECUTE` boundary, so a
//! calendar needed by a pivot is declared inside the dynamic batch.

use super::layout::{self, CalendarSql, PivotColumns, PivotTemplate, TemplatePart};
use super::AggregateBuilder;
use crate::axis::{AxisIncrement, QueryAxis};
use crate::config::{AggregateDefaults, ResolvedEngineConfig};
use crate::engine::DatabaseType;
use crate::error::Result;
use crate::fragment::CustomLine;
use crate::request::AggregateRequest;
use crate::syntax::{MsSqlSyntax, QuerySyntaxHelper};

#[derive(Debug, Clone)]
pub struct MsSqlAggregateBuilder {
    defaults: AggregateDefaults,
}

impl MsSqlAggregateBuilder {
    pub fn new(config: &ResolvedEngineConfig) -> Self {
        Self {
            defaults: config.aggregate.clone(),
        }
    }

    fn pivot_values_table(&self, discovery: &str) -> String {
        format!(
            "DECLARE @pivotValues TABLE\n(\n    ord INT IDENTITY(1,1),\n    piv NVARCHAR(MAX)\n)\n\nINSERT INTO @pivotValues (piv)\n{discovery}"
        )
    }

    fn case_columns_variable(&self, pivot: &PivotColumns) -> String {
        let syntax = MsSqlSyntax;
        let (head, tail) = pivot.case_parts();
        format!(
            "DECLARE @CaseColumns NVARCHAR(MAX)\nSELECT @CaseColumns = STRING_AGG(CAST(N'{}N''' + REPLACE(piv, N'''', N'''''') + N'''{} AS [' + REPLACE(piv, N']', N']]') + N']' AS NVARCHAR(MAX)), N', ') WITHIN GROUP (ORDER BY ord)\nFROM @pivotValues",
            syntax.escape(&head),
            syntax.escape(&tail)
        )
    }

    fn dataset_columns_variable(&self) -> String {
        "DECLARE @DatasetColumns NVARCHAR(MAX)\nSELECT @DatasetColumns = STRING_AGG(CAST(N'COALESCE(dataset.[' + REPLACE(piv, N']', N']]') + N'], 0) AS [' + REPLACE(piv, N']', N']]') + N']' AS NVARCHAR(MAX)), N', ') WITHIN GROUP (ORDER BY ord)\nFROM @pivotValues".to_string()
    }

    fn execute_template(&self, template: &PivotTemplate) -> String {
        let syntax = MsSqlSyntax;
        let mut pieces = vec!["CAST(N'' AS NVARCHAR(MAX))".to_string()];
        pieces.extend(template.parts.iter().map(|part| match part {
            TemplatePart::Sql(sql) => format!("N'{}'", syntax.escape(sql)),
            TemplatePart::CaseColumns => "ISNULL(N', ' + @CaseColumns, N'')".to_string(),
            TemplatePart::DatasetColumns => "ISNULL(N', ' + @DatasetColumns, N'')".to_string(),
        }));
        format!(
            "DECLARE @Query NVARCHAR(MAX)\nSET @Query = {}\n\nEXECUTE(@Query)",
            pieces.join("\n    + ")
        )
    }
}

impl AggregateBuilder for MsSqlAggregateBuilder {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MicrosoftSqlServer
    }

    fn defaults(&self) -> &AggregateDefaults {
        &self.defaults
    }

    fn date_part_of_column(&self, increment: AxisIncrement, column: &str) -> String {
        match increment {
            AxisIncrement::Day => format!("CONVERT(DATE, {column})"),
            AxisIncrement::Month => format!("CONVERT(NVARCHAR(7), {column}, 126)"),
            AxisIncrement::Year => format!("YEAR({column})"),
            AxisIncrement::Quarter => format!(
                "CONVERT(NVARCHAR(4), YEAR({column})) + 'Q' + CONVERT(NVARCHAR(1), DATEPART(QUARTER, {column}))"
            ),
        }
    }

    fn calendar(&self, axis: &QueryAxis) -> CalendarSql {
        let declaration = format!(
            "DECLARE @startDate DATE\nDECLARE @endDate DATE\nSET @startDate = {start}\nSET @endDate = {end}\n\nDECLARE @dateAxis TABLE\n(\n    dt DATE\n)\n\nDECLARE @currentDate DATE = @startDate\nWHILE @currentDate <= @endDate\nBEGIN\n    INSERT INTO @dateAxis SELECT @currentDate\n    SET @currentDate = DATEADD({unit}, 1, @currentDate)\nEND\n",
            start = axis.start_date,
            end = axis.end_date,
            unit = axis.increment,
        );
        CalendarSql {
            declaration,
            relation: "@dateAxis axis".to_string(),
            column: "axis.dt".to_string(),
        }
    }

    fn build_pivot_only(
        &self,
        request: &AggregateRequest<'_>,
        non_pivot: &CustomLine,
    ) -> Result<String> {
        let pivot = PivotColumns::from_request(request)?;
        let discovery = layout::discovery_sql(request, self)?;
        let template = layout::pivot_only_template(request, non_pivot)?;
        Ok([
            self.pivot_values_table(&discovery),
            self.case_columns_variable(&pivot),
            self.execute_template(&template),
        ]
        .join("\n\n"))
    }

    fn build_pivot_and_axis(&self, request: &AggregateRequest<'_>) -> Result<String> {
        let pivot = PivotColumns::from_request(request)?;
        let discovery = layout::discovery_sql(request, self)?;
        let axis = layout::prepare_axis(request, self)?;
        let calendar = self.calendar(&axis.axis);

        let mut template = layout::pivot_axis_template(&axis, &calendar, self)?;
        template.prepend_sql(format!("{}\n", calendar.declaration));

        Ok([
            self.pivot_values_table(&discovery),
            self.case_columns_variable(&pivot),
            self.dataset_columns_variable(),
            self.execute_template(&template),
        ]
        .join("\n\n"))
    }

    fn pivot_values_sql(&self, request: &AggregateRequest<'_>) -> Result<String> {
        layout::discovery_sql(request, self)
    }

    fn build_pivot_with_values(
        &self,
        request: &AggregateRequest<'_>,
        values: &[String],
    ) -> Result<String> {
        layout::static_pivot(request, values, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MsSqlAggregateBuilder {
        MsSqlAggregateBuilder::new(&ResolvedEngineConfig::default())
    }

    #[test]
    fn date_parts() {
        let b = builder();
        assert_eq!(b.date_part_of_column(AxisIncrement::Year, "dt"), "YEAR(dt)");
        assert_eq!(
            b.date_part_of_column(AxisIncrement::Month, "dt"),
            "CONVERT(NVARCHAR(7), dt, 126)"
        );
        assert_eq!(b.date_part_of_column(AxisIncrement::Day, "dt"), "CONVERT(DATE, dt)");
        assert_eq!(
            b.date_part_of_column(AxisIncrement::Quarter, "dt"),
            "CONVERT(NVARCHAR(4), YEAR(dt)) + 'Q' + CONVERT(NVARCHAR(1), DATEPART(QUARTER, dt))"
        );
    }

    #[test]
    fn calendar_steps_by_increment() {
        let axis = QueryAxis::new("'2015-01-01'", "GETDATE()", AxisIncrement::Quarter);
        let calendar = builder().calendar(&axis);
        assert!(calendar.declaration.contains("SET @startDate = '2015-01-01'"));
        assert!(calendar.declaration.contains("SET @endDate = GETDATE()"));
        assert!(calendar
            .declaration
            .contains("DATEADD(quarter, 1, @currentDate)"));
        assert_eq!(calendar.relation, "@dateAxis axis");
    }

    #[test]
    fn dynamic_sql_escapes_literal_parts() {
        let template = PivotTemplate {
            parts: vec![
                TemplatePart::Sql("SELECT 'a'".to_string()),
                TemplatePart::CaseColumns,
            ],
        };
        let sql = builder().execute_template(&template);
        assert!(sql.contains("N'SELECT ''a'''"));
        assert!(sql.contains("ISNULL(N', ' + @CaseColumns, N'')"));
        assert!(sql.ends_with("EXECUTE(@Query)"));
    }
}
