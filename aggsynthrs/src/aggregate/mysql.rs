//! MySQL aggregates.
//!
//! Calendars are temporary tables filled from a derived numbers table.
//! Dynamic pivots stage the discovered values in a temporary table, build the
//! column lists with `GROUP_CONCAT` and run the final query as a prepared
//! statement.

use super::layout::{self, CalendarSql, PivotColumns, PivotTemplate, TemplatePart};
use super::AggregateBuilder;
use crate::axis::{AxisIncrement, QueryAxis};
use crate::config::{AggregateDefaults, MySqlConfig, ResolvedEngineConfig};
use crate::engine::DatabaseType;
use crate::error::Result;
use crate::fragment::CustomLine;
use crate::request::AggregateRequest;
use crate::syntax::{MySqlSyntax, QuerySyntaxHelper};

#[derive(Debug, Clone)]
pub struct MySqlAggregateBuilder {
    defaults: AggregateDefaults,
    options: MySqlConfig,
}

/// `SELECT 0 n UNION SELECT <step> ... UNION SELECT <9 * step>`
fn digits(step: u32) -> String {
    (0..10)
        .map(|n| {
            if n == 0 {
                "SELECT 0 n".to_string()
            } else {
                format!("SELECT {}", n * step)
            }
        })
        .collect::<Vec<_>>()
        .join(" UNION ")
}

impl MySqlAggregateBuilder {
    pub fn new(config: &ResolvedEngineConfig) -> Self {
        Self {
            defaults: config.aggregate.clone(),
            options: config.mysql.clone(),
        }
    }

    fn pivot_values_table(&self, discovery: &str) -> String {
        format!(
            "SET SESSION group_concat_max_len = {};\n\nDROP TEMPORARY TABLE IF EXISTS pivotValues;\n\nCREATE TEMPORARY TABLE pivotValues\n(\n    ord INT AUTO_INCREMENT PRIMARY KEY,\n    piv TEXT\n);\n\nINSERT INTO pivotValues (piv)\n{discovery};",
            self.options.group_concat_max_len
        )
    }

    fn case_columns_variable(&self, pivot: &PivotColumns) -> String {
        let syntax = MySqlSyntax;
        let (head, tail) = pivot.case_parts();
        format!(
            "SET @columnsSelectCases = NULL;\nSELECT GROUP_CONCAT(\n    CONCAT('{}''', REPLACE(REPLACE(piv, '\\\\', '\\\\\\\\'), '\\'', '\\\\\\''), '''{} AS `', REPLACE(piv, '`', '``'), '`')\n    ORDER BY ord SEPARATOR ', '\n) INTO @columnsSelectCases\nFROM pivotValues;",
            syntax.escape(&head),
            syntax.escape(&tail)
        )
    }

    fn dataset_columns_variable(&self) -> String {
        "SET @columnsSelectFromDataset = NULL;\nSELECT GROUP_CONCAT(\n    CONCAT('COALESCE(dataset.`', REPLACE(piv, '`', '``'), '`, 0) AS `', REPLACE(piv, '`', '``'), '`')\n    ORDER BY ord SEPARATOR ', '\n) INTO @columnsSelectFromDataset\nFROM pivotValues;".to_string()
    }

    fn execute_template(&self, template: &PivotTemplate) -> String {
        let syntax = MySqlSyntax;
        let pieces: Vec<String> = template
            .parts
            .iter()
            .map(|part| match part {
                TemplatePart::Sql(sql) => syntax.string_literal(sql),
                TemplatePart::CaseColumns => {
                    "IFNULL(CONCAT(', ', @columnsSelectCases), '')".to_string()
                }
                TemplatePart::DatasetColumns => {
                    "IFNULL(CONCAT(', ', @columnsSelectFromDataset), '')".to_string()
                }
            })
            .collect();
        format!(
            "SET @sql = CONCAT(\n    {}\n);\n\nPREPARE stmt FROM @sql;\nEXECUTE stmt;\nDEALLOCATE PREPARE stmt;",
            pieces.join(",\n    ")
        )
    }
}

impl AggregateBuilder for MySqlAggregateBuilder {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn defaults(&self) -> &AggregateDefaults {
        &self.defaults
    }

    fn date_part_of_column(&self, increment: AxisIncrement, column: &str) -> String {
        match increment {
            AxisIncrement::Day => format!("DATE({column})"),
            AxisIncrement::Month => format!("DATE_FORMAT({column}, '%Y-%m')"),
            AxisIncrement::Year => format!("DATE_FORMAT({column}, '%Y')"),
            AxisIncrement::Quarter => format!("CONCAT(YEAR({column}), 'Q', QUARTER({column}))"),
        }
    }

    fn calendar(&self, axis: &QueryAxis) -> CalendarSql {
        // Four digit places cover 27 years of days; coarser steps need three.
        let (thousands, thousands_join) = if axis.increment == AxisIncrement::Day {
            (
                " + thousands.n",
                format!("\n    JOIN ({}) thousands", digits(1000)),
            )
        } else {
            ("", String::new())
        };
        let unit = axis.increment.to_string().to_uppercase();

        let declaration = format!(
            "SET @startDate = {start};\nSET @endDate = {end};\n\nDROP TEMPORARY TABLE IF EXISTS dateAxis;\n\nCREATE TEMPORARY TABLE dateAxis\n(\n    dt DATE\n);\n\nINSERT INTO dateAxis\nSELECT DISTINCT (@startDate + INTERVAL c.number {unit}) AS dt\nFROM (\n    SELECT singles.n + tens.n + hundreds.n{thousands} AS number\n    FROM ({singles}) singles\n    JOIN ({tens}) tens\n    JOIN ({hundreds}) hundreds{thousands_join}\n) c;\n\nDELETE FROM dateAxis WHERE dt > @endDate;\n",
            start = axis.start_date,
            end = axis.end_date,
            singles = digits(1),
            tens = digits(10),
            hundreds = digits(100),
        );
        CalendarSql {
            declaration,
            relation: "dateAxis axis".to_string(),
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
        let template = layout::pivot_axis_template(&axis, &calendar, self)?;

        Ok([
            calendar.declaration.clone(),
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
