//! Statement layouts shared by every dialect: the calendar LEFT JOIN for axis
//! aggregates, pivot value discovery and the pivot column templates.

use super::rewrite::{order_by_expression, realias_line, rewrite_axis_column, AggregateCall};
use super::{non_pivot_column, AggregateBuilder};
use crate::axis::QueryAxis;
use crate::error::{AggsynthError, Result};
use crate::fragment::{CustomLine, CustomLineRole, QueryComponent};
use crate::request::{AggregateRequest, Slot};
use crate::syntax::QuerySyntaxHelper;

/// How a dialect materializes the calendar an axis aggregate joins against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSql {
    /// Statements or CTE emitted ahead of the final SELECT (may be empty).
    pub declaration: String,
    /// Relation reference for the FROM clause, already aliased `axis`.
    pub relation: String,
    /// Date column of the relation.
    pub column: String,
}

/// An axis request after the axis and count columns have been re-aliased.
pub(crate) struct AxisLayout<'s> {
    pub request: AggregateRequest<'s>,
    pub axis: QueryAxis,
    pub axis_alias: String,
    pub count_alias: String,
}

pub(crate) fn prepare_axis<'s, B: AggregateBuilder + ?Sized>(
    request: &AggregateRequest<'s>,
    builder: &B,
) -> Result<AxisLayout<'s>> {
    let syntax = request.syntax();
    let axis = request
        .axis()
        .ok_or_else(|| {
            AggsynthError::Validation("axis aggregates require an axis descriptor".to_string())
        })?
        .clone();
    let axis_select = request.require(Slot::AxisSelect, "an axis aggregate")?;
    let count = request.require(Slot::CountSelect, "an axis aggregate")?;

    if let Some((start, end)) = axis.literal_bounds() {
        if start > end {
            tracing::warn!(
                start = %start,
                end = %end,
                "axis starts after it ends; calendar will be empty"
            );
        }
    }

    let defaults = builder.defaults();
    let axis_alias = axis_select
        .alias(syntax)?
        .unwrap_or_else(|| defaults.axis_alias.clone());
    let count_alias = count
        .alias(syntax)?
        .unwrap_or_else(|| defaults.count_alias.clone());

    let rewritten = rewrite_axis_column(request, &axis_alias, builder)?;
    let rewritten = realias_line(&rewritten, Slot::CountSelect, &count_alias)?;

    Ok(AxisLayout {
        request: rewritten,
        axis,
        axis_alias: syntax.ensure_wrapped(&axis_alias),
        count_alias: syntax.ensure_wrapped(&count_alias),
    })
}

pub(crate) fn render_axis_join<B: AggregateBuilder + ?Sized>(
    layout: &AxisLayout<'_>,
    calendar: &CalendarSql,
    builder: &B,
) -> String {
    let bucket = builder.date_part_of_column(layout.axis.increment, &calendar.column);
    let body = layout
        .request
        .join_lines(|line| line.location().is_aggregate_body());
    let select = format!(
        "SELECT\n{bucket} AS {alias},\ndataset.{count}\nFROM\n{relation}\nLEFT JOIN\n(\n{body}\n) dataset\nON dataset.{alias} = {bucket}\nORDER BY\n{bucket}",
        alias = layout.axis_alias,
        count = layout.count_alias,
        relation = calendar.relation,
    );
    join_sections([calendar.declaration.as_str(), select.as_str()])
}

/// Newline-join the non-empty sections.
pub(crate) fn join_sections<'a>(sections: impl IntoIterator<Item = &'a str>) -> String {
    sections
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn select_keyword(request: &AggregateRequest<'_>) -> String {
    let select = request.join_lines(|line| {
        line.location() == QueryComponent::Select && line.role() != CustomLineRole::TopX
    });
    if select.is_empty() {
        "SELECT".to_string()
    } else {
        select
    }
}

/// Pivot column expression and the aggregate spread across its values.
pub(crate) struct PivotColumns {
    pub pivot: String,
    pub call: AggregateCall,
}

impl PivotColumns {
    pub fn from_request(request: &AggregateRequest<'_>) -> Result<Self> {
        let syntax = request.syntax();
        let pivot = request
            .require(Slot::PivotSelect, "a pivot aggregate")?
            .text_without_alias(syntax)?;
        let count = request
            .require(Slot::CountSelect, "a pivot aggregate")?
            .text_without_alias(syntax)?;
        Ok(Self {
            pivot,
            call: AggregateCall::parse(&count)?,
        })
    }

    /// Text around the value literal of one pivot cell. Cells with no
    /// matching rows read 0.
    pub fn case_parts(&self) -> (String, String) {
        let (head, tail) = self.call.case_parts(&self.pivot);
        (format!("COALESCE({head}"), format!("{tail}, 0)"))
    }

    pub fn case_column(&self, syntax: &dyn QuerySyntaxHelper, value: &str) -> String {
        let (head, tail) = self.case_parts();
        format!(
            "{head}{}{tail} AS {}",
            syntax.string_literal(value),
            syntax.wrap(value)
        )
    }

    pub fn dataset_column(syntax: &dyn QuerySyntaxHelper, value: &str) -> String {
        let column = syntax.wrap(value);
        format!("COALESCE(dataset.{column}, 0) AS {column}")
    }
}

/// Query returning the distinct non-empty pivot values in a column `piv`,
/// ordered most significant first.
pub(crate) fn discovery_sql<B: AggregateBuilder + ?Sized>(
    request: &AggregateRequest<'_>,
    builder: &B,
) -> Result<String> {
    let syntax = request.syntax();
    let pivot = PivotColumns::from_request(request)?;
    let count = request
        .require(Slot::CountSelect, "pivot value discovery")?
        .text_without_alias(syntax)?;
    let p = &pivot.pivot;

    let mut sections = vec!["SELECT".to_string()];
    if let Some(top) = request.top_x_select()? {
        sections.push(top.text().to_string());
    }
    sections.push(format!("{p} AS piv"));

    let keep_filter_line = |line: &CustomLine| {
        !matches!(line.role(), CustomLineRole::Axis | CustomLineRole::TopX)
    };
    sections.push(request.join_lines(|line| {
        (QueryComponent::From..=QueryComponent::Where).contains(&line.location())
            && keep_filter_line(line)
    }));

    let has_where = request
        .any_line(|line| line.location() == QueryComponent::Where && keep_filter_line(line));
    let mut filter = format!(
        "{} {p} IS NOT NULL AND {p} <> ''",
        if has_where { "AND" } else { "WHERE" }
    );
    if let Some(axis) = request.axis() {
        let column = request
            .require(Slot::AxisSelect, "pivot value discovery")?
            .text_without_alias(syntax)?;
        let bucket = |sql: &str| builder.date_part_of_column(axis.increment, sql);
        filter.push_str(&format!(
            " AND {} BETWEEN {} AND {}",
            bucket(&column),
            bucket(&axis.start_date),
            bucket(&axis.end_date)
        ));
    }
    sections.push(filter);

    sections.push(format!("GROUP BY\n{p}"));
    sections.push(request.join_lines(|line| line.location() == QueryComponent::Having));

    let order = match request.top_x_order_by()? {
        Some(line) => order_by_expression(line.text()).to_string(),
        None => format!("{count} DESC, {p}"),
    };
    sections.push(format!("ORDER BY\n{order}"));
    if let Some(postfix) = request.top_x_postfix()? {
        sections.push(postfix.text().to_string());
    }

    Ok(join_sections(sections.iter().map(String::as_str)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TemplatePart {
    Sql(String),
    /// Comma-prefixed list of per-value aggregate columns.
    CaseColumns,
    /// Comma-prefixed list of `COALESCE(dataset.<v>, 0)` columns.
    DatasetColumns,
}

/// Final pivot statement with holes for the generated column lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PivotTemplate {
    pub parts: Vec<TemplatePart>,
}

impl PivotTemplate {
    pub fn prepend_sql(&mut self, sql: String) {
        if !sql.is_empty() {
            self.parts.insert(0, TemplatePart::Sql(sql));
        }
    }

    pub fn render_static(&self, case_columns: &[String], dataset_columns: &[String]) -> String {
        let list = |columns: &[String]| {
            if columns.is_empty() {
                String::new()
            } else {
                format!(",\n{}", columns.join(",\n"))
            }
        };
        self.parts
            .iter()
            .map(|part| match part {
                TemplatePart::Sql(sql) => sql.clone(),
                TemplatePart::CaseColumns => list(case_columns),
                TemplatePart::DatasetColumns => list(dataset_columns),
            })
            .collect()
    }
}

/// `SELECT <non-pivot>, <case columns> FROM .. GROUP BY <non-pivot> ..`
pub(crate) fn pivot_only_template(
    request: &AggregateRequest<'_>,
    non_pivot: &CustomLine,
) -> Result<PivotTemplate> {
    let syntax = request.syntax();
    let not_top_x = |line: &CustomLine| line.role() != CustomLineRole::TopX;

    let head = format!(
        "{}\n{}",
        select_keyword(request),
        non_pivot.text_without_trailing_comma()
    );

    let from = request.join_lines(|line| {
        (QueryComponent::From..QueryComponent::GroupBy).contains(&line.location())
            && not_top_x(line)
    });
    let group_by = format!("GROUP BY\n{}", non_pivot.text_without_alias(syntax)?);
    let having = request.join_lines(|line| line.location() == QueryComponent::Having);
    let trailer = request.join_lines(|line| {
        matches!(line.location(), QueryComponent::OrderBy | QueryComponent::Postfix)
            && not_top_x(line)
    });
    let tail = join_sections([
        from.as_str(),
        group_by.as_str(),
        having.as_str(),
        trailer.as_str(),
    ]);

    Ok(PivotTemplate {
        parts: vec![
            TemplatePart::Sql(head),
            TemplatePart::CaseColumns,
            TemplatePart::Sql(format!("\n{tail}")),
        ],
    })
}

/// Calendar LEFT JOIN whose inner dataset is grouped by the axis bucket and
/// spread across the pivot values.
pub(crate) fn pivot_axis_template<B: AggregateBuilder + ?Sized>(
    layout: &AxisLayout<'_>,
    calendar: &CalendarSql,
    builder: &B,
) -> Result<PivotTemplate> {
    let request = &layout.request;
    let bucket = builder.date_part_of_column(layout.axis.increment, &calendar.column);
    let axis_select = request.require(Slot::AxisSelect, "a pivot axis aggregate")?;
    let axis_group_by = request.require(Slot::AxisGroupBy, "a pivot axis aggregate")?;

    for ignored in request
        .lines()
        .iter()
        .filter(|line| line.is_in(QueryComponent::QueryTimeColumn, CustomLineRole::None))
    {
        tracing::warn!(column = ignored.text(), "column ignored by pivot axis aggregate");
    }

    let head = format!("SELECT\n{bucket} AS {}", layout.axis_alias);
    let inner_head = format!(
        "\nFROM\n{}\nLEFT JOIN\n(\n{}\n{}",
        calendar.relation,
        select_keyword(request),
        axis_select.text_without_trailing_comma()
    );

    let from = request.join_lines(|line| {
        (QueryComponent::From..=QueryComponent::Where).contains(&line.location())
            && line.role() != CustomLineRole::TopX
    });
    let group_by = format!("GROUP BY\n{}", axis_group_by.text_without_trailing_comma());
    let having = request.join_lines(|line| line.location() == QueryComponent::Having);
    let outer = format!(
        ") dataset\nON dataset.{alias} = {bucket}\nORDER BY\n{bucket}",
        alias = layout.axis_alias
    );
    let tail = join_sections([
        from.as_str(),
        group_by.as_str(),
        having.as_str(),
        outer.as_str(),
    ]);

    Ok(PivotTemplate {
        parts: vec![
            TemplatePart::Sql(head),
            TemplatePart::DatasetColumns,
            TemplatePart::Sql(inner_head),
            TemplatePart::CaseColumns,
            TemplatePart::Sql(format!("\n{tail}")),
        ],
    })
}

/// Pivot statement with one column per entry of `values`, in the given order.
pub(crate) fn static_pivot<B: AggregateBuilder + ?Sized>(
    request: &AggregateRequest<'_>,
    values: &[String],
    builder: &B,
) -> Result<String> {
    let syntax = request.syntax();
    let pivot = PivotColumns::from_request(request)?;

    let values: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .collect();
    tracing::debug!(values = values.len(), "rendering pivot with known values");
    let case_columns: Vec<String> = values
        .iter()
        .map(|v| pivot.case_column(syntax, v))
        .collect();

    if request.axis().is_none() {
        let non_pivot = non_pivot_column(request)?;
        return Ok(pivot_only_template(request, non_pivot)?.render_static(&case_columns, &[]));
    }

    let layout = prepare_axis(request, builder)?;
    let calendar = builder.calendar(&layout.axis);
    let dataset_columns: Vec<String> = values
        .iter()
        .map(|v| PivotColumns::dataset_column(syntax, v))
        .collect();
    let body = pivot_axis_template(&layout, &calendar, builder)?
        .render_static(&case_columns, &dataset_columns);
    Ok(join_sections([calendar.declaration.as_str(), body.as_str()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PostgresAggregateBuilder;
    use crate::config::ResolvedEngineConfig;
    use crate::syntax::PostgresSyntax;

    fn request(syntax: &PostgresSyntax) -> AggregateRequest<'_> {
        let lines = vec![
            CustomLine::new("SELECT", QueryComponent::Select),
            CustomLine::new("count(*) AS n,", QueryComponent::QueryTimeColumn)
                .with_role(CustomLineRole::CountFunction),
            CustomLine::new("category,", QueryComponent::QueryTimeColumn)
                .with_role(CustomLineRole::Pivot),
            CustomLine::new("region", QueryComponent::QueryTimeColumn),
            CustomLine::new("FROM sales", QueryComponent::From),
            CustomLine::new("WHERE amount > 0", QueryComponent::Where),
            CustomLine::new("GROUP BY", QueryComponent::GroupBy),
            CustomLine::new("category, region", QueryComponent::GroupBy),
        ];
        AggregateRequest::new(lines, None, syntax).unwrap()
    }

    #[test]
    fn discovery_extends_existing_where() {
        let syntax = PostgresSyntax;
        let builder = PostgresAggregateBuilder::new(&ResolvedEngineConfig::default());
        let sql = discovery_sql(&request(&syntax), &builder).unwrap();
        assert_eq!(
            sql,
            "SELECT\ncategory AS piv\nFROM sales\nWHERE amount > 0\nAND category IS NOT NULL AND category <> ''\nGROUP BY\ncategory\nORDER BY\ncount(*) DESC, category"
        );
    }

    #[test]
    fn static_template_without_values_has_no_dangling_comma() {
        let syntax = PostgresSyntax;
        let request = request(&syntax);
        let non_pivot = non_pivot_column(&request).unwrap();
        let template = pivot_only_template(&request, non_pivot).unwrap();

        let empty = template.render_static(&[], &[]);
        assert!(empty.starts_with("SELECT\nregion\nFROM sales"));
        assert!(!empty.contains(",\n"));

        let one = template.render_static(&["x AS \"T\"".to_string()], &[]);
        assert!(one.starts_with("SELECT\nregion,\nx AS \"T\"\nFROM sales"));
        assert!(one.ends_with("GROUP BY\nregion"));
    }

    #[test]
    fn case_column_defaults_to_zero() {
        let pivot = PivotColumns {
            pivot: "category".to_string(),
            call: AggregateCall::parse("sum(amount)").unwrap(),
        };
        assert_eq!(
            pivot.case_column(&PostgresSyntax, "T"),
            "COALESCE(sum(CASE WHEN category = 'T' THEN amount ELSE NULL END), 0) AS \"T\""
        );
    }

    #[test]
    fn dataset_column_defaults_to_zero() {
        assert_eq!(
            PivotColumns::dataset_column(&PostgresSyntax, "T"),
            "COALESCE(dataset.\"T\", 0) AS \"T\""
        );
    }
}
