//! Pure line rewrites used while assembling axis and pivot aggregates.

use super::AggregateBuilder;
use crate::error::{AggsynthError, Result};
use crate::request::{AggregateRequest, Slot};

fn trailing_comma(had_comma: bool) -> &'static str {
    if had_comma {
        ","
    } else {
        ""
    }
}

/// Replace the axis SELECT and GROUP BY lines with the date-part expression
/// of the axis column; the SELECT is re-aliased to `alias`.
///
/// Trailing commas survive the rewrite. The input request is not modified.
pub fn rewrite_axis_column<'s, B: AggregateBuilder + ?Sized>(
    request: &AggregateRequest<'s>,
    alias: &str,
    builder: &B,
) -> Result<AggregateRequest<'s>> {
    let syntax = request.syntax();
    let axis = request.axis().ok_or_else(|| {
        AggsynthError::Validation("axis column rewriting requires an axis descriptor".to_string())
    })?;
    let select = request.require(Slot::AxisSelect, "axis column rewriting")?;
    let group_by = request.require(Slot::AxisGroupBy, "axis column rewriting")?;

    let column = select.text_without_alias(syntax)?;
    let date_part = builder.date_part_of_column(axis.increment, &column);

    let select_line = select.with_text(format!(
        "{date_part} AS {}{}",
        syntax.ensure_wrapped(alias),
        trailing_comma(select.ends_with_comma())
    ));
    let group_line = group_by.with_text(format!(
        "{date_part}{}",
        trailing_comma(group_by.ends_with_comma())
    ));

    request
        .replace_slot(Slot::AxisSelect, select_line)?
        .replace_slot(Slot::AxisGroupBy, group_line)
}

/// Re-emit the line in `slot` as `<expr> AS <alias>`, keeping any trailing comma.
pub fn realias_line<'s>(
    request: &AggregateRequest<'s>,
    slot: Slot,
    alias: &str,
) -> Result<AggregateRequest<'s>> {
    let syntax = request.syntax();
    let line = request.require(slot, "re-aliasing")?;
    let expr = line.text_without_alias(syntax)?;
    let rewritten = line.with_text(format!(
        "{expr} AS {}{}",
        syntax.ensure_wrapped(alias),
        trailing_comma(line.ends_with_comma())
    ));
    request.replace_slot(slot, rewritten)
}

/// Strip a leading `ORDER BY` keyword from a TopX ordering line.
pub(crate) fn order_by_expression(text: &str) -> &str {
    let trimmed = text.trim();
    strip_keyword(trimmed, "order")
        .and_then(|rest| strip_keyword(rest, "by"))
        .unwrap_or(trimmed)
}

/// `text` after a leading case-insensitive `keyword` and the whitespace
/// following it; `None` unless the keyword is a whole word.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    let rest = &text[keyword.len()..];
    let separated = rest.is_empty() || rest.starts_with(char::is_whitespace);
    (head.eq_ignore_ascii_case(keyword) && separated).then(|| rest.trim_start())
}

/// A single aggregate function call such as `count(DISTINCT id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCall {
    pub function: String,
    pub distinct: bool,
    pub argument: String,
}

impl AggregateCall {
    pub fn parse(sql: &str) -> Result<Self> {
        let sql = sql.trim();
        let invalid = || {
            AggsynthError::Validation(format!(
                "count column '{sql}' must be a single aggregate call such as count(*) or sum(x)"
            ))
        };

        let open = sql.find('(').ok_or_else(invalid)?;
        let function = sql[..open].trim();
        if function.is_empty()
            || !function
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(invalid());
        }
        if !sql.ends_with(')') || matching_paren(sql, open) != Some(sql.len() - 1) {
            return Err(invalid());
        }

        let inner = sql[open + 1..sql.len() - 1].trim();
        let (distinct, argument) = match inner.get(..9) {
            Some(head) if head.eq_ignore_ascii_case("distinct ") => (true, inner[9..].trim()),
            _ => (false, inner),
        };
        if argument.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            function: function.to_string(),
            distinct,
            argument: argument.to_string(),
        })
    }

    /// Text before and after the pivot value literal in
    /// `fn(CASE WHEN pivot = <value> THEN arg ELSE NULL END)`.
    pub fn case_parts(&self, pivot: &str) -> (String, String) {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let argument = if self.argument == "*" {
            "1"
        } else {
            self.argument.as_str()
        };
        (
            format!("{}({distinct}CASE WHEN {pivot} = ", self.function),
            format!(" THEN {argument} ELSE NULL END)"),
        )
    }
}

/// Byte index of the parenthesis closing the one at `open`, skipping quoted text.
fn matching_paren(sql: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    for (i, b) in sql.bytes().enumerate().skip(open) {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MsSqlAggregateBuilder;
    use crate::axis::{AxisIncrement, QueryAxis};
    use crate::config::ResolvedEngineConfig;
    use crate::fragment::{CustomLine, CustomLineRole, QueryComponent};
    use crate::syntax::MsSqlSyntax;

    fn axis_request(syntax: &MsSqlSyntax) -> AggregateRequest<'_> {
        let lines = vec![
            CustomLine::new("SELECT", QueryComponent::Select),
            CustomLine::new("count(*) AS n,", QueryComponent::QueryTimeColumn)
                .with_role(CustomLineRole::CountFunction),
            CustomLine::new("t.dt AS d", QueryComponent::QueryTimeColumn)
                .with_role(CustomLineRole::Axis),
            CustomLine::new("FROM t", QueryComponent::From),
            CustomLine::new("GROUP BY", QueryComponent::GroupBy),
            CustomLine::new("t.dt", QueryComponent::GroupBy).with_role(CustomLineRole::Axis),
        ];
        let axis = QueryAxis::new("'2001-01-01'", "'2010-01-01'", AxisIncrement::Year);
        AggregateRequest::new(lines, Some(axis), syntax).unwrap()
    }

    #[test]
    fn rewrites_axis_select_and_group_by() {
        let syntax = MsSqlSyntax;
        let request = axis_request(&syntax);
        let builder = MsSqlAggregateBuilder::new(&ResolvedEngineConfig::default());

        let rewritten = rewrite_axis_column(&request, "joinDt", &builder).unwrap();
        assert_eq!(
            rewritten.axis_select().unwrap().unwrap().text(),
            "YEAR(t.dt) AS [joinDt]"
        );
        assert_eq!(rewritten.axis_group_by().unwrap().unwrap().text(), "YEAR(t.dt)");
        assert_eq!(request.axis_select().unwrap().unwrap().text(), "t.dt AS d");
    }

    #[test]
    fn realias_keeps_trailing_comma() {
        let syntax = MsSqlSyntax;
        let request = axis_request(&syntax);
        let rewritten = realias_line(&request, Slot::CountSelect, "MyCount").unwrap();
        assert_eq!(
            rewritten.count_select().unwrap().unwrap().text(),
            "count(*) AS [MyCount],"
        );
    }

    #[test]
    fn parses_aggregate_calls() {
        let call = AggregateCall::parse("count(*)").unwrap();
        assert_eq!(call.function, "count");
        assert_eq!(call.argument, "*");
        assert!(!call.distinct);

        let call = AggregateCall::parse("COUNT(DISTINCT t.id)").unwrap();
        assert!(call.distinct);
        assert_eq!(call.argument, "t.id");

        let call = AggregateCall::parse("sum(coalesce(x, ')'))").unwrap();
        assert_eq!(call.argument, "coalesce(x, ')')");

        assert!(AggregateCall::parse("count(*) + 1").is_err());
        assert!(AggregateCall::parse("42").is_err());
        assert!(AggregateCall::parse("count()").is_err());
    }

    #[test]
    fn case_parts_substitute_star() {
        let call = AggregateCall::parse("count(*)").unwrap();
        let (head, tail) = call.case_parts("cat");
        assert_eq!(
            format!("{head}'T'{tail}"),
            "count(CASE WHEN cat = 'T' THEN 1 ELSE NULL END)"
        );
    }

    #[test]
    fn strips_order_by_keyword() {
        assert_eq!(order_by_expression("ORDER BY sum(x) DESC"), "sum(x) DESC");
        assert_eq!(order_by_expression("order by  a"), "a");
        assert_eq!(order_by_expression("count(*) DESC"), "count(*) DESC");
        assert_eq!(order_by_expression("ORDER\nBY count(*) ASC"), "count(*) ASC");
        assert_eq!(order_by_expression("Order\t By x"), "x");
        assert_eq!(order_by_expression("ordered_at DESC"), "ordered_at DESC");
        assert_eq!(order_by_expression("order byname"), "order byname");
    }
}
