//! Tagged SQL fragments that callers assemble into an aggregate query.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::syntax::QuerySyntaxHelper;

/// Where a line is inserted. Declaration order is significant: range checks
/// such as "everything from SELECT through HAVING" compare variants directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryComponent {
    Select,
    QueryTimeColumn,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Postfix,
    /// Sorts after the statement clauses; not part of aggregate assembly.
    JoinInfoJoin,
    /// Used by UPDATE assembly only.
    Set,
}

impl QueryComponent {
    /// True for the clauses that make up a full SELECT .. HAVING pipeline.
    pub fn is_aggregate_body(self) -> bool {
        (QueryComponent::Select..=QueryComponent::Having).contains(&self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomLineRole {
    #[default]
    None,
    CountFunction,
    Axis,
    Pivot,
    TopX,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomLine {
    text: String,
    location: QueryComponent,
    role: CustomLineRole,
}

impl<'de> Deserialize<'de> for CustomLine {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            text: String,
            location: QueryComponent,
            #[serde(default)]
            role: CustomLineRole,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(CustomLine::new(raw.text, raw.location).with_role(raw.role))
    }
}

impl CustomLine {
    pub fn new(text: impl Into<String>, location: QueryComponent) -> Self {
        Self {
            text: text.into().trim().to_string(),
            location,
            role: CustomLineRole::None,
        }
    }

    pub fn with_role(mut self, role: CustomLineRole) -> Self {
        self.role = role;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn location(&self) -> QueryComponent {
        self.location
    }

    pub fn role(&self) -> CustomLineRole {
        self.role
    }

    /// Copy of this line carrying new text; location and role are kept.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self::new(text, self.location).with_role(self.role)
    }

    pub fn ends_with_comma(&self) -> bool {
        self.text.ends_with(',')
    }

    pub fn text_without_trailing_comma(&self) -> &str {
        self.text.trim_end_matches(|c: char| c == ',' || c.is_whitespace())
    }

    pub fn text_without_alias(&self, syntax: &dyn QuerySyntaxHelper) -> Result<String> {
        Ok(syntax.split_select_and_alias(&self.text)?.0)
    }

    pub fn alias(&self, syntax: &dyn QuerySyntaxHelper) -> Result<Option<String>> {
        Ok(syntax.split_select_and_alias(&self.text)?.1)
    }

    pub fn is_in(&self, location: QueryComponent, role: CustomLineRole) -> bool {
        self.location == location && self.role == role
    }
}

/// Typed SELECT-list item. Renders to a `QueryTimeColumn` line with the alias
/// wrapped for the target dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub role: CustomLineRole,
}

impl SelectItem {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: None,
            role: CustomLineRole::None,
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_role(mut self, role: CustomLineRole) -> Self {
        self.role = role;
        self
    }

    pub fn into_line(self, syntax: &dyn QuerySyntaxHelper, trailing_comma: bool) -> CustomLine {
        let comma = if trailing_comma { "," } else { "" };
        let text = match &self.alias {
            Some(alias) => format!(
                "{} AS {}{comma}",
                self.expr.trim(),
                syntax.ensure_wrapped(alias)
            ),
            None => format!("{}{comma}", self.expr.trim()),
        };
        CustomLine::new(text, QueryComponent::QueryTimeColumn).with_role(self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{MsSqlSyntax, MySqlSyntax};

    #[test]
    fn text_is_trimmed() {
        let line = CustomLine::new("  count(*) AS n,\n", QueryComponent::QueryTimeColumn);
        assert_eq!(line.text(), "count(*) AS n,");
        assert!(line.ends_with_comma());
        assert_eq!(line.text_without_trailing_comma(), "count(*) AS n");
    }

    #[test]
    fn alias_round_trip() {
        let line = CustomLine::new("UPPER('a') as a", QueryComponent::QueryTimeColumn);
        assert_eq!(line.text_without_alias(&MsSqlSyntax).unwrap(), "UPPER('a')");
        assert_eq!(line.alias(&MsSqlSyntax).unwrap().as_deref(), Some("a"));

        let unaliased = CustomLine::new("UPPER('a')", QueryComponent::QueryTimeColumn);
        assert_eq!(unaliased.text_without_alias(&MsSqlSyntax).unwrap(), "UPPER('a')");
        assert_eq!(unaliased.alias(&MsSqlSyntax).unwrap(), None);
    }

    #[test]
    fn component_order_matches_statement_order() {
        assert!(QueryComponent::Select < QueryComponent::QueryTimeColumn);
        assert!(QueryComponent::Having < QueryComponent::OrderBy);
        assert!(QueryComponent::Postfix < QueryComponent::JoinInfoJoin);
        assert!(QueryComponent::Having.is_aggregate_body());
        assert!(!QueryComponent::OrderBy.is_aggregate_body());
        assert!(!QueryComponent::JoinInfoJoin.is_aggregate_body());
    }

    #[test]
    fn with_text_keeps_tags() {
        let line = CustomLine::new("dt", QueryComponent::GroupBy).with_role(CustomLineRole::Axis);
        let rewritten = line.with_text("YEAR(dt)");
        assert_eq!(rewritten.text(), "YEAR(dt)");
        assert!(rewritten.is_in(QueryComponent::GroupBy, CustomLineRole::Axis));
        assert_eq!(line.text(), "dt");
    }

    #[test]
    fn select_item_wraps_alias() {
        let line = SelectItem::new("count(*)")
            .aliased("MyCount")
            .with_role(CustomLineRole::CountFunction)
            .into_line(&MySqlSyntax, true);
        assert_eq!(line.text(), "count(*) AS `MyCount`,");
        assert_eq!(line.role(), CustomLineRole::CountFunction);
        assert_eq!(line.alias(&MySqlSyntax).unwrap().as_deref(), Some("MyCount"));
    }

    #[test]
    fn deserializes_with_default_role() {
        let line: CustomLine =
            serde_json::from_str(r#"{"text": " FROM t ", "location": "from"}"#).unwrap();
        assert_eq!(line.text(), "FROM t");
        assert_eq!(line.role(), CustomLineRole::None);
    }
}
