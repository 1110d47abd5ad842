//! Oracle syntax.

use crate::engine::DatabaseType;

use super::QuerySyntaxHelper;

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleSyntax;

impl QuerySyntaxHelper for OracleSyntax {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn open_qualifier(&self) -> &'static str {
        "\""
    }

    fn close_qualifier(&self) -> &'static str {
        "\""
    }
}
