//! Microsoft SQL Server syntax.

use crate::engine::DatabaseType;

use super::QuerySyntaxHelper;

#[derive(Debug, Default, Clone, Copy)]
pub struct MsSqlSyntax;

impl QuerySyntaxHelper for MsSqlSyntax {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MicrosoftSqlServer
    }

    fn open_qualifier(&self) -> &'static str {
        "["
    }

    fn close_qualifier(&self) -> &'static str {
        "]"
    }

    fn string_literal(&self, value: &str) -> String {
        // N prefix keeps non-ASCII pivot values intact
        format!("N'{}'", self.escape(value))
    }
}
