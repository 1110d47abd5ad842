//! PostgreSQL syntax.

use crate::engine::DatabaseType;

use super::QuerySyntaxHelper;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresSyntax;

impl QuerySyntaxHelper for PostgresSyntax {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSql
    }

    fn open_qualifier(&self) -> &'static str {
        "\""
    }

    fn close_qualifier(&self) -> &'static str {
        "\""
    }
}
