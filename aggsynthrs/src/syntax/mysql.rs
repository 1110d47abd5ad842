//! MySQL syntax.

use crate::engine::DatabaseType;

use super::QuerySyntaxHelper;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlSyntax;

impl QuerySyntaxHelper for MySqlSyntax {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn open_qualifier(&self) -> &'static str {
        "`"
    }

    fn close_qualifier(&self) -> &'static str {
        "`"
    }

    fn escape(&self, sql: &str) -> String {
        sql.replace('\\', "\\\\").replace('\'', "\\'")
    }
}
