//! Engine registry: one syntax helper and one aggregate builder per database type.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    self, AggregateBuilder, MsSqlAggregateBuilder, MySqlAggregateBuilder, OracleAggregateBuilder,
    PostgresAggregateBuilder,
};
use crate::axis::QueryAxis;
use crate::config::{AggsynthConfig, ResolvedEngineConfig};
use crate::error::{AggsynthError, Result};
use crate::fragment::CustomLine;
use crate::request::AggregateRequest;
use crate::syntax::{MsSqlSyntax, MySqlSyntax, OracleSyntax, PostgresSyntax, QuerySyntaxHelper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    #[serde(alias = "mssql", alias = "sqlserver", alias = "sql_server")]
    MicrosoftSqlServer,
    #[serde(alias = "mysql")]
    MySql,
    Oracle,
    #[serde(alias = "postgres", alias = "postgresql")]
    PostgreSql,
}

impl DatabaseType {
    pub const ALL: [DatabaseType; 4] = [
        DatabaseType::MicrosoftSqlServer,
        DatabaseType::MySql,
        DatabaseType::Oracle,
        DatabaseType::PostgreSql,
    ];
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatabaseType::MicrosoftSqlServer => "Microsoft SQL Server",
            DatabaseType::MySql => "MySQL",
            DatabaseType::Oracle => "Oracle",
            DatabaseType::PostgreSql => "PostgreSQL",
        };
        f.write_str(name)
    }
}

impl FromStr for DatabaseType {
    type Err = AggsynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "microsoft_sql_server" | "mssql" | "sqlserver" | "sql_server" => {
                Ok(DatabaseType::MicrosoftSqlServer)
            }
            "mysql" | "my_sql" => Ok(DatabaseType::MySql),
            "oracle" => Ok(DatabaseType::Oracle),
            "postgresql" | "postgres" | "postgre_sql" => Ok(DatabaseType::PostgreSql),
            other => Err(AggsynthError::Validation(format!(
                "unknown database type {other}"
            ))),
        }
    }
}

/// Syntax primitives and aggregate builder for one database type.
pub struct Engine {
    syntax: Box<dyn QuerySyntaxHelper>,
    aggregates: Box<dyn AggregateBuilder>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database_type", &self.database_type())
            .finish()
    }
}

impl Engine {
    pub fn new(database_type: DatabaseType) -> Self {
        Self::with_resolved(database_type, &ResolvedEngineConfig::default())
    }

    pub fn with_config(database_type: DatabaseType, config: &AggsynthConfig) -> Self {
        Self::with_resolved(database_type, &config.for_engine(database_type))
    }

    pub fn with_resolved(database_type: DatabaseType, config: &ResolvedEngineConfig) -> Self {
        let (syntax, aggregates): (Box<dyn QuerySyntaxHelper>, Box<dyn AggregateBuilder>) =
            match database_type {
                DatabaseType::MicrosoftSqlServer => (
                    Box::new(MsSqlSyntax),
                    Box::new(MsSqlAggregateBuilder::new(config)),
                ),
                DatabaseType::MySql => (
                    Box::new(MySqlSyntax),
                    Box::new(MySqlAggregateBuilder::new(config)),
                ),
                DatabaseType::Oracle => (
                    Box::new(OracleSyntax),
                    Box::new(OracleAggregateBuilder::new(config)),
                ),
                DatabaseType::PostgreSql => (
                    Box::new(PostgresSyntax),
                    Box::new(PostgresAggregateBuilder::new(config)),
                ),
            };
        Self { syntax, aggregates }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.syntax.database_type()
    }

    pub fn syntax(&self) -> &dyn QuerySyntaxHelper {
        self.syntax.as_ref()
    }

    pub fn aggregates(&self) -> &dyn AggregateBuilder {
        self.aggregates.as_ref()
    }

    /// Validate `lines` + `axis` into a request bound to this engine's syntax.
    pub fn request(
        &self,
        lines: Vec<CustomLine>,
        axis: Option<QueryAxis>,
    ) -> Result<AggregateRequest<'_>> {
        AggregateRequest::new(lines, axis, self.syntax())
    }

    /// Build the aggregate as a single SQL text (dynamic SQL for pivots).
    pub fn build_aggregate(
        &self,
        lines: Vec<CustomLine>,
        axis: Option<QueryAxis>,
    ) -> Result<String> {
        let request = self.request(lines, axis)?;
        aggregate::build_aggregate(self.aggregates(), &request)
    }

    /// First phase of a pivot: SQL returning the ordered distinct pivot values.
    pub fn pivot_values_sql(
        &self,
        lines: Vec<CustomLine>,
        axis: Option<QueryAxis>,
    ) -> Result<String> {
        let request = self.request(lines, axis)?;
        self.aggregates().pivot_values_sql(&request)
    }

    /// Second phase of a pivot: static SQL with one column per value, in order.
    pub fn build_pivoted_query(
        &self,
        lines: Vec<CustomLine>,
        axis: Option<QueryAxis>,
        values: &[String],
    ) -> Result<String> {
        let request = self.request(lines, axis)?;
        self.aggregates().build_pivot_with_values(&request, values)
    }
}

struct Engines {
    mssql: Engine,
    mysql: Engine,
    oracle: Engine,
    postgres: Engine,
}

static ENGINES: Lazy<Engines> = Lazy::new(|| Engines {
    mssql: Engine::new(DatabaseType::MicrosoftSqlServer),
    mysql: Engine::new(DatabaseType::MySql),
    oracle: Engine::new(DatabaseType::Oracle),
    postgres: Engine::new(DatabaseType::PostgreSql),
});

/// Shared default-configured engine for `database_type`.
pub fn engine(database_type: DatabaseType) -> &'static Engine {
    match database_type {
        DatabaseType::MicrosoftSqlServer => &ENGINES.mssql,
        DatabaseType::MySql => &ENGINES.mysql,
        DatabaseType::Oracle => &ENGINES.oracle,
        DatabaseType::PostgreSql => &ENGINES.postgres,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_database_type_names() {
        assert_eq!("mssql".parse::<DatabaseType>().unwrap(), DatabaseType::MicrosoftSqlServer);
        assert_eq!("PostgreSQL".parse::<DatabaseType>().unwrap(), DatabaseType::PostgreSql);
        assert_eq!("my-sql".parse::<DatabaseType>().unwrap(), DatabaseType::MySql);
        assert!("sqlite".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn registry_hands_out_matching_engines() {
        for db in DatabaseType::ALL {
            let engine = engine(db);
            assert_eq!(engine.database_type(), db);
            assert_eq!(engine.aggregates().database_type(), db);
        }
    }
}
