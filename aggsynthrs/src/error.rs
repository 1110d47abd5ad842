use thiserror::Error;

use crate::engine::DatabaseType;
use crate::request::Slot;

pub type Result<T> = std::result::Result<T, AggsynthError>;

#[derive(Debug, Error)]
pub enum AggsynthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("ambiguous {slot}: {matches} lines match, expected at most one")]
    AmbiguousSlot { slot: Slot, matches: usize },
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("axis increment {0} is out of range (expected 1 to 4)")]
    AxisIncrementOutOfRange(i64),
    #[error("{database_type} does not implement {operation}")]
    NotImplemented {
        database_type: DatabaseType,
        operation: &'static str,
    },
    #[error("execution error: {0}")]
    Execution(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
