use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glob::glob;
use serde::{Deserialize, Serialize};

use crate::axis::QueryAxis;
use crate::config::AggsynthConfig;
use crate::engine::{DatabaseType, Engine};
use crate::error::{AggsynthError, Result};
use crate::fragment::CustomLine;

/// A saved aggregate: the fragments plus everything needed to build them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateDefinition {
    pub name: String,
    pub database_type: DatabaseType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub axis: Option<QueryAxis>,
    /// Known pivot headers; when set the static pivot form is built.
    #[serde(default)]
    pub pivot_values: Option<Vec<String>>,
    pub lines: Vec<CustomLine>,
}

impl AggregateDefinition {
    pub fn build_sql(&self, config: &AggsynthConfig) -> Result<String> {
        let engine = Engine::with_config(self.database_type, config);
        match &self.pivot_values {
            Some(values) => {
                engine.build_pivoted_query(self.lines.clone(), self.axis.clone(), values)
            }
            None => engine.build_aggregate(self.lines.clone(), self.axis.clone()),
        }
    }

    pub fn pivot_values_sql(&self, config: &AggsynthConfig) -> Result<String> {
        Engine::with_config(self.database_type, config)
            .pivot_values_sql(self.lines.clone(), self.axis.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub struct AggregateCatalog {
    pub definitions: HashMap<String, AggregateDefinition>,
}

impl AggregateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: Vec<AggregateDefinition>) -> Result<Self> {
        let mut catalog = AggregateCatalog::new();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(AggsynthError::Validation(format!(
                "aggregate directory not found: {}",
                dir.display()
            )));
        }

        let mut catalog = AggregateCatalog::new();
        for extension in ["yml", "yaml", "json"] {
            for entry in glob(&format!("{}/*.{extension}", dir.display()))
                .map_err(|e| AggsynthError::Other(e.into()))?
                .flatten()
            {
                catalog.load_file(&entry)?;
            }
        }
        tracing::debug!(
            dir = %dir.display(),
            definitions = catalog.definitions.len(),
            "loaded aggregate catalog"
        );
        Ok(catalog)
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let definition: AggregateDefinition =
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                serde_json::from_str(&contents)?
            } else {
                serde_yaml::from_str(&contents)?
            };
        self.insert(definition)
    }

    fn insert(&mut self, definition: AggregateDefinition) -> Result<()> {
        if self.definitions.contains_key(&definition.name) {
            return Err(AggsynthError::Validation(format!(
                "duplicate aggregate definition '{}'",
                definition.name
            )));
        }
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AggregateDefinition> {
        self.definitions.get(name)
    }
}
