//! Configuration schema and loader for replicated tables.
//!
//! A [`ReplicatedTableConfig`] lists the views (replica chains stamped with
//! a [`ViewId`]) and the per-table bindings that route reads and writes to
//! them.

pub mod table;

pub use table::ConfiguredTable;

use rtable_common::{names_equal, ViewId};
use serde::{Deserialize, Serialize};

/// Top-level replicated-table configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicatedTableConfig {
    /// Views that tables may be bound to.
    #[serde(default)]
    pub views: Vec<ViewConfig>,

    /// Table bindings, including at most one default binding.
    #[serde(default)]
    pub tables: Vec<ConfiguredTable>,
}

/// A named replica chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// View name referenced by table bindings.
    pub name: String,

    /// Version of this view; bumped on every reconfiguration.
    pub view_id: ViewId,

    /// Replicas, head first.
    #[serde(default)]
    pub replicas: Vec<ReplicaConfig>,

    /// Index of the first replica that serves reads.
    #[serde(default)]
    pub read_head_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Storage account hosting this replica.
    pub storage_account: String,

    /// Suffix appended to the logical table name on this replica.
    #[serde(default)]
    pub table_suffix: String,
}

impl ViewConfig {
    /// Replicas eligible to serve reads.
    pub fn read_replicas(&self) -> &[ReplicaConfig] {
        self.replicas.get(self.read_head_index..).unwrap_or_default()
    }

    /// The replica reads are sent to (the tail of the chain).
    pub fn read_tail(&self) -> Option<&ReplicaConfig> {
        self.replicas.last()
    }
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ReplicatedTableConfig {
    /// Validate that configuration values are consistent.
    ///
    /// Empty view names on bindings are accepted: they mark a table whose
    /// configuration is in flight and are reported by
    /// [`ConfiguredTable::is_any_view_null_or_empty`] instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, view) in self.views.iter().enumerate() {
            if view.name.is_empty() {
                return Err(ConfigError::Invalid(format!("views[{}].name must not be empty", i)));
            }
            if self.views[..i].iter().any(|v| names_equal(&v.name, &view.name)) {
                return Err(ConfigError::Invalid(format!(
                    "views[{}].name '{}' is defined more than once",
                    i, view.name
                )));
            }
            if view.replicas.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "views[{}].replicas must not be empty",
                    i
                )));
            }
            if view.read_head_index >= view.replicas.len() {
                return Err(ConfigError::Invalid(format!(
                    "views[{}].read_head_index ({}) must be < replica count ({})",
                    i,
                    view.read_head_index,
                    view.replicas.len()
                )));
            }
        }

        let mut default_seen = false;
        for (i, table) in self.tables.iter().enumerate() {
            if table.table_name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "tables[{}].table_name must not be empty",
                    i
                )));
            }
            if table.use_as_default {
                if default_seen {
                    return Err(ConfigError::Invalid(format!(
                        "tables[{}]: only one table may set use_as_default",
                        i
                    )));
                }
                default_seen = true;
            } else if self.tables[..i]
                .iter()
                .any(|t| !t.use_as_default && names_equal(&t.table_name, &table.table_name))
            {
                return Err(ConfigError::Invalid(format!(
                    "tables[{}].table_name '{}' is configured more than once",
                    i, table.table_name
                )));
            }

            let keys: Vec<&String> = table.partitions_to_view_map.iter().flatten().map(|(k, _)| k).collect();
            for (j, key) in keys.iter().enumerate() {
                if keys[..j].iter().any(|k| names_equal(k, key)) {
                    return Err(ConfigError::Invalid(format!(
                        "tables[{}].partitions_to_view_map has duplicate partition '{}'",
                        i, key
                    )));
                }
            }

            for view in table.referenced_views() {
                if self.get_view(view).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "tables[{}] references undefined view '{}'",
                        i, view
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a view by name (case-insensitive).
    pub fn get_view(&self, name: &str) -> Option<&ViewConfig> {
        if name.is_empty() {
            return None;
        }
        self.views.iter().find(|v| names_equal(&v.name, name))
    }

    /// The binding for `table_name`, falling back to the default binding.
    pub fn get_table(&self, table_name: &str) -> Option<&ConfiguredTable> {
        self.tables
            .iter()
            .find(|t| !t.use_as_default && names_equal(&t.table_name, table_name))
            .or_else(|| self.default_table())
    }

    /// The binding marked `use_as_default`, if any.
    pub fn default_table(&self) -> Option<&ConfiguredTable> {
        self.tables.iter().find(|t| t.use_as_default)
    }

    /// Resolve the view serving `partition` of `table_name` (`""` for the
    /// table-wide view).
    ///
    /// Returns `None` when the table has no binding or the binding routes to
    /// an empty or undefined view.
    pub fn resolve_view(&self, table_name: &str, partition: &str) -> Option<&ViewConfig> {
        let table = self.get_table(table_name)?;
        let view_name = table.get_view_for_partition(partition);
        let view = self.get_view(view_name);
        if view.is_none() {
            tracing::debug!(
                "table '{}' partition '{}' routes to unknown view '{}'",
                table_name,
                partition,
                view_name
            );
        }
        view
    }

    /// Tables whose binding still routes traffic to `view_name`.
    ///
    /// A view may only be retired once this is empty.
    pub fn tables_referencing(&self, view_name: &str) -> Vec<&ConfiguredTable> {
        self.tables
            .iter()
            .filter(|t| t.is_view_referenced(view_name))
            .collect()
    }

    /// Tables whose binding is not yet safe to route traffic through.
    pub fn incomplete_tables(&self) -> Vec<&ConfiguredTable> {
        self.tables
            .iter()
            .filter(|t| t.is_any_view_null_or_empty())
            .collect()
    }
}

/// Load a `ReplicatedTableConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<ReplicatedTableConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `ReplicatedTableConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<ReplicatedTableConfig, ConfigError> {
    let config: ReplicatedTableConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
