use directories::ProjectDirs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::debug;

use super::{LineageConfig, REPOSITORY_CONFIG_FILE};
use crate::error::{LineageError, Result};

/// Environment variables that override configuration keys
const ENV_OVERRIDES: &[(&str, &str, &str)] = &[
    ("LINEAGE_STORE", "store", "path"),
    ("LINEAGE_LOCK_WAIT", "lock", "wait"),
];

/// Location of the user-wide configuration file
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "lineage", "lineage").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Builds a [`LineageConfig`] from layered sources
pub struct ConfigLoader {
    user_config: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ConfigLoader {
    /// Loader reading the user's config file and the process environment
    pub fn new() -> Self {
        Self {
            user_config: user_config_path(),
            env: ENV_OVERRIDES
                .iter()
                .filter_map(|(var, _, _)| std::env::var(var).ok().map(|v| (var.to_string(), v)))
                .collect(),
        }
    }

    pub fn with_user_config(mut self, path: Option<PathBuf>) -> Self {
        self.user_config = path;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Load the configuration that applies to the repository at `root`
    pub fn load(&self, root: &Path) -> Result<LineageConfig> {
        let mut merged = Table::new();

        let repository_config = root.join(REPOSITORY_CONFIG_FILE);
        for path in self.user_config.iter().chain(std::iter::once(&repository_config)) {
            if let Some(table) = read_table(path)? {
                debug!("Loaded configuration from {}", path.display());
                merge_tables(&mut merged, table);
            }
        }

        for (var, section, key) in ENV_OVERRIDES {
            if let Some(value) = self.env.get(*var) {
                debug!("Overriding {}.{} from {}", section, key, var);
                let entry = merged
                    .entry(section.to_string())
                    .or_insert_with(|| Value::Table(Table::new()));
                if let Value::Table(table) = entry {
                    table.insert(key.to_string(), Value::String(value.clone()));
                }
            }
        }

        let config = Value::Table(merged)
            .try_into::<LineageConfig>()
            .map_err(|e| LineageError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_table(path: &Path) -> Result<Option<Table>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LineageError::config_at(e.to_string(), path)),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| LineageError::config_at(format!("{}: {e}", path.display()), path))
}

/// Merge `overlay` into `base`; nested tables merge key by key
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
