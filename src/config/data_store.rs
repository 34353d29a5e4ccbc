//! Data-store connection parameters for database dump hooks.
//!
//! Hooks such as `mysqldump -h:host -u:username -p:password :database` are
//! interpolated from these parameters before they run. Parameters come from
//! `RSYNC_DB_<KEY>` environment variables, e.g. `RSYNC_DB_HOST=db1` provides
//! `:host`.
use std::collections::BTreeMap;

use super::template;

/// Prefix of the environment variables holding connection parameters.
pub const ENV_PREFIX: &str = "RSYNC_DB_";

/// Command fragments that identify a database client invocation.
const DATABASE_CLIENTS: &[&str] = &["mysql", "mariadb"];

/// Connection parameters of the active data store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataStore {
    params: BTreeMap<String, String>,
}

impl DataStore {
    /// Read parameters from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from `(name, value)` pairs, keeping only `RSYNC_DB_*` names.
    ///
    /// Keys are lower-cased with `_` turned into `-`. `user` and `username`
    /// are aliases of each other.
    #[must_use]
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        vars.into_iter()
            .filter_map(|(name, value)| {
                let key = name.strip_prefix(ENV_PREFIX)?;
                (!key.is_empty()).then(|| (key.to_lowercase().replace('_', "-"), value))
            })
            .fold(Self::default(), |store, (key, value)| store.with(&key, &value))
    }

    /// Add (or replace) one parameter.
    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        match key {
            "user" => {
                self.params
                    .entry("username".to_string())
                    .or_insert_with(|| value.to_string());
            }
            "username" => {
                self.params
                    .entry("user".to_string())
                    .or_insert_with(|| value.to_string());
            }
            _ => {}
        }
        self
    }

    /// Look up a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Substitute `:key` placeholders in `command` with the connection parameters.
    #[must_use]
    pub fn interpolate(&self, command: &str) -> String {
        template::insert(
            command,
            self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }
}

/// Whether `command` invokes a database client whose placeholders should be
/// interpolated.
#[must_use]
pub fn is_database_invocation(command: &str) -> bool {
    DATABASE_CLIENTS.iter().any(|client| command.contains(client))
}
