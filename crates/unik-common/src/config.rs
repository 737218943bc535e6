//! Registry configuration
//!
//! The set of protected annotation keys is supplied once at startup as a static
//! mapping from scope name to annotation keys. `"*"` names the cluster-wide scope,
//! any other entry is a namespace.
//!
//! ```yaml
//! annotations:
//!   "*":
//!     - ncp/snat_pool
//!   team-a:
//!     - example.com/port
//! ```
//!
//! `serde_yaml` is used for parsing, so JSON documents are accepted as well.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, ANNOTATION_NCP_SNAT_POOL, CLUSTER_SCOPE_NAME};

/// Static scope → protected annotation keys mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Protected annotation keys per scope name (`"*"` is cluster-wide)
    #[serde(default)]
    pub annotations: BTreeMap<String, Vec<String>>,
}

impl Default for RegistryConfig {
    /// Protects `ncp/snat_pool` cluster-wide, matching the historical behaviour
    /// of the webhook before scopes became configurable.
    fn default() -> Self {
        Self {
            annotations: BTreeMap::from([(
                CLUSTER_SCOPE_NAME.to_string(),
                vec![ANNOTATION_NCP_SNAT_POOL.to_string()],
            )]),
        }
    }
}

impl RegistryConfig {
    /// Parse and validate a configuration document held in memory
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_yaml(&content).map_err(|e| match e {
            Error::Config { message, .. } => Error::config_in(path.display().to_string(), message),
            other => other,
        })
    }

    /// Reject scope names and annotation keys that can never match anything.
    ///
    /// Empty key lists are allowed: they register the scope without protecting
    /// any key.
    pub fn validate(&self) -> Result<()> {
        for (scope, keys) in &self.annotations {
            if scope.trim().is_empty() {
                return Err(Error::config("scope name must not be empty"));
            }
            if scope != CLUSTER_SCOPE_NAME && scope.contains('*') {
                return Err(Error::config(format!(
                    "scope '{scope}' is neither \"{CLUSTER_SCOPE_NAME}\" nor a namespace name"
                )));
            }
            if let Some(key) = keys.iter().find(|k| k.trim().is_empty()) {
                return Err(Error::config(format!(
                    "scope '{scope}' contains an empty annotation key {key:?}"
                )));
            }
        }
        Ok(())
    }
}
