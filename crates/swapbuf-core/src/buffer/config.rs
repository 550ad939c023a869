//! Manager configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use swapbuf_common::utils::error::{Error, Result};

/// Environment variable overriding [`BufferManagerConfig::temp_root`].
pub const ENV_TEMP_DIR: &str = "SWAPBUF_TEMP_DIR";
/// Environment variable overriding [`BufferManagerConfig::policy`].
pub const ENV_POLICY: &str = "SWAPBUF_POLICY";
/// Environment variable holding `key=value` pairs separated by commas.
pub const ENV_POLICY_PARAMS: &str = "SWAPBUF_POLICY_PARAMS";
/// Environment variable overriding [`BufferManagerConfig::sweep_stale`].
pub const ENV_SWEEP_STALE: &str = "SWAPBUF_SWEEP_STALE";

/// Settings for a [`BufferManager`](super::BufferManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferManagerConfig {
    /// Directory under which the dump folder is created.
    pub temp_root: PathBuf,
    /// Name prefix of the dump folder.
    pub dir_prefix: String,
    /// Remove dump folders left behind by dead processes at startup.
    pub sweep_stale: bool,
    /// Name of the initial dump policy.
    pub policy: String,
    /// Parameters applied to the initial policy.
    pub policy_params: BTreeMap<String, String>,
}

impl Default for BufferManagerConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            dir_prefix: "swapbuf-".to_string(),
            sweep_stale: true,
            policy: "never".to_string(),
            policy_params: BTreeMap::new(),
        }
    }
}

impl BufferManagerConfig {
    /// Sets the directory holding the dump folder.
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    /// Sets the dump folder name prefix.
    #[must_use]
    pub fn with_dir_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dir_prefix = prefix.into();
        self
    }

    /// Enables or disables the stale folder sweep.
    #[must_use]
    pub fn with_sweep_stale(mut self, sweep: bool) -> Self {
        self.sweep_stale = sweep;
        self
    }

    /// Sets the initial policy.
    #[must_use]
    pub fn with_policy(mut self, name: impl Into<String>) -> Self {
        self.policy = name.into();
        self
    }

    /// Adds a parameter for the initial policy.
    #[must_use]
    pub fn with_policy_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.policy_params.insert(name.into(), value.into());
        self
    }

    /// Default configuration overridden by `SWAPBUF_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a variable holds a malformed value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a variable holds a malformed value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = lookup(ENV_TEMP_DIR).filter(|v| !v.is_empty()) {
            config.temp_root = PathBuf::from(root);
        }
        if let Some(policy) = lookup(ENV_POLICY).filter(|v| !v.is_empty()) {
            config.policy = policy;
        }
        if let Some(params) = lookup(ENV_POLICY_PARAMS) {
            config.policy_params = parse_params(&params)?;
        }
        if let Some(sweep) = lookup(ENV_SWEEP_STALE) {
            config.sweep_stale = parse_bool(&sweep).ok_or_else(|| {
                Error::Configuration(format!("{}: expected a boolean, got '{}'", ENV_SWEEP_STALE, sweep))
            })?;
        }

        Ok(config)
    }
}

/// Parses `key=value` pairs separated by commas. Blank items are skipped.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an item without `=` or with an empty
/// key.
pub fn parse_params(input: &str) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for item in input.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| Error::Configuration(format!("expected key=value, got '{}'", item)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Configuration(format!("missing parameter name in '{}'", item)));
        }
        params.insert(key.to_string(), value.trim().to_string());
    }
    Ok(params)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
