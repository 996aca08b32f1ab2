//! Configuration system for the IFS solver.
//!
//! Every component reads its tunables from a flat, string-keyed property bag
//! ([`DataProperties`]) using dotted keys such as `SimulatedAnnealing.CoolingRate`.
//! The bag can be built in code or loaded from TOML / YAML files, where nested
//! tables are flattened into dotted keys.
//!
//! # Examples
//!
//! Load configuration from a TOML string:
//!
//! ```
//! use ifs_config::{DataProperties, TerminationConfig};
//! use std::time::Duration;
//!
//! let properties = DataProperties::from_toml_str(r#"
//!     [General]
//!     Seed = 42
//!
//!     [Termination]
//!     TimeOut = 30
//!     StopWhenComplete = true
//!
//!     [SimulatedAnnealing]
//!     CoolingRate = 0.9
//! "#).unwrap();
//!
//! assert_eq!(properties.get_f64("SimulatedAnnealing.CoolingRate", 0.95), 0.9);
//! let termination = TerminationConfig::from_properties(&properties);
//! assert_eq!(termination.time_limit(), Some(Duration::from_secs(30)));
//! assert!(termination.stop_when_complete);
//! ```
//!
//! Use defaults when the file is missing:
//!
//! ```
//! use ifs_config::DataProperties;
//!
//! let properties = DataProperties::load("solver.toml").unwrap_or_default();
//! assert!(properties.get_bool("General.MPP", true));
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Flat string-keyed property bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DataProperties {
    properties: BTreeMap<String, String>,
}

impl DataProperties {
    /// Creates an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads properties from a file; `.yaml` / `.yml` files are parsed as
    /// YAML, everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    /// Parses properties from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(s)?;
        let mut properties = Self::new();
        for (key, value) in table {
            properties.flatten_toml(key, value)?;
        }
        Ok(properties)
    }

    /// Parses properties from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(s)?;
        let mut properties = Self::new();
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (key, value) in map {
                    properties.flatten_yaml(yaml_key(&key)?, value)?;
                }
            }
            serde_yaml::Value::Null => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "top level of a YAML configuration must be a mapping".to_string(),
                ))
            }
        }
        Ok(properties)
    }

    fn flatten_toml(&mut self, key: String, value: toml::Value) -> Result<(), ConfigError> {
        match value {
            toml::Value::Table(table) => {
                for (child, value) in table {
                    self.flatten_toml(format!("{key}.{child}"), value)?;
                }
            }
            toml::Value::Array(items) => {
                let items: Result<Vec<String>, ConfigError> = items.into_iter().map(toml_scalar).collect();
                self.set(key, items?.join(","));
            }
            other => {
                let scalar = toml_scalar(other)?;
                self.set(key, scalar);
            }
        }
        Ok(())
    }

    fn flatten_yaml(&mut self, key: String, value: serde_yaml::Value) -> Result<(), ConfigError> {
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (child, value) in map {
                    self.flatten_yaml(format!("{key}.{}", yaml_key(&child)?), value)?;
                }
            }
            serde_yaml::Value::Sequence(items) => {
                let items: Result<Vec<String>, ConfigError> = items.into_iter().map(yaml_scalar).collect();
                self.set(key, items?.join(","));
            }
            other => {
                let scalar = yaml_scalar(other)?;
                self.set(key, scalar);
            }
        }
        Ok(())
    }

    /// Sets a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.properties.insert(key.into(), value.to_string());
    }

    /// Builder-style [`DataProperties::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Copies every property of `other` into this bag, overriding duplicates.
    pub fn extend(&mut self, other: &DataProperties) {
        for (key, value) in &other.properties {
            self.properties.insert(key.clone(), value.clone());
        }
    }

    /// Removes a property, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    /// Raw value of a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterates all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys starting with `prefix`, in key order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.properties
            .keys()
            .filter(move |k| k.starts_with(prefix))
            .map(String::as_str)
    }

    /// String property, or `default` when missing.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Boolean property. Accepts `true`/`false`, `yes`/`no` and `1`/`0`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => default,
            Some(v) => match v.as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => {
                    warn!(key, value = %v, "Invalid boolean property, using default {}", default);
                    default
                }
            },
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.parse_or(key, default)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.parse_or(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.parse_or(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.parse_or(key, default)
    }

    /// Comma separated list of numbers. Entries that fail to parse are
    /// returned as `None`.
    pub fn get_f64_list(&self, key: &str) -> Option<Vec<Option<f64>>> {
        let raw = self.get(key)?;
        Some(
            raw.split(',')
                .map(|item| {
                    let item = item.trim();
                    if item.is_empty() {
                        None
                    } else {
                        item.parse().ok()
                    }
                })
                .collect(),
        )
    }

    fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + Display + Copy,
    {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = raw, "Invalid numeric property, using default {}", default);
                default
            }
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for DataProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (key, value) in iter {
            properties.set(key, value);
        }
        properties
    }
}

fn toml_scalar(value: toml::Value) -> Result<String, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => s,
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            return Err(ConfigError::Invalid(
                "nested collections are not supported inside arrays".to_string(),
            ))
        }
    })
}

fn yaml_key(key: &serde_yaml::Value) -> Result<String, ConfigError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::Invalid(format!("unsupported YAML key: {key:?}"))),
    }
}

fn yaml_scalar(value: serde_yaml::Value) -> Result<String, ConfigError> {
    Ok(match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Tagged(tagged) => return yaml_scalar(tagged.value),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => {
            return Err(ConfigError::Invalid(
                "nested collections are not supported inside sequences".to_string(),
            ))
        }
    })
}

/// Termination settings read from `Termination.*`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TerminationConfig {
    /// Stop as soon as every variable is assigned.
    pub stop_when_complete: bool,

    /// Maximum number of iterations; negative for unlimited.
    pub max_iterations: i64,

    /// Wall-clock limit in seconds; negative for unlimited.
    pub time_out_seconds: f64,

    /// MPP only: stop once a complete solution has at most this many
    /// perturbations; negative to disable.
    pub min_perturbances: i64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            stop_when_complete: false,
            max_iterations: -1,
            time_out_seconds: -1.0,
            min_perturbances: -1,
        }
    }
}

impl TerminationConfig {
    pub fn from_properties(properties: &DataProperties) -> Self {
        let defaults = Self::default();
        Self {
            stop_when_complete: properties
                .get_bool("Termination.StopWhenComplete", defaults.stop_when_complete),
            max_iterations: properties.get_i64("Termination.MaxIters", defaults.max_iterations),
            time_out_seconds: properties.get_f64("Termination.TimeOut", defaults.time_out_seconds),
            min_perturbances: properties
                .get_i64("Termination.MinPerturbances", defaults.min_perturbances),
        }
    }

    /// Returns the time limit as a Duration, if any.
    ///
    /// Negative values disable the limit. Values that do not fit a
    /// Duration (NaN, infinite, overflowing) disable it as well.
    pub fn time_limit(&self) -> Option<Duration> {
        if self.time_out_seconds < 0.0 {
            return None;
        }
        match Duration::try_from_secs_f64(self.time_out_seconds) {
            Ok(limit) => Some(limit),
            Err(e) => {
                warn!(value = self.time_out_seconds, "Invalid Termination.TimeOut, ignoring it: {e}");
                None
            }
        }
    }

    /// Returns the iteration limit, if any.
    pub fn iteration_limit(&self) -> Option<u64> {
        u64::try_from(self.max_iterations).ok()
    }
}

/// General solver settings read from `General.*` and `Parallel.*`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneralConfig {
    /// Random seed for reproducible results.
    pub seed: Option<u64>,

    /// Minimal perturbation mode.
    pub mpp: bool,

    /// Save a best solution only when it has at most this many unassigned
    /// variables; negative to always allow.
    pub save_best_unassigned: i64,

    /// Number of parallel workers.
    pub nr_solvers: usize,

    /// Solver extensions from `Extensions.Classes`, by short name.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: None,
            mpp: false,
            save_best_unassigned: -1,
            nr_solvers: 1,
            extensions: Vec::new(),
        }
    }
}

impl GeneralConfig {
    pub fn from_properties(properties: &DataProperties) -> Self {
        let defaults = Self::default();
        let seed = properties.get("General.Seed").and_then(|raw| match raw.trim().parse() {
            Ok(seed) => Some(seed),
            Err(_) => {
                warn!(value = raw, "Invalid General.Seed, using a random seed");
                None
            }
        });
        Self {
            seed,
            mpp: properties.get_bool("General.MPP", defaults.mpp),
            save_best_unassigned: properties
                .get_i64("General.SaveBestUnassigned", defaults.save_best_unassigned),
            nr_solvers: properties
                .get_usize("Parallel.NrSolvers", defaults.nr_solvers)
                .max(1),
            extensions: properties
                .get("Extensions.Classes")
                .map(|raw| {
                    raw.split([';', ','])
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(|name| name.rsplit('.').next().unwrap_or(name).to_string())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// True if `Extensions.Classes` lists `name`.
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }
}

#[cfg(test)]
mod tests;
