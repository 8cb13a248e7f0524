// Configuration Access
// Accessor contract for externally-parsed configuration plus the
// typed per-variable resolution layer (ParamConfig)

pub mod param;
pub mod split;

pub use param::{FormatRef, ParamConfig, ParamDict, ParamValue, VarKey};

use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while resolving configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("option {0:?} is not set and has no default")]
    MissingOption(String),

    #[error("option {option:?}: cannot parse {value:?} as {expected}")]
    InvalidValue {
        option: String,
        value: String,
        expected: &'static str,
    },

    #[error("variable {0:?} is undefined")]
    UndefinedVariable(String),

    #[error("[variable: {variable}] invalid parameter type: {ptype}")]
    InvalidParameterType { variable: String, ptype: String },

    #[error("unable to parse {text:?}")]
    UnparsableTuple { text: String },

    #[error("[variable: {variable}] tuple entry {entry:?} expands to {count} values")]
    TupleExpansion {
        variable: String,
        entry: String,
        count: usize,
    },

    #[error("unbalanced quotes or brackets in {text:?}")]
    UnbalancedText { text: String },

    #[error("option {option:?} is frozen, cannot change {current:?} to {proposed:?}")]
    ChangeImpossible {
        option: String,
        current: String,
        proposed: String,
    },

    #[error("expression error: {0}")]
    Expression(#[from] crate::expression::EvalError),
}

/// Whether an option read through the accessor may change later on.
///
/// Frozen reads mark the option; a later reconfiguration with a
/// different value is a `ChangeImpossible` fault rather than a silent
/// apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePolicy {
    Allow,
    Frozen,
}

/// Accessor for externally-parsed configuration.
///
/// The core never parses configuration files itself; everything goes
/// through this trait. Implementations own layering, persistence and
/// change notification.
pub trait ConfigView: Send + Sync {
    /// All option names visible in this view.
    fn option_names(&self) -> Vec<String>;

    /// Raw lookup; `None` when the option is absent.
    fn lookup(&self, option: &str, policy: ChangePolicy) -> Option<String>;

    /// Persist a generated default so later runs observe the same value.
    fn persist_default(&self, option: &str, value: &str);

    fn get(
        &self,
        option: &str,
        default: Option<&str>,
        policy: ChangePolicy,
    ) -> Result<String, ConfigError> {
        match self.lookup(option, policy) {
            Some(value) => Ok(value),
            None => default
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingOption(option.to_string())),
        }
    }

    fn get_int(&self, option: &str, default: Option<i64>) -> Result<i64, ConfigError> {
        match self.lookup(option, ChangePolicy::Allow) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                option: option.to_string(),
                value,
                expected: "integer",
            }),
            None => default.ok_or_else(|| ConfigError::MissingOption(option.to_string())),
        }
    }

    fn get_bool(&self, option: &str, default: Option<bool>) -> Result<bool, ConfigError> {
        match self.lookup(option, ChangePolicy::Allow) {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    option: option.to_string(),
                    value,
                    expected: "boolean",
                }),
            },
            None => default.ok_or_else(|| ConfigError::MissingOption(option.to_string())),
        }
    }

    /// Whitespace-separated list; `default` is raw text in the same format.
    fn get_list(&self, option: &str, default: Option<&str>) -> Result<Vec<String>, ConfigError> {
        let raw = self.get(option, default, ChangePolicy::Allow)?;
        Ok(raw.split_whitespace().map(str::to_string).collect())
    }

    /// Like `get_list`, but a generated default is written back so
    /// repeated runs reuse the identical value.
    fn get_list_persistent(
        &self,
        option: &str,
        default: &[String],
    ) -> Result<Vec<String>, ConfigError> {
        match self.lookup(option, ChangePolicy::Allow) {
            Some(raw) => Ok(raw.split_whitespace().map(str::to_string).collect()),
            None => {
                self.persist_default(option, &default.join(" "));
                Ok(default.to_vec())
            }
        }
    }

    /// Ordered `key => value` entries, one per line; lines without the
    /// mapping marker are ignored here (ParamConfig handles defaults).
    fn get_dict(
        &self,
        option: &str,
        default: Option<&str>,
    ) -> Result<Vec<(String, String)>, ConfigError> {
        let raw = self.get(option, default, ChangePolicy::Allow)?;
        let mut entries = Vec::new();
        for line in raw.lines() {
            if let Some((key, value)) = line.split_once("=>") {
                entries.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        Ok(entries)
    }
}

/// In-memory `ConfigView` used by embedders and tests.
///
/// Tracks frozen options so that a later `set` with a different value
/// reports the change-impossible fault instead of applying silently.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: Mutex<BTreeMap<String, String>>,
    frozen: Mutex<BTreeMap<String, ()>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(self, option: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(option.into().to_lowercase(), value.into());
        self
    }

    /// Load a flat YAML mapping; sequences are joined with spaces,
    /// scalars are stringified.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let mapping: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(text)?;
        let mut values = BTreeMap::new();
        for (key, value) in mapping {
            values.insert(key.to_lowercase(), yaml_to_string(&value));
        }
        Ok(Self {
            values: Mutex::new(values),
            frozen: Mutex::new(BTreeMap::new()),
        })
    }

    /// Reconfigure an option. Fails when the option was read under a
    /// frozen policy and the value actually changes.
    pub fn set(&self, option: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        let option = option.to_lowercase();
        let value = value.into();
        let mut values = self.values.lock().unwrap();
        if self.frozen.lock().unwrap().contains_key(&option) {
            let current = values.get(&option).cloned().unwrap_or_default();
            if current != value {
                return Err(ConfigError::ChangeImpossible {
                    option,
                    current,
                    proposed: value,
                });
            }
        }
        values.insert(option, value);
        Ok(())
    }
}

impl ConfigView for MemoryConfig {
    fn option_names(&self) -> Vec<String> {
        self.values.lock().unwrap().keys().cloned().collect()
    }

    fn lookup(&self, option: &str, policy: ChangePolicy) -> Option<String> {
        let option = option.to_lowercase();
        if policy == ChangePolicy::Frozen {
            self.frozen.lock().unwrap().insert(option.clone(), ());
        }
        self.values.lock().unwrap().get(&option).cloned()
    }

    fn persist_default(&self, option: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(option.to_lowercase(), value.to_string());
    }
}

fn yaml_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}
