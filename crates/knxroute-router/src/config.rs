//! Sectioned router configuration loaded from TOML.
//!
//! Every top-level table is a [`Section`]. The main section carries router
//! settings, the others describe links and filters:
//!
//! ```toml
//! [main]
//! addr = "1.1.250"
//! client-addrs = "1.1.100:8"
//! connections = ["bus"]
//!
//! [bus]
//! driver = "dummy"
//! filters = ["log"]
//! ```
//!
//! Sections remember which keys were read so that misspelt settings can be
//! reported instead of silently ignored.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use knxroute_core::{readaddr, readaddrblock, IndividualAddress};
use serde::Deserialize;

use crate::error::ConfigError;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Section {
    name: String,
    values: BTreeMap<String, Value>,
    used: RefCell<BTreeSet<String>>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            used: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Looks up `key` and marks it as used.
    pub fn value(&self, key: &str) -> Option<&Value> {
        let value = self.values.get(key)?;
        self.used.borrow_mut().insert(key.to_string());
        Some(value)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::Text(text) => Some(text.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::List(items) => Some(items.join(",")),
        }
    }

    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.value(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Int(0)) => Ok(false),
            Some(Value::Int(1)) => Ok(true),
            Some(Value::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, format!("'{text}' is not a boolean"))),
            },
            Some(other) => Err(self.invalid(key, format!("{other:?} is not a boolean"))),
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.value(key) {
            None => Ok(default),
            Some(Value::Int(n)) => {
                u64::try_from(*n).map_err(|_| self.invalid(key, format!("{n} is negative")))
            }
            Some(Value::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, format!("'{text}' is not a number"))),
            Some(other) => Err(self.invalid(key, format!("{other:?} is not a number"))),
        }
    }

    /// A list value. A plain string is split at commas.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.value(key) {
            None => Vec::new(),
            Some(Value::List(items)) => items.clone(),
            Some(Value::Text(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::Int(n)) => vec![n.to_string()],
            Some(Value::Bool(b)) => vec![b.to_string()],
        }
    }

    pub fn get_addr(&self, key: &str) -> Result<Option<IndividualAddress>, ConfigError> {
        let Some(text) = self.get_str(key) else {
            return Ok(None);
        };
        readaddr(&text)
            .map(Some)
            .map_err(|err| self.invalid(key, format!("'{text}': {err}")))
    }

    pub fn get_addr_block(
        &self,
        key: &str,
    ) -> Result<Option<(IndividualAddress, u16)>, ConfigError> {
        let Some(text) = self.get_str(key) else {
            return Ok(None);
        };
        readaddrblock(&text)
            .map(Some)
            .map_err(|err| self.invalid(key, format!("'{text}': {err}")))
    }

    /// Keys present in the section that nothing has read.
    pub fn unused_keys(&self) -> Vec<String> {
        let used = self.used.borrow();
        self.values
            .keys()
            .filter(|key| !used.contains(*key))
            .cloned()
            .collect()
    }

    /// Fails with [`ConfigError::UnknownKeys`] if any key went unread.
    pub fn check_unused(&self) -> Result<(), ConfigError> {
        let keys = self.unused_keys();
        if keys.is_empty() {
            return Ok(());
        }
        Err(ConfigError::UnknownKeys {
            section: self.name.clone(),
            keys,
        })
    }

    fn invalid(&self, key: &str, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.clone(),
            key: key.to_string(),
            reason,
        }
    }
}

/// All sections of a configuration file, by name.
#[derive(Debug, Clone, Default)]
pub struct IniData {
    sections: BTreeMap<String, Section>,
}

impl IniData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, BTreeMap<String, Value>> = toml::from_str(s)?;
        let sections = raw
            .into_iter()
            .map(|(name, values)| {
                let section = Section {
                    name: name.clone(),
                    values,
                    used: RefCell::new(BTreeSet::new()),
                };
                (name, section)
            })
            .collect();
        Ok(Self { sections })
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.insert(section);
        self
    }

    pub fn insert(&mut self, section: Section) {
        self.sections.insert(section.name.clone(), section);
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }
}
