// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

const MAX_PAGE_SIZE: usize = 500;
const MAX_CONCURRENCY: usize = 64;
const MAX_GROUP_KEY_CHARS: usize = 128;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    30
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// Inverted index built once and rebuilt after content writes.
    Index,
    /// Full scan of the content store on every lookup.
    Scan,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Remove the tag record only; content keeps the orphaned name.
    Orphan,
    /// Remove the name from every content tag field before removing the record.
    Detach,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PropagationConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_locator")]
    pub locator: LocatorKind,
    #[serde(default = "default_delete_policy")]
    pub delete_policy: DeletePolicy,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            locator: default_locator(),
            delete_policy: default_delete_policy(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

fn default_locator() -> LocatorKind {
    LocatorKind::Index
}

fn default_delete_policy() -> DeletePolicy {
    DeletePolicy::Orphan
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateNamePolicy {
    Allow,
    Reject,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TagsConfig {
    #[serde(default = "default_duplicate_names")]
    pub duplicate_names: DuplicateNamePolicy,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            duplicate_names: default_duplicate_names(),
        }
    }
}

fn default_duplicate_names() -> DuplicateNamePolicy {
    DuplicateNamePolicy::Allow
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ContentTypeConfig {
    #[serde(default)]
    pub tag_fields: Vec<TagFieldConfig>,
}

/// A tag field is either a bare field name or a name with the tag group
/// it belongs to.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TagFieldConfig {
    Name(String),
    Grouped {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },
}

impl TagFieldConfig {
    pub fn name(&self) -> &str {
        match self {
            TagFieldConfig::Name(name) => name,
            TagFieldConfig::Grouped { name, .. } => name,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            TagFieldConfig::Name(_) => None,
            TagFieldConfig::Grouped { group, .. } => group.as_deref(),
        }
    }
}

impl From<&str> for TagFieldConfig {
    fn from(name: &str) -> Self {
        TagFieldConfig::Name(name.to_string())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default = "default_content_types")]
    pub content_types: BTreeMap<String, ContentTypeConfig>,
}

fn default_content_types() -> BTreeMap<String, ContentTypeConfig> {
    let mut content_types = BTreeMap::new();
    content_types.insert(
        "article".to_string(),
        ContentTypeConfig {
            tag_fields: vec![TagFieldConfig::from("tags")],
        },
    );
    content_types
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            admin: AdminConfig::default(),
            propagation: PropagationConfig::default(),
            tags: TagsConfig::default(),
            content_types: default_content_types(),
        }
    }
}

/// Configuration that passed validation. Only this type is handed to the
/// runtime components.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub propagation: PropagationConfig,
    pub tags: TagsConfig,
    pub content_types: BTreeMap<String, ContentTypeConfig>,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join(CONFIG_FILE_NAME);
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        if config_content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&config_content).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Loads and validates configuration at startup. If validation fails, the application should not start.
    pub fn load_and_validate(root: &Path) -> Result<ValidatedConfig, ConfigError> {
        Self::load(root)?.validate()
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got: {}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        if self.admin.page_size == 0 || self.admin.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "admin.page_size must be between 1 and {}, got: {}",
                MAX_PAGE_SIZE, self.admin.page_size
            )));
        }

        if self.propagation.concurrency == 0 || self.propagation.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::ValidationError(format!(
                "propagation.concurrency must be between 1 and {}, got: {}",
                MAX_CONCURRENCY, self.propagation.concurrency
            )));
        }

        for (content_type, declared) in &self.content_types {
            validate_identifier("content type", content_type)?;
            let mut seen = std::collections::BTreeSet::new();
            for field in &declared.tag_fields {
                validate_identifier("tag field", field.name())?;
                if !seen.insert(field.name()) {
                    return Err(ConfigError::ValidationError(format!(
                        "Content type '{}' declares tag field '{}' twice",
                        content_type,
                        field.name()
                    )));
                }
                if let Some(group) = field.group() {
                    validate_group_key(content_type, field.name(), group)?;
                }
            }
            if declared.tag_fields.is_empty() {
                log::warn!(
                    "Content type '{}' declares no tag fields and will never be rewritten",
                    content_type
                );
            }
        }

        Ok(ValidatedConfig {
            logging: LoggingConfig { level },
            admin: self.admin,
            propagation: self.propagation,
            tags: self.tags,
            content_types: self.content_types,
        })
    }
}

fn validate_identifier(label: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} names must not be empty",
            label
        )));
    }
    if value.contains(',') || value.chars().any(|ch| ch.is_control()) {
        return Err(ConfigError::ValidationError(format!(
            "{} name '{}' contains invalid characters",
            label, value
        )));
    }
    Ok(())
}

fn validate_group_key(content_type: &str, field: &str, group: &str) -> Result<(), ConfigError> {
    let trimmed = group.trim();
    if trimmed.is_empty() || trimmed != group || group.chars().count() > MAX_GROUP_KEY_CHARS {
        return Err(ConfigError::ValidationError(format!(
            "Group of tag field '{}.{}' must be 1 to {} characters without surrounding whitespace, got: '{}'",
            content_type, field, MAX_GROUP_KEY_CHARS, group
        )));
    }
    Ok(())
}

/// Writes the default configuration when no config file exists yet.
/// Returns true when a file was created.
pub fn ensure_default_config(root: &Path) -> Result<bool, ConfigError> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Ok(false);
    }
    fs::create_dir_all(root).map_err(|e| {
        ConfigError::LoadError(format!(
            "Failed to create runtime root '{}': {}",
            root.display(),
            e
        ))
    })?;
    let content = serde_yaml::to_string(&Config::default())
        .map_err(|e| ConfigError::LoadError(format!("Failed to serialize config: {}", e)))?;
    fs::write(&config_path, content).map_err(|e| {
        ConfigError::LoadError(format!(
            "Failed to write config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;
    Ok(true)
}
