//! User settings: defaults merged with the stored object.
//!
//! The stored object may be partial (older versions, hand edits). On load it
//! is shallow-merged over the serialized defaults, so every missing key takes
//! its default. Updates merge the same way and persist the full result.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{SourceKind, SourceSet};
use crate::storage::{Database, DatabaseError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

// ============================================================================
// Settings Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    Xlarge,
}

impl FontSize {
    pub fn as_str(self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
            FontSize::Xlarge => "xlarge",
        }
    }

    /// Terminal columns used when wrapping reading text.
    pub fn wrap_width(self) -> usize {
        match self {
            FontSize::Small => 80,
            FontSize::Medium => 60,
            FontSize::Large => 44,
            FontSize::Xlarge => 32,
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FontSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(FontSize::Small),
            "medium" => Ok(FontSize::Medium),
            "large" => Ok(FontSize::Large),
            "xlarge" => Ok(FontSize::Xlarge),
            other => Err(format!("unknown font size '{other}'")),
        }
    }
}

/// Per-source switches. Missing keys take their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledSources {
    pub wikipedia: bool,
    pub news: bool,
    pub weather: bool,
    pub fallback: bool,
}

impl Default for EnabledSources {
    fn default() -> Self {
        Self {
            wikipedia: true,
            news: true,
            weather: true,
            fallback: false,
        }
    }
}

impl From<EnabledSources> for SourceSet {
    fn from(e: EnabledSources) -> Self {
        let mut set = SourceSet::empty();
        set.set(SourceKind::Wikipedia, e.wikipedia);
        set.set(SourceKind::News, e.news);
        set.set(SourceKind::Weather, e.weather);
        set.set(SourceKind::Fallback, e.fallback);
        set
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub font_size: FontSize,
    pub dark_mode: bool,
    pub enabled_sources: EnabledSources,
    pub max_char_count: usize,
    pub notification_enabled: bool,
    #[serde(default)]
    pub notification_time: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            font_size: FontSize::Medium,
            dark_mode: false,
            enabled_sources: EnabledSources::default(),
            max_char_count: 500,
            notification_enabled: false,
            notification_time: None,
        }
    }
}

impl UserSettings {
    pub fn source_set(&self) -> SourceSet {
        self.enabled_sources.into()
    }
}

/// A partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_sources: Option<EnabledSources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_char_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_time: Option<String>,
}

// ============================================================================
// SettingsStore
// ============================================================================

/// Loaded settings plus the database they persist to.
pub struct SettingsStore {
    db: Database,
    current: UserSettings,
}

impl SettingsStore {
    /// Read the stored object and merge it over the defaults.
    ///
    /// A stored object that is not valid JSON, or whose merged result has the
    /// wrong shape, is logged and replaced by the defaults.
    pub async fn load(db: &Database) -> Result<Self, DatabaseError> {
        let current = match db.load_settings_raw().await? {
            Some(raw) => decode_stored(&raw),
            None => UserSettings::default(),
        };
        Ok(Self {
            db: db.clone(),
            current,
        })
    }

    pub fn get(&self) -> &UserSettings {
        &self.current
    }

    /// Merge `patch` into the current settings, persist, and return the result.
    pub async fn update(&mut self, patch: &SettingsUpdate) -> Result<&UserSettings, SettingsError> {
        let patch = serde_json::to_value(patch).map_err(DatabaseError::from)?;
        self.apply(patch).await
    }

    /// Set one setting from CLI text, e.g. `darkMode true` or
    /// `enabledSources.news false`.
    ///
    /// Values that parse as JSON are taken as such; anything else is a string.
    pub async fn set_key(&mut self, key: &str, value: &str) -> Result<&UserSettings, SettingsError> {
        let parsed: Value =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

        let defaults = serde_json::to_value(UserSettings::default()).map_err(DatabaseError::from)?;
        let (top, nested) = match key.split_once('.') {
            Some((top, nested)) => (top, Some(nested)),
            None => (key, None),
        };
        let Some(default_value) = defaults.get(top) else {
            return Err(SettingsError::UnknownKey(key.to_string()));
        };

        let patch_value = match nested {
            None => parsed,
            Some(nested) => {
                if default_value.get(nested).is_none() {
                    return Err(SettingsError::UnknownKey(key.to_string()));
                }
                let mut inner = serde_json::to_value(self.current.enabled_sources)
                    .map_err(DatabaseError::from)?;
                if let Value::Object(map) = &mut inner {
                    map.insert(nested.to_string(), parsed);
                }
                inner
            }
        };

        let mut patch = Map::new();
        patch.insert(top.to_string(), patch_value);
        self.apply(Value::Object(patch)).await.map_err(|e| match e {
            SettingsError::InvalidValue { reason, .. } => SettingsError::InvalidValue {
                key: key.to_string(),
                reason,
            },
            other => other,
        })
    }

    async fn apply(&mut self, patch: Value) -> Result<&UserSettings, SettingsError> {
        let base = serde_json::to_value(&self.current).map_err(DatabaseError::from)?;
        let merged = shallow_merge(base, patch);
        let updated: UserSettings =
            serde_json::from_value(merged).map_err(|e| SettingsError::InvalidValue {
                key: "settings".to_string(),
                reason: e.to_string(),
            })?;

        self.db.save_settings(&updated).await?;
        tracing::debug!(?updated, "Saved settings");
        self.current = updated;
        Ok(&self.current)
    }
}

fn decode_stored(raw: &str) -> UserSettings {
    let mut stored = match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            tracing::warn!("Stored settings are not a JSON object, using defaults");
            return UserSettings::default();
        }
    };

    rename_legacy_keys(&mut stored);

    let defaults = match serde_json::to_value(UserSettings::default()) {
        Ok(v) => v,
        Err(_) => return UserSettings::default(),
    };
    match serde_json::from_value(shallow_merge(defaults, stored)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Stored settings have the wrong shape, using defaults");
            UserSettings::default()
        }
    }
}

/// `enabledSources.government` was the old name of `weather`. When both are
/// present `weather` wins.
fn rename_legacy_keys(stored: &mut Value) {
    let Some(Value::Object(sources)) = stored.get_mut("enabledSources") else {
        return;
    };
    if let Some(government) = sources.remove("government") {
        sources.entry("weather").or_insert(government);
    }
}

/// Top-level keys of `patch` replace those of `base`.
fn shallow_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            base.extend(patch);
            Value::Object(base)
        }
        (base, _) => base,
    }
}
