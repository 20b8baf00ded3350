//! Persisted application settings.
//!
//! A hierarchical key-value store addressed by paths. Paths can use either
//! "." or "/" as separators, so `"app/reopenNamespacesOnReload"` and
//! `"app.reopenNamespacesOnReload"` name the same value.
//!
//! ```
//! use keytree::settings::Settings;
//!
//! let settings = Settings::new();
//! settings.set("app/reopenNamespacesOnReload", false);
//! assert_eq!(settings.get::<bool>("app.reopenNamespacesOnReload"), Some(false));
//! assert_eq!(settings.get_or("app/missing", 7), 7);
//! ```
//!
//! Settings are persisted as JSON or TOML. Writes go to a temporary file in
//! the target directory which then replaces the target, so a failed save
//! never leaves a truncated file behind.

mod error;
mod value;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keytree_core::Signal;
use keytree_core::logging::targets;
use parking_lot::RwLock;

pub use error::{SettingsError, SettingsResult};
pub use value::{FromSettingsValue, SettingsValue};

/// File format for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Toml,
}

impl SettingsFormat {
    /// Derives the format from a `.json` or `.toml` extension.
    pub fn from_path(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => Err(SettingsError::UnknownFormat(path.to_path_buf())),
        }
    }
}

#[derive(Debug, Clone)]
struct AutoSave {
    path: PathBuf,
    format: SettingsFormat,
}

/// Hierarchical key-value settings store.
pub struct Settings {
    data: RwLock<HashMap<String, SettingsValue>>,
    /// Emitted with the key path after every change; an empty path means
    /// everything was cleared.
    changed: Signal<String>,
    auto_save: RwLock<Option<AutoSave>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::from_data(HashMap::new())
    }

    pub fn from_data(data: HashMap<String, SettingsValue>) -> Self {
        Self {
            data: RwLock::new(data),
            changed: Signal::new(),
            auto_save: RwLock::new(None),
        }
    }

    pub fn changed(&self) -> &Signal<String> {
        &self.changed
    }

    /// Persists every later change to `path`.
    pub fn set_auto_save(&self, path: impl AsRef<Path>, format: SettingsFormat) {
        *self.auto_save.write() = Some(AutoSave {
            path: path.as_ref().to_path_buf(),
            format,
        });
    }

    pub fn disable_auto_save(&self) {
        *self.auto_save.write() = None;
    }

    pub fn is_auto_save_enabled(&self) -> bool {
        self.auto_save.read().is_some()
    }

    /// Sets a value, creating intermediate groups as needed.
    pub fn set<V: Into<SettingsValue>>(&self, path: &str, value: V) {
        let parts = parse_path(path);
        if parts.is_empty() {
            return;
        }

        set_nested(&mut self.data.write(), &parts, value.into());
        self.changed.emit(path.to_string());
        self.auto_save();
    }

    /// Gets a value converted to `T`; `None` if missing or of another type.
    pub fn get<T: FromSettingsValue>(&self, path: &str) -> Option<T> {
        let data = self.data.read();
        get_nested(&data, &parse_path(path)).and_then(T::from_settings_value)
    }

    pub fn get_or<T: FromSettingsValue>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    pub fn get_raw(&self, path: &str) -> Option<SettingsValue> {
        let data = self.data.read();
        get_nested(&data, &parse_path(path)).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        let data = self.data.read();
        get_nested(&data, &parse_path(path)).is_some()
    }

    /// Removes and returns the value at `path`.
    pub fn remove(&self, path: &str) -> Option<SettingsValue> {
        let parts = parse_path(path);
        if parts.is_empty() {
            return None;
        }

        let removed = remove_nested(&mut self.data.write(), &parts);
        if removed.is_some() {
            self.changed.emit(path.to_string());
            self.auto_save();
        }
        removed
    }

    pub fn clear(&self) {
        self.data.write().clear();
        self.changed.emit(String::new());
        self.auto_save();
    }

    /// Keys directly below the group at `path`.
    pub fn group_keys(&self, path: &str) -> Vec<String> {
        let data = self.data.read();
        match get_nested(&data, &parse_path(path)) {
            Some(SettingsValue::Object(group)) => group.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Top-level keys.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Loads settings, picking the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        match SettingsFormat::from_path(path)? {
            SettingsFormat::Json => Self::load_json(path),
            SettingsFormat::Toml => Self::load_toml(path),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::io(path, e))?;
        let data: HashMap<String, SettingsValue> =
            serde_json::from_str(&content).map_err(|e| SettingsError::parse(path, e))?;
        tracing::debug!(target: targets::SETTINGS, path = %path.display(), "settings loaded");
        Ok(Self::from_data(data))
    }

    pub fn load_toml(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::io(path, e))?;
        let value: toml::Value = content.parse().map_err(|e| SettingsError::parse(path, e))?;
        tracing::debug!(target: targets::SETTINGS, path = %path.display(), "settings loaded");
        match SettingsValue::from(value) {
            SettingsValue::Object(data) => Ok(Self::from_data(data)),
            _ => Ok(Self::new()),
        }
    }

    /// Loads settings if the file exists, otherwise starts empty.
    pub fn load_or_default(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Saves settings, picking the format from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> SettingsResult<()> {
        let path = path.as_ref();
        self.save_as(path, SettingsFormat::from_path(path)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> SettingsResult<()> {
        self.save_as(path.as_ref(), SettingsFormat::Json)
    }

    pub fn save_toml(&self, path: impl AsRef<Path>) -> SettingsResult<()> {
        self.save_as(path.as_ref(), SettingsFormat::Toml)
    }

    fn save_as(&self, path: &Path, format: SettingsFormat) -> SettingsResult<()> {
        let encoded = {
            let data = self.data.read();
            match format {
                SettingsFormat::Json => {
                    serde_json::to_string_pretty(&*data).map_err(SettingsError::encode)?
                }
                SettingsFormat::Toml => {
                    let table = toml::Value::Table(
                        data.iter()
                            .map(|(k, v)| (k.clone(), toml::Value::from(v)))
                            .collect(),
                    );
                    toml::to_string_pretty(&table).map_err(SettingsError::encode)?
                }
            }
        };

        atomic_write(path, encoded.as_bytes())?;
        tracing::debug!(target: targets::SETTINGS, path = %path.display(), ?format, "settings saved");
        Ok(())
    }

    /// Writes to the auto-save target now, if one is set.
    pub fn sync(&self) -> SettingsResult<()> {
        let target = self.auto_save.read().clone();
        match target {
            Some(target) => self.save_as(&target.path, target.format),
            None => Ok(()),
        }
    }

    fn auto_save(&self) {
        if let Err(err) = self.sync() {
            tracing::error!(target: targets::SETTINGS, error = %err, "failed to auto-save settings");
        }
    }
}

/// Settings shared between components.
pub type SharedSettings = Arc<Settings>;

static_assertions::assert_impl_all!(Settings: Send, Sync);

fn atomic_write(path: &Path, bytes: &[u8]) -> SettingsResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| SettingsError::io(path, e))?;
    file.write_all(bytes).map_err(|e| SettingsError::io(path, e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| SettingsError::io(path, e))?;
    file.persist(path)
        .map_err(|e| SettingsError::io(path, e.error))?;
    Ok(())
}

fn parse_path(path: &str) -> Vec<&str> {
    path.split(['.', '/']).filter(|s| !s.is_empty()).collect()
}

fn get_nested<'a>(data: &'a HashMap<String, SettingsValue>, parts: &[&str]) -> Option<&'a SettingsValue> {
    let (first, rest) = parts.split_first()?;
    let value = data.get(*first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        SettingsValue::Object(group) => get_nested(group, rest),
        _ => None,
    }
}

/// Non-group values on the way are replaced by groups.
fn set_nested(data: &mut HashMap<String, SettingsValue>, parts: &[&str], value: SettingsValue) {
    let Some((first, rest)) = parts.split_first() else {
        return;
    };
    if rest.is_empty() {
        data.insert(first.to_string(), value);
        return;
    }

    let entry = data
        .entry(first.to_string())
        .or_insert_with(|| SettingsValue::Object(HashMap::new()));
    if !matches!(entry, SettingsValue::Object(_)) {
        *entry = SettingsValue::Object(HashMap::new());
    }
    if let SettingsValue::Object(group) = entry {
        set_nested(group, rest, value);
    }
}

fn remove_nested(data: &mut HashMap<String, SettingsValue>, parts: &[&str]) -> Option<SettingsValue> {
    let (first, rest) = parts.split_first()?;
    if rest.is_empty() {
        return data.remove(*first);
    }
    match data.get_mut(*first)? {
        SettingsValue::Object(group) => remove_nested(group, rest),
        _ => None,
    }
}
