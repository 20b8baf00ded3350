//! Values stored in [`Settings`](super::Settings).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A value that can be stored in settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingsValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<SettingsValue>),
    /// A nested group of settings.
    Object(HashMap<String, SettingsValue>),
}

impl SettingsValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SettingsValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingsValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingsValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as a float. Integers are converted.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingsValue::Float(v) => Some(*v),
            SettingsValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingsValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[SettingsValue]> {
        match self {
            SettingsValue::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, SettingsValue>> {
        match self {
            SettingsValue::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for SettingsValue {
    fn from(v: bool) -> Self {
        SettingsValue::Bool(v)
    }
}

impl From<i32> for SettingsValue {
    fn from(v: i32) -> Self {
        SettingsValue::Integer(v.into())
    }
}

impl From<i64> for SettingsValue {
    fn from(v: i64) -> Self {
        SettingsValue::Integer(v)
    }
}

impl From<f64> for SettingsValue {
    fn from(v: f64) -> Self {
        SettingsValue::Float(v)
    }
}

impl From<String> for SettingsValue {
    fn from(v: String) -> Self {
        SettingsValue::String(v)
    }
}

impl From<&str> for SettingsValue {
    fn from(v: &str) -> Self {
        SettingsValue::String(v.to_string())
    }
}

impl<T: Into<SettingsValue>> From<Vec<T>> for SettingsValue {
    fn from(v: Vec<T>) -> Self {
        SettingsValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<toml::Value> for SettingsValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => SettingsValue::String(s),
            toml::Value::Integer(i) => SettingsValue::Integer(i),
            toml::Value::Float(f) => SettingsValue::Float(f),
            toml::Value::Boolean(b) => SettingsValue::Bool(b),
            toml::Value::Datetime(dt) => SettingsValue::String(dt.to_string()),
            toml::Value::Array(arr) => {
                SettingsValue::Array(arr.into_iter().map(SettingsValue::from).collect())
            }
            toml::Value::Table(table) => SettingsValue::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, SettingsValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&SettingsValue> for toml::Value {
    /// TOML has no null; it is written as an empty string.
    fn from(value: &SettingsValue) -> Self {
        match value {
            SettingsValue::Null => toml::Value::String(String::new()),
            SettingsValue::Bool(b) => toml::Value::Boolean(*b),
            SettingsValue::Integer(i) => toml::Value::Integer(*i),
            SettingsValue::Float(f) => toml::Value::Float(*f),
            SettingsValue::String(s) => toml::Value::String(s.clone()),
            SettingsValue::Array(arr) => {
                toml::Value::Array(arr.iter().map(toml::Value::from).collect())
            }
            SettingsValue::Object(obj) => toml::Value::Table(
                obj.iter()
                    .map(|(k, v)| (k.clone(), toml::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Types that can be read out of a [`SettingsValue`].
pub trait FromSettingsValue: Sized {
    fn from_settings_value(value: &SettingsValue) -> Option<Self>;
}

impl FromSettingsValue for bool {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromSettingsValue for i64 {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value.as_integer()
    }
}

impl FromSettingsValue for i32 {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value.as_integer().and_then(|v| i32::try_from(v).ok())
    }
}

impl FromSettingsValue for usize {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value.as_integer().and_then(|v| usize::try_from(v).ok())
    }
}

impl FromSettingsValue for f64 {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value.as_float()
    }
}

impl FromSettingsValue for String {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<T: FromSettingsValue> FromSettingsValue for Vec<T> {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        value
            .as_array()
            .and_then(|arr| arr.iter().map(T::from_settings_value).collect())
    }
}

impl FromSettingsValue for SettingsValue {
    fn from_settings_value(value: &SettingsValue) -> Option<Self> {
        Some(value.clone())
    }
}
