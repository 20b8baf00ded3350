//! Data roles for item models.
//!
//! Roles define which attribute of a node is being requested. The connections
//! tree exposes four: the display name, the icon, the type tag and the
//! original (raw) name.

/// Roles for accessing different aspects of item data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemRole {
    /// Display name shown to the user. Returns `String`.
    Display,

    /// Icon reference. Returns `String`.
    Decoration,

    /// Type tag (`"server"`, `"database"`, `"namespace"`, `"key"`, ...).
    /// Returns `String`.
    Type,

    /// The node's original, unformatted name. Returns `String`.
    OriginalName,

    /// First role available for application-specific data.
    User(u32),
}

impl ItemRole {
    /// Returns `true` if this is a user-defined role.
    #[inline]
    pub fn is_user_role(&self) -> bool {
        matches!(self, ItemRole::User(_))
    }

    /// Returns the numeric value of this role.
    ///
    /// Standard roles have fixed values 0-255. User roles have values >= 256.
    pub fn value(&self) -> u32 {
        match self {
            ItemRole::Display => 0,
            ItemRole::Decoration => 1,
            ItemRole::Type => 2,
            ItemRole::OriginalName => 3,
            ItemRole::User(n) => 256 + n,
        }
    }

    /// Creates an ItemRole from a numeric value.
    ///
    /// Returns `None` for reserved but undefined role values (4-255).
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(ItemRole::Display),
            1 => Some(ItemRole::Decoration),
            2 => Some(ItemRole::Type),
            3 => Some(ItemRole::OriginalName),
            4..=255 => None,
            n => Some(ItemRole::User(n - 256)),
        }
    }
}

/// Type-erased container for item data and node metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ItemData {
    /// No data.
    #[default]
    None,
    /// Text.
    String(String),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// List of strings.
    StringList(Vec<String>),
}

impl ItemData {
    /// Returns `true` if this holds no data.
    pub fn is_none(&self) -> bool {
        matches!(self, ItemData::None)
    }

    /// Returns `true` if this holds data.
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Returns the string, if this is one.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ItemData::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Converts into the owned string, if this is one.
    pub fn into_string(self) -> Option<String> {
        match self {
            ItemData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ItemData::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ItemData::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ItemData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the string list, if this is one.
    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            ItemData::StringList(list) => Some(list),
            _ => None,
        }
    }

    /// Renders scalar data as text for matching.
    ///
    /// Returns `None` for [`ItemData::None`] and string lists.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ItemData::String(s) => Some(s.clone()),
            ItemData::Int(n) => Some(n.to_string()),
            ItemData::Float(n) => Some(n.to_string()),
            ItemData::Bool(b) => Some(b.to_string()),
            ItemData::None | ItemData::StringList(_) => None,
        }
    }
}

impl From<String> for ItemData {
    fn from(s: String) -> Self {
        ItemData::String(s)
    }
}

impl From<&str> for ItemData {
    fn from(s: &str) -> Self {
        ItemData::String(s.to_string())
    }
}

impl From<i64> for ItemData {
    fn from(n: i64) -> Self {
        ItemData::Int(n)
    }
}

impl From<i32> for ItemData {
    fn from(n: i32) -> Self {
        ItemData::Int(n as i64)
    }
}

impl From<f64> for ItemData {
    fn from(n: f64) -> Self {
        ItemData::Float(n)
    }
}

impl From<bool> for ItemData {
    fn from(b: bool) -> Self {
        ItemData::Bool(b)
    }
}

impl From<Vec<String>> for ItemData {
    fn from(list: Vec<String>) -> Self {
        ItemData::StringList(list)
    }
}
