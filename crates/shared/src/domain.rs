use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Reserved id of the top-level output scope.
pub const ROOT_SCOPE_ID: &str = "pywebio-scope-ROOT";

/// Insert as the first child of the container.
pub const PREPEND: i64 = 0;
/// Insert as the last child of the container.
pub const APPEND: i64 = -1;

/// Globally unique name of a scope in the output tree.
///
/// The server has historically addressed scopes with CSS-style selectors
/// (`#name`); a single leading `#` is dropped on decode so both forms resolve
/// to the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.strip_prefix('#') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(raw),
        }
    }

    pub fn root() -> Self {
        Self(ROOT_SCOPE_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_SCOPE_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ScopeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// What `set_scope` does when a scope with the requested id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IfExist {
    /// Leave the existing scope alone.
    #[default]
    #[serde(rename = "none")]
    Keep,
    /// Delete the existing scope, then create a fresh one.
    Remove,
    /// Empty the existing scope and stop.
    Clear,
}

/// Where the target ends up in the viewport after a `scroll_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollPosition {
    #[default]
    Top,
    Middle,
    Bottom,
}
