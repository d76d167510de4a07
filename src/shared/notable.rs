//! The notable-function registry: which function names the analysis watches,
//! and what their error contract is.

use crate::shared::Map;
use serde::Deserialize;
use std::{fs, io, path::Path};
use thiserror::Error;

/// An error for issues in the notable-functions file.
#[derive(Debug, Error)]
pub enum Error {
    /// Misc IO errors.
    #[error("I/O Error: {0}: {1}")]
    Io(&'static str, io::Error),

    /// When the file is not the expected JSON shape, or a `reporting`/`type`
    /// value is not one of the known strings.
    #[error("Failed to deserialize notable functions: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// A function entry with an empty name.
    #[error("Notable function #{0} has an empty name")]
    EmptyName(usize),

    /// Neither `reporting` nor `type` was given.
    #[error("Notable function {0:?} needs exactly one of `reporting` or `type`")]
    MissingRole(String),

    /// Both `reporting` and `type` were given.
    #[error("Notable function {0:?} has both `reporting` and `type`")]
    ConflictingRole(String),

    /// The same name registered twice, in any role.
    #[error("Notable function {0:?} appears more than once")]
    Duplicate(String),
}

/// How the analysis treats a registered function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Role {
    /// Watched; errors come back through the return value.
    WatchedReturnValue,

    /// Watched; errors come back through `errno`.
    WatchedErrno,

    /// Passing an error value here counts as handling it.
    Handler,

    /// Passing an error value here only records it.
    Logger,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Reporting {
    ReturnValue,
    Errno,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Kind {
    Handler,
    Logger,
}

/// One element of the configuration array, before validation.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Entry {
    name: String,

    #[serde(default)]
    reporting: Option<Reporting>,

    #[serde(default, rename = "type")]
    kind: Option<Kind>,
}

/// The validated name-to-role mapping.
pub struct Registry {
    roles: Map<String, Role>,
}

impl Registry {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content =
            fs::read_to_string(path).map_err(|e| Error::Io("reading notable functions", e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, Error> {
        let entries: Vec<Entry> = serde_json::from_str(content)?;
        let mut roles = Map::default();
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.name.is_empty() {
                return Err(Error::EmptyName(index));
            }
            let role = match (entry.reporting, entry.kind) {
                (Some(_), Some(_)) => return Err(Error::ConflictingRole(entry.name)),
                (None, None) => return Err(Error::MissingRole(entry.name)),
                (Some(Reporting::ReturnValue), None) => Role::WatchedReturnValue,
                (Some(Reporting::Errno), None) => Role::WatchedErrno,
                (None, Some(Kind::Handler)) => Role::Handler,
                (None, Some(Kind::Logger)) => Role::Logger,
            };
            if roles.insert(entry.name.clone(), role).is_some() {
                return Err(Error::Duplicate(entry.name));
            }
        }
        Ok(Self { roles })
    }

    /// The role registered for `name`, if any.
    pub fn role(&self, name: &str) -> Option<Role> {
        self.roles.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Role)> {
        self.roles.iter().map(|(name, role)| (name.as_str(), *role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_four_roles() {
        let registry = Registry::from_json(
            r#"[
                {"name": "malloc", "reporting": "return_value"},
                {"name": "strtoull", "reporting": "errno"},
                {"name": "handle", "type": "handler"},
                {"name": "log_errno", "type": "logger"}
            ]"#,
        )
        .expect("valid configuration rejected");
        assert_eq!(registry.role("malloc"), Some(Role::WatchedReturnValue));
        assert_eq!(registry.role("strtoull"), Some(Role::WatchedErrno));
        assert_eq!(registry.role("handle"), Some(Role::Handler));
        assert_eq!(registry.role("log_errno"), Some(Role::Logger));
        assert_eq!(registry.role("free"), None);
    }

    #[test]
    fn rejects_both_reporting_and_type() {
        let result = Registry::from_json(
            r#"[{"name": "x", "reporting": "errno", "type": "handler"}]"#,
        );
        assert!(matches!(result, Err(Error::ConflictingRole(name)) if name == "x"));
    }

    #[test]
    fn rejects_neither_reporting_nor_type() {
        let result = Registry::from_json(r#"[{"name": "x"}]"#);
        assert!(matches!(result, Err(Error::MissingRole(name)) if name == "x"));
    }

    #[test]
    fn rejects_unknown_reporting_value() {
        let result = Registry::from_json(r#"[{"name": "x", "reporting": "exceptions"}]"#);
        assert!(matches!(result, Err(Error::Deserialize(_))));
    }

    #[test]
    fn rejects_duplicate_names_across_roles() {
        let result = Registry::from_json(
            r#"[
                {"name": "x", "reporting": "errno"},
                {"name": "x", "type": "logger"}
            ]"#,
        );
        assert!(matches!(result, Err(Error::Duplicate(name)) if name == "x"));
    }

    #[test]
    fn rejects_empty_names() {
        let result = Registry::from_json(r#"[{"name": "", "type": "logger"}]"#);
        assert!(matches!(result, Err(Error::EmptyName(0))));
    }
}
