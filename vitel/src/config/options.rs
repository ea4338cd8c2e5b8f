//! Serializable registration options.

use serde::{Deserialize, Serialize};

use crate::services::spec::Data;

/// Keys recognised as registration settings. They never become props.
pub const RESERVED_KEYS: [&str; 8] = [
    "hostApp",
    "global",
    "name",
    "wrapInit",
    "runInit",
    "extend",
    "props",
    "autoProps",
];

/// Registration options.
///
/// Unrecognised keys land in `extra` and become props when `props` is
/// empty and `auto_props` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceOptions {
    /// Expose the service in the host's global property table.
    pub global: bool,
    /// Registration name override. Defaults to the spec's name.
    pub name: Option<String>,
    /// Install `ready` and the memoized `promise()` when the spec has `init`.
    pub wrap_init: bool,
    /// Schedule `init` after registration.
    #[serde(alias = "init")]
    pub run_init: bool,
    /// Explicit prop values.
    pub props: Data,
    pub auto_props: bool,
    /// Passthrough settings.
    #[serde(flatten)]
    pub extra: Data,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            global: true,
            name: None,
            wrap_init: true,
            run_init: true,
            props: Data::new(),
            auto_props: true,
            extra: Data::new(),
        }
    }
}

impl ServiceOptions {
    /// Props before finalization: explicit props when given, otherwise the
    /// passthrough settings if `auto_props` is on.
    pub fn derive_props(&self) -> Data {
        if !self.props.is_empty() {
            return self.props.clone();
        }
        if !self.auto_props {
            return Data::new();
        }

        self.extra
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
