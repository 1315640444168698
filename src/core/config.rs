use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Attributes only a root questionnaire may declare
pub const DEFAULT_PROHIBITED_ATTRIBUTES: &[&str] = &["implicitRules", "modifierExtension"];
pub const DEFAULT_LINK_ID_PREFIX: &str = "linkIdPrefix";
pub const DEFAULT_VERSION_SUFFIX: &str = "-assembled";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AssembleConfig {
    /// Opaque request configuration forwarded to every fetch (headers, auth, ...)
    pub request_config: Option<Value>,
    /// Upper bound for a whole `$assemble` invocation
    pub timeout: Option<Duration>,
    /// Fetches in flight per recursion level; 1 fetches strictly in order
    pub max_concurrent_fetches: usize,
    pub prohibited_attributes: Vec<String>,
    /// Prefix used when renaming clashing linkIds
    pub link_id_prefix: String,
    /// Appended to the root version of an assembled questionnaire
    pub version_suffix: String,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            request_config: None,
            timeout: None,
            max_concurrent_fetches: 1,
            prohibited_attributes: DEFAULT_PROHIBITED_ATTRIBUTES
                .iter()
                .map(|attr| attr.to_string())
                .collect(),
            link_id_prefix: DEFAULT_LINK_ID_PREFIX.to_string(),
            version_suffix: DEFAULT_VERSION_SUFFIX.to_string(),
        }
    }
}

impl AssembleConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_request_config(mut self, request_config: Value) -> Self {
        self.request_config = Some(request_config);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn with_prohibited_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.prohibited_attributes.push(attribute.into());
        self
    }

    pub fn with_link_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.link_id_prefix = prefix.into();
        self
    }

    pub fn with_version_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.version_suffix = suffix.into();
        self
    }
}
