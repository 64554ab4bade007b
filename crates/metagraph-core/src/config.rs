//! Client configuration.
//!
//! Fixed once a [`crate::client::MetadataClient`] is built: the client keeps
//! its own copy and only hands out shared references.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// What "no effective time" means for calls that do not pass one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveTimePolicy {
    /// Ignore effectivity windows.
    #[default]
    Ignore,
    /// Simulate the graph at the moment of the call.
    Now,
}

impl EffectiveTimePolicy {
    /// Apply the policy to a caller-supplied time.
    #[must_use]
    pub fn resolve(self, requested: Option<Timestamp>, now: Timestamp) -> Option<Timestamp> {
        match (requested, self) {
            (Some(t), _) => Some(t),
            (None, Self::Ignore) => None,
            (None, Self::Now) => Some(now),
        }
    }
}

/// Configuration for a metadata client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name reported in logs and status output.
    pub server_name: String,

    /// Page size used when a caller asks for 0.
    pub default_page_size: usize,

    /// Largest page a caller may request (0 = unrestricted).
    pub max_page_size: usize,

    /// Effective time applied when a call passes none.
    pub default_effective_time: EffectiveTimePolicy,

    /// Opening delimiter of template placeholders.
    pub template_placeholder_prefix: String,

    /// Closing delimiter of template placeholders.
    pub template_placeholder_suffix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_name: "metagraph".to_string(),
            default_page_size: 0,
            max_page_size: 0,
            default_effective_time: EffectiveTimePolicy::Ignore,
            template_placeholder_prefix: "~{".to_string(),
            template_placeholder_suffix: "}~".to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name.
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Sets the page size used for 0-sized requests.
    #[must_use]
    pub const fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Sets the largest page a caller may request.
    #[must_use]
    pub const fn max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the default effective time policy.
    #[must_use]
    pub const fn default_effective_time(mut self, policy: EffectiveTimePolicy) -> Self {
        self.default_effective_time = policy;
        self
    }

    /// Sets the placeholder delimiters.
    #[must_use]
    pub fn placeholder_delimiters(
        mut self,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        self.template_placeholder_prefix = prefix.into();
        self.template_placeholder_suffix = suffix.into();
        self
    }
}
