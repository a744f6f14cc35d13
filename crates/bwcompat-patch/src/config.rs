//! Registry configuration

use serde::{Deserialize, Serialize};

/// Default logger name handed to the deprecation sink
pub const DEFAULT_LOGGER_NAME: &str = "bwcompat";

/// Default entry-point group holding named registries
pub const DEFAULT_PLUGIN_GROUP: &str = "bwcompat.registries";

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// What is being made compatible, logged on activation
    pub subject: String,
    /// Logger name passed to the deprecation sink
    pub logger_name: String,
    /// Entry-point group searched for named registries
    pub plugin_group: String,
}

impl RegistryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With activation subject
    #[inline]
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// With logger name
    #[inline]
    #[must_use]
    pub fn with_logger_name(mut self, logger_name: impl Into<String>) -> Self {
        self.logger_name = logger_name.into();
        self
    }

    /// With plugin group
    #[inline]
    #[must_use]
    pub fn with_plugin_group(mut self, group: impl Into<String>) -> Self {
        self.plugin_group = group.into();
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            subject: "Backward compatibility".to_string(),
            logger_name: DEFAULT_LOGGER_NAME.to_string(),
            plugin_group: DEFAULT_PLUGIN_GROUP.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: RegistryConfig = serde_yaml::from_str("subject: IDAES v1 API\n").unwrap();
        assert_eq!(config.subject, "IDAES v1 API");
        assert_eq!(config.logger_name, DEFAULT_LOGGER_NAME);
        assert_eq!(config.plugin_group, DEFAULT_PLUGIN_GROUP);
    }

    #[test]
    fn builder() {
        let config = RegistryConfig::new()
            .with_logger_name("compat")
            .with_plugin_group("acme.registries");
        assert_eq!(config.logger_name, "compat");
        assert_eq!(config.plugin_group, "acme.registries");
    }
}
