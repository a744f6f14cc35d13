//! Error types for the patch engine
//!
//! Provides error handling for:
//! - Configuration problems found while declaring or populating directives
//! - Resolution failures when a redirect target is first used
//! - Activation lifecycle misuse

use bwcompat_namespace::{AttributeError, ImportError, PathError};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Invalid directive configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Redirect target could not be resolved
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Module import failed while installing
    #[error("import error: {0}")]
    Import(#[from] ImportError),

    /// Registry is already active
    #[error("registry is already active; deactivate it first")]
    AlreadyActive,

    /// Restoring genuinely modified state failed
    #[error("failed to uninstall {patcher}: {message}")]
    Uninstall {
        /// Patcher being uninstalled
        patcher: &'static str,
        /// What could not be restored
        message: String,
    },
}

impl PatchError {
    /// Check if this is a configuration error
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Configuration errors, fatal at declaration or populate time
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// More than one module redirect for the same module
    #[error("expected 1 module redirect for {module}, instead found {count}")]
    DuplicateModuleRedirect {
        /// Redirected module
        module: String,
        /// Number of directives found
        count: usize,
    },

    /// More than one attribute redirect for the same `(module, name)`
    #[error("duplicate attribute redirect for module {module}, attribute {name}")]
    DuplicateAttributeRedirect {
        /// Module containing the attribute
        module: String,
        /// Attribute name
        name: String,
    },

    /// Target spec does not have the `<module>:<name>` shape
    #[error("malformed target '{spec}': {reason}")]
    MalformedTarget {
        /// Offending spec
        spec: String,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid module path or identifier
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// YAML declaration document is malformed
    #[error("malformed YAML declaration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON declaration document is malformed
    #[error("malformed JSON declaration: {0}")]
    Json(#[from] serde_json::Error),

    /// Entry point refers to a collection nobody provided
    #[error("unknown directive collection: {name}")]
    UnknownCollection {
        /// Collection name
        name: String,
    },

    /// Named registry not found in the plugin group
    #[error("registry {name} not found within {group}; available: {available:?}")]
    UnknownRegistry {
        /// Requested registry
        name: String,
        /// Group searched
        group: String,
        /// Registries that do exist
        available: Vec<String>,
    },
}

/// Resolution errors, raised at first use of a directive
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Target module could not be imported
    #[error("cannot resolve {target} for {directive}: {source}")]
    Import {
        /// Directive being resolved
        directive: String,
        /// Target spec
        target: String,
        /// Import failure
        #[source]
        source: ImportError,
    },

    /// Target attribute is missing
    #[error("cannot resolve {target} for {directive}: {source}")]
    Attribute {
        /// Directive being resolved
        directive: String,
        /// Target spec
        target: String,
        /// Lookup failure
        #[source]
        source: AttributeError,
    },

    /// Module redirect with no replacement
    #[error("{directive}: module {module} has been removed")]
    Removed {
        /// Directive being resolved
        directive: String,
        /// Removed module
        module: String,
    },

    /// Resolving the target led back to the same directive
    #[error("{directive}: redirect target leads back to itself")]
    Cycle {
        /// Directive being resolved
        directive: String,
    },
}

impl ResolveError {
    /// Description of the directive that triggered the failure
    #[must_use]
    pub fn directive(&self) -> &str {
        match self {
            Self::Import { directive, .. }
            | Self::Attribute { directive, .. }
            | Self::Removed { directive, .. }
            | Self::Cycle { directive } => directive,
        }
    }
}
