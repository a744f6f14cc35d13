//! Error types for the namespace runtime
//!
//! Provides error handling for:
//! - Module imports (invalid names, missing modules, removed modules)
//! - Attribute lookups (missing names, failing fallbacks)
//! - Calls on values

use crate::path::PathError;

/// Boxed error carried across the finder and fallback seams
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Module import errors
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Requested name is not a valid module path
    #[error("invalid module name: {0}")]
    InvalidName(#[from] PathError),

    /// No finder produced a spec for the module
    #[error("no module named '{name}'")]
    NotFound {
        /// Requested module
        name: String,
    },

    /// Module was removed and has no replacement
    #[error("module '{name}' has been removed and no direct replacement is available")]
    Removed {
        /// Requested module
        name: String,
        /// Provenance of the directive that removed it
        origin: Option<String>,
    },

    /// A finder failed while resolving the module
    #[error("failed to find module '{name}': {source}")]
    Finder {
        /// Requested module
        name: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Module body failed during execution
    #[error("error executing module '{name}': {message}")]
    Exec {
        /// Module being executed
        name: String,
        /// Failure reported by the module body
        message: String,
    },
}

impl ImportError {
    /// Name of the module the import was for
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        match self {
            Self::InvalidName(_) => None,
            Self::NotFound { name }
            | Self::Removed { name, .. }
            | Self::Finder { name, .. }
            | Self::Exec { name, .. } => Some(name),
        }
    }

    /// Check if the module was deliberately removed
    #[inline]
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}

/// Attribute lookup errors
#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    /// Name is not defined on the owner
    #[error("'{owner}' has no attribute '{name}'")]
    Missing {
        /// Module or object that was searched
        owner: String,
        /// Requested attribute
        name: String,
    },

    /// Value kind has no attributes at all
    #[error("value of kind {kind} has no attribute '{name}'")]
    NoAttributes {
        /// Kind of the value
        kind: &'static str,
        /// Requested attribute
        name: String,
    },

    /// Attribute fallback failed to produce a value
    #[error("failed to resolve '{name}' on '{owner}': {source}")]
    Fallback {
        /// Module whose fallback ran
        owner: String,
        /// Requested attribute
        name: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },
}

impl AttributeError {
    /// Check if this is a plain "not defined" miss
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. } | Self::NoAttributes { .. })
    }
}

/// Errors raised when calling a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Value cannot be called
    #[error("value of kind {kind} is not callable")]
    NotCallable {
        /// Kind of the value
        kind: &'static str,
    },

    /// Wrong number of arguments
    #[error("{function}() takes {expected} arguments but {given} were given")]
    Arity {
        /// Function name
        function: String,
        /// Expected argument count
        expected: usize,
        /// Given argument count
        given: usize,
    },

    /// Function failed
    #[error("call failed: {0}")]
    Failed(String),
}
