//! Bulk directive declarations
//!
//! A [`DirectiveTable`] is the document form of the bulk constructors:
//!
//! ```yaml
//! config:
//!   subject: IDAES v1 API
//! modules:
//!   idaes.dmf: idaes.core.dmf
//!   idaes.dmf.tabular: null
//! attributes:
//!   idaes.core.util:
//!     get_solver: idaes.core.solvers:get_solver
//!     copy_port_values: null
//! overwrites:
//!   idaes.core.base.process_block:
//!     ProcessBlockData: idaes_compat.process_block:ProcessBlockData
//! ```

use crate::config::RegistryConfig;
use crate::directive::{AttributeOverwrite, AttributeRedirect, Directive, ModuleRedirect};
use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declaration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectiveTable {
    /// Registry configuration carried with the declarations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RegistryConfig>,
    /// `old module -> new module`, `null` when removed
    pub modules: IndexMap<String, Option<String>>,
    /// `module -> name -> replacement`, `null` when removed
    pub attributes: IndexMap<String, IndexMap<String, Option<String>>>,
    /// `module -> name -> replacement`
    pub overwrites: IndexMap<String, IndexMap<String, String>>,
}

impl DirectiveTable {
    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns error if the document does not have the table's shape
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns error if the document does not have the table's shape
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Number of directives the table expands to
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
            + self.attributes.values().map(IndexMap::len).sum::<usize>()
            + self.overwrites.values().map(IndexMap::len).sum::<usize>()
    }

    /// Check if the table declares nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand into directives: module redirects, then attribute redirects,
    /// then overwrites, each in document order
    ///
    /// # Errors
    /// Returns the first invalid module path, name or target
    pub fn into_directives(self) -> Result<Vec<Directive>, ConfigError> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(
            ModuleRedirect::from_mapping(self.modules)?
                .into_iter()
                .map(Directive::from),
        );
        out.extend(
            AttributeRedirect::for_modules(self.attributes)?
                .into_iter()
                .map(Directive::from),
        );
        out.extend(
            AttributeOverwrite::for_modules(self.overwrites)?
                .into_iter()
                .map(Directive::from),
        );
        Ok(out)
    }
}
