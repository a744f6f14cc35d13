//! bwcompat Patch - directive-driven compatibility shims
//!
//! Keeps old names for modules and attributes working after a package has
//! been reorganized:
//! - Directives declare what moved where (or that it is gone)
//! - The registry aggregates directives and drives the patchers
//! - Patchers install interception points in a [`ModuleSystem`]
//! - Hooks report every exercised directive to a deprecation sink
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bwcompat_namespace::{ModuleCode, ModuleSystem, Value};
//! use bwcompat_patch::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let system = Arc::new(ModuleSystem::new());
//! system.register("pkg", ModuleCode::empty())?;
//! system.register("pkg.new", ModuleCode::empty())?;
//! system.register("pkg.new.util", ModuleCode::from_attrs([("helper", "h")]))?;
//!
//! let mut registry = Registry::new();
//! registry.add(vec![
//!     Directive::from(ModuleRedirect::new("pkg.old", Some("pkg.new"))?),
//!     AttributeRedirect::parse("pkg.old.util:helper_fn", "pkg.new.util:helper")?.into(),
//! ])?;
//! registry.enable(default_patchers(&system))?;
//!
//! registry.activate()?;
//! assert_eq!(system.lookup("pkg.old.util", "helper_fn")?, Value::str("h"));
//! registry.deactivate()?;
//!
//! assert!(system.import("pkg.old").is_err());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod directive;
pub mod error;
pub mod hooks;
pub mod patchers;
pub mod plugin;
pub mod registry;
pub mod resolve;
pub mod table;
pub mod verify;

// Re-exports for convenience
pub use config::{RegistryConfig, DEFAULT_LOGGER_NAME, DEFAULT_PLUGIN_GROUP};
pub use directive::{
    AttributeDirective, AttributeOverwrite, AttributeRedirect, Directive, DirectiveKind,
    ModuleRedirect, Replacement, TargetSpec,
};
pub use error::{ConfigError, PatchError, ResolveError};
pub use hooks::{DeprecationMessages, HandlerId, HookContext, HookEvent, Hooks};
pub use patchers::{AttributeRedirector, ModuleRedirector, OverwriteInstaller, Patcher, Prior};
pub use plugin::{EntryPoint, PluginCatalog};
pub use registry::{EngineState, Registrable, Registry, Selector};
pub use resolve::{get_attribute_value, get_module_spec, ResolveContext};
pub use table::DirectiveTable;
pub use verify::{verify_importables, Check, Importable, Outcome, VerifyReport};

use bwcompat_namespace::ModuleSystem;
use std::sync::Arc;

/// The three standard patchers, in activation order
///
/// Attribute fallbacks go first so that modules served by the module
/// redirector already get them through the load hook.
#[must_use]
pub fn default_patchers(system: &Arc<ModuleSystem>) -> Vec<Box<dyn Patcher>> {
    vec![
        Box::new(AttributeRedirector::new(Arc::clone(system))),
        Box::new(ModuleRedirector::new(Arc::clone(system))),
        Box::new(OverwriteInstaller::new(Arc::clone(system))),
    ]
}

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for declaring and activating shims
    pub use crate::{
        default_patchers, AttributeOverwrite, AttributeRedirect, DeprecationMessages, Directive,
        DirectiveKind, DirectiveTable, HookEvent, ModuleRedirect, PatchError, Patcher, Registry,
        RegistryConfig, Replacement, Selector,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
