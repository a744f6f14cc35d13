//! Patchers
//!
//! A patcher turns the directives of one kind into live interception points
//! in a [`ModuleSystem`](bwcompat_namespace::ModuleSystem):
//! - [`ModuleRedirector`]: finder serving old module names
//! - [`AttributeRedirector`]: miss-only fallback on affected modules
//! - [`OverwriteInstaller`]: in-place attribute replacement

mod attribute;
mod module;
mod overwrite;

pub use attribute::AttributeRedirector;
pub use module::ModuleRedirector;
pub use overwrite::{OverwriteInstaller, Prior};

use crate::error::PatchError;
use crate::registry::Registry;

/// Installs and removes the interception points for a set of directives
///
/// # Contract
/// `populate` always discards previously built state. `install` and
/// `uninstall` are exact inverses: after `uninstall` the module system is
/// observably as it was before `install`.
pub trait Patcher: Send + Sync + std::fmt::Debug {
    /// Patcher name (for hooks and logging)
    fn name(&self) -> &'static str;

    /// Build internal tables from the registry's directives
    ///
    /// # Errors
    /// Returns a configuration error on conflicting directives
    fn populate(&mut self, registry: &Registry) -> Result<(), PatchError>;

    /// Install interception points
    ///
    /// # Errors
    /// Returns error if installation fails; partial work is undone
    fn install(&mut self) -> Result<(), PatchError>;

    /// Remove interception points and restore prior state
    ///
    /// Calling this when not installed logs a warning and returns `Ok`.
    ///
    /// # Errors
    /// Returns error if modified state cannot be restored
    fn uninstall(&mut self) -> Result<(), PatchError>;

    /// Check if interception points are currently installed
    fn is_installed(&self) -> bool;
}
