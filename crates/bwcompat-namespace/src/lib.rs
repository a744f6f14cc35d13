//! bwcompat Namespace Runtime
//!
//! Explicit module namespace that client code imports through, and that
//! compatibility shims intercept.
//!
//! # Overview
//!
//! - **ModuleSystem**: resolver with a module cache, a finder chain and load hooks
//! - **Module**: attribute table with an optional miss-only fallback
//! - **Value**: dynamically typed module contents
//! - **DeprecationSink**: seam through which warnings leave the runtime
//!
//! # Example
//!
//! ```rust
//! use bwcompat_namespace::{ModuleCode, ModuleSystem, Value};
//!
//! let system = ModuleSystem::new();
//! system.register("pkg", ModuleCode::empty()).unwrap();
//! system
//!     .register("pkg.util", ModuleCode::from_attrs([("answer", 42_i64)]))
//!     .unwrap();
//!
//! let util = system.import("pkg.util").unwrap();
//! assert_eq!(util.get_attr("answer").unwrap(), Value::Int(42));
//! ```

pub mod error;
pub mod module;
pub mod path;
pub mod system;
pub mod value;
pub mod warn;

// Re-exports
pub use error::{AttributeError, BoxError, CallError, ImportError};
pub use module::{AttrFallback, Module, ModuleCode};
pub use path::{validate_identifier, ModulePath, PathError};
pub use system::{LoadHook, LookupError, ModuleFinder, ModuleSpec, ModuleSystem, SourceFinder};
pub use value::{Function, Object, Value};
pub use warn::{CallSite, DeprecationSink, FixedTarget, Placeholder, TracingSink, WarningTarget};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for namespace operations
    pub use crate::{
        AttrFallback, CallSite, DeprecationSink, Function, ImportError, LoadHook, Module,
        ModuleCode, ModuleFinder, ModulePath, ModuleSpec, ModuleSystem, Object, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
