//! Testing utilities for bwcompat workspace
//!
//! Shared fixtures, a recording deprecation sink, and tracing setup.

#![allow(missing_docs)]

use bwcompat_namespace::{CallSite, DeprecationSink, ModuleCode, ModuleSystem, Object, Value};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub logger_name: String,
    pub call_site: Option<CallSite>,
}

/// Sink that keeps every warning for later assertions
#[derive(Debug, Default)]
pub struct RecordingSink {
    warnings: Mutex<Vec<Warning>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.warnings.lock().iter().map(|w| w.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.lock().is_empty()
    }

    pub fn clear(&self) {
        self.warnings.lock().clear();
    }
}

impl DeprecationSink for RecordingSink {
    fn warn(&self, message: &str, logger_name: &str, call_site: Option<CallSite>) {
        self.warnings.lock().push(Warning {
            message: message.to_string(),
            logger_name: logger_name.to_string(),
            call_site,
        });
    }
}

pub fn helper_fn() -> Value {
    Value::function("helper", |args| Ok(Value::Int(i64::try_from(args.len()).unwrap_or(i64::MAX))))
}

/// Package renamed from `pkg.old` to `pkg.new`
///
/// - `pkg`
/// - `pkg.new`: `VERSION`, `Block`
/// - `pkg.new.util`: `helper`, `TOLERANCE`
/// - `pkg.compat`: compatibility `Block`
/// - `pkg.models.pure`: `NIST` object with `cp_mol_ig_comp`
pub fn renamed_package() -> Arc<ModuleSystem> {
    let system = ModuleSystem::new();
    let block = Object::new("Block").with_attr("kind", "new");
    let compat_block = Object::new("Block").with_attr("kind", "compat");
    let nist = Object::new("NIST").with_attr("cp_mol_ig_comp", Value::Float(29.1));

    let modules = [
        ("pkg", ModuleCode::empty()),
        (
            "pkg.new",
            ModuleCode::from_attrs([("VERSION", Value::Int(2)), ("Block", block.into())]),
        ),
        (
            "pkg.new.util",
            ModuleCode::from_attrs([("helper", helper_fn()), ("TOLERANCE", Value::Float(1e-8))]),
        ),
        ("pkg.compat", ModuleCode::from_attrs([("Block", compat_block)])),
        ("pkg.models", ModuleCode::empty()),
        ("pkg.models.pure", ModuleCode::from_attrs([("NIST", nist)])),
    ];
    for (name, code) in modules {
        system.register(name, code).unwrap();
    }
    Arc::new(system)
}

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
