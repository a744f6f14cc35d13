//! Lazy resolution of redirect targets
//!
//! Both functions cache their result on the directive, so a target is
//! imported and walked at most once per directive. A directive whose target
//! leads back to itself fails with [`ResolveError::Cycle`].

use crate::directive::{AttributeDirective, ModuleRedirect, Replacement, TargetSpec};
use crate::error::ResolveError;
use crate::hooks::Hooks;
use bwcompat_namespace::{CallSite, ImportError, ModuleSpec, ModuleSystem, Placeholder, Value};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static RESOLVING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a directive as being resolved on this thread until dropped
struct ResolvingGuard(usize);

impl ResolvingGuard {
    fn enter<T>(cell: &T) -> Option<Self> {
        let key = (cell as *const T) as usize;
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&key) {
                return None;
            }
            stack.push(key);
            Some(Self(key))
        })
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(idx) = stack.iter().rposition(|key| *key == self.0) {
                stack.remove(idx);
            }
        });
    }
}

/// What resolution needs from its surroundings
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    system: &'a ModuleSystem,
    hooks: &'a Hooks,
    call_site: CallSite,
}

impl<'a> ResolveContext<'a> {
    /// Create context
    #[inline]
    #[must_use]
    pub fn new(system: &'a ModuleSystem, hooks: &'a Hooks, call_site: CallSite) -> Self {
        Self {
            system,
            hooks,
            call_site,
        }
    }

    /// Module system targets are imported through
    #[inline]
    #[must_use]
    pub fn system(&self) -> &'a ModuleSystem {
        self.system
    }

    /// Client code location
    #[inline]
    #[must_use]
    pub fn call_site(&self) -> CallSite {
        self.call_site
    }
}

/// Value an attribute directive stands for
///
/// # Errors
/// Returns error naming the directive if the target module cannot be
/// imported or the attribute chain breaks
pub fn get_attribute_value<D>(directive: &D, cx: &ResolveContext<'_>) -> Result<Value, ResolveError>
where
    D: AttributeDirective + ?Sized,
{
    match directive.replacement() {
        Replacement::Value(value) => Ok(value.clone()),
        Replacement::Target(spec) => {
            if let Some(value) = directive.resolved().get() {
                return Ok(value.clone());
            }
            let _guard = ResolvingGuard::enter(directive.resolved()).ok_or_else(|| {
                ResolveError::Cycle {
                    directive: directive.to_string(),
                }
            })?;
            directive
                .resolved()
                .get_or_try_init(|| resolve_target(directive, spec, cx))
                .cloned()
        }
        Replacement::Removed => Ok(directive
            .resolved()
            .get_or_init(|| {
                let message = format!(
                    "The '{}' attribute of {} is not available anymore.",
                    directive.name(),
                    directive.module()
                );
                Value::Placeholder(Arc::new(Placeholder::with_target(
                    message,
                    cx.hooks.warning_target(),
                )))
            })
            .clone()),
    }
}

fn resolve_target<D>(directive: &D, spec: &TargetSpec, cx: &ResolveContext<'_>) -> Result<Value, ResolveError>
where
    D: AttributeDirective + ?Sized,
{
    tracing::debug!(target_spec = %spec, "resolving {directive}");
    let module = cx
        .system
        .import_path(spec.module(), cx.call_site)
        .map_err(|source| ResolveError::Import {
            directive: directive.to_string(),
            target: spec.to_string(),
            source,
        })?;

    let mut value = Value::Module(module);
    for name in spec.attr_chain() {
        value = value
            .get_attr_at(name, cx.call_site)
            .map_err(|source| ResolveError::Attribute {
                directive: directive.to_string(),
                target: spec.to_string(),
                source,
            })?;
    }
    Ok(value)
}

/// Spec loading the replacement's code under the redirected name
///
/// The replacement is looked up through the whole finder chain, so chained
/// redirects resolve transitively.
///
/// # Errors
/// Returns [`ResolveError::Removed`] if the module has no replacement, or an
/// import error if the replacement cannot be found
pub fn get_module_spec(
    directive: &ModuleRedirect,
    cx: &ResolveContext<'_>,
) -> Result<ModuleSpec, ResolveError> {
    let Some(replacement) = directive.replacement() else {
        return Err(ResolveError::Removed {
            directive: directive.to_string(),
            module: directive.module().to_string(),
        });
    };

    if let Some(spec) = directive.resolved().get() {
        return Ok(spec.renamed(directive.module().clone()));
    }
    let _guard = ResolvingGuard::enter(directive.resolved()).ok_or_else(|| ResolveError::Cycle {
        directive: directive.to_string(),
    })?;
    let spec = directive.resolved().get_or_try_init(|| {
        tracing::debug!("resolving {directive}");
        let import_error = |source: ImportError| ResolveError::Import {
            directive: directive.to_string(),
            target: replacement.to_string(),
            source,
        };
        cx.system
            .find_spec(replacement, cx.call_site)
            .map_err(import_error)?
            .ok_or_else(|| {
                import_error(ImportError::NotFound {
                    name: replacement.to_string(),
                })
            })
    })?;

    Ok(spec.renamed(directive.module().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::AttributeRedirect;
    use bwcompat_namespace::{ModuleCode, Object};

    fn system() -> ModuleSystem {
        let system = ModuleSystem::new();
        system.register("models", ModuleCode::empty()).unwrap();
        let nist = Object::new("NIST").with_attr("cp_mol_ig_comp", Value::function("cp", |_| Ok(Value::Float(1.5))));
        system
            .register("models.pure", ModuleCode::from_attrs([("NIST", nist)]))
            .unwrap();
        system
    }

    #[test]
    fn target_walks_attribute_chain() {
        let system = system();
        let hooks = Hooks::default();
        let cx = ResolveContext::new(&system, &hooks, CallSite::caller());
        let directive =
            AttributeRedirect::new("props.pure", "cp_mol_ig_comp", "models.pure:NIST.cp_mol_ig_comp").unwrap();

        let value = get_attribute_value(&directive, &cx).unwrap();
        assert_eq!(value.call(&[]).unwrap(), Value::Float(1.5));
        assert!(directive.resolved().get().is_some());
    }

    #[test]
    fn resolution_is_cached() {
        let system = system();
        let hooks = Hooks::default();
        let cx = ResolveContext::new(&system, &hooks, CallSite::caller());
        let directive = AttributeRedirect::new("props.pure", "NIST", "models.pure:NIST").unwrap();

        let first = get_attribute_value(&directive, &cx).unwrap();
        let module = system.import("models.pure").unwrap();
        module.remove_attr("NIST");

        let second = get_attribute_value(&directive, &cx).unwrap();
        assert!(first.same_as(&second));
    }

    #[test]
    fn missing_target_names_directive() {
        let system = system();
        let hooks = Hooks::default();
        let cx = ResolveContext::new(&system, &hooks, CallSite::caller());

        let bad_module = AttributeRedirect::new("props", "x", "models.gone:x").unwrap();
        let err = get_attribute_value(&bad_module, &cx).unwrap_err();
        assert!(matches!(err, ResolveError::Import { .. }));
        assert!(err.directive().contains("props:x"));

        let bad_attr = AttributeRedirect::new("props", "y", "models.pure:NIST.nope").unwrap();
        assert!(matches!(
            get_attribute_value(&bad_attr, &cx).unwrap_err(),
            ResolveError::Attribute { .. }
        ));
        assert!(bad_attr.resolved().get().is_none());
    }

    #[test]
    fn removed_yields_same_placeholder() {
        let system = system();
        let hooks = Hooks::default();
        let cx = ResolveContext::new(&system, &hooks, CallSite::caller());
        let directive = AttributeRedirect::new("props", "gone", None::<&str>).unwrap();

        let a = get_attribute_value(&directive, &cx).unwrap();
        let b = get_attribute_value(&directive, &cx).unwrap();
        assert!(a.is_placeholder());
        assert!(a.same_as(&b));
    }

    #[test]
    fn concrete_value_unchanged() {
        let system = system();
        let hooks = Hooks::default();
        let cx = ResolveContext::new(&system, &hooks, CallSite::caller());
        let directive = AttributeRedirect::new("props", "answer", Value::Int(42)).unwrap();
        assert_eq!(get_attribute_value(&directive, &cx).unwrap(), Value::Int(42));
    }

    #[test]
    fn module_spec_renamed_and_removed() {
        let system = system();
        let hooks = Hooks::default();
        let cx = ResolveContext::new(&system, &hooks, CallSite::caller());

        let moved = ModuleRedirect::new("props.pure", Some("models.pure")).unwrap();
        let spec = get_module_spec(&moved, &cx).unwrap();
        assert_eq!(spec.name().to_string(), "props.pure");
        assert_eq!(spec.origin().to_string(), "models.pure");

        let removed = ModuleRedirect::new("props.old", None).unwrap();
        assert!(matches!(
            get_module_spec(&removed, &cx),
            Err(ResolveError::Removed { .. })
        ));
    }
}
