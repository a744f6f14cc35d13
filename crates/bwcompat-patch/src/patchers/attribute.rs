//! Attribute-miss redirection
//!
//! Affected modules get a fallback that is only consulted when normal lookup
//! misses. Modules loaded after installation get it through a load hook.

use super::Patcher;
use crate::directive::{AttributeDirective, AttributeRedirect, Directive, DirectiveKind};
use crate::error::{ConfigError, PatchError};
use crate::hooks::Hooks;
use crate::registry::{Registry, Selector};
use crate::resolve::{get_attribute_value, ResolveContext};
use bwcompat_namespace::{
    AttrFallback, BoxError, CallSite, LoadHook, Module, ModulePath, ModuleSystem, Value,
};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

/// Resolves names missing from affected modules
pub struct AttributeRedirector {
    system: Arc<ModuleSystem>,
    state: Arc<AttrState>,
    installed: Option<Arc<dyn LoadHook>>,
}

impl AttributeRedirector {
    /// Patcher name
    pub const NAME: &'static str = "AttributeRedirector";

    /// Create redirector for `system`
    #[must_use]
    pub fn new(system: Arc<ModuleSystem>) -> Self {
        Self {
            system,
            state: Arc::new(AttrState::default()),
            installed: None,
        }
    }

    /// Affected modules, in registration order
    #[must_use]
    pub fn modules(&self) -> Vec<ModulePath> {
        self.state.tables.read().keys().cloned().collect()
    }

    /// Number of module instances currently carrying the fallback
    #[must_use]
    pub fn touched(&self) -> usize {
        self.state.touched.lock().len()
    }
}

impl Patcher for AttributeRedirector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn populate(&mut self, registry: &Registry) -> Result<(), PatchError> {
        let system = Arc::downgrade(&self.system);
        let hooks = Arc::clone(registry.hooks());

        let mut tables = IndexMap::new();
        for (module, directives) in
            registry.by_module(&Selector::Kind(DirectiveKind::AttributeRedirect))
        {
            let mut by_name = IndexMap::new();
            for directive in directives.iter().filter_map(Directive::as_attribute_redirect) {
                let name = directive.name().to_string();
                if by_name.contains_key(&name) {
                    return Err(ConfigError::DuplicateAttributeRedirect {
                        module: module.to_string(),
                        name,
                    }
                    .into());
                }
                by_name.insert(name, Arc::clone(directive));
            }

            let getattr = ModuleGetattr {
                directives: by_name,
                system: Weak::clone(&system),
                hooks: Arc::clone(&hooks),
            };
            tables.insert(module, Arc::new(getattr));
        }

        tracing::info!(modules = tables.len(), "populated {}", Self::NAME);
        *self.state.tables.write() = tables;
        Ok(())
    }

    fn install(&mut self) -> Result<(), PatchError> {
        if self.installed.is_some() {
            return Ok(());
        }

        for module in self.system.loaded_modules() {
            self.state.attach(&module);
        }
        let hook: Arc<dyn LoadHook> = self.state.clone();
        self.system.add_load_hook(Arc::clone(&hook));
        self.installed = Some(hook);

        for getattr in self.state.tables.read().values() {
            for directive in getattr.directives.values() {
                getattr
                    .hooks
                    .on_installation(&Directive::Attribute(Arc::clone(directive)), Self::NAME);
            }
        }
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), PatchError> {
        let Some(hook) = self.installed.take() else {
            tracing::warn!("{} is not installed", Self::NAME);
            return Ok(());
        };

        let removed = self.system.remove_load_hook(&hook);

        let touched = std::mem::take(&mut *self.state.touched.lock());
        for (module, previous) in touched.into_iter().rev() {
            tracing::debug!(module = %module.name(), "restoring attribute fallback");
            module.set_fallback(previous);
        }

        if !removed {
            return Err(PatchError::Uninstall {
                patcher: Self::NAME,
                message: "load hook missing from the module system".to_string(),
            });
        }
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.installed.is_some()
    }
}

impl fmt::Debug for AttributeRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRedirector")
            .field("modules", &self.state.tables.read().len())
            .field("touched", &self.touched())
            .field("installed", &self.is_installed())
            .finish()
    }
}

type Touched = (Arc<Module>, Option<Arc<dyn AttrFallback>>);

#[derive(Default)]
struct AttrState {
    tables: RwLock<IndexMap<ModulePath, Arc<ModuleGetattr>>>,
    touched: Mutex<Vec<Touched>>,
}

impl AttrState {
    fn attach(&self, module: &Arc<Module>) {
        let Some(getattr) = self.tables.read().get(module.name()).cloned() else {
            return;
        };
        tracing::debug!(module = %module.name(), "attaching attribute fallback");
        let previous = module.set_fallback(Some(getattr));
        self.touched.lock().push((Arc::clone(module), previous));
    }
}

impl LoadHook for AttrState {
    fn on_load(&self, module: &Arc<Module>) {
        self.attach(module);
    }
}

/// Fallback for one module: `name -> directive`
struct ModuleGetattr {
    directives: IndexMap<String, Arc<AttributeRedirect>>,
    system: Weak<ModuleSystem>,
    hooks: Arc<Hooks>,
}

impl AttrFallback for ModuleGetattr {
    fn resolve(
        &self,
        _module: &Module,
        name: &str,
        call_site: CallSite,
    ) -> Result<Option<Value>, BoxError> {
        let Some(directive) = self.directives.get(name) else {
            return Ok(None);
        };

        self.hooks.on_activation(
            &Directive::Attribute(Arc::clone(directive)),
            AttributeRedirector::NAME,
            Some(call_site),
        );

        let system = self
            .system
            .upgrade()
            .ok_or("module system was dropped while redirects were installed")?;
        let cx = ResolveContext::new(&system, &self.hooks, call_site);
        Ok(Some(get_attribute_value(directive.as_ref(), &cx)?))
    }
}
