//! Whole-module redirection
//!
//! Appends a finder to the module system's chain. Old module names are
//! answered with the replacement's code, loaded under the old name.

use super::Patcher;
use crate::directive::{Directive, DirectiveKind, ModuleRedirect};
use crate::error::{ConfigError, PatchError, ResolveError};
use crate::hooks::Hooks;
use crate::registry::{Registry, Selector};
use crate::resolve::{get_module_spec, ResolveContext};
use bwcompat_namespace::{CallSite, ImportError, ModuleFinder, ModulePath, ModuleSpec, ModuleSystem};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// Serves redirected module names through the finder chain
pub struct ModuleRedirector {
    system: Arc<ModuleSystem>,
    finder: Arc<RedirectFinder>,
    installed: Option<Arc<dyn ModuleFinder>>,
}

impl ModuleRedirector {
    /// Patcher name
    pub const NAME: &'static str = "ModuleRedirector";

    /// Create redirector for `system`
    #[must_use]
    pub fn new(system: Arc<ModuleSystem>) -> Self {
        Self {
            system,
            finder: Arc::new(RedirectFinder::default()),
            installed: None,
        }
    }

    /// Redirected module names, in registration order
    #[must_use]
    pub fn modules(&self) -> Vec<ModulePath> {
        self.finder.table.read().keys().cloned().collect()
    }

    /// Directive for `module`, if any
    #[must_use]
    pub fn get(&self, module: &ModulePath) -> Option<Arc<ModuleRedirect>> {
        self.finder.table.read().get(module).cloned()
    }
}

impl Patcher for ModuleRedirector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn populate(&mut self, registry: &Registry) -> Result<(), PatchError> {
        let mut table = IndexMap::new();
        for (module, directives) in registry.by_module(&Selector::Kind(DirectiveKind::ModuleRedirect)) {
            let [Directive::Module(directive)] = directives.as_slice() else {
                return Err(ConfigError::DuplicateModuleRedirect {
                    module: module.to_string(),
                    count: directives.len(),
                }
                .into());
            };
            table.insert(module, Arc::clone(directive));
        }

        tracing::info!(count = table.len(), "populated {}", Self::NAME);
        *self.finder.table.write() = table;
        *self.finder.hooks.write() = Arc::clone(registry.hooks());
        Ok(())
    }

    fn install(&mut self) -> Result<(), PatchError> {
        if self.installed.is_some() {
            return Ok(());
        }
        let finder: Arc<dyn ModuleFinder> = self.finder.clone();
        self.system.add_finder(Arc::clone(&finder));
        self.installed = Some(finder);

        let hooks = self.finder.hooks.read().clone();
        for directive in self.finder.table.read().values() {
            hooks.on_installation(&Directive::Module(Arc::clone(directive)), Self::NAME);
        }
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), PatchError> {
        let Some(finder) = self.installed.take() else {
            tracing::warn!("{} is not installed", Self::NAME);
            return Ok(());
        };

        let served = std::mem::take(&mut *self.finder.served.lock());
        for module in self.system.loaded_modules() {
            let name = module.name();
            if served.iter().any(|s| s.is_prefix_of(name)) {
                tracing::debug!(module = %name, "evicting redirected module");
                self.system.evict(name);
            }
        }

        if !self.system.remove_finder(&finder) {
            return Err(PatchError::Uninstall {
                patcher: Self::NAME,
                message: "finder missing from the module system's chain".to_string(),
            });
        }
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.installed.is_some()
    }
}

impl fmt::Debug for ModuleRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRedirector")
            .field("modules", &self.finder.table.read().len())
            .field("installed", &self.is_installed())
            .finish()
    }
}

#[derive(Default)]
struct RedirectFinder {
    table: RwLock<IndexMap<ModulePath, Arc<ModuleRedirect>>>,
    served: Mutex<Vec<ModulePath>>,
    hooks: RwLock<Arc<Hooks>>,
}

impl ModuleFinder for RedirectFinder {
    fn find_spec(
        &self,
        name: &ModulePath,
        system: &ModuleSystem,
        call_site: CallSite,
    ) -> Result<Option<ModuleSpec>, ImportError> {
        let Some(directive) = self.table.read().get(name).cloned() else {
            return Ok(None);
        };
        tracing::debug!(module = %name, "finding spec using {directive}");

        let hooks = self.hooks.read().clone();
        hooks.on_activation(
            &Directive::Module(Arc::clone(&directive)),
            ModuleRedirector::NAME,
            Some(call_site),
        );

        let cx = ResolveContext::new(system, &hooks, call_site);
        match get_module_spec(&directive, &cx) {
            Ok(spec) => {
                self.served.lock().push(name.clone());
                Ok(Some(spec))
            }
            Err(ResolveError::Removed { .. }) => Err(ImportError::Removed {
                name: name.to_string(),
                origin: directive.origin().map(str::to_string),
            }),
            Err(err) => Err(ImportError::Finder {
                name: name.to_string(),
                source: Box::new(err),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwcompat_namespace::{ModuleCode, Value};

    fn system() -> Arc<ModuleSystem> {
        let system = ModuleSystem::new();
        system.register("pkg", ModuleCode::empty()).unwrap();
        system
            .register("pkg.new", ModuleCode::from_attrs([("VERSION", 2_i64)]))
            .unwrap();
        system
            .register("pkg.new.util", ModuleCode::from_attrs([("helper", "h")]))
            .unwrap();
        Arc::new(system)
    }

    fn registry(directives: Vec<ModuleRedirect>) -> Registry {
        let mut registry = Registry::new();
        registry.add(directives).unwrap();
        registry
    }

    #[test]
    fn serves_replacement_code_under_old_name() {
        let system = system();
        let registry = registry(vec![ModuleRedirect::new("pkg.old", Some("pkg.new")).unwrap()]);
        let mut patcher = ModuleRedirector::new(system.clone());
        patcher.populate(&registry).unwrap();
        patcher.install().unwrap();

        let old = system.import("pkg.old").unwrap();
        let new = system.import("pkg.new").unwrap();
        assert_eq!(old.name().to_string(), "pkg.old");
        assert!(old.code().ptr_eq(new.code()));
        assert_eq!(old.get_attr("VERSION").unwrap(), Value::Int(2));

        let util = system.import("pkg.old.util").unwrap();
        assert_eq!(util.origin().to_string(), "pkg.new.util");

        patcher.uninstall().unwrap();
        assert!(!system.is_loaded("pkg.old"));
        assert!(!system.is_loaded("pkg.old.util"));
        assert!(system.is_loaded("pkg.new"));
        assert!(matches!(
            system.import("pkg.old"),
            Err(ImportError::NotFound { .. })
        ));
        assert_eq!(system.finder_count(), 1);
    }

    #[test]
    fn removed_module_raises() {
        let system = system();
        let registry = registry(vec![ModuleRedirect::new("pkg.gone", None).unwrap()]);
        let mut patcher = ModuleRedirector::new(system.clone());
        patcher.populate(&registry).unwrap();
        patcher.install().unwrap();

        let err = system.import("pkg.gone").unwrap_err();
        assert!(err.is_removed());
        assert!(!system.is_loaded("pkg.gone"));
    }

    #[test]
    fn missing_replacement_is_finder_error() {
        let system = system();
        let registry = registry(vec![ModuleRedirect::new("pkg.old", Some("pkg.nowhere")).unwrap()]);
        let mut patcher = ModuleRedirector::new(system.clone());
        patcher.populate(&registry).unwrap();
        patcher.install().unwrap();

        assert!(matches!(
            system.import("pkg.old"),
            Err(ImportError::Finder { .. })
        ));
    }

    #[test]
    fn duplicate_module_redirect_rejected() {
        let registry = registry(vec![
            ModuleRedirect::new("pkg.old", Some("pkg.new")).unwrap(),
            ModuleRedirect::new("pkg.old", Some("pkg.newer")).unwrap(),
        ]);
        let mut patcher = ModuleRedirector::new(system());

        match patcher.populate(&registry) {
            Err(PatchError::Config(ConfigError::DuplicateModuleRedirect { module, count })) => {
                assert_eq!(module, "pkg.old");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn chained_redirects_resolve() {
        let system = system();
        let registry = registry(vec![
            ModuleRedirect::new("pkg.oldest", Some("pkg.old")).unwrap(),
            ModuleRedirect::new("pkg.old", Some("pkg.new")).unwrap(),
        ]);
        let mut patcher = ModuleRedirector::new(system.clone());
        patcher.populate(&registry).unwrap();
        patcher.install().unwrap();

        let oldest = system.import("pkg.oldest").unwrap();
        assert_eq!(oldest.origin().to_string(), "pkg.new");
    }

    #[test]
    fn uninstall_without_install_is_ok() {
        let mut patcher = ModuleRedirector::new(system());
        patcher.uninstall().unwrap();
        assert!(!patcher.is_installed());
    }
}
