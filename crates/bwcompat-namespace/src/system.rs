//! Module system
//!
//! Provides [`ModuleSystem`], the resolver client code imports through.
//! Interception points plug in at two seams:
//! - [`ModuleFinder`]: ordered chain asked for a [`ModuleSpec`] on a cache miss
//! - [`LoadHook`]: run after a module body has executed

use crate::error::ImportError;
use crate::module::{Module, ModuleCode};
use crate::path::{ModulePath, PathError};
use crate::value::Value;
use crate::warn::CallSite;
use crate::AttributeError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Where to load a module's code from
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    name: ModulePath,
    origin: ModulePath,
    code: ModuleCode,
}

impl ModuleSpec {
    /// Create spec loading `code` (found under `origin`) as `name`
    #[inline]
    #[must_use]
    pub fn new(name: ModulePath, origin: ModulePath, code: ModuleCode) -> Self {
        Self { name, origin, code }
    }

    /// Same code and origin, presented under another name
    #[inline]
    #[must_use]
    pub fn renamed(&self, name: ModulePath) -> Self {
        Self {
            name,
            origin: self.origin.clone(),
            code: self.code.clone(),
        }
    }

    /// Name the module will be presented under
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ModulePath {
        &self.name
    }

    /// Path the code was found under
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &ModulePath {
        &self.origin
    }

    /// Module code
    #[inline]
    #[must_use]
    pub fn code(&self) -> &ModuleCode {
        &self.code
    }
}

/// Link in the finder chain
pub trait ModuleFinder: Send + Sync {
    /// Produce a spec for `name`, or `Ok(None)` to let the next finder try
    ///
    /// # Errors
    /// Returns error to abort the import
    fn find_spec(
        &self,
        name: &ModulePath,
        system: &ModuleSystem,
        call_site: CallSite,
    ) -> Result<Option<ModuleSpec>, ImportError>;
}

/// Callback run after a module body has executed
pub trait LoadHook: Send + Sync {
    /// Observe a freshly executed module before it is cached
    fn on_load(&self, module: &Arc<Module>);
}

/// Built-in finder over the registered sources
///
/// Submodules of a package loaded from another origin are also looked up
/// under that origin, so they follow a relocated package.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceFinder;

impl ModuleFinder for SourceFinder {
    fn find_spec(
        &self,
        name: &ModulePath,
        system: &ModuleSystem,
        _call_site: CallSite,
    ) -> Result<Option<ModuleSpec>, ImportError> {
        if let Some(code) = system.source(name) {
            return Ok(Some(ModuleSpec::new(name.clone(), name.clone(), code)));
        }

        let Some(parent) = name.parent() else {
            return Ok(None);
        };
        let Some(package) = system.loaded(&parent) else {
            return Ok(None);
        };
        if !package.is_relocated() {
            return Ok(None);
        }

        let relocated = package.origin().child(name.last())?;
        Ok(system
            .source(&relocated)
            .map(|code| ModuleSpec::new(name.clone(), relocated, code)))
    }
}

/// Resolver for modules and their attributes
///
/// Holds the installed sources, the module cache, the finder chain and the
/// load hooks. A fresh system has a single [`SourceFinder`] in its chain.
pub struct ModuleSystem {
    sources: RwLock<IndexMap<ModulePath, ModuleCode>>,
    modules: RwLock<IndexMap<ModulePath, Arc<Module>>>,
    finders: RwLock<Vec<Arc<dyn ModuleFinder>>>,
    load_hooks: RwLock<Vec<Arc<dyn LoadHook>>>,
}

impl ModuleSystem {
    /// Create system with the built-in source finder
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(IndexMap::new()),
            modules: RwLock::new(IndexMap::new()),
            finders: RwLock::new(vec![Arc::new(SourceFinder)]),
            load_hooks: RwLock::new(Vec::new()),
        }
    }

    /// Install module code under `name`
    ///
    /// # Errors
    /// Returns error if `name` is not a valid module path
    pub fn register(&self, name: &str, code: ModuleCode) -> Result<(), PathError> {
        let path: ModulePath = name.parse()?;
        self.sources.write().insert(path, code);
        Ok(())
    }

    /// Check if code is installed under `name`
    #[must_use]
    pub fn has_source(&self, name: &ModulePath) -> bool {
        self.sources.read().contains_key(name)
    }

    /// Installed code for `name`
    #[must_use]
    pub fn source(&self, name: &ModulePath) -> Option<ModuleCode> {
        self.sources.read().get(name).cloned()
    }

    /// Import a module by dotted name
    ///
    /// Parent packages are imported first. The result is cached, so repeated
    /// imports return the same module.
    ///
    /// # Errors
    /// Returns error if the name is invalid, no finder knows it, a finder
    /// aborts, or the module body fails
    #[track_caller]
    pub fn import(&self, name: &str) -> Result<Arc<Module>, ImportError> {
        self.import_at(name, CallSite::caller())
    }

    /// Import on behalf of `call_site`
    ///
    /// # Errors
    /// See [`ModuleSystem::import`]
    pub fn import_at(&self, name: &str, call_site: CallSite) -> Result<Arc<Module>, ImportError> {
        let path: ModulePath = name.parse()?;
        self.import_path(&path, call_site)
    }

    /// Import an already parsed path on behalf of `call_site`
    ///
    /// # Errors
    /// See [`ModuleSystem::import`]
    pub fn import_path(
        &self,
        path: &ModulePath,
        call_site: CallSite,
    ) -> Result<Arc<Module>, ImportError> {
        if let Some(module) = self.loaded(path) {
            return Ok(module);
        }

        if let Some(parent) = path.parent() {
            self.import_path(&parent, call_site)?;
        }

        let spec = self
            .find_spec(path, call_site)?
            .ok_or_else(|| ImportError::NotFound {
                name: path.to_string(),
            })?;

        tracing::debug!(module = %path, origin = %spec.origin(), "loading module");
        let module = Arc::new(Module::new(
            spec.name().clone(),
            spec.origin().clone(),
            spec.code().clone(),
        ));
        spec.code()
            .exec(&module)
            .map_err(|message| ImportError::Exec {
                name: path.to_string(),
                message,
            })?;

        let hooks = self.load_hooks.read().clone();
        for hook in hooks {
            hook.on_load(&module);
        }

        let mut modules = self.modules.write();
        Ok(modules.entry(path.clone()).or_insert(module).clone())
    }

    /// Import `module` and look up `name` in it
    ///
    /// # Errors
    /// Returns error if the import or the lookup fails
    #[track_caller]
    pub fn lookup(&self, module: &str, name: &str) -> Result<Value, LookupError> {
        let call_site = CallSite::caller();
        let module = self.import_at(module, call_site)?;
        Ok(module.get_attr_at(name, call_site)?)
    }

    /// Ask the finder chain for a spec
    ///
    /// # Errors
    /// Returns the first finder error
    pub fn find_spec(
        &self,
        name: &ModulePath,
        call_site: CallSite,
    ) -> Result<Option<ModuleSpec>, ImportError> {
        // Clone out so finders may import reentrantly.
        let finders = self.finders.read().clone();
        for finder in finders {
            if let Some(spec) = finder.find_spec(name, self, call_site)? {
                return Ok(Some(spec));
            }
        }
        Ok(None)
    }

    /// Cached module, if loaded
    #[must_use]
    pub fn loaded(&self, name: &ModulePath) -> Option<Arc<Module>> {
        self.modules.read().get(name).cloned()
    }

    /// Check if `name` is in the module cache
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        name.parse::<ModulePath>()
            .map(|path| self.modules.read().contains_key(&path))
            .unwrap_or(false)
    }

    /// All cached modules in load order
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<Arc<Module>> {
        self.modules.read().values().cloned().collect()
    }

    /// Drop `name` from the module cache
    pub fn evict(&self, name: &ModulePath) -> Option<Arc<Module>> {
        self.modules.write().shift_remove(name)
    }

    /// Append a finder to the chain
    pub fn add_finder(&self, finder: Arc<dyn ModuleFinder>) {
        self.finders.write().push(finder);
    }

    /// Remove a finder previously added; returns false if it was not present
    pub fn remove_finder(&self, finder: &Arc<dyn ModuleFinder>) -> bool {
        let mut finders = self.finders.write();
        match finders.iter().position(|f| Arc::ptr_eq(f, finder)) {
            Some(idx) => {
                finders.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of finders in the chain
    #[must_use]
    pub fn finder_count(&self) -> usize {
        self.finders.read().len()
    }

    /// Register a load hook
    pub fn add_load_hook(&self, hook: Arc<dyn LoadHook>) {
        self.load_hooks.write().push(hook);
    }

    /// Remove a load hook previously added; returns false if it was not present
    pub fn remove_load_hook(&self, hook: &Arc<dyn LoadHook>) -> bool {
        let mut hooks = self.load_hooks.write();
        match hooks.iter().position(|h| Arc::ptr_eq(h, hook)) {
            Some(idx) => {
                hooks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of registered load hooks
    #[must_use]
    pub fn load_hook_count(&self) -> usize {
        self.load_hooks.read().len()
    }
}

impl Default for ModuleSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSystem")
            .field("sources", &self.sources.read().len())
            .field("modules", &self.modules.read().len())
            .field("finders", &self.finder_count())
            .field("load_hooks", &self.load_hook_count())
            .finish()
    }
}

/// Failure of a combined import-and-lookup
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Module import failed
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Attribute lookup failed
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use parking_lot::Mutex;

    fn system() -> ModuleSystem {
        let system = ModuleSystem::new();
        system.register("pkg", ModuleCode::empty()).unwrap();
        system
            .register("pkg.new", ModuleCode::from_attrs([("VERSION", 2_i64)]))
            .unwrap();
        system
            .register("pkg.new.util", ModuleCode::from_attrs([("helper", "h")]))
            .unwrap();
        system
    }

    struct Alias {
        from: ModulePath,
        to: ModulePath,
    }

    impl ModuleFinder for Alias {
        fn find_spec(
            &self,
            name: &ModulePath,
            system: &ModuleSystem,
            call_site: CallSite,
        ) -> Result<Option<ModuleSpec>, ImportError> {
            if name != &self.from {
                return Ok(None);
            }
            Ok(system
                .find_spec(&self.to, call_site)?
                .map(|spec| spec.renamed(name.clone())))
        }
    }

    #[derive(Default)]
    struct Seen(Mutex<Vec<String>>);

    impl LoadHook for Seen {
        fn on_load(&self, module: &Arc<Module>) {
            self.0.lock().push(module.name().to_string());
        }
    }

    #[test]
    fn import_caches_modules() {
        let system = system();
        let a = system.import("pkg.new").unwrap();
        let b = system.import("pkg.new").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(system.is_loaded("pkg"));
        assert_eq!(a.get_attr("VERSION").unwrap(), Value::Int(2));
    }

    #[test]
    fn import_missing_module() {
        let system = system();
        let err = system.import("pkg.old").unwrap_err();
        assert!(matches!(err, ImportError::NotFound { ref name } if name == "pkg.old"));
        assert!(!system.is_loaded("pkg.old"));
    }

    #[test]
    fn import_invalid_name() {
        let system = system();
        assert!(matches!(
            system.import("pkg..new"),
            Err(ImportError::InvalidName(_))
        ));
    }

    #[test]
    fn finder_presents_code_under_requested_name() {
        let system = system();
        let finder: Arc<dyn ModuleFinder> = Arc::new(Alias {
            from: "pkg.old".parse().unwrap(),
            to: "pkg.new".parse().unwrap(),
        });
        system.add_finder(finder.clone());

        let old = system.import("pkg.old").unwrap();
        let new = system.import("pkg.new").unwrap();
        assert_eq!(old.name().to_string(), "pkg.old");
        assert_eq!(old.origin().to_string(), "pkg.new");
        assert!(old.code().ptr_eq(new.code()));

        assert!(system.remove_finder(&finder));
        assert!(!system.remove_finder(&finder));
    }

    #[test]
    fn submodules_follow_relocated_package() {
        let system = system();
        system.add_finder(Arc::new(Alias {
            from: "pkg.old".parse().unwrap(),
            to: "pkg.new".parse().unwrap(),
        }));

        let util = system.import("pkg.old.util").unwrap();
        assert_eq!(util.origin().to_string(), "pkg.new.util");
        assert_eq!(util.get_attr("helper").unwrap(), Value::str("h"));
    }

    #[test]
    fn load_hooks_see_new_modules() {
        let system = system();
        let seen = Arc::new(Seen::default());
        let hook: Arc<dyn LoadHook> = seen.clone();
        system.add_load_hook(hook.clone());

        system.import("pkg.new").unwrap();
        system.import("pkg.new").unwrap();
        assert_eq!(*seen.0.lock(), vec!["pkg", "pkg.new"]);

        assert!(system.remove_load_hook(&hook));
        assert_eq!(system.load_hook_count(), 0);
    }

    #[test]
    fn evict_forces_reload() {
        let system = system();
        let first = system.import("pkg.new").unwrap();
        assert!(system.evict(first.name()).is_some());

        let second = system.import("pkg.new").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn lookup_combines_import_and_attribute() {
        let system = system();
        assert_eq!(
            system.lookup("pkg.new.util", "helper").unwrap(),
            Value::str("h")
        );
        assert!(matches!(
            system.lookup("pkg.new.util", "nope"),
            Err(LookupError::Attribute(_))
        ));
    }
}
