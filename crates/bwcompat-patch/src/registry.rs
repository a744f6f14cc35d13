//! Directive registry
//!
//! The registry aggregates directives from several sources and drives the
//! enabled patchers as a unit. It holds no interception state itself.

use crate::config::RegistryConfig;
use crate::directive::{AttributeOverwrite, AttributeRedirect, Directive, DirectiveKind, ModuleRedirect, Replacement};
use crate::error::PatchError;
use crate::hooks::Hooks;
use crate::patchers::Patcher;
use crate::plugin::{EntryPoint, PluginCatalog};
use crate::table::DirectiveTable;
use bwcompat_namespace::ModulePath;
use indexmap::IndexMap;
use std::sync::Arc;

/// Anything [`Registry::add`] accepts
#[derive(Debug, Clone)]
pub enum Registrable {
    /// Single directive
    Directive(Directive),
    /// Several registrables, added in order
    List(Vec<Registrable>),
    /// External entry point
    EntryPoint(EntryPoint),
    /// Every entry point in a plugin group
    Group(String),
    /// Bulk declaration
    Table(DirectiveTable),
}

impl From<Directive> for Registrable {
    fn from(d: Directive) -> Self {
        Self::Directive(d)
    }
}

impl From<ModuleRedirect> for Registrable {
    fn from(d: ModuleRedirect) -> Self {
        Self::Directive(d.into())
    }
}

impl From<AttributeRedirect> for Registrable {
    fn from(d: AttributeRedirect) -> Self {
        Self::Directive(d.into())
    }
}

impl From<AttributeOverwrite> for Registrable {
    fn from(d: AttributeOverwrite) -> Self {
        Self::Directive(d.into())
    }
}

impl<T: Into<Registrable>> From<Vec<T>> for Registrable {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<EntryPoint> for Registrable {
    fn from(ep: EntryPoint) -> Self {
        Self::EntryPoint(ep)
    }
}

impl From<&str> for Registrable {
    fn from(group: &str) -> Self {
        Self::Group(group.to_string())
    }
}

impl From<DirectiveTable> for Registrable {
    fn from(table: DirectiveTable) -> Self {
        Self::Table(table)
    }
}

/// Directive filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every directive
    All,
    /// Directives of one kind
    Kind(DirectiveKind),
    /// Directives whose module matches a glob
    Pattern(String),
}

impl Selector {
    /// Check if `directive` passes the filter
    #[must_use]
    pub fn matches(&self, directive: &Directive) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => directive.kind() == *kind,
            Self::Pattern(glob) => glob_match::glob_match(glob, &directive.module().to_string()),
        }
    }
}

impl From<DirectiveKind> for Selector {
    fn from(kind: DirectiveKind) -> Self {
        Self::Kind(kind)
    }
}

/// Record of a successful activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    patchers: Vec<&'static str>,
}

impl EngineState {
    /// Names of the installed patchers, in installation order
    #[inline]
    #[must_use]
    pub fn patchers(&self) -> &[&'static str] {
        &self.patchers
    }
}

/// Ordered directives plus the patchers that install them
#[derive(Debug)]
pub struct Registry {
    directives: Vec<Directive>,
    patchers: Vec<Box<dyn Patcher>>,
    hooks: Arc<Hooks>,
    catalog: Arc<PluginCatalog>,
    config: RegistryConfig,
    state: Option<EngineState>,
}

impl Registry {
    /// Create empty registry with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create empty registry
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            directives: Vec::new(),
            patchers: Vec::new(),
            hooks: Arc::new(Hooks::new(config.logger_name.clone())),
            catalog: Arc::new(PluginCatalog::new()),
            config,
            state: None,
        }
    }

    /// Resolve entry points and groups against `catalog`
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<PluginCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Create registry from a declaration document
    ///
    /// The table's embedded configuration, if any, is used.
    ///
    /// # Errors
    /// Returns error if the table holds invalid declarations
    pub fn from_table(mut table: DirectiveTable) -> Result<Self, PatchError> {
        let config = table.config.take().unwrap_or_default();
        let mut registry = Self::with_config(config);
        registry.add(table)?;
        Ok(registry)
    }

    /// Load the registry published as `name` in the configured plugin group
    ///
    /// # Errors
    /// Returns error listing the available registries if `name` is unknown
    pub fn load(
        name: &str,
        catalog: Arc<PluginCatalog>,
        config: RegistryConfig,
    ) -> Result<Self, PatchError> {
        let directives = catalog.load_registry(name, &config.plugin_group)?;
        let mut registry = Self::with_config(config).with_catalog(catalog);
        registry.add(directives)?;
        Ok(registry)
    }

    /// Append directives
    ///
    /// # Errors
    /// Returns error if an entry point is malformed or names an unknown
    /// collection
    pub fn add(&mut self, item: impl Into<Registrable>) -> Result<&mut Self, PatchError> {
        self.add_item(item.into(), None)?;
        Ok(self)
    }

    /// Append the directives of a declaration document
    ///
    /// # Errors
    /// Returns error if the table holds invalid declarations
    pub fn add_table(&mut self, table: DirectiveTable) -> Result<&mut Self, PatchError> {
        self.add(table)
    }

    fn add_item(&mut self, item: Registrable, origin: Option<&str>) -> Result<(), PatchError> {
        match item {
            Registrable::Directive(mut directive) => {
                if let Some(origin) = origin {
                    directive.set_origin_if_absent(origin);
                }
                tracing::debug!("adding directive {directive}");
                self.directives.push(directive);
            }
            Registrable::List(items) => {
                for item in items {
                    self.add_item(item, origin)?;
                }
            }
            Registrable::EntryPoint(ep) => {
                let produced = self.expand_entry_point(&ep)?;
                self.add_item(produced, Some(&ep.name))?;
            }
            Registrable::Group(group) => match self.catalog.entry_points(&group) {
                Some(entry_points) => {
                    for ep in entry_points {
                        self.add_item(Registrable::EntryPoint(ep), origin)?;
                    }
                }
                None => tracing::debug!(%group, "no entry points found in group, skipping"),
            },
            Registrable::Table(table) => {
                let directives = table.into_directives()?;
                for directive in directives {
                    self.add_item(Registrable::Directive(directive), origin)?;
                }
            }
        }
        Ok(())
    }

    fn expand_entry_point(&self, ep: &EntryPoint) -> Result<Registrable, PatchError> {
        if let Some((module, name)) = ep.name.split_once(':') {
            if !name.is_empty() {
                let replacement = Replacement::parse(&ep.value);
                return Ok(AttributeRedirect::new(module, name, replacement)?.into());
            }
        }
        if !ep.value.contains(':') {
            let module = ep.name.split(':').next().unwrap_or(&ep.name);
            return Ok(ModuleRedirect::new(module, Some(ep.value.as_str()))?.into());
        }
        Ok(self.catalog.collection(&ep.value)?.into())
    }

    /// Directives matching `selector`, in registration order
    #[must_use]
    pub fn select(&self, selector: &Selector) -> Vec<Directive> {
        self.directives
            .iter()
            .filter(|d| selector.matches(d))
            .cloned()
            .collect()
    }

    /// Matching directives grouped by module, in first-seen order
    #[must_use]
    pub fn by_module(&self, selector: &Selector) -> Vec<(ModulePath, Vec<Directive>)> {
        let mut grouped: IndexMap<ModulePath, Vec<Directive>> = IndexMap::new();
        for directive in self.select(selector) {
            grouped
                .entry(directive.module().clone())
                .or_default()
                .push(directive);
        }
        grouped.into_iter().collect()
    }

    /// Record the participating patchers, replacing any previous set
    ///
    /// # Errors
    /// Returns [`PatchError::AlreadyActive`] while active
    pub fn enable(
        &mut self,
        patchers: impl IntoIterator<Item = Box<dyn Patcher>>,
    ) -> Result<&mut Self, PatchError> {
        if self.is_active() {
            return Err(PatchError::AlreadyActive);
        }
        self.patchers = patchers.into_iter().collect();
        Ok(self)
    }

    /// Populate every enabled patcher, then install them in order
    ///
    /// Configuration errors surface before any patcher is installed. If an
    /// install fails, the patchers already installed by this call are
    /// uninstalled again before the error is returned.
    ///
    /// # Errors
    /// Returns [`PatchError::AlreadyActive`] if active, or the first
    /// populate/install failure
    pub fn activate(&mut self) -> Result<(), PatchError> {
        if self.is_active() {
            return Err(PatchError::AlreadyActive);
        }

        tracing::warn!("{} is being activated", self.config.subject);
        for directive in &self.directives {
            tracing::debug!("{directive}");
        }

        let mut patchers = std::mem::take(&mut self.patchers);
        let result = self
            .populate_all(&mut patchers)
            .and_then(|()| Self::install_all(&mut patchers));
        self.patchers = patchers;

        self.state = Some(EngineState { patchers: result? });
        tracing::warn!("{} is now active", self.config.subject);
        Ok(())
    }

    fn populate_all(&self, patchers: &mut [Box<dyn Patcher>]) -> Result<(), PatchError> {
        for patcher in patchers.iter_mut() {
            tracing::info!("populating {}", patcher.name());
            patcher.populate(self)?;
        }
        Ok(())
    }

    fn install_all(patchers: &mut [Box<dyn Patcher>]) -> Result<Vec<&'static str>, PatchError> {
        for idx in 0..patchers.len() {
            let patcher = &mut patchers[idx];
            tracing::info!("installing {}", patcher.name());
            if let Err(err) = patcher.install() {
                tracing::info!(failed = patcher.name(), "rolling back activation: {err}");
                for installed in patchers[..idx].iter_mut().rev() {
                    if let Err(undo) = installed.uninstall() {
                        tracing::error!("rollback of {} failed: {undo}", installed.name());
                    }
                }
                return Err(err);
            }
        }
        Ok(patchers.iter().map(|p| p.name()).collect())
    }

    /// Uninstall every patcher, in activation order
    ///
    /// Every patcher is given the chance to uninstall even if an earlier one
    /// fails; the first failure is returned.
    ///
    /// # Errors
    /// Returns the first uninstall failure
    pub fn deactivate(&mut self) -> Result<(), PatchError> {
        if self.state.take().is_none() {
            tracing::warn!("{} is not active, nothing to deactivate", self.config.subject);
            return Ok(());
        }

        let mut first_err = None;
        for patcher in &mut self.patchers {
            tracing::info!("uninstalling {}", patcher.name());
            if let Err(err) = patcher.uninstall() {
                tracing::error!("uninstalling {} failed: {err}", patcher.name());
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Registered directives, in order
    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.directives.iter()
    }

    /// Number of registered directives
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Check if no directive is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Hooks shared with the patchers
    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Plugin catalog entry points are resolved against
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Check if activated
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Activation record, while active
    #[inline]
    #[must_use]
    pub fn state(&self) -> Option<&EngineState> {
        self.state.as_ref()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Directive;
    type IntoIter = std::slice::Iter<'a, Directive>;

    fn into_iter(self) -> Self::IntoIter {
        self.directives.iter()
    }
}
