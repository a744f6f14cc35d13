//! In-place attribute overwrites

use super::Patcher;
use crate::directive::{AttributeDirective, AttributeOverwrite, Directive, DirectiveKind};
use crate::error::PatchError;
use crate::hooks::Hooks;
use crate::registry::{Registry, Selector};
use crate::resolve::{get_attribute_value, ResolveContext};
use bwcompat_namespace::{CallSite, Module, ModuleSystem, Value};
use std::sync::Arc;

/// Attribute state captured before an overwrite
#[derive(Debug, Clone)]
pub enum Prior {
    /// Attribute was bound to this value
    Existed(Value),
    /// Attribute was not bound
    Absent,
}

impl From<Option<Value>> for Prior {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Absent, Self::Existed)
    }
}

#[derive(Debug)]
struct Applied {
    module: Arc<Module>,
    name: String,
    prior: Prior,
}

impl Applied {
    fn restore(self) {
        tracing::debug!(module = %self.module.name(), name = %self.name, "restoring attribute");
        match self.prior {
            Prior::Existed(value) => {
                self.module.set_attr(self.name, value);
            }
            Prior::Absent => {
                self.module.remove_attr(&self.name);
            }
        }
    }
}

/// Replaces attributes in place, remembering what was there
#[derive(Debug)]
pub struct OverwriteInstaller {
    system: Arc<ModuleSystem>,
    hooks: Arc<Hooks>,
    directives: Vec<Arc<AttributeOverwrite>>,
    applied: Option<Vec<Applied>>,
}

impl OverwriteInstaller {
    /// Patcher name
    pub const NAME: &'static str = "OverwriteInstaller";

    /// Create installer for `system`
    #[must_use]
    pub fn new(system: Arc<ModuleSystem>) -> Self {
        Self {
            system,
            hooks: Arc::new(Hooks::default()),
            directives: Vec::new(),
            applied: None,
        }
    }

    /// Populated directives, in registration order
    #[must_use]
    pub fn directives(&self) -> &[Arc<AttributeOverwrite>] {
        &self.directives
    }

    fn apply(&self, directive: &Arc<AttributeOverwrite>, call_site: CallSite) -> Result<Applied, PatchError> {
        let as_directive = Directive::Overwrite(Arc::clone(directive));
        self.hooks.on_installation(&as_directive, Self::NAME);
        self.hooks.on_activation(&as_directive, Self::NAME, Some(call_site));

        let cx = ResolveContext::new(&self.system, &self.hooks, call_site);
        let value = get_attribute_value(directive.as_ref(), &cx)?;
        let module = self.system.import_path(directive.module(), call_site)?;

        let prior = module.set_attr(directive.name(), value).into();
        Ok(Applied {
            module,
            name: directive.name().to_string(),
            prior,
        })
    }
}

impl Patcher for OverwriteInstaller {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn populate(&mut self, registry: &Registry) -> Result<(), PatchError> {
        self.directives = registry
            .select(&Selector::Kind(DirectiveKind::AttributeOverwrite))
            .iter()
            .filter_map(Directive::as_attribute_overwrite)
            .cloned()
            .collect();
        self.hooks = Arc::clone(registry.hooks());
        tracing::info!(count = self.directives.len(), "populated {}", Self::NAME);
        Ok(())
    }

    fn install(&mut self) -> Result<(), PatchError> {
        if self.applied.is_some() {
            return Ok(());
        }

        let call_site = CallSite::caller();
        let mut applied = Vec::with_capacity(self.directives.len());
        for directive in &self.directives {
            match self.apply(directive, call_site) {
                Ok(done) => applied.push(done),
                Err(err) => {
                    for done in applied.into_iter().rev() {
                        done.restore();
                    }
                    return Err(err);
                }
            }
        }
        self.applied = Some(applied);
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), PatchError> {
        let Some(applied) = self.applied.take() else {
            tracing::warn!("{} is not installed", Self::NAME);
            return Ok(());
        };
        for done in applied.into_iter().rev() {
            done.restore();
        }
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.applied.is_some()
    }
}
