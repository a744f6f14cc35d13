//! Modules and module code
//!
//! A [`Module`] is a named, mutable attribute table produced by executing a
//! [`ModuleCode`] body. Lookups that miss the table get one more chance
//! through an optional [`AttrFallback`].

use crate::error::{AttributeError, BoxError};
use crate::path::ModulePath;
use crate::value::Value;
use crate::warn::CallSite;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

type Body = dyn Fn(&Module) -> Result<(), String> + Send + Sync;

/// Code that populates a module when it is loaded
///
/// Cloning shares the body; [`ModuleCode::ptr_eq`] tells whether two modules
/// were loaded from the same code.
#[derive(Clone)]
pub struct ModuleCode {
    body: Arc<Body>,
}

impl ModuleCode {
    /// Create code from a closure
    #[must_use]
    pub fn new(body: impl Fn(&Module) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self {
            body: Arc::new(body),
        }
    }

    /// Code that binds a fixed attribute table
    ///
    /// Shared values keep their identity across every load.
    #[must_use]
    pub fn from_attrs<K, V>(attrs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let attrs: Vec<(String, Value)> = attrs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(move |module| {
            for (name, value) in &attrs {
                module.set_attr(name.clone(), value.clone());
            }
            Ok(())
        })
    }

    /// Code that defines nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|_| Ok(()))
    }

    /// Run the body against `module`
    ///
    /// # Errors
    /// Returns the message reported by the body
    #[inline]
    pub fn exec(&self, module: &Module) -> Result<(), String> {
        (self.body)(module)
    }

    /// Check if both handles share a body
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCode")
            .field("body", &Arc::as_ptr(&self.body).cast::<()>())
            .finish()
    }
}

/// Last-chance attribute provider consulted on a miss
pub trait AttrFallback: Send + Sync {
    /// Produce `name` for `module`
    ///
    /// Returns `Ok(None)` when the fallback has nothing for `name`, which the
    /// module reports as an ordinary missing attribute.
    ///
    /// # Errors
    /// Returns error when the fallback claims `name` but cannot produce it
    fn resolve(
        &self,
        module: &Module,
        name: &str,
        call_site: CallSite,
    ) -> Result<Option<Value>, BoxError>;
}

/// Loaded module
pub struct Module {
    name: ModulePath,
    origin: ModulePath,
    code: ModuleCode,
    attrs: RwLock<IndexMap<String, Value>>,
    fallback: RwLock<Option<Arc<dyn AttrFallback>>>,
}

impl Module {
    /// Create an empty module
    ///
    /// `origin` is the path the code was found under; it differs from `name`
    /// when the module was loaded through a redirect.
    #[must_use]
    pub fn new(name: ModulePath, origin: ModulePath, code: ModuleCode) -> Self {
        Self {
            name,
            origin,
            code,
            attrs: RwLock::new(IndexMap::new()),
            fallback: RwLock::new(None),
        }
    }

    /// Name the module was requested under
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ModulePath {
        &self.name
    }

    /// Path the code was loaded from
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &ModulePath {
        &self.origin
    }

    /// Check if the module was loaded from another location
    #[inline]
    #[must_use]
    pub fn is_relocated(&self) -> bool {
        self.name != self.origin
    }

    /// Code the module was loaded from
    #[inline]
    #[must_use]
    pub fn code(&self) -> &ModuleCode {
        &self.code
    }

    /// Look up an attribute, consulting the fallback on a miss
    ///
    /// # Errors
    /// Returns error if neither the namespace nor the fallback provides `name`
    #[track_caller]
    pub fn get_attr(&self, name: &str) -> Result<Value, AttributeError> {
        self.get_attr_at(name, CallSite::caller())
    }

    /// Look up an attribute on behalf of `call_site`
    ///
    /// # Errors
    /// See [`Module::get_attr`]
    pub fn get_attr_at(&self, name: &str, call_site: CallSite) -> Result<Value, AttributeError> {
        if let Some(value) = self.get_own(name) {
            return Ok(value);
        }

        // Clone out so the fallback may reenter this module.
        let fallback = self.fallback.read().clone();
        let missing = || AttributeError::Missing {
            owner: self.name.to_string(),
            name: name.to_string(),
        };

        match fallback {
            None => Err(missing()),
            Some(fallback) => match fallback.resolve(self, name, call_site) {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(missing()),
                Err(source) => Err(AttributeError::Fallback {
                    owner: self.name.to_string(),
                    name: name.to_string(),
                    source,
                }),
            },
        }
    }

    /// Attribute defined in the module's own namespace
    #[inline]
    #[must_use]
    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    /// Check if `name` is defined in the module's own namespace
    #[inline]
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.read().contains_key(name)
    }

    /// Bind `name`, returning the previous value
    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs.write().insert(name.into(), value.into())
    }

    /// Unbind `name`, returning the removed value
    pub fn remove_attr(&self, name: &str) -> Option<Value> {
        self.attrs.write().shift_remove(name)
    }

    /// Names defined in the module's own namespace, in definition order
    #[must_use]
    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.read().keys().cloned().collect()
    }

    /// Snapshot of the module's own namespace
    #[must_use]
    pub fn attrs(&self) -> Vec<(String, Value)> {
        self.attrs
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the fallback, returning the previous one
    pub fn set_fallback(
        &self,
        fallback: Option<Arc<dyn AttrFallback>>,
    ) -> Option<Arc<dyn AttrFallback>> {
        std::mem::replace(&mut *self.fallback.write(), fallback)
    }

    /// Current fallback
    #[inline]
    #[must_use]
    pub fn fallback(&self) -> Option<Arc<dyn AttrFallback>> {
        self.fallback.read().clone()
    }

    /// Check if a fallback is attached
    #[inline]
    #[must_use]
    pub fn has_fallback(&self) -> bool {
        self.fallback.read().is_some()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name.to_string())
            .field("origin", &self.origin.to_string())
            .field("attrs", &self.attr_names())
            .field("has_fallback", &self.has_fallback())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn module(name: &str) -> Module {
        let path: ModulePath = name.parse().unwrap();
        Module::new(path.clone(), path, ModuleCode::empty())
    }

    struct Fixed;

    impl AttrFallback for Fixed {
        fn resolve(
            &self,
            _module: &Module,
            name: &str,
            _call_site: CallSite,
        ) -> Result<Option<Value>, BoxError> {
            match name {
                "legacy" => Ok(Some(Value::Int(1))),
                "broken" => Err("target gone".into()),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn set_and_remove_attr() {
        let m = module("pkg");
        assert!(m.set_attr("x", Value::Int(1)).is_none());
        assert_eq!(m.set_attr("x", Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(m.remove_attr("x"), Some(Value::Int(2)));
        assert!(!m.has_attr("x"));
    }

    #[test]
    fn code_from_attrs_binds_shared_values() {
        let f = Value::function("f", |_| Ok(Value::None));
        let code = ModuleCode::from_attrs([("f", f.clone())]);
        let m = module("pkg");
        code.exec(&m).unwrap();

        assert!(m.get_attr("f").unwrap().same_as(&f));
    }

    #[test]
    fn fallback_only_consulted_on_miss() {
        let m = module("pkg");
        m.set_attr("legacy", Value::Int(99));
        m.set_fallback(Some(Arc::new(Fixed)));

        assert_eq!(m.get_attr("legacy").unwrap(), Value::Int(99));
        m.remove_attr("legacy");
        assert_eq!(m.get_attr("legacy").unwrap(), Value::Int(1));
    }

    #[test]
    fn fallback_decline_is_missing() {
        let m = module("pkg");
        m.set_fallback(Some(Arc::new(Fixed)));

        assert!(m.get_attr("other").unwrap_err().is_missing());
        assert!(matches!(
            m.get_attr("broken").unwrap_err(),
            AttributeError::Fallback { .. }
        ));
    }

    #[test]
    fn set_fallback_returns_previous() {
        let m = module("pkg");
        assert!(m.set_fallback(Some(Arc::new(Fixed))).is_none());
        assert!(m.set_fallback(None).is_some());
        assert!(!m.has_fallback());
    }
}
