//! Runtime values held by modules
//!
//! Provides [`Value`], the dynamically typed contents of a module namespace,
//! together with [`Function`] and [`Object`].

use crate::error::{AttributeError, CallError};
use crate::module::Module;
use crate::warn::{CallSite, Placeholder};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

type NativeFn = dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync;

/// Value bound to a name in a module or object
///
/// Reference variants (`Function`, `Object`, `Module`, `Placeholder`) are
/// shared; cloning keeps identity, which [`Value::same_as`] observes.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(Arc<str>),
    /// Callable
    Function(Function),
    /// Class-like namespace
    Object(Arc<Object>),
    /// Module
    Module(Arc<Module>),
    /// Removed name stand-in
    Placeholder(Arc<Placeholder>),
}

impl Value {
    /// Create a string value
    #[inline]
    #[must_use]
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    /// Create a function value
    #[inline]
    #[must_use]
    pub fn function(
        name: impl AsRef<str>,
        body: impl Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self::Function(Function::new(name, body))
    }

    /// Short name of the variant
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Function(_) => "function",
            Self::Object(_) => "object",
            Self::Module(_) => "module",
            Self::Placeholder(_) => "placeholder",
        }
    }

    /// Identity for shared variants, equality for scalars
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Arc::ptr_eq(a, b),
            (Self::Placeholder(a), Self::Placeholder(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Check for `Value::None`
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Check for a removed-name placeholder
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// String contents, if a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents, if an integer
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Module, if a module
    #[inline]
    #[must_use]
    pub fn as_module(&self) -> Option<&Arc<Module>> {
        match self {
            Self::Module(m) => Some(m),
            _ => None,
        }
    }

    /// Function, if a function
    #[inline]
    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Look up an attribute
    ///
    /// # Errors
    /// Returns error if the attribute is not defined or the value kind has no
    /// attributes
    #[track_caller]
    pub fn get_attr(&self, name: &str) -> Result<Value, AttributeError> {
        self.get_attr_at(name, CallSite::caller())
    }

    /// Look up an attribute on behalf of `call_site`
    ///
    /// # Errors
    /// See [`Value::get_attr`]
    pub fn get_attr_at(&self, name: &str, call_site: CallSite) -> Result<Value, AttributeError> {
        match self {
            Self::Module(module) => module.get_attr_at(name, call_site),
            Self::Object(object) => {
                object
                    .get(name)
                    .cloned()
                    .ok_or_else(|| AttributeError::Missing {
                        owner: object.name().to_string(),
                        name: name.to_string(),
                    })
            }
            Self::Placeholder(placeholder) => {
                placeholder.touch(call_site);
                Ok(Value::None)
            }
            other => Err(AttributeError::NoAttributes {
                kind: other.kind(),
                name: name.to_string(),
            }),
        }
    }

    /// Call the value
    ///
    /// # Errors
    /// Returns error if the value is not callable or the function fails
    #[track_caller]
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        self.call_at(args, CallSite::caller())
    }

    /// Call the value on behalf of `call_site`
    ///
    /// # Errors
    /// See [`Value::call`]
    pub fn call_at(&self, args: &[Value], call_site: CallSite) -> Result<Value, CallError> {
        match self {
            Self::Function(function) => function.call(args),
            Self::Placeholder(placeholder) => {
                placeholder.touch(call_site);
                Ok(Value::None)
            }
            other => Err(CallError::NotCallable { kind: other.kind() }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(Arc::new(o))
    }
}

impl From<Arc<Module>> for Value {
    fn from(m: Arc<Module>) -> Self {
        Self::Module(m)
    }
}

impl From<Placeholder> for Value {
    fn from(p: Placeholder) -> Self {
        Self::Placeholder(Arc::new(p))
    }
}

/// Named native callable
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    body: Arc<NativeFn>,
}

impl Function {
    /// Create function from a closure
    #[must_use]
    pub fn new(
        name: impl AsRef<str>,
        body: impl Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            body: Arc::new(body),
        }
    }

    /// Function name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    ///
    /// # Errors
    /// Returns whatever the function body returns
    #[inline]
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.body)(args)
    }

    /// Check if both handles refer to the same function body
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

/// Class-like namespace with a fixed attribute table
#[derive(Debug, Clone)]
pub struct Object {
    name: String,
    attrs: IndexMap<String, Value>,
}

impl Object {
    /// Create empty object
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
        }
    }

    /// Add an attribute
    #[inline]
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Object name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Attribute names in definition order
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_as_uses_identity_for_functions() {
        let f = Value::function("f", |_| Ok(Value::None));
        let g = Value::function("f", |_| Ok(Value::None));

        assert!(f.same_as(&f.clone()));
        assert!(!f.same_as(&g));
    }

    #[test]
    fn same_as_uses_equality_for_scalars() {
        assert!(Value::from(3_i64).same_as(&Value::Int(3)));
        assert!(Value::from("a").same_as(&Value::str("a")));
        assert!(!Value::from(true).same_as(&Value::Int(1)));
    }

    #[test]
    fn call_function() {
        let add = Value::function("add", |args| {
            let sum = args.iter().filter_map(Value::as_int).sum::<i64>();
            Ok(Value::Int(sum))
        });
        assert_eq!(add.call(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
    }

    #[test]
    fn call_non_callable() {
        let err = Value::Int(1).call(&[]).unwrap_err();
        assert_eq!(err, CallError::NotCallable { kind: "int" });
    }

    #[test]
    fn object_attribute_chain() {
        let nist = Object::new("NIST").with_attr("cp_mol_ig_comp", Value::Int(7));
        let value = Value::from(nist);

        assert_eq!(value.get_attr("cp_mol_ig_comp").unwrap(), Value::Int(7));
        assert!(value.get_attr("missing").unwrap_err().is_missing());
    }

    #[test]
    fn scalar_has_no_attributes() {
        let err = Value::str("x").get_attr("len").unwrap_err();
        assert!(matches!(err, AttributeError::NoAttributes { kind: "str", .. }));
    }
}
