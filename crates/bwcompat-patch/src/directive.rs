//! Directive model
//!
//! A directive is a declarative fact about one redirected name. Three kinds
//! exist, unified by [`Directive`]:
//! - [`ModuleRedirect`]: a whole module moved (or was removed)
//! - [`AttributeRedirect`]: a missing attribute now lives elsewhere
//! - [`AttributeOverwrite`]: an attribute must be replaced in place
//!
//! Construction validates shape only. Targets are resolved lazily, once, and
//! cached on the directive.

use crate::error::ConfigError;
use bwcompat_namespace::{validate_identifier, ModulePath, ModuleSpec, Value};
use once_cell::sync::OnceCell;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Deferred reference of the form `<module>:<attr>[.<attr>...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetSpec {
    module: ModulePath,
    attrs: Vec<String>,
}

impl TargetSpec {
    /// Delimiter between module path and attribute chain
    pub const SEPARATOR: char = ':';

    /// Module to import
    #[inline]
    #[must_use]
    pub fn module(&self) -> &ModulePath {
        &self.module
    }

    /// Attribute chain to walk after import
    #[inline]
    #[must_use]
    pub fn attr_chain(&self) -> &[String] {
        &self.attrs
    }
}

impl FromStr for TargetSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| ConfigError::MalformedTarget {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let count = s.matches(Self::SEPARATOR).count();
        if count != 1 {
            return Err(malformed(&format!(
                "expected exactly 1 instance of '{}', found {count}",
                Self::SEPARATOR
            )));
        }
        let (module, chain) = s
            .split_once(Self::SEPARATOR)
            .ok_or_else(|| malformed("missing separator"))?;
        if chain.is_empty() {
            return Err(malformed("empty attribute name"));
        }

        let module: ModulePath = module.parse()?;
        let attrs = chain
            .split('.')
            .map(|seg| validate_identifier(seg).map(|()| seg.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { module, attrs })
    }
}

impl Display for TargetSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.module, Self::SEPARATOR, self.attrs.join("."))
    }
}

/// What a redirected attribute now refers to
#[derive(Debug, Clone)]
pub enum Replacement {
    /// Concrete value, returned unchanged
    Value(Value),
    /// Deferred reference, resolved at first use
    Target(TargetSpec),
    /// Deliberately removed, no replacement
    Removed,
}

impl Replacement {
    /// Interpret a string
    ///
    /// Strings with the `<module>:<name>` shape become targets; anything else
    /// is kept as a plain string value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.parse::<TargetSpec>() {
            Ok(spec) => Self::Target(spec),
            Err(err) => {
                tracing::debug!("unable to parse {s} as target spec: {err}");
                Self::Value(Value::str(s))
            }
        }
    }

    /// Check for the removed marker
    #[inline]
    #[must_use]
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }

    /// Target spec, if deferred
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&TargetSpec> {
        match self {
            Self::Target(spec) => Some(spec),
            _ => None,
        }
    }
}

impl Display for Replacement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(Value::Str(s)) => write!(f, "{s:?}"),
            Self::Value(v) => write!(f, "<{} value>", v.kind()),
            Self::Target(spec) => write!(f, "{spec}"),
            Self::Removed => f.write_str("nothing"),
        }
    }
}

impl From<&str> for Replacement {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Replacement {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl<S: AsRef<str>> From<Option<S>> for Replacement {
    fn from(s: Option<S>) -> Self {
        s.map_or(Self::Removed, |s| Self::parse(s.as_ref()))
    }
}

impl From<Value> for Replacement {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<TargetSpec> for Replacement {
    fn from(spec: TargetSpec) -> Self {
        Self::Target(spec)
    }
}

/// Directive kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// [`ModuleRedirect`]
    ModuleRedirect,
    /// [`AttributeRedirect`]
    AttributeRedirect,
    /// [`AttributeOverwrite`]
    AttributeOverwrite,
}

impl Display for DirectiveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ModuleRedirect => "ModuleRedirect",
            Self::AttributeRedirect => "AttributeRedirect",
            Self::AttributeOverwrite => "AttributeOverwrite",
        })
    }
}

/// A whole module now lives at another path, or is gone
#[derive(Debug, Clone)]
pub struct ModuleRedirect {
    module: ModulePath,
    replacement: Option<ModulePath>,
    origin: Option<String>,
    resolved: OnceCell<ModuleSpec>,
}

impl ModuleRedirect {
    /// Create redirect; `None` marks the module as removed
    ///
    /// # Errors
    /// Returns error if either path is invalid
    pub fn new(module: &str, replacement: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            module: module.parse()?,
            replacement: replacement.map(str::parse).transpose()?,
            origin: None,
            resolved: OnceCell::new(),
        })
    }

    /// Expand `{old: new}` pairs
    ///
    /// # Errors
    /// Returns the first invalid path
    pub fn from_mapping<K, S>(
        mapping: impl IntoIterator<Item = (K, Option<S>)>,
    ) -> Result<Vec<Self>, ConfigError>
    where
        K: AsRef<str>,
        S: AsRef<str>,
    {
        mapping
            .into_iter()
            .map(|(old, new)| Self::new(old.as_ref(), new.as_ref().map(AsRef::as_ref)))
            .collect()
    }

    /// Attach provenance
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Old module path
    #[inline]
    #[must_use]
    pub fn module(&self) -> &ModulePath {
        &self.module
    }

    /// New module path, `None` if removed
    #[inline]
    #[must_use]
    pub fn replacement(&self) -> Option<&ModulePath> {
        self.replacement.as_ref()
    }

    /// Provenance tag
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Cache for the resolved spec of the replacement
    #[inline]
    #[must_use]
    pub fn resolved(&self) -> &OnceCell<ModuleSpec> {
        &self.resolved
    }
}

impl Display for ModuleRedirect {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.replacement {
            Some(new) => write!(f, "ModuleRedirect({} -> {new})", self.module),
            None => write!(f, "ModuleRedirect({} -> removed)", self.module),
        }
    }
}

/// Shared accessors of the attribute-level directives
pub trait AttributeDirective: Display {
    /// Module containing the attribute
    fn module(&self) -> &ModulePath;

    /// Attribute name
    fn name(&self) -> &str;

    /// Replacement value or target
    fn replacement(&self) -> &Replacement;

    /// Cache for the resolved value
    fn resolved(&self) -> &OnceCell<Value>;
}

macro_rules! attribute_directive {
    ($(#[$doc:meta])* $ty:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $ty {
            module: ModulePath,
            name: String,
            replacement: Replacement,
            origin: Option<String>,
            resolved: OnceCell<Value>,
        }

        impl $ty {
            /// Create directive for `module.name`
            ///
            /// # Errors
            /// Returns error if the module path or name is invalid
            pub fn new(
                module: &str,
                name: &str,
                replacement: impl Into<Replacement>,
            ) -> Result<Self, ConfigError> {
                validate_identifier(name)?;
                Ok(Self {
                    module: module.parse()?,
                    name: name.to_string(),
                    replacement: replacement.into(),
                    origin: None,
                    resolved: OnceCell::new(),
                })
            }

            /// Expand `{module: {name: replacement}}`
            ///
            /// # Errors
            /// Returns the first invalid module path or name
            pub fn for_modules<M, N, K, V>(
                spec: impl IntoIterator<Item = (M, N)>,
            ) -> Result<Vec<Self>, ConfigError>
            where
                M: AsRef<str>,
                N: IntoIterator<Item = (K, V)>,
                K: AsRef<str>,
                V: Into<Replacement>,
            {
                let mut out = Vec::new();
                for (module, names) in spec {
                    for (name, replacement) in names {
                        out.push(Self::new(module.as_ref(), name.as_ref(), replacement)?);
                    }
                }
                Ok(out)
            }

            /// Attach provenance
            #[inline]
            #[must_use]
            pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
                self.origin = Some(origin.into());
                self
            }

            /// Provenance tag
            #[inline]
            #[must_use]
            pub fn origin(&self) -> Option<&str> {
                self.origin.as_deref()
            }
        }

        impl AttributeDirective for $ty {
            fn module(&self) -> &ModulePath {
                &self.module
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn replacement(&self) -> &Replacement {
                &self.replacement
            }

            fn resolved(&self) -> &OnceCell<Value> {
                &self.resolved
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!($label, "({}:{} -> {})"),
                    self.module, self.name, self.replacement
                )
            }
        }
    };
}

attribute_directive!(
    /// A name no longer defined in a module resolves to a replacement
    AttributeRedirect,
    "AttributeRedirect"
);

attribute_directive!(
    /// An attribute is forcibly replaced, whether or not it exists
    AttributeOverwrite,
    "AttributeOverwrite"
);

impl AttributeRedirect {
    /// Create directive from a `module:name` key
    ///
    /// # Errors
    /// Returns error if `spec` does not have exactly one separator with a
    /// valid module path and name on either side
    pub fn parse(spec: &str, replacement: impl Into<Replacement>) -> Result<Self, ConfigError> {
        let target: TargetSpec = spec.parse()?;
        match target.attr_chain() {
            [name] => Self::new(&target.module().to_string(), name, replacement),
            _ => Err(ConfigError::MalformedTarget {
                spec: spec.to_string(),
                reason: "expected a single attribute name".to_string(),
            }),
        }
    }

    /// Expand `{"module:name": replacement}`
    ///
    /// # Errors
    /// Returns the first malformed key
    pub fn from_mapping<K, V>(
        mapping: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Vec<Self>, ConfigError>
    where
        K: AsRef<str>,
        V: Into<Replacement>,
    {
        mapping
            .into_iter()
            .map(|(key, replacement)| Self::parse(key.as_ref(), replacement))
            .collect()
    }

    /// Expand `{module: [names]}` into removed attributes
    ///
    /// # Errors
    /// Returns the first invalid module path or name
    pub fn with_no_replacement<M, N, K>(
        spec: impl IntoIterator<Item = (M, N)>,
    ) -> Result<Vec<Self>, ConfigError>
    where
        M: AsRef<str>,
        N: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut out = Vec::new();
        for (module, names) in spec {
            for name in names {
                out.push(Self::new(module.as_ref(), name.as_ref(), Replacement::Removed)?);
            }
        }
        Ok(out)
    }
}

/// Any directive
#[derive(Debug, Clone)]
pub enum Directive {
    /// Whole-module redirect
    Module(Arc<ModuleRedirect>),
    /// Attribute-miss redirect
    Attribute(Arc<AttributeRedirect>),
    /// In-place attribute overwrite
    Overwrite(Arc<AttributeOverwrite>),
}

impl Directive {
    /// Kind discriminant
    #[must_use]
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Self::Module(_) => DirectiveKind::ModuleRedirect,
            Self::Attribute(_) => DirectiveKind::AttributeRedirect,
            Self::Overwrite(_) => DirectiveKind::AttributeOverwrite,
        }
    }

    /// Module the directive is about
    #[must_use]
    pub fn module(&self) -> &ModulePath {
        match self {
            Self::Module(d) => d.module(),
            Self::Attribute(d) => d.module(),
            Self::Overwrite(d) => d.module(),
        }
    }

    /// Attribute name, for attribute-level directives
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Module(_) => None,
            Self::Attribute(d) => Some(d.name()),
            Self::Overwrite(d) => Some(d.name()),
        }
    }

    /// Provenance tag
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Module(d) => d.origin(),
            Self::Attribute(d) => d.origin(),
            Self::Overwrite(d) => d.origin(),
        }
    }

    /// Set provenance unless already present
    pub(crate) fn set_origin_if_absent(&mut self, origin: &str) {
        if self.origin().is_some() {
            return;
        }
        let origin = Some(origin.to_string());
        match self {
            Self::Module(d) => Arc::make_mut(d).origin = origin,
            Self::Attribute(d) => Arc::make_mut(d).origin = origin,
            Self::Overwrite(d) => Arc::make_mut(d).origin = origin,
        }
    }

    /// Module redirect, if this is one
    #[inline]
    #[must_use]
    pub fn as_module_redirect(&self) -> Option<&Arc<ModuleRedirect>> {
        match self {
            Self::Module(d) => Some(d),
            _ => None,
        }
    }

    /// Attribute redirect, if this is one
    #[inline]
    #[must_use]
    pub fn as_attribute_redirect(&self) -> Option<&Arc<AttributeRedirect>> {
        match self {
            Self::Attribute(d) => Some(d),
            _ => None,
        }
    }

    /// Attribute overwrite, if this is one
    #[inline]
    #[must_use]
    pub fn as_attribute_overwrite(&self) -> Option<&Arc<AttributeOverwrite>> {
        match self {
            Self::Overwrite(d) => Some(d),
            _ => None,
        }
    }
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(d) => d.fmt(f),
            Self::Attribute(d) => d.fmt(f),
            Self::Overwrite(d) => d.fmt(f),
        }
    }
}

impl From<ModuleRedirect> for Directive {
    fn from(d: ModuleRedirect) -> Self {
        Self::Module(Arc::new(d))
    }
}

impl From<AttributeRedirect> for Directive {
    fn from(d: AttributeRedirect) -> Self {
        Self::Attribute(Arc::new(d))
    }
}

impl From<AttributeOverwrite> for Directive {
    fn from(d: AttributeOverwrite) -> Self {
        Self::Overwrite(Arc::new(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_spec_parse() {
        let spec: TargetSpec = "pkg.new.util:helper".parse().unwrap();
        assert_eq!(spec.module().to_string(), "pkg.new.util");
        assert_eq!(spec.attr_chain(), &["helper"]);
        assert_eq!(spec.to_string(), "pkg.new.util:helper");
    }

    #[test]
    fn target_spec_dotted_chain() {
        let spec: TargetSpec = "props.pure.NIST:NIST.cp_mol_ig_comp".parse().unwrap();
        assert_eq!(spec.attr_chain(), &["NIST", "cp_mol_ig_comp"]);
    }

    #[test]
    fn target_spec_requires_one_separator() {
        assert!(matches!(
            "pkg.new".parse::<TargetSpec>(),
            Err(ConfigError::MalformedTarget { .. })
        ));
        assert!(matches!(
            "a:b:c".parse::<TargetSpec>(),
            Err(ConfigError::MalformedTarget { .. })
        ));
        assert!(matches!(
            "pkg:".parse::<TargetSpec>(),
            Err(ConfigError::MalformedTarget { .. })
        ));
    }

    #[test]
    fn replacement_parse_falls_back_to_string() {
        assert!(Replacement::parse("pkg:name").target().is_some());
        match Replacement::parse("just text") {
            Replacement::Value(v) => assert_eq!(v.as_str(), Some("just text")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(Replacement::from(None::<&str>).is_removed());
    }

    #[test]
    fn module_redirect_from_mapping() {
        let redirects =
            ModuleRedirect::from_mapping([("idaes.dmf", Some("idaes.core.dmf")), ("idaes.dmf.tabular", None)])
                .unwrap();

        assert_eq!(redirects.len(), 2);
        assert_eq!(
            redirects[0].replacement().map(ToString::to_string),
            Some("idaes.core.dmf".to_string())
        );
        assert!(redirects[1].replacement().is_none());
    }

    #[test]
    fn attribute_redirect_from_mapping_parses_keys() {
        let redirects = AttributeRedirect::from_mapping([(
            "props.pure.NIST:cp_mol_ig_comp",
            "models.pure.NIST:NIST.cp_mol_ig_comp",
        )])
        .unwrap();

        assert_eq!(redirects[0].module().to_string(), "props.pure.NIST");
        assert_eq!(redirects[0].name(), "cp_mol_ig_comp");
        assert!(redirects[0].replacement().target().is_some());
    }

    #[test]
    fn attribute_redirect_parse_rejects_chains() {
        assert!(AttributeRedirect::parse("pkg:a.b", None::<&str>).is_err());
        assert!(AttributeRedirect::parse("pkg", None::<&str>).is_err());
    }

    #[test]
    fn for_modules_and_no_replacement() {
        let redirects = AttributeRedirect::for_modules([(
            "idaes.core.util",
            vec![
                ("get_solver", Some("idaes.core.solvers:get_solver")),
                ("copy_port_values", None),
            ],
        )])
        .unwrap();
        assert_eq!(redirects.len(), 2);
        assert!(redirects[1].replacement().is_removed());

        let removed = AttributeRedirect::with_no_replacement([(
            "idaes.power_generation.control.pid_controller",
            ["PIDController", "PIDControllerData"],
        )])
        .unwrap();
        assert!(removed.iter().all(|d| d.replacement().is_removed()));
    }

    #[test]
    fn directive_origin_set_once() {
        let mut d = Directive::from(ModuleRedirect::new("a.b", Some("a.c")).unwrap());
        d.set_origin_if_absent("plugin");
        d.set_origin_if_absent("other");
        assert_eq!(d.origin(), Some("plugin"));
        assert_eq!(d.kind(), DirectiveKind::ModuleRedirect);
    }

    #[test]
    fn directive_display() {
        let d = Directive::from(AttributeRedirect::new("pkg.old", "helper", "pkg.new:helper").unwrap());
        assert_eq!(d.to_string(), "AttributeRedirect(pkg.old:helper -> pkg.new:helper)");
        assert_eq!(d.name(), Some("helper"));
    }
}
