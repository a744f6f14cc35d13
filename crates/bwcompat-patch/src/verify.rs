//! Importables verification
//!
//! Checks that a list of `(module, name)` pairs can still be imported, which
//! is how a registry is validated against the names client code relies on.

use crate::error::ConfigError;
use bwcompat_namespace::{CallSite, ModuleSystem};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Name client code imports from a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Importable {
    /// Module imported from
    #[serde(rename = "module_name")]
    pub module: String,
    /// Name imported
    pub name: String,
}

impl Importable {
    /// Create importable
    #[inline]
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Parse a JSON array of `{"module_name": .., "name": ..}` records
    ///
    /// # Errors
    /// Returns error if the document is not such an array
    pub fn from_json_str(s: &str) -> Result<Vec<Self>, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl Display for Importable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// What was checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// `import module`
    Module(String),
    /// `from module import name`
    Importable(Importable),
}

impl Display for Check {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(module) => f.write_str(module),
            Self::Importable(target) => target.fmt(f),
        }
    }
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Import succeeded
    Passed,
    /// Import failed
    Failed {
        /// Error message
        reason: String,
    },
}

impl Outcome {
    /// Check if passed
    #[inline]
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Outcomes in check order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    results: Vec<(Check, Outcome)>,
}

impl VerifyReport {
    /// Every check with its outcome
    #[inline]
    #[must_use]
    pub fn results(&self) -> &[(Check, Outcome)] {
        &self.results
    }

    /// Checks that passed
    pub fn passed(&self) -> impl Iterator<Item = &Check> {
        self.results
            .iter()
            .filter(|(_, outcome)| outcome.is_passed())
            .map(|(check, _)| check)
    }

    /// Checks that failed, with the reason
    pub fn failed(&self) -> impl Iterator<Item = (&Check, &str)> {
        self.results.iter().filter_map(|(check, outcome)| match outcome {
            Outcome::Passed => None,
            Outcome::Failed { reason } => Some((check, reason.as_str())),
        })
    }

    /// Check if every check passed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, outcome)| outcome.is_passed())
    }
}

/// Import each distinct module once, then look up each name in it
///
/// Modules are checked in first-seen order, each followed by its names.
pub fn verify_importables<'a>(
    system: &ModuleSystem,
    items: impl IntoIterator<Item = &'a Importable>,
) -> VerifyReport {
    let mut by_module: IndexMap<&str, Vec<&Importable>> = IndexMap::new();
    for item in items {
        by_module.entry(item.module.as_str()).or_default().push(item);
    }

    let call_site = CallSite::caller();
    let mut report = VerifyReport::default();
    for (module, targets) in by_module {
        let imported = system.import_at(module, call_site);
        let outcome = match &imported {
            Ok(_) => Outcome::Passed,
            Err(err) => Outcome::Failed {
                reason: format!("import failed for {module}: {err}"),
            },
        };
        report.results.push((Check::Module(module.to_string()), outcome));

        for target in targets {
            let outcome = match &imported {
                Ok(m) => match m.get_attr_at(&target.name, call_site) {
                    Ok(_) => Outcome::Passed,
                    Err(err) => Outcome::Failed {
                        reason: format!("import failed for {target}: {err}"),
                    },
                },
                Err(err) => Outcome::Failed {
                    reason: format!("import failed for {target}: {err}"),
                },
            };
            report.results.push((Check::Importable(target.clone()), outcome));
        }
    }

    let failed = report.failed().count();
    tracing::info!(
        checks = report.results.len(),
        failed,
        "verified importables"
    );
    report
}
