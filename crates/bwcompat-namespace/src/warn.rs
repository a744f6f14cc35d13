//! Deprecation signalling
//!
//! Provides [`CallSite`] attribution, the [`DeprecationSink`] seam through
//! which warnings leave the runtime, and the [`Placeholder`] value handed out
//! for names that were removed without replacement.

use std::fmt::{self, Display, Formatter};
use std::panic::Location;
use std::sync::Arc;

/// Source location of the client code that triggered a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    location: &'static Location<'static>,
}

impl CallSite {
    /// Capture the location of the caller
    ///
    /// Propagates through every `#[track_caller]` frame, so public lookup
    /// entry points report the client's own source line.
    #[inline]
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Self {
            location: Location::caller(),
        }
    }

    /// Source file
    #[inline]
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Line number
    #[inline]
    #[must_use]
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// Column number
    #[inline]
    #[must_use]
    pub fn column(&self) -> u32 {
        self.location.column()
    }
}

impl Display for CallSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file(), self.line(), self.column())
    }
}

/// Host facility that emits deprecation warnings
pub trait DeprecationSink: Send + Sync + fmt::Debug {
    /// Emit `message` on behalf of `logger_name`, attributed to `call_site`
    fn warn(&self, message: &str, logger_name: &str, call_site: Option<CallSite>);
}

/// Default sink: forwards warnings to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DeprecationSink for TracingSink {
    fn warn(&self, message: &str, logger_name: &str, call_site: Option<CallSite>) {
        match call_site {
            Some(site) => tracing::warn!(logger = logger_name, call_site = %site, "{message}"),
            None => tracing::warn!(logger = logger_name, "{message}"),
        }
    }
}

/// Where a placeholder sends its warnings
///
/// Read at every use, so replacing the sink after the placeholder was handed
/// out still takes effect.
pub trait WarningTarget: Send + Sync + fmt::Debug {
    /// Sink currently in effect
    fn sink(&self) -> Arc<dyn DeprecationSink>;

    /// Logger name currently in effect
    fn logger_name(&self) -> String;
}

/// Target that never changes
#[derive(Debug, Clone)]
pub struct FixedTarget {
    sink: Arc<dyn DeprecationSink>,
    logger_name: String,
}

impl FixedTarget {
    /// Create target
    #[must_use]
    pub fn new(logger_name: impl Into<String>, sink: Arc<dyn DeprecationSink>) -> Self {
        Self {
            sink,
            logger_name: logger_name.into(),
        }
    }
}

impl WarningTarget for FixedTarget {
    fn sink(&self) -> Arc<dyn DeprecationSink> {
        Arc::clone(&self.sink)
    }

    fn logger_name(&self) -> String {
        self.logger_name.clone()
    }
}

/// Stand-in for an attribute removed without replacement
///
/// Holding a placeholder is harmless. Each attribute access or call on it
/// emits one warning and yields `Value::None` instead of failing.
#[derive(Debug, Clone)]
pub struct Placeholder {
    message: String,
    target: Arc<dyn WarningTarget>,
}

impl Placeholder {
    /// Create a placeholder that reports `message` through `sink`
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        logger_name: impl Into<String>,
        sink: Arc<dyn DeprecationSink>,
    ) -> Self {
        Self::with_target(message, Arc::new(FixedTarget::new(logger_name, sink)))
    }

    /// Create a placeholder that reports `message` wherever `target` points
    /// at the time of use
    #[must_use]
    pub fn with_target(message: impl Into<String>, target: Arc<dyn WarningTarget>) -> Self {
        Self {
            message: message.into(),
            target,
        }
    }

    /// Warning text emitted on use
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Logger name currently passed to the sink
    #[must_use]
    pub fn logger_name(&self) -> String {
        self.target.logger_name()
    }

    /// Record one use of the placeholder
    pub fn touch(&self, call_site: CallSite) {
        self.target
            .sink()
            .warn(&self.message, &self.target.logger_name(), Some(call_site));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Mutex, RwLock};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Collect(Mutex<Vec<(String, String, Option<CallSite>)>>);

    impl DeprecationSink for Collect {
        fn warn(&self, message: &str, logger_name: &str, call_site: Option<CallSite>) {
            self.0
                .lock()
                .push((message.to_string(), logger_name.to_string(), call_site));
        }
    }

    #[test]
    fn call_site_points_at_caller() {
        let site = CallSite::caller();
        assert!(site.file().ends_with("warn.rs"));
        assert!(site.line() > 0);
        assert!(site.to_string().contains("warn.rs:"));
    }

    #[test]
    fn placeholder_touch_reports_once() {
        let sink = Arc::new(Collect::default());
        let placeholder = Placeholder::new("gone", "compat", sink.clone());

        placeholder.touch(CallSite::caller());

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "gone");
        assert_eq!(seen[0].1, "compat");
        assert!(seen[0].2.is_some());
    }

    #[derive(Debug)]
    struct Switchable(RwLock<Arc<dyn DeprecationSink>>);

    impl WarningTarget for Switchable {
        fn sink(&self) -> Arc<dyn DeprecationSink> {
            Arc::clone(&self.0.read())
        }

        fn logger_name(&self) -> String {
            "live".to_string()
        }
    }

    #[test]
    fn placeholder_follows_target_changes() {
        let first = Arc::new(Collect::default());
        let second = Arc::new(Collect::default());
        let target = Arc::new(Switchable(RwLock::new(first.clone())));
        let placeholder = Placeholder::with_target("gone", target.clone());

        placeholder.touch(CallSite::caller());
        *target.0.write() = second.clone();
        placeholder.touch(CallSite::caller());

        assert_eq!(first.0.lock().len(), 1);
        assert_eq!(second.0.lock().len(), 1);
        assert_eq!(second.0.lock()[0].1, "live");
        assert_eq!(placeholder.logger_name(), "live");
    }
}
