//! Hook dispatch
//!
//! Handlers are keyed by `(HookEvent, DirectiveKind)`. Patchers fire
//! [`HookEvent::Installation`] while installing a directive and
//! [`HookEvent::Activation`] each time client code exercises one.

use crate::directive::{AttributeDirective, Directive, DirectiveKind, Replacement};
use bwcompat_namespace::{CallSite, DeprecationSink, TracingSink, WarningTarget};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// When a hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Client code exercised the directive
    Activation,
    /// A patcher installed the directive
    Installation,
}

/// Handle returned by [`Hooks::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Hook handler
pub type Handler = Arc<dyn Fn(&Directive, &HookContext<'_>) + Send + Sync>;

/// Information passed to handlers alongside the directive
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    event: HookEvent,
    patcher: &'static str,
    call_site: Option<CallSite>,
    sink: Arc<dyn DeprecationSink>,
    logger_name: &'a str,
}

impl HookContext<'_> {
    /// Event being dispatched
    #[inline]
    #[must_use]
    pub fn event(&self) -> HookEvent {
        self.event
    }

    /// Name of the patcher firing the hook
    #[inline]
    #[must_use]
    pub fn patcher(&self) -> &'static str {
        self.patcher
    }

    /// Client code location, when known
    #[inline]
    #[must_use]
    pub fn call_site(&self) -> Option<CallSite> {
        self.call_site
    }

    /// Warning sink configured on the hooks
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn DeprecationSink> {
        &self.sink
    }

    /// Logger name configured on the hooks
    #[inline]
    #[must_use]
    pub fn logger_name(&self) -> &str {
        self.logger_name
    }
}

/// Sink and logger name, shared with the placeholders handed out
#[derive(Debug)]
struct WarningSettings {
    sink: RwLock<Arc<dyn DeprecationSink>>,
    logger_name: RwLock<String>,
}

impl WarningTarget for WarningSettings {
    fn sink(&self) -> Arc<dyn DeprecationSink> {
        Arc::clone(&self.sink.read())
    }

    fn logger_name(&self) -> String {
        self.logger_name.read().clone()
    }
}

/// Handler table plus the warning sink shared by the patchers
pub struct Hooks {
    handlers: RwLock<IndexMap<(HookEvent, DirectiveKind), Vec<(HandlerId, Handler)>>>,
    warnings: Arc<WarningSettings>,
    next_id: AtomicU64,
}

impl Hooks {
    /// Create hooks with no handlers and the `tracing` sink
    #[must_use]
    pub fn new(logger_name: impl Into<String>) -> Self {
        Self {
            handlers: RwLock::new(IndexMap::new()),
            warnings: Arc::new(WarningSettings {
                sink: RwLock::new(Arc::new(TracingSink)),
                logger_name: RwLock::new(logger_name.into()),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `handler` for `(event, kind)`
    pub fn subscribe(
        &self,
        event: HookEvent,
        kind: DirectiveKind,
        handler: impl Fn(&Directive, &HookContext<'_>) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry((event, kind))
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler; returns false if it was not registered
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(idx) = list.iter().position(|(h, _)| *h == id) {
                list.remove(idx);
                return true;
            }
        }
        false
    }

    /// Number of handlers for `(event, kind)`
    #[must_use]
    pub fn handler_count(&self, event: HookEvent, kind: DirectiveKind) -> usize {
        self.handlers.read().get(&(event, kind)).map_or(0, Vec::len)
    }

    /// Call every handler registered for the directive's kind
    pub fn dispatch(
        &self,
        event: HookEvent,
        directive: &Directive,
        patcher: &'static str,
        call_site: Option<CallSite>,
    ) {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .get(&(event, directive.kind()))
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::info!(?event, patcher, "{directive}");
            return;
        }

        let logger_name = self.logger_name();
        let cx = HookContext {
            event,
            patcher,
            call_site,
            sink: self.sink(),
            logger_name: &logger_name,
        };
        for handler in handlers {
            handler(directive, &cx);
        }
    }

    /// Fire [`HookEvent::Activation`]
    #[inline]
    pub fn on_activation(
        &self,
        directive: &Directive,
        patcher: &'static str,
        call_site: Option<CallSite>,
    ) {
        self.dispatch(HookEvent::Activation, directive, patcher, call_site);
    }

    /// Fire [`HookEvent::Installation`]
    #[inline]
    pub fn on_installation(&self, directive: &Directive, patcher: &'static str) {
        self.dispatch(HookEvent::Installation, directive, patcher, None);
    }

    /// Current warning sink
    #[must_use]
    pub fn sink(&self) -> Arc<dyn DeprecationSink> {
        self.warnings.sink()
    }

    /// Replace the warning sink
    pub fn set_sink(&self, sink: Arc<dyn DeprecationSink>) {
        *self.warnings.sink.write() = sink;
    }

    /// Logger name passed to the sink
    #[must_use]
    pub fn logger_name(&self) -> String {
        self.warnings.logger_name()
    }

    /// Replace the logger name
    pub fn set_logger_name(&self, logger_name: impl Into<String>) {
        *self.warnings.logger_name.write() = logger_name.into();
    }

    /// Live view of the sink and logger name, for values that warn later
    #[must_use]
    pub fn warning_target(&self) -> Arc<dyn WarningTarget> {
        let target: Arc<WarningSettings> = Arc::clone(&self.warnings);
        target
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOGGER_NAME)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("handlers", &self.handlers.read().len())
            .field("sink", &*self.warnings.sink.read())
            .field("logger_name", &*self.warnings.logger_name.read())
            .finish()
    }
}

/// Standard deprecation messages for exercised directives
#[derive(Debug, Clone, Copy, Default)]
pub struct DeprecationMessages;

impl DeprecationMessages {
    /// Register activation handlers that send a message per directive kind
    /// to the hooks' sink
    pub fn install(hooks: &Hooks) -> [HandlerId; 3] {
        let kinds = [
            DirectiveKind::ModuleRedirect,
            DirectiveKind::AttributeRedirect,
            DirectiveKind::AttributeOverwrite,
        ];
        kinds.map(|kind| {
            hooks.subscribe(HookEvent::Activation, kind, |directive, cx| {
                let message = Self::message(directive);
                cx.sink().warn(&message, cx.logger_name(), cx.call_site());
            })
        })
    }

    /// Message text for `directive`
    #[must_use]
    pub fn message(directive: &Directive) -> String {
        match directive {
            Directive::Module(d) => match d.replacement() {
                Some(new) => format!("The module {} must now be imported as {new}", d.module()),
                None => format!(
                    "The module {} has been removed and no direct replacement is available.",
                    d.module()
                ),
            },
            Directive::Attribute(d) => {
                let mut msg = format!(
                    "'{}' cannot be imported from module '{}' anymore.",
                    d.name(),
                    d.module()
                );
                match d.replacement() {
                    Replacement::Removed => {}
                    replacement => msg.push_str(&format!(" Instead, use {replacement}")),
                }
                msg
            }
            Directive::Overwrite(d) => format!(
                "'{}' of module '{}' has been replaced for backward compatibility",
                d.name(),
                d.module()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{AttributeOverwrite, AttributeRedirect, ModuleRedirect};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Collect(Mutex<Vec<(String, String)>>);

    impl DeprecationSink for Collect {
        fn warn(&self, message: &str, logger_name: &str, _call_site: Option<CallSite>) {
            self.0.lock().push((message.to_string(), logger_name.to_string()));
        }
    }

    fn module_redirect(new: Option<&str>) -> Directive {
        ModuleRedirect::new("pkg.old", new).unwrap().into()
    }

    #[test]
    fn dispatch_by_event_and_kind() {
        let hooks = Hooks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hooks.subscribe(HookEvent::Activation, DirectiveKind::ModuleRedirect, move |d, cx| {
            sink.lock().push((d.to_string(), cx.patcher()));
        });

        let directive = module_redirect(Some("pkg.new"));
        hooks.on_activation(&directive, "ModuleRedirector", None);
        hooks.on_installation(&directive, "ModuleRedirector");

        assert_eq!(
            *seen.lock(),
            vec![("ModuleRedirect(pkg.old -> pkg.new)".to_string(), "ModuleRedirector")]
        );
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let hooks = Hooks::default();
        let id = hooks.subscribe(HookEvent::Installation, DirectiveKind::AttributeOverwrite, |_, _| {});
        assert_eq!(hooks.handler_count(HookEvent::Installation, DirectiveKind::AttributeOverwrite), 1);
        assert!(hooks.unsubscribe(id));
        assert!(!hooks.unsubscribe(id));
    }

    #[test]
    fn module_messages() {
        assert_eq!(
            DeprecationMessages::message(&module_redirect(Some("pkg.new"))),
            "The module pkg.old must now be imported as pkg.new"
        );
        assert_eq!(
            DeprecationMessages::message(&module_redirect(None)),
            "The module pkg.old has been removed and no direct replacement is available."
        );
    }

    #[test]
    fn attribute_messages() {
        let redirect: Directive = AttributeRedirect::new("pkg.old.util", "helper", "pkg.new.util:helper")
            .unwrap()
            .into();
        assert_eq!(
            DeprecationMessages::message(&redirect),
            "'helper' cannot be imported from module 'pkg.old.util' anymore. Instead, use pkg.new.util:helper"
        );

        let removed: Directive = AttributeRedirect::new("pkg.old.util", "gone", None::<&str>)
            .unwrap()
            .into();
        assert_eq!(
            DeprecationMessages::message(&removed),
            "'gone' cannot be imported from module 'pkg.old.util' anymore."
        );

        let overwrite: Directive = AttributeOverwrite::new("pkg.new", "Block", "pkg.compat:Block")
            .unwrap()
            .into();
        assert_eq!(
            DeprecationMessages::message(&overwrite),
            "'Block' of module 'pkg.new' has been replaced for backward compatibility"
        );
    }

    #[test]
    fn installed_messages_reach_sink() {
        let hooks = Hooks::new("compat");
        let sink = Arc::new(Collect::default());
        hooks.set_sink(sink.clone());
        DeprecationMessages::install(&hooks);

        hooks.on_activation(&module_redirect(None), "ModuleRedirector", None);

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "compat");
        assert!(seen[0].0.contains("has been removed"));
    }

    #[test]
    fn warning_target_tracks_replaced_sink() {
        let hooks = Hooks::new("compat");
        let first = Arc::new(Collect::default());
        hooks.set_sink(first.clone());
        let target = hooks.warning_target();

        let second = Arc::new(Collect::default());
        hooks.set_sink(second.clone());
        hooks.set_logger_name("renamed");
        target.sink().warn("gone", &target.logger_name(), None);

        assert!(first.0.lock().is_empty());
        assert_eq!(*second.0.lock(), vec![("gone".to_string(), "renamed".to_string())]);
    }
}
