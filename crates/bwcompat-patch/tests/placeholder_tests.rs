use bwcompat_namespace::Value;
use bwcompat_patch::prelude::*;
use bwcompat_test_utils::{renamed_package, RecordingSink};
use pretty_assertions::assert_eq;

const GONE: &str = "The 'PIDController' attribute of pkg.new.util is not available anymore.";

fn activated(sink: &std::sync::Arc<RecordingSink>) -> (std::sync::Arc<bwcompat_namespace::ModuleSystem>, Registry) {
    let system = renamed_package();
    let mut registry = Registry::new();
    registry
        .add(
            AttributeRedirect::with_no_replacement([("pkg.new.util", ["PIDController"])])
                .unwrap(),
        )
        .unwrap();
    registry.hooks().set_sink(sink.clone());
    registry.enable(default_patchers(&system)).unwrap();
    registry.activate().unwrap();
    (system, registry)
}

#[test]
fn access_without_call_is_silent() {
    let sink = RecordingSink::new();
    let (system, mut registry) = activated(&sink);

    let placeholder = system.lookup("pkg.new.util", "PIDController").unwrap();
    assert!(placeholder.is_placeholder());
    assert!(sink.messages().iter().all(|m| m != GONE));

    registry.deactivate().unwrap();
}

#[test]
fn each_call_warns_once() {
    let sink = RecordingSink::new();
    let (system, mut registry) = activated(&sink);

    let placeholder = system.lookup("pkg.new.util", "PIDController").unwrap();
    sink.clear();

    assert_eq!(placeholder.call(&[]).unwrap(), Value::None);
    assert_eq!(sink.len(), 1);
    assert_eq!(placeholder.call(&[Value::Int(1)]).unwrap(), Value::None);
    assert_eq!(sink.len(), 2);

    // Attribute access on the placeholder warns too and yields nothing
    assert!(placeholder.get_attr("setpoint").unwrap().is_none());
    assert_eq!(sink.len(), 3);

    for warning in sink.warnings() {
        assert_eq!(warning.message, GONE);
        let site = warning.call_site.unwrap();
        assert!(site.file().ends_with("placeholder_tests.rs"), "{site}");
    }

    registry.deactivate().unwrap();
}

#[test]
fn same_placeholder_for_every_lookup() {
    let sink = RecordingSink::new();
    let (system, mut registry) = activated(&sink);

    let a = system.lookup("pkg.new.util", "PIDController").unwrap();
    let b = system.lookup("pkg.new.util", "PIDController").unwrap();
    assert!(a.same_as(&b));

    registry.deactivate().unwrap();
    assert!(system.lookup("pkg.new.util", "PIDController").is_err());
}

#[test]
fn warnings_follow_replaced_sink_across_reactivation() {
    let first = RecordingSink::new();
    let (system, mut registry) = activated(&first);

    let placeholder = system.lookup("pkg.new.util", "PIDController").unwrap();
    placeholder.call(&[]).unwrap();
    registry.deactivate().unwrap();
    assert_eq!(first.len(), 1);

    let second = RecordingSink::new();
    registry.hooks().set_sink(second.clone());
    registry.hooks().set_logger_name("pkg.deprecations");
    registry.activate().unwrap();

    let placeholder = system.lookup("pkg.new.util", "PIDController").unwrap();
    placeholder.call(&[]).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.messages(), vec![GONE.to_string()]);
    assert_eq!(second.warnings()[0].logger_name, "pkg.deprecations");

    registry.deactivate().unwrap();
}
