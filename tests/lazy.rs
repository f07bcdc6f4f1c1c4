mod common;

use std::sync::Arc;

use common::{stub, Harness};
use ferrous_wire::lazy::{is_proxy, real_instance};
use ferrous_wire::{
    ClassProxy, ContainerBuilder, DiError, Injected, LazyStrategy, MethodProxy, PropertyProxy, Scope, Service,
    Value, Visibility,
};

#[test]
fn method_proxy_defers_until_called() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Mailer"));
    builder.set_class("mailer", "Mailer").set_lazy_method("mailer", "send");
    let container = builder.build().unwrap();

    let mailer = container.get("mailer").unwrap();
    assert_eq!(harness.builds("Mailer"), 0);
    let proxy = mailer.downcast_ref::<MethodProxy>().unwrap();
    assert_eq!(proxy.bound_method(), "send");
    assert!(!proxy.is_initialized());

    // whatever name is requested, the bound method runs
    let out = mailer.invoke("deliver", vec![Injected::Value("hi".into())]).unwrap();
    assert_eq!(out.as_value(), Some(&Value::from("Mailer:send")));
    mailer.invoke("send", Vec::new()).unwrap();

    assert_eq!(harness.builds("Mailer"), 1);
    assert_eq!(harness.calls(), vec!["Mailer.send", "Mailer.send"]);
}

#[test]
fn method_proxy_definition_from_json() {
    let harness = Harness::new();
    let set = serde_json::from_str(
        r#"{ "services": { "job": { "class": "Job", "lazy": "method", "lazy_method": "run" } } }"#,
    )
    .unwrap();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Job"));
    builder.load_definitions(set);
    let container = builder.build().unwrap();

    let job = container.get("job").unwrap();
    job.invoke("anything", Vec::new()).unwrap();
    assert_eq!(harness.calls(), vec!["Job.run"]);
}

#[test]
fn method_proxy_without_a_method_is_invalid() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Job"));
    builder.set_class("job", "Job").set_lazy("job", LazyStrategy::Method);

    assert!(matches!(builder.build(), Err(DiError::InvalidDefinition { id, .. }) if id == "job"));
}

#[test]
fn class_proxy_builds_on_first_use() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Report"));
    builder.set_class("report", "Report").set_lazy("report", LazyStrategy::Class);
    let container = builder.build().unwrap();

    let report = container.get("report").unwrap();
    assert!(is_proxy(&report));
    assert_eq!(report.type_name(), "Report");
    assert_eq!(harness.builds("Report"), 0);

    report.set_property("title", Injected::Value("Q3".into())).unwrap();
    assert_eq!(harness.builds("Report"), 1);
    assert_eq!(report.get_property("title").unwrap().as_value(), Some(&Value::from("Q3")));

    let proxy = report.downcast_ref::<ClassProxy>().unwrap();
    assert!(proxy.is_initialized());
    assert_eq!(proxy.id(), "report");

    // the proxy is what the scope caches
    assert!(Arc::ptr_eq(&report, &container.get("report").unwrap()));
    assert_eq!(harness.builds("Report"), 1);
}

#[test]
fn lazy_prototype_hands_out_fresh_proxies() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Report"));
    builder
        .set_class("report", "Report")
        .set_lazy("report", LazyStrategy::Class)
        .set_scope("report", Scope::Prototype);
    let container = builder.build().unwrap();

    let a = container.get("report").unwrap();
    let b = container.get("report").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    real_instance(&a).unwrap();
    real_instance(&b).unwrap();
    assert_eq!(harness.builds("Report"), 2);
}

#[test]
fn property_proxy_initializes_each_property_once() {
    let harness = Harness::new();
    let summaries = Harness::new();
    let counter = summaries.clone();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Analytics").lazy_property("summary", move |target| {
        counter.instance("Summary", Vec::new());
        Ok(Injected::Value(Value::from(format!("summary of {}", target.type_name()))))
    }));
    builder
        .set_class("analytics", "Analytics")
        .set_lazy_properties("analytics", ["summary"]);
    let container = builder.build().unwrap();

    let analytics = container.get("analytics").unwrap();
    assert_eq!(harness.builds("Analytics"), 0);

    let proxy = analytics.downcast_ref::<PropertyProxy>().unwrap();
    assert!(!proxy.is_property_initialized("summary"));

    let summary = analytics.get_property("summary").unwrap();
    assert_eq!(summary.as_value(), Some(&Value::from("summary of Analytics")));
    analytics.get_property("summary").unwrap();
    assert_eq!(summaries.builds("Summary"), 1);
    assert!(proxy.is_property_initialized("summary"));

    // the value lives on the real instance
    let real = real_instance(&analytics).unwrap();
    assert_eq!(
        stub(&real).property("summary").and_then(|v| v.as_value().cloned()),
        Some(Value::from("summary of Analytics"))
    );
}

#[test]
fn writing_a_lazy_property_skips_its_initializer() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(
        harness
            .stub("Analytics")
            .lazy_property("summary", |_| Err(DiError::construction("summary", "must not run"))),
    );
    builder
        .set_class("analytics", "Analytics")
        .set_lazy_properties("analytics", ["summary"]);
    let container = builder.build().unwrap();

    let analytics = container.get("analytics").unwrap();
    analytics.set_property("summary", Injected::Value("preset".into())).unwrap();
    let summary = analytics.get_property("summary").unwrap();
    assert_eq!(summary.as_value(), Some(&Value::from("preset")));
}

#[test]
fn lazy_property_without_initializer_is_invalid() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Analytics"));
    builder
        .set_class("analytics", "Analytics")
        .set_lazy_properties("analytics", ["summary"]);

    match builder.build() {
        Err(DiError::InvalidDefinition { id, reason }) => {
            assert_eq!(id, "analytics");
            assert!(reason.contains("summary"));
        }
        other => panic!("expected InvalidDefinition, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn lazy_dependencies_stay_deferred() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Heavy"));
    builder.register_type(harness.stub("Consumer"));
    builder.set_class("heavy", "Heavy").set_lazy("heavy", LazyStrategy::Class);
    builder.set_class("consumer", "Consumer").add_argument("consumer", "@heavy");
    let container = builder.build().unwrap();

    let consumer = container.get("consumer").unwrap();
    assert_eq!(harness.builds("Heavy"), 0);

    let heavy = stub(&consumer).arg(0).as_service().unwrap().clone();
    assert!(is_proxy(&heavy));
    let real = real_instance(&heavy).unwrap();
    assert_eq!(stub(&real).class, "Heavy");
    assert_eq!(harness.builds("Heavy"), 1);
}

#[test]
fn lazy_services_skip_the_visibility_check() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Report"));
    builder
        .set_class("report", "Report")
        .set_lazy("report", LazyStrategy::Class)
        .set_visibility("report", Visibility::Private);
    let container = builder.build().unwrap();

    assert!(is_proxy(&container.get("report").unwrap()));
}

#[test]
fn proxy_outliving_its_container_fails_cleanly() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Report"));
    builder.set_class("report", "Report").set_lazy("report", LazyStrategy::Class);
    let container = builder.build().unwrap();

    let report = container.get("report").unwrap();
    drop(container);

    assert!(matches!(
        report.invoke("render", Vec::new()),
        Err(DiError::Construction { id, .. }) if id == "report"
    ));
    assert_eq!(harness.builds("Report"), 0);
}

#[test]
fn shutdown_cleans_only_materialized_targets() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Used"));
    builder.register_type(harness.stub("Idle"));
    builder.set_class("used", "Used").set_lazy("used", LazyStrategy::Class);
    builder.set_class("idle", "Idle").set_lazy("idle", LazyStrategy::Class);
    let container = builder.build().unwrap();

    container.get("used").unwrap().invoke("touch", Vec::new()).unwrap();
    container.get("idle").unwrap();

    assert_eq!(container.shutdown(), vec!["idle", "used"]);
    assert_eq!(harness.cleanups(), vec!["Used"]);
    assert_eq!(harness.builds("Idle"), 0);
}

#[test]
fn real_instance_passes_plain_services_through() {
    let harness = Harness::new();
    let plain = harness.instance("Plain", Vec::new());
    let same = real_instance(&plain).unwrap();
    assert!(Arc::ptr_eq(&plain, &same));
    assert!(!is_proxy(&plain));
}
