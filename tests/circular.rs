mod common;

use common::Harness;
use ferrous_wire::{ContainerBuilder, ContainerConfig, CyclePolicy, DiError};

fn chain(error: Option<DiError>) -> Vec<String> {
    match error {
        Some(DiError::CircularDependency(chain)) => chain,
        other => panic!("expected a circular dependency, got {:?}", other),
    }
}

fn two_node_cycle(harness: &Harness) -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("A"));
    builder.register_type(harness.stub("B"));
    builder.set_class("a", "A").add_argument("a", "@b");
    builder.set_class("b", "B").add_argument("b", "@a");
    builder
}

#[test]
fn test_build_rejects_a_cycle_with_its_chain() {
    let harness = Harness::new();
    let result = two_node_cycle(&harness).build();
    assert_eq!(chain(result.err()), ["a", "b", "a"]);
    assert_eq!(harness.builds("A"), 0);
}

#[test]
fn test_self_reference() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Node"));
    builder.set_class("node", "Node").add_argument("node", "@node");

    assert_eq!(chain(builder.build().err()), ["node", "node"]);
}

#[test]
fn test_cycle_through_an_alias() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("A"));
    builder.register_type(harness.stub("B"));
    builder.set_class("a", "A").add_argument("a", "@b_alias");
    builder.set_class("b", "B").add_argument("b", "@a");
    builder.set_alias("b_alias", "b");

    // references are canonicalized before the graph is checked
    assert_eq!(chain(builder.build().err()), ["a", "b", "a"]);
}

#[test]
fn test_cycle_through_method_call_arguments() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("A"));
    builder.register_type(harness.stub("B"));
    builder.set_class("a", "A").add_method_call("a", "setB", ["@b"]);
    builder.set_class("b", "B").add_argument("b", "@a");

    assert_eq!(chain(builder.build().err()), ["a", "b", "a"]);
}

#[test]
fn test_cycle_through_a_service_factory() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Workshop"));
    builder.set_class("workshop", "Workshop").add_argument("workshop", "@widget");
    builder.set_factory("widget", "@workshop", "make").add_argument("widget", "Widget");

    assert_eq!(chain(builder.build().err()), ["workshop", "widget", "workshop"]);
}

#[test]
fn test_longer_cycle_reports_every_hop() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Node"));
    builder.set_class("entry", "Node").add_argument("entry", "@x");
    builder.set_class("x", "Node").add_argument("x", "@y");
    builder.set_class("y", "Node").add_argument("y", "@z");
    builder.set_class("z", "Node").add_argument("z", "@x");

    assert_eq!(chain(builder.build().err()), ["entry", "x", "y", "z", "x"]);
}

#[test]
fn test_lenient_policy_fails_only_the_cycle() {
    let harness = Harness::new();
    let mut builder = two_node_cycle(&harness);
    builder.register_type(harness.stub("Standalone"));
    builder.set_class("standalone", "Standalone");
    builder.with_config(ContainerConfig::default().with_cycle_policy(CyclePolicy::FailOnResolve));
    let container = builder.build().unwrap();

    assert_eq!(chain(container.get("a").err()), ["a", "b", "a"]);
    assert_eq!(chain(container.get("b").err()), ["b", "a", "b"]);
    assert!(container.get("standalone").is_ok());

    // nothing is cached for a failed resolution
    assert!(!container.is_instantiated("a"));
    assert!(!container.is_instantiated("b"));
}

#[test]
fn test_repeated_resolution_of_a_diamond_is_not_a_cycle() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Node"));
    builder.set_class("top", "Node").set_arguments("top", ["@left", "@right"]);
    builder.set_class("left", "Node").add_argument("left", "@bottom");
    builder.set_class("right", "Node").add_argument("right", "@bottom");
    builder.set_class("bottom", "Node");
    let container = builder.build().unwrap();

    container.get("top").unwrap();
    assert_eq!(harness.builds("Node"), 4);
}

#[test]
fn test_missing_reference_fails_the_build() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Mailer"));
    builder.set_class("mailer", "Mailer").add_argument("mailer", "@logger");

    assert_eq!(builder.build().err(), Some(DiError::ServiceNotFound("logger".into())));
}
