/// Concurrent access integration tests
///
/// These tests verify that the container behaves correctly when many threads
/// resolve services at once: singletons are built exactly once, independent
/// ids do not block each other, and cycle tracking is per call.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::{stub, Harness};
use ferrous_wire::{Container, ContainerBuilder, ContainerConfig, CyclePolicy, DiError, Instance, Scope, TypeDescriptor};

const THREADS: usize = 8;

/// A descriptor that takes a while to construct and counts constructions.
fn slow(harness: &Harness, class: &'static str, counter: &Arc<AtomicUsize>) -> TypeDescriptor {
    let harness = harness.clone();
    let counter = counter.clone();
    TypeDescriptor::new(class, move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(harness.instance(class, args))
    })
}

fn race<F>(container: &Container, f: F) -> Vec<Instance>
where
    F: Fn(&Container) -> Instance + Sync,
{
    let barrier = Barrier::new(THREADS);
    crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    f(container)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap()
}

#[test]
fn test_concurrent_singleton_is_constructed_once() {
    let harness = Harness::new();
    let constructions = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    builder.register_type(slow(&harness, "Pool", &constructions));
    builder.set_class("pool", "Pool");
    let container = builder.build().unwrap();

    let instances = race(&container, |c| c.get("pool").unwrap());

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

#[test]
fn test_concurrent_shared_dependency_is_constructed_once() {
    let harness = Harness::new();
    let constructions = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    builder.register_type(slow(&harness, "Pool", &constructions));
    builder.register_type(harness.stub("Repository"));
    builder.set_class("pool", "Pool");
    builder
        .set_class("repo", "Repository")
        .set_scope("repo", Scope::Prototype)
        .add_argument("repo", "@pool");
    let container = builder.build().unwrap();

    let repos = race(&container, |c| c.get("repo").unwrap());

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert_eq!(harness.builds("Repository"), THREADS);
    let pool = stub(&repos[0]).dependency(0).serial;
    assert!(repos.iter().all(|repo| stub(repo).dependency(0).serial == pool));
}

#[test]
fn test_no_false_cycles_across_threads() {
    // every thread walks the same chain at the same time
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Node"));
    builder.set_class("c", "Node").set_scope("c", Scope::Prototype);
    builder
        .set_class("b", "Node")
        .set_scope("b", Scope::Prototype)
        .add_argument("b", "@c");
    builder
        .set_class("a", "Node")
        .set_scope("a", Scope::Prototype)
        .add_argument("a", "@b");
    let container = builder.build().unwrap();

    let barrier = Barrier::new(THREADS);
    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                for _ in 0..50 {
                    container.get("a").unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(harness.builds("Node"), THREADS * 50 * 3);
}

#[test]
fn test_independent_ids_construct_in_parallel() {
    let harness = Harness::new();
    let constructions = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    builder.register_type(slow(&harness, "Worker", &constructions));
    for i in 0..THREADS {
        builder.set_class(&format!("worker.{}", i), "Worker");
    }
    let container = builder.build().unwrap();

    let next = AtomicUsize::new(0);
    let workers = race(&container, |c| {
        let i = next.fetch_add(1, Ordering::SeqCst);
        c.get(&format!("worker.{}", i)).unwrap()
    });

    assert_eq!(constructions.load(Ordering::SeqCst), THREADS);
    assert_eq!(container.singleton_count(), THREADS);
    for (i, a) in workers.iter().enumerate() {
        for b in &workers[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
}

#[test]
fn test_concurrent_request_scope_and_end_request() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Session"));
    builder.set_class("session", "Session").set_scope("session", Scope::Request);
    let container = builder.build().unwrap();

    let sessions = race(&container, |c| c.get("session").unwrap());
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    assert_eq!(harness.builds("Session"), 1);

    assert_eq!(container.end_request(), vec!["session"]);
    let fresh = container.get("session").unwrap();
    assert!(!Arc::ptr_eq(&fresh, &sessions[0]));
}

#[test]
fn test_container_clones_share_state_across_threads() {
    let harness = Harness::new();
    let mut builder = ContainerBuilder::new();
    builder.register_type(harness.stub("Clock"));
    builder.set_class("clock", "Clock");
    let container = builder.build().unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || stub(&container.get("clock").unwrap()).serial)
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(harness.builds("Clock"), 1);
}

#[test]
fn test_lenient_cycle_entered_from_both_ends_fails_both_calls() {
    // a and b depend on each other; the slow shared dependency keeps both
    // threads inside construction at the same time
    let harness = Harness::new();
    let constructions = Arc::new(AtomicUsize::new(0));
    let mut builder = ContainerBuilder::new();
    builder.register_type(slow(&harness, "Seed", &constructions));
    builder.register_type(harness.stub("Node"));
    builder.set_class("seed", "Seed").set_scope("seed", Scope::Prototype);
    builder.set_class("a", "Node").set_arguments("a", ["@seed", "@b"]);
    builder.set_class("b", "Node").set_arguments("b", ["@seed", "@a"]);
    builder.set_class("c", "Node").add_argument("c", "@seed");
    builder.with_config(ContainerConfig::default().with_cycle_policy(CyclePolicy::FailOnResolve));
    let container = builder.build().unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let (tx, rx) = mpsc::channel();
    for id in ["a", "b"] {
        let container = container.clone();
        let barrier = barrier.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            barrier.wait();
            let _ = tx.send((id, container.get(id).err()));
        });
    }

    for _ in 0..2 {
        let (id, error) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("concurrent resolution of a cycle did not return");
        let chain = match error {
            Some(DiError::CircularDependency(chain)) => chain,
            other => panic!("get({}) gave {:?}", id, other),
        };
        assert_eq!(chain.first().map(String::as_str), Some(id));
        assert_eq!(chain.last().map(String::as_str), Some(id));
    }

    // the slots stay usable and the rest of the graph is unaffected
    assert!(matches!(container.get("a"), Err(DiError::CircularDependency(_))));
    assert!(!container.is_instantiated("a"));
    assert!(!container.is_instantiated("b"));
    assert!(container.get("c").is_ok());
}
