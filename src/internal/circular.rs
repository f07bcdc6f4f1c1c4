//! Circular dependency detection over the binding graph.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};

use crate::binding::Binding;
use crate::error::{DiError, DiResult};

/// Ids currently being built by one top-level `get`.
///
/// Each top-level call owns its stack, so concurrent resolutions of
/// unrelated services never see each other's frames.
#[derive(Debug, Default)]
pub(crate) struct ResolvingStack {
    stack: Vec<String>,
}

impl ResolvingStack {
    /// Pushes `id`, failing with the chain if it is already being built.
    pub(crate) fn enter(&mut self, id: &str) -> DiResult<()> {
        if self.stack.iter().any(|frame| frame == id) {
            let mut chain = self.stack.clone();
            chain.push(id.to_string());
            return Err(DiError::CircularDependency(chain));
        }
        self.stack.push(id.to_string());
        Ok(())
    }

    pub(crate) fn exit(&mut self, id: &str) {
        let popped = self.stack.pop();
        debug_assert_eq!(popped.as_deref(), Some(id));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Depth-first search for cycles, starting from each id in `order`.
///
/// Every back edge yields one chain: the DFS stack plus the repeated id.
/// Each node is expanded once, so the walk is linear in the graph size.
pub(crate) fn find_cycles(bindings: &HashMap<String, Binding>, order: &[String]) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut done = HashSet::new();
    let mut stack = Vec::new();
    for root in order {
        visit(root, bindings, &mut stack, &mut done, &mut cycles);
    }
    cycles
}

fn visit<'a>(
    id: &'a str,
    bindings: &'a HashMap<String, Binding>,
    stack: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    if stack.contains(&id) {
        let mut chain: Vec<String> = stack.iter().map(|s| s.to_string()).collect();
        chain.push(id.to_string());
        cycles.push(chain);
        return;
    }
    if done.contains(id) {
        return;
    }
    let Some(binding) = bindings.get(id) else {
        return;
    };
    stack.push(id);
    for dep in binding.dependencies() {
        visit(dep, bindings, stack, done, cycles);
    }
    stack.pop();
    done.insert(id);
}

/// The cycle chain each id runs into when it is built, keyed by that id.
///
/// A lazy service reached as a dependency hands out a proxy without
/// building anything, so the walk stops there; the root itself is always
/// expanded. Ids whose construction is cycle-free are absent.
pub(crate) fn cycle_chains<B: Borrow<Binding>>(bindings: &HashMap<String, B>, order: &[String]) -> HashMap<String, Vec<String>> {
    let mut chains = HashMap::new();
    for root in order {
        let mut stack = Vec::new();
        let mut done = HashSet::new();
        if let Some(chain) = first_cycle(root, bindings, &mut stack, &mut done) {
            chains.insert(root.clone(), chain);
        }
    }
    chains
}

fn first_cycle<'a, B: Borrow<Binding>>(
    id: &'a str,
    bindings: &'a HashMap<String, B>,
    stack: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if stack.contains(&id) {
        let mut chain: Vec<String> = stack.iter().map(|s| s.to_string()).collect();
        chain.push(id.to_string());
        return Some(chain);
    }
    if done.contains(id) {
        return None;
    }
    let binding: &Binding = bindings.get(id)?.borrow();
    if !stack.is_empty() && binding.lazy.is_lazy() {
        return None;
    }
    stack.push(id);
    for dep in binding.dependencies() {
        if let Some(chain) = first_cycle(dep, bindings, stack, done) {
            return Some(chain);
        }
    }
    stack.pop();
    done.insert(id);
    None
}

/// Fails with the first cycle found.
pub(crate) fn reject_cycles(bindings: &HashMap<String, Binding>, order: &[String]) -> DiResult<()> {
    match find_cycles(bindings, order).into_iter().next() {
        Some(chain) => Err(DiError::CircularDependency(chain)),
        None => Ok(()),
    }
}

/// Every service reference must name a binding or an externally known id.
pub(crate) fn check_references<F>(bindings: &HashMap<String, Binding>, order: &[String], known: F) -> DiResult<()>
where
    F: Fn(&str) -> bool,
{
    for id in order {
        let Some(binding) = bindings.get(id) else { continue };
        if let Some(missing) = binding
            .dependencies()
            .find(|dep| !bindings.contains_key(*dep) && !known(dep))
        {
            return Err(DiError::ServiceNotFound(missing.to_string()));
        }
    }
    Ok(())
}
