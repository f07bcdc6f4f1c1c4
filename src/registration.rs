//! Definition registry: raw definitions, parameters, aliases and the interface map.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::definition::{FactorySpec, MethodCall, ServiceDefinition};
use crate::error::{DiError, DiResult};
use crate::lifetime::{LazyStrategy, Scope, Visibility, WiringMode};
use crate::value::Value;

/// Service registry holding all raw definitions in registration order.
///
/// Every mutator returns `&mut Self` so calls chain the way the builder's do.
/// Mutators that target an id create an empty definition when the id is not
/// registered yet.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<(String, ServiceDefinition)>,
    index: HashMap<String, usize>,
    parameters: BTreeMap<String, Value>,
    aliases: HashMap<String, String>,
    interfaces: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a definition; a replaced id keeps its position.
    pub fn define(&mut self, id: impl Into<String>, definition: ServiceDefinition) -> &mut Self {
        let id = id.into();
        match self.index.get(&id) {
            Some(&pos) => self.entries[pos].1 = definition,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, definition));
            }
        }
        self
    }

    /// Registers `definition` only when `id` is not defined yet.
    pub fn bind_if(&mut self, id: impl Into<String>, definition: ServiceDefinition) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            return false;
        }
        self.define(id, definition);
        true
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn definition(&self, id: &str) -> Option<&ServiceDefinition> {
        self.index.get(id).map(|&pos| &self.entries[pos].1)
    }

    pub fn definition_mut(&mut self, id: &str) -> Option<&mut ServiceDefinition> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    fn entry(&mut self, id: &str) -> &mut ServiceDefinition {
        let pos = match self.index.get(id) {
            Some(&pos) => pos,
            None => {
                self.define(id, ServiceDefinition::default());
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    /// Ids in registration order.
    pub fn service_ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServiceDefinition)> {
        self.entries.iter().map(|(id, def)| (id.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ----- Definition shorthands -----

    pub fn set_class(&mut self, id: &str, class: impl Into<String>) -> &mut Self {
        self.entry(id).class = Some(class.into());
        self
    }

    pub fn set_factory(&mut self, id: &str, target: impl Into<String>, method: impl Into<String>) -> &mut Self {
        self.entry(id).factory = Some(FactorySpec::new(target, method));
        self
    }

    pub fn add_argument(&mut self, id: &str, argument: impl Into<Value>) -> &mut Self {
        self.entry(id).arguments.push(argument.into());
        self
    }

    pub fn set_arguments<I, V>(&mut self, id: &str, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.entry(id).arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_method_call<I, V>(&mut self, id: &str, method: impl Into<String>, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let call = MethodCall::new(method, arguments.into_iter().map(Into::into).collect());
        self.entry(id).method_calls.push(call);
        self
    }

    pub fn set_scope(&mut self, id: &str, scope: Scope) -> &mut Self {
        self.entry(id).scope = Some(scope);
        self
    }

    pub fn set_visibility(&mut self, id: &str, visibility: Visibility) -> &mut Self {
        self.entry(id).visibility = Some(visibility);
        self
    }

    pub fn set_shared(&mut self, id: &str, shared: bool) -> &mut Self {
        self.entry(id).shared = Some(shared);
        self
    }

    pub fn set_lazy(&mut self, id: &str, lazy: LazyStrategy) -> &mut Self {
        self.entry(id).lazy = Some(lazy);
        self
    }

    /// Method proxy: every call is forwarded to `method`.
    pub fn set_lazy_method(&mut self, id: &str, method: impl Into<String>) -> &mut Self {
        let def = self.entry(id);
        def.lazy = Some(LazyStrategy::Method);
        def.lazy_method = Some(method.into());
        self
    }

    /// Property proxy: the listed properties are initialized on first read.
    pub fn set_lazy_properties<I, S>(&mut self, id: &str, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = self.entry(id);
        def.lazy = Some(LazyStrategy::Property);
        def.lazy_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn extends(&mut self, id: &str, parent: impl Into<String>) -> &mut Self {
        self.entry(id).extends = Some(parent.into());
        self
    }

    pub fn autowire(&mut self, id: &str) -> &mut Self {
        let def = self.entry(id);
        def.autowire = Some(true);
        def.annotwire = Some(false);
        self
    }

    pub fn annotwire(&mut self, id: &str) -> &mut Self {
        let def = self.entry(id);
        def.annotwire = Some(true);
        def.autowire = Some(false);
        self
    }

    /// Annotwire directive for one constructor parameter.
    pub fn inject(&mut self, id: &str, parameter: impl Into<String>, directive: impl Into<String>) -> &mut Self {
        self.entry(id).inject.insert(parameter.into(), directive.into());
        self
    }

    /// Appends tags, skipping ones the service already carries.
    pub fn add_tag<I, S>(&mut self, id: &str, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = self.entry(id);
        for tag in tags {
            let tag = tag.into();
            if !def.tags.contains(&tag) {
                def.tags.push(tag);
            }
        }
        self
    }

    /// Registers `id` as the implementation of `interface`.
    pub fn implements(&mut self, id: &str, interface: impl Into<String>) -> &mut Self {
        let interface = interface.into();
        let def = self.entry(id);
        if !def.implements.contains(&interface) {
            def.implements.push(interface.clone());
        }
        self.interfaces.insert(interface, id.to_string());
        self
    }

    /// Makes `alias` resolve to `id`; the aliased service becomes public.
    pub fn set_alias(&mut self, alias: impl Into<String>, id: &str) -> &mut Self {
        self.aliases.insert(alias.into(), id.to_string());
        if let Some(def) = self.definition_mut(id) {
            def.visibility = Some(Visibility::Global);
        }
        self
    }

    /// Declares `decorator_class` as a decorator of `id`. The current
    /// definition of `id` moves to `inner_id` (`<id>.inner` by default) during
    /// normalization.
    pub fn decorate(&mut self, id: &str, decorator_class: impl Into<String>, inner_id: Option<&str>) -> &mut Self {
        let decorator_id = format!("{}.decorator.{}", id, self.entries.len());
        let def = self.entry(&decorator_id);
        def.class = Some(decorator_class.into());
        def.decorate = Some(id.to_string());
        def.decoration_inner = inner_id.map(str::to_string);
        self
    }

    // ----- Parameters -----

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    // ----- Aliases and tags -----

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    pub fn interfaces(&self) -> &HashMap<String, String> {
        &self.interfaces
    }

    /// Follows the alias table, then the interface map, until a name maps
    /// to nothing further. Returns the name itself when unaliased.
    pub fn resolve_id<'a>(&'a self, name: &'a str) -> &'a str {
        resolve_alias(&self.aliases, &self.interfaces, name)
    }

    /// Ids tagged with `tag`, in registration order.
    pub fn find_tagged_service_ids(&self, tag: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, def)| def.tags.iter().any(|t| t == tag))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Tag index: tag name to ids in registration order.
    pub fn tag_index(&self) -> BTreeMap<String, Vec<String>> {
        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, def) in &self.entries {
            for tag in &def.tags {
                index.entry(tag.clone()).or_default().push(id.clone());
            }
        }
        index
    }

    // ----- Normalization -----

    /// Merges `extends` chains, registers declared aliases and interfaces,
    /// and rewrites decorators. Running it again on its own output is a no-op.
    pub fn normalize(&mut self) -> DiResult<()> {
        self.merge_extends()?;
        self.rewrite_decorators()?;
        self.register_declared_names();
        debug!(services = self.entries.len(), aliases = self.aliases.len(), "registry normalized");
        Ok(())
    }

    fn merge_extends(&mut self) -> DiResult<()> {
        let mut merged: HashMap<String, ServiceDefinition> = HashMap::new();
        for (id, _) in &self.entries {
            let mut chain = Vec::new();
            self.merge_one(id, &mut chain, &mut merged)?;
        }
        for (id, def) in self.entries.iter_mut() {
            if let Some(resolved) = merged.remove(id.as_str()) {
                *def = resolved;
            }
        }
        Ok(())
    }

    fn merge_one(
        &self,
        id: &str,
        chain: &mut Vec<String>,
        merged: &mut HashMap<String, ServiceDefinition>,
    ) -> DiResult<ServiceDefinition> {
        if let Some(done) = merged.get(id) {
            return Ok(done.clone());
        }
        if chain.iter().any(|c| c == id) {
            chain.push(id.to_string());
            return Err(DiError::invalid(
                id,
                format!("extends chain is cyclic: {}", chain.join(" -> ")),
            ));
        }
        let own = match self.definition(id) {
            Some(def) => def.clone(),
            None => {
                let child = chain.last().cloned().unwrap_or_default();
                return Err(DiError::UnknownParent {
                    id: child,
                    parent: id.to_string(),
                });
            }
        };
        let resolved = match own.extends.as_deref() {
            Some(parent) => {
                chain.push(id.to_string());
                let parent_def = self.merge_one(parent, chain, merged)?;
                chain.pop();
                own.merged_over(&parent_def)
            }
            None => own,
        };
        merged.insert(id.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn rewrite_decorators(&mut self) -> DiResult<()> {
        let decorators: Vec<(String, String, Option<String>)> = self
            .entries
            .iter()
            .filter_map(|(id, def)| {
                def.decorate
                    .clone()
                    .map(|target| (id.clone(), target, def.decoration_inner.clone()))
            })
            .collect();

        for (decorator_id, target, inner) in decorators {
            let target = self.resolve_id(&target).to_string();
            let Some(&target_pos) = self.index.get(&target) else {
                return Err(DiError::invalid(
                    decorator_id,
                    format!("decorates unknown service '{}'", target),
                ));
            };
            let inner_id = match inner {
                Some(explicit) if self.index.contains_key(&explicit) => {
                    return Err(DiError::invalid(
                        decorator_id,
                        format!("inner id '{}' is already defined", explicit),
                    ));
                }
                Some(explicit) => explicit,
                None => self.free_inner_id(&target),
            };

            let Some(decorator_pos) = self.index.get(&decorator_id).copied() else {
                continue;
            };
            let mut decorator = self.entries[decorator_pos].1.clone();
            decorator.decorate = None;
            decorator.decoration_inner = None;
            decorator.arguments = vec![Value::String(format!("@{}", inner_id))];
            decorator.autowire = Some(false);
            decorator.annotwire = Some(false);

            let mut inner_def = std::mem::take(&mut self.entries[target_pos].1);
            // identity (alias, tags, visibility) stays with the public id
            if decorator.alias.is_none() {
                decorator.alias = inner_def.alias.take();
            }
            if decorator.tags.is_empty() {
                decorator.tags = std::mem::take(&mut inner_def.tags);
            }
            if decorator.implements.is_empty() {
                decorator.implements = std::mem::take(&mut inner_def.implements);
            }
            if decorator.visibility.is_none() {
                decorator.visibility = inner_def.visibility;
            }
            inner_def.alias = None;
            inner_def.visibility = Some(Visibility::Private);
            self.entries[target_pos].1 = decorator;

            self.remove(&decorator_id);
            self.define(inner_id.clone(), inner_def);
            debug!(service = %target, inner = %inner_id, "decorator installed");
        }
        Ok(())
    }

    fn free_inner_id(&self, target: &str) -> String {
        let base = format!("{}.inner", target);
        if !self.index.contains_key(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}.{}", base, n))
            .find(|candidate| !self.index.contains_key(candidate))
            .unwrap_or(base)
    }

    /// Drops the definition of `id`, shifting later entries up.
    pub fn remove(&mut self, id: &str) -> Option<ServiceDefinition> {
        let pos = self.index.remove(id)?;
        let (_, removed) = self.entries.remove(pos);
        for (i, (entry_id, _)) in self.entries.iter().enumerate().skip(pos) {
            self.index.insert(entry_id.clone(), i);
        }
        Some(removed)
    }

    fn register_declared_names(&mut self) {
        let mut public = Vec::new();
        for (id, def) in &self.entries {
            if let Some(alias) = &def.alias {
                self.aliases.insert(alias.clone(), id.clone());
                public.push(id.clone());
            }
            for interface in &def.implements {
                self.interfaces
                    .entry(interface.clone())
                    .or_insert_with(|| id.clone());
            }
        }
        for id in public {
            if let Some(def) = self.definition_mut(&id) {
                def.visibility = Some(Visibility::Global);
            }
        }
    }

    /// Effective wiring mode of a definition under the container default.
    pub(crate) fn wiring_of(def: &ServiceDefinition, default: WiringMode) -> WiringMode {
        match (def.autowire, def.annotwire) {
            (Some(true), _) => WiringMode::Autowire,
            (_, Some(true)) => WiringMode::Annotwire,
            (Some(false), Some(false)) => WiringMode::Explicit,
            _ => default,
        }
    }

    /// Guards against names that would alias into a loop.
    pub(crate) fn check_aliases(&self) -> DiResult<()> {
        for alias in self.aliases.keys() {
            let mut seen = HashSet::new();
            let mut current = alias.as_str();
            while let Some(next) = self.aliases.get(current) {
                if !seen.insert(current) {
                    return Err(DiError::invalid(alias.clone(), "alias chain loops"));
                }
                current = next;
            }
        }
        Ok(())
    }
}

/// Alias resolution shared by the registry and the built container.
pub(crate) fn resolve_alias<'a>(
    aliases: &'a HashMap<String, String>,
    interfaces: &'a HashMap<String, String>,
    name: &'a str,
) -> &'a str {
    let mut current = name;
    // bounded: a looping alias table is rejected at build, this only caps the walk
    for _ in 0..=aliases.len() + interfaces.len() {
        match aliases.get(current).or_else(|| interfaces.get(current)) {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }
    current
}
