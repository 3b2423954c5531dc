//! The immutable set of definitions a container tree builds objects from.

use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::scope::Scopes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) struct Entry {
  pub(crate) def: Definition,
  /// Index of the definition's scope in the hierarchy.
  pub(crate) scope: usize,
}

/// Collects definitions and checks them before any container exists.
#[derive(Default)]
pub struct RegistryBuilder {
  scopes: Scopes,
  entries: HashMap<String, Entry>,
  order: Vec<String>,
}

impl RegistryBuilder {
  pub fn new(scopes: Scopes) -> Self {
    Self {
      scopes,
      entries: HashMap::new(),
      order: Vec::new(),
    }
  }

  /// Adds a definition.
  ///
  /// Fails if the name is already taken, if the scope is unknown, or if a
  /// dependency registered so far lives in a narrower scope than the
  /// definition itself. Dependencies registered later are checked by
  /// [`validate`](Self::validate).
  pub fn register(&mut self, def: Definition) -> Result<()> {
    if self.entries.contains_key(&def.name) {
      return Err(Error::Config(format!("definition '{}' is already registered", def.name)));
    }

    let scope = self.scopes.index_of(&def.scope).ok_or_else(|| {
      Error::Config(format!(
        "definition '{}' uses unknown scope '{}' (available: {:?})",
        def.name, def.scope, self.scopes
      ))
    })?;

    for dep in &def.dependencies {
      if let Some(dep_entry) = self.entries.get(dep) {
        check_scope_order(&def.name, scope, dep, dep_entry, &self.scopes)?;
      }
    }

    // Earlier definitions that named this one as a dependency.
    for entry in self.entries.values() {
      if entry.def.dependencies.iter().any(|d| d == &def.name) && scope > entry.scope {
        return Err(narrower_dependency(&entry.def.name, &entry.def.scope, &def.name, &def.scope));
      }
    }

    self.order.push(def.name.clone());
    self.entries.insert(def.name.clone(), Entry { def, scope });
    Ok(())
  }

  /// Chained form of [`register`](Self::register).
  pub fn with(mut self, def: Definition) -> Result<Self> {
    self.register(def)?;
    Ok(self)
  }

  /// Checks the whole definition graph: every dependency exists, no
  /// dependency is narrower than its dependent and there is no cycle.
  pub fn validate(&self) -> Result<()> {
    for name in &self.order {
      let entry = &self.entries[name];
      for dep in &entry.def.dependencies {
        let dep_entry = self.entries.get(dep).ok_or_else(|| {
          Error::Config(format!("definition '{}' depends on unknown definition '{}'", name, dep))
        })?;
        check_scope_order(name, entry.scope, dep, dep_entry, &self.scopes)?;
      }
    }

    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.entries.len());
    let mut path = Vec::new();
    for name in &self.order {
      self.visit(name, &mut marks, &mut path)?;
    }
    Ok(())
  }

  fn visit<'a>(
    &'a self,
    name: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
  ) -> Result<()> {
    match marks.get(name) {
      Some(Mark::Done) => return Ok(()),
      Some(Mark::Visiting) => {
        let start = path.iter().position(|n| *n == name).unwrap_or(0);
        let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_owned());
        return Err(Error::Cycle { path: cycle });
      }
      None => {}
    }

    marks.insert(name, Mark::Visiting);
    path.push(name);
    if let Some(entry) = self.entries.get(name) {
      for dep in &entry.def.dependencies {
        self.visit(dep, marks, path)?;
      }
    }
    path.pop();
    marks.insert(name, Mark::Done);
    Ok(())
  }

  /// Validates the definitions and freezes them into a [`Registry`].
  pub fn build(self) -> Result<Registry> {
    self.validate()?;
    Ok(Registry {
      inner: Arc::new(RegistryInner {
        scopes: self.scopes,
        entries: self.entries,
        order: self.order,
      }),
    })
  }
}

#[derive(Clone, Copy)]
enum Mark {
  Visiting,
  Done,
}

fn check_scope_order(name: &str, scope: usize, dep: &str, dep_entry: &Entry, scopes: &Scopes) -> Result<()> {
  if dep_entry.scope > scope {
    return Err(narrower_dependency(
      name,
      scopes.name(scope).unwrap_or_default(),
      dep,
      &dep_entry.def.scope,
    ));
  }
  Ok(())
}

fn narrower_dependency(name: &str, scope: &str, dep: &str, dep_scope: &str) -> Error {
  Error::Config(format!(
    "definition '{}' in scope '{}' cannot depend on '{}' from the narrower scope '{}'",
    name, scope, dep, dep_scope
  ))
}

struct RegistryInner {
  scopes: Scopes,
  entries: HashMap<String, Entry>,
  order: Vec<String>,
}

/// A validated, read-only set of definitions. Cheap to clone.
#[derive(Clone)]
pub struct Registry {
  inner: Arc<RegistryInner>,
}

impl Registry {
  pub fn builder(scopes: Scopes) -> RegistryBuilder {
    RegistryBuilder::new(scopes)
  }

  pub fn scopes(&self) -> &Scopes {
    &self.inner.scopes
  }

  pub fn contains(&self, name: &str) -> bool {
    self.inner.entries.contains_key(name)
  }

  pub fn definition(&self, name: &str) -> Option<&Definition> {
    self.inner.entries.get(name).map(|e| &e.def)
  }

  /// Definition names in registration order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.inner.order.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.inner.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.entries.is_empty()
  }

  pub(crate) fn entry(&self, name: &str) -> Option<&Entry> {
    self.inner.entries.get(name)
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("scopes", &self.inner.scopes)
      .field("definitions", &self.inner.order)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::key::Key;
  use crate::scope::{APP, REQUEST};
  use pretty_assertions::assert_eq;

  struct Unit;

  fn def(name: &'static str, scope: &str, deps: &[&'static str]) -> Definition {
    let mut builder = Definition::builder(&Key::<Unit>::new(name), scope);
    for dep in deps {
      builder = builder.depends_on(&Key::<Unit>::new(*dep));
    }
    builder
      .build(|_| Ok::<_, std::convert::Infallible>(Unit))
      .finish()
      .unwrap()
  }

  #[test]
  fn duplicate_name_is_a_config_error() {
    let mut builder = RegistryBuilder::default();
    builder.register(def("a", APP, &[])).unwrap();
    let err = builder.register(def("a", REQUEST, &[])).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }

  #[test]
  fn unknown_scope_is_a_config_error() {
    let mut builder = RegistryBuilder::default();
    let err = builder.register(def("a", "session", &[])).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }

  #[test]
  fn narrower_dependency_is_rejected_in_either_registration_order() {
    let mut builder = RegistryBuilder::default();
    builder.register(def("conn", REQUEST, &[])).unwrap();
    let err = builder.register(def("pool", APP, &["conn"])).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let mut builder = RegistryBuilder::default();
    builder.register(def("pool", APP, &["conn"])).unwrap();
    let err = builder.register(def("conn", REQUEST, &[])).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }

  #[test]
  fn missing_dependency_fails_validation() {
    let mut builder = RegistryBuilder::default();
    builder.register(def("a", APP, &["ghost"])).unwrap();
    assert!(matches!(builder.validate(), Err(Error::Config(_))));
  }

  #[test]
  fn cycle_is_reported_with_its_path() {
    let mut builder = RegistryBuilder::default();
    builder.register(def("a", APP, &["b"])).unwrap();
    builder.register(def("b", APP, &["a"])).unwrap();

    match builder.build() {
      Err(Error::Cycle { path }) => assert_eq!(path, vec!["a", "b", "a"]),
      other => panic!("expected a cycle error, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn self_dependency_is_a_cycle() {
    let mut builder = RegistryBuilder::default();
    builder.register(def("a", APP, &["a"])).unwrap();
    assert!(matches!(builder.validate(), Err(Error::Cycle { .. })));
  }

  #[test]
  fn built_registry_keeps_registration_order() {
    let registry = RegistryBuilder::default()
      .with(def("pool", APP, &[]))
      .unwrap()
      .with(def("conn", REQUEST, &["pool"]))
      .unwrap()
      .build()
      .unwrap();

    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["pool", "conn"]);
    assert_eq!(registry.entry("conn").map(|e| e.scope), Some(1));
    assert!(!registry.contains("ghost"));
  }
}
