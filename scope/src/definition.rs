//! Declarative recipes describing how a named object is built and closed.

use crate::error::{BoxError, Error, Result};
use crate::key::Key;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased built object. The concrete content is always an `Arc<T>`,
/// which lets unsized types such as trait objects be stored as well.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

type BuildFn = Box<dyn Fn(&Dependencies) -> Result<Instance, BoxError> + Send + Sync>;
type CloseFn = Box<dyn Fn(&Instance) + Send + Sync>;

/// How to build, and optionally close, one named object.
///
/// Definitions are created with [`Definition::builder`] and handed to a
/// [`RegistryBuilder`](crate::RegistryBuilder).
pub struct Definition {
  pub(crate) name: String,
  pub(crate) scope: String,
  pub(crate) type_id: TypeId,
  pub(crate) type_name: &'static str,
  pub(crate) dependencies: Vec<String>,
  pub(crate) shared: bool,
  pub(crate) build: BuildFn,
  pub(crate) close: Option<CloseFn>,
}

impl Definition {
  /// Starts a definition for `key`, living in `scope`.
  pub fn builder<T: ?Sized + Any + Send + Sync>(key: &Key<T>, scope: &str) -> DefinitionBuilder<T> {
    DefinitionBuilder {
      key: key.clone(),
      scope: scope.to_owned(),
      dependencies: Vec::new(),
      shared: true,
      build: None,
      close: None,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn scope(&self) -> &str {
    &self.scope
  }

  /// Names of the declared dependencies, in declaration order.
  pub fn dependencies(&self) -> &[String] {
    &self.dependencies
  }

  /// `false` for definitions built anew on every retrieval.
  pub fn is_shared(&self) -> bool {
    self.shared
  }

  pub(crate) fn close_instance(&self, instance: &Instance) {
    if let Some(close) = &self.close {
      close(instance);
    }
  }
}

impl fmt::Debug for Definition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Definition")
      .field("name", &self.name)
      .field("scope", &self.scope)
      .field("type", &self.type_name)
      .field("dependencies", &self.dependencies)
      .field("shared", &self.shared)
      .field("has_close", &self.close.is_some())
      .finish()
  }
}

/// A builder for [`Definition`].
pub struct DefinitionBuilder<T: ?Sized> {
  key: Key<T>,
  scope: String,
  dependencies: Vec<String>,
  shared: bool,
  build: Option<BuildFn>,
  close: Option<CloseFn>,
}

impl<T: ?Sized + Any + Send + Sync> DefinitionBuilder<T> {
  /// Declares a dependency. Declared dependencies are resolved before the
  /// build function runs and handed to it through [`Dependencies`].
  pub fn depends_on<U: ?Sized>(mut self, key: &Key<U>) -> Self {
    self.dependencies.push(key.name().to_owned());
    self
  }

  /// Builds a new object on every retrieval instead of caching one per
  /// container. Each object is still closed when its container is deleted.
  pub fn unshared(mut self) -> Self {
    self.shared = false;
    self
  }

  /// Sets the function producing an already shared handle. Use this to
  /// register trait objects.
  pub fn build_shared<F, E>(mut self, f: F) -> Self
  where
    F: Fn(&Dependencies) -> Result<Arc<T>, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.build = Some(Box::new(move |deps: &Dependencies| {
      f(deps)
        .map(|obj| Arc::new(obj) as Instance)
        .map_err(Into::into)
    }));
    self
  }

  /// Sets the function called when the owning container is deleted.
  pub fn close(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
    self.close = Some(Box::new(move |instance: &Instance| {
      if let Some(obj) = instance.downcast_ref::<Arc<T>>() {
        f(&**obj);
      }
    }));
    self
  }

  /// Finishes the definition. Fails if no build function was given.
  pub fn finish(self) -> Result<Definition> {
    let build = self.build.ok_or_else(|| {
      Error::Config(format!("definition '{}' has no build function", self.key.name()))
    })?;
    Ok(Definition {
      name: self.key.name().to_owned(),
      scope: self.scope,
      type_id: self.key.value_type_id(),
      type_name: std::any::type_name::<T>(),
      dependencies: self.dependencies,
      shared: self.shared,
      build,
      close: self.close,
    })
  }
}

impl<T: Any + Send + Sync> DefinitionBuilder<T> {
  /// Sets the function producing the object.
  pub fn build<F, E>(self, f: F) -> Self
  where
    F: Fn(&Dependencies) -> Result<T, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.build_shared(move |deps| f(deps).map(Arc::new))
  }
}

/// The resolved dependencies handed to a build function.
pub struct Dependencies {
  name: String,
  resolved: HashMap<String, Instance>,
}

impl Dependencies {
  pub(crate) fn new(name: &str, resolved: HashMap<String, Instance>) -> Self {
    Self {
      name: name.to_owned(),
      resolved,
    }
  }

  /// Name of the object being built.
  pub fn building(&self) -> &str {
    &self.name
  }

  /// Returns a dependency declared with `depends_on`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, key: &Key<T>) -> Result<Arc<T>> {
    self
      .resolved
      .get(key.name())
      .and_then(|instance| instance.downcast_ref::<Arc<T>>())
      .cloned()
      .ok_or_else(|| Error::not_found::<T>(key.name()))
  }

  pub fn len(&self) -> usize {
    self.resolved.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resolved.is_empty()
  }
}
