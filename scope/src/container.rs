//! The main `Container` handle and its associated methods.

use crate::error::{Error, Result};
use crate::key::Key;
use crate::node::Node;
use crate::registry::{Entry, Registry};
use crate::scope::Scopes;
use crate::sink::{ErrorSink, TracingSink};
use crate::unscoped::Unscoped;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A scoped object container.
///
/// A `Container` lives in one scope of the registry's hierarchy. It may have
/// a parent in a wider scope and children in narrower scopes. Objects are
/// built lazily from their definition the first time they are requested and
/// cached in the container matching the definition's scope, so every later
/// request made through that container (or one of its descendants) returns
/// the same instance.
///
/// `Container` is a cheap handle: clones refer to the same container.
#[derive(Clone)]
pub struct Container {
  node: Arc<Node>,
}

impl Container {
  /// Creates a root container in the widest scope. Retrieval errors from
  /// [`get`](Self::get) are logged through `tracing`.
  pub fn new(registry: Registry) -> Self {
    Self::with_error_sink(registry, TracingSink)
  }

  /// Creates a root container reporting the errors swallowed by
  /// [`get`](Self::get) to `sink`. Every sub-container shares the sink.
  pub fn with_error_sink(registry: Registry, sink: impl ErrorSink + 'static) -> Self {
    Self {
      node: Node::root(registry, Arc::new(sink)),
    }
  }

  /// Name of the container scope.
  pub fn scope(&self) -> &str {
    self.node.scope_name()
  }

  /// The full scope hierarchy.
  pub fn scopes(&self) -> &Scopes {
    self.node.registry.scopes()
  }

  /// Scopes wider than this container's, widest first.
  pub fn parent_scopes(&self) -> Vec<String> {
    self.scopes().wider_than(self.node.scope)
  }

  /// Scopes narrower than this container's, widest first.
  pub fn sub_scopes(&self) -> Vec<String> {
    self.scopes().narrower_than(self.node.scope)
  }

  pub fn registry(&self) -> &Registry {
    &self.node.registry
  }

  /// The container this one was created from. `None` for the root, or if
  /// the parent no longer exists.
  pub fn parent(&self) -> Option<Container> {
    self.node.parent().map(|node| Container { node })
  }

  /// Number of live sub-containers.
  pub fn children_count(&self) -> usize {
    self.node.children_count()
  }

  /// `true` once the container has been deleted.
  pub fn is_closed(&self) -> bool {
    self.node.is_closed()
  }

  /// Creates a container in the next narrower scope, with this container as
  /// its parent.
  ///
  /// Fails with [`Error::Scope`] if this container is already in the
  /// narrowest scope and with [`Error::Closed`] if it has been deleted.
  pub fn sub_container(&self) -> Result<Container> {
    let node = self.node.create_child(false)?;
    Ok(Container { node })
  }

  // --- Resolution ---

  /// Retrieves an object, building it if needed.
  ///
  /// The object must belong to this container's scope or a wider one.
  /// Objects of a wider scope are built and cached in the matching ancestor.
  pub fn try_get<T: ?Sized + Any + Send + Sync>(&self, key: &Key<T>) -> Result<Arc<T>> {
    let entry = self.typed_entry(key)?;
    let instance = self.node.resolve(key.name(), entry)?;
    instance
      .downcast_ref::<Arc<T>>()
      .cloned()
      .ok_or_else(|| Error::not_found::<T>(key.name()))
  }

  /// Like [`try_get`](Self::try_get), but reports the error to the
  /// container's [`ErrorSink`] and returns `None`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, key: &Key<T>) -> Option<Arc<T>> {
    self.report(self.try_get(key))
  }

  /// Retrieves an object even if it belongs to a narrower scope.
  ///
  /// For a narrower object, throwaway sub-containers are created down to the
  /// object's scope and the object is built there. The returned
  /// [`Unscoped`] keeps them alive until [`Unscoped::release`] or
  /// [`clean`](Self::clean) is called.
  pub fn try_get_unscoped<T: ?Sized + Any + Send + Sync>(&self, key: &Key<T>) -> Result<Unscoped<T>> {
    let entry = self.typed_entry(key)?;
    if entry.scope <= self.node.scope {
      return self.try_get(key).map(|value| Unscoped::new(value, None));
    }

    let throwaway = Container {
      node: self.node.create_child(true)?,
    };
    match throwaway.descend_and_get(key, entry.scope) {
      Ok(value) => Ok(Unscoped::new(value, Some(throwaway))),
      Err(err) => {
        throwaway.delete_with_sub_containers();
        Err(err)
      }
    }
  }

  /// Like [`try_get_unscoped`](Self::try_get_unscoped), but reports the error
  /// to the container's [`ErrorSink`].
  pub fn get_unscoped<T: ?Sized + Any + Send + Sync>(&self, key: &Key<T>) -> Option<Unscoped<T>> {
    self.report(self.try_get_unscoped(key))
  }

  fn descend_and_get<T: ?Sized + Any + Send + Sync>(&self, key: &Key<T>, scope: usize) -> Result<Arc<T>> {
    let mut leaf = self.clone();
    while leaf.node.scope < scope {
      leaf = leaf.sub_container()?;
    }
    leaf.try_get(key)
  }

  fn typed_entry<T: ?Sized + Any>(&self, key: &Key<T>) -> Result<&Entry> {
    self
      .node
      .registry
      .entry(key.name())
      .filter(|entry| entry.def.type_id == TypeId::of::<T>())
      .ok_or_else(|| Error::not_found::<T>(key.name()))
  }

  fn report<V>(&self, result: Result<V>) -> Option<V> {
    match result {
      Ok(value) => Some(value),
      Err(err) => {
        self.node.sink.report(&err);
        None
      }
    }
  }

  // --- Teardown ---

  /// Deletes the container, closing its objects in reverse build order.
  ///
  /// If the container still has sub-containers, nothing happens right away:
  /// the deletion runs automatically once the last sub-container is deleted.
  pub fn delete(&self) {
    self.node.delete();
  }

  /// Deletes the container and its whole subtree immediately. The objects of
  /// the sub-containers are closed before the objects of this container.
  pub fn delete_with_sub_containers(&self) {
    self.node.delete_with_sub_containers();
  }

  /// Deletes the sub-containers created by unscoped retrievals on this
  /// container.
  pub fn clean(&self) {
    self.node.clean();
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("id", &self.node.id)
      .field("scope", &self.scope())
      .field("closed", &self.is_closed())
      .field("children", &self.children_count())
      .finish()
  }
}
