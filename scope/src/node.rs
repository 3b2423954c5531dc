//! One level of the container tree and the resolution engine running on it.

use crate::core::{BuildSlot, ResolutionGuard};
use crate::definition::{Dependencies, Instance};
use crate::error::{Error, Result};
use crate::registry::{Entry, Registry};
use crate::sink::ErrorSink;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
pub(crate) struct NodeState {
  /// Shared objects, by name.
  cache: HashMap<String, Instance>,
  /// Objects to close with this node, in build order: every shared object
  /// and the unshared ones that have a close function.
  built: Vec<(String, Instance)>,
  /// Builds currently in flight.
  pending: HashMap<String, Arc<BuildSlot>>,
  /// Live children, keyed by id. Ids grow with creation time.
  children: BTreeMap<u64, Arc<Node>>,
  /// Children created by unscoped retrievals.
  throwaway: BTreeSet<u64>,
  /// `delete` was called while children were still alive.
  delete_requested: bool,
  /// Builds running in this node, plus a running teardown.
  in_flight: usize,
  /// The node is closed but its objects wait for `in_flight` to drop to zero.
  close_deferred: bool,
  closed: bool,
}

pub(crate) struct Node {
  pub(crate) id: u64,
  pub(crate) scope: usize,
  pub(crate) registry: Registry,
  pub(crate) sink: Arc<dyn ErrorSink>,
  pub(crate) parent: Option<Weak<Node>>,
  pub(crate) state: Mutex<NodeState>,
}

impl Node {
  pub(crate) fn root(registry: Registry, sink: Arc<dyn ErrorSink>) -> Arc<Self> {
    Arc::new(Self {
      id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
      scope: 0,
      registry,
      sink,
      parent: None,
      state: Mutex::new(NodeState::default()),
    })
  }

  pub(crate) fn scope_name(&self) -> &str {
    self.registry.scopes().name(self.scope).unwrap_or_default()
  }

  pub(crate) fn closed_error(&self) -> Error {
    Error::closed(self.scope_name())
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  pub(crate) fn children_count(&self) -> usize {
    self.state.lock().children.len()
  }

  pub(crate) fn parent(&self) -> Option<Arc<Node>> {
    self.parent.as_ref().and_then(Weak::upgrade)
  }

  /// Creates a node in the next narrower scope and registers it as a child.
  pub(crate) fn create_child(self: &Arc<Self>, throwaway: bool) -> Result<Arc<Node>> {
    let mut state = self.state.lock();
    if state.closed {
      return Err(self.closed_error());
    }

    let next = self.scope + 1;
    if next >= self.registry.scopes().len() {
      return Err(Error::Scope(format!(
        "there is no scope narrower than '{}'",
        self.scope_name()
      )));
    }

    let child = Arc::new(Node {
      id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
      scope: next,
      registry: self.registry.clone(),
      sink: self.sink.clone(),
      parent: Some(Arc::downgrade(self)),
      state: Mutex::new(NodeState::default()),
    });
    state.children.insert(child.id, child.clone());
    if throwaway {
      state.throwaway.insert(child.id);
    }
    debug!(
      parent_id = self.id,
      child_id = child.id,
      scope = %child.scope_name(),
      "created sub-container"
    );
    Ok(child)
  }

  /// Resolves `name` from this node, walking up to the node owning the
  /// definition's scope.
  pub(crate) fn resolve(self: &Arc<Self>, name: &str, entry: &Entry) -> Result<Instance> {
    if self.is_closed() {
      return Err(self.closed_error());
    }
    if entry.scope > self.scope {
      return Err(Error::Scope(format!(
        "'{}' belongs to the scope '{}' which is narrower than the container scope '{}'",
        name,
        entry.def.scope,
        self.scope_name()
      )));
    }

    let owner = self.ancestor(entry.scope)?;
    owner.obtain(name, entry)
  }

  fn ancestor(self: &Arc<Self>, scope: usize) -> Result<Arc<Node>> {
    let mut current = self.clone();
    while current.scope > scope {
      let parent = match &current.parent {
        Some(weak) => weak.upgrade().ok_or_else(|| current.closed_error())?,
        None => {
          return Err(Error::Scope(format!(
            "no container in scope '{}' above '{}'",
            self.registry.scopes().name(scope).unwrap_or_default(),
            current.scope_name()
          )))
        }
      };
      current = parent;
    }
    Ok(current)
  }

  /// Returns the cached object or builds it in this node.
  fn obtain(self: &Arc<Self>, name: &str, entry: &Entry) -> Result<Instance> {
    let _guard = ResolutionGuard::enter(self.id, name)?;

    if !entry.def.shared {
      let _in_flight = InFlight::enter(self)?;
      let instance = self.build(name, entry)?;
      return self.store(name, entry, instance);
    }

    let (slot, _in_flight) = {
      let mut state = self.state.lock();
      if state.closed {
        return Err(self.closed_error());
      }
      if let Some(instance) = state.cache.get(name) {
        trace!(node_id = self.id, object = %name, "cache hit");
        return Ok(instance.clone());
      }
      let in_flight = state.pending.get(name).cloned();
      if let Some(slot) = in_flight {
        drop(state);
        trace!(node_id = self.id, object = %name, "waiting for build in progress");
        return slot.wait();
      }
      let slot = Arc::new(BuildSlot::new());
      state.pending.insert(name.to_owned(), slot.clone());
      state.in_flight += 1;
      (slot, InFlight { node: self })
    };

    trace!(node_id = self.id, object = %name, "building");
    let claim = Claim {
      node: self,
      name,
      slot: &slot,
    };
    let result = self
      .build(name, entry)
      .and_then(|instance| self.store(name, entry, instance));
    if result.is_err() {
      self.state.lock().pending.remove(name);
    }
    slot.complete(result.clone());
    drop(claim);
    result
  }

  fn build(self: &Arc<Self>, name: &str, entry: &Entry) -> Result<Instance> {
    let mut resolved = HashMap::with_capacity(entry.def.dependencies.len());
    for dep in &entry.def.dependencies {
      let dep_entry = self
        .registry
        .entry(dep)
        .ok_or_else(|| Error::NotFound {
          name: dep.clone(),
          type_name: "<unregistered>",
        })?;
      let instance = self.resolve(dep, dep_entry)?;
      resolved.insert(dep.clone(), instance);
    }

    let deps = Dependencies::new(name, resolved);
    (entry.def.build)(&deps).map_err(|err| Error::build(name, err))
  }

  /// Records a freshly built object. If the node was deleted while the build
  /// ran, the object is only queued for the deferred close pass.
  fn store(&self, name: &str, entry: &Entry, instance: Instance) -> Result<Instance> {
    let mut state = self.state.lock();
    if entry.def.shared {
      state.pending.remove(name);
    }
    if entry.def.shared || entry.def.close.is_some() {
      state.built.push((name.to_owned(), instance.clone()));
    }
    if state.closed {
      warn!(node_id = self.id, object = %name, "container closed during build, the new object is closed with it");
      return Err(self.closed_error());
    }
    if entry.def.shared {
      state.cache.insert(name.to_owned(), instance.clone());
    }
    Ok(instance)
  }

  /// Closes this node once it has no live children. Otherwise the deletion
  /// is deferred until the last child is deleted.
  pub(crate) fn delete(self: &Arc<Self>) {
    let _teardown = {
      let mut state = self.state.lock();
      if state.closed {
        return;
      }
      if !state.children.is_empty() {
        state.delete_requested = true;
        debug!(
          node_id = self.id,
          children = state.children.len(),
          "deletion deferred until sub-containers are deleted"
        );
        return;
      }
      self.begin_close(&mut state)
    };
  }

  /// Closes the whole subtree, children first, without waiting.
  pub(crate) fn delete_with_sub_containers(self: &Arc<Self>) {
    let (children, teardown) = {
      let mut state = self.state.lock();
      if state.closed {
        return;
      }
      state.throwaway.clear();
      let children = std::mem::take(&mut state.children);
      (children, self.begin_close(&mut state))
    };

    for child in children.into_values().rev() {
      child.delete_with_sub_containers();
    }
    drop(teardown);
  }

  /// Marks the node closed. Its objects are closed when the returned hold
  /// and every build still running in the node are gone.
  fn begin_close<'a>(self: &'a Arc<Self>, state: &mut NodeState) -> InFlight<'a> {
    state.closed = true;
    state.close_deferred = true;
    state.cache.clear();
    state.in_flight += 1;
    if state.in_flight > 1 {
      debug!(
        node_id = self.id,
        builds = state.in_flight - 1,
        "closing deferred until builds in progress finish"
      );
    }
    InFlight { node: self }
  }

  /// Deletes the children created by unscoped retrievals.
  pub(crate) fn clean(self: &Arc<Self>) {
    let children: Vec<Arc<Node>> = {
      let mut state = self.state.lock();
      let ids = std::mem::take(&mut state.throwaway);
      ids
        .iter()
        .filter_map(|id| state.children.get(id).cloned())
        .collect()
    };
    for child in children {
      child.delete_with_sub_containers();
    }
  }

  fn close_objects(&self, built: Vec<(String, Instance)>) {
    debug!(node_id = self.id, objects = built.len(), "closing container");
    for (name, instance) in built.into_iter().rev() {
      let Some(entry) = self.registry.entry(&name) else {
        continue;
      };
      trace!(node_id = self.id, object = %name, "closing object");
      let closed = panic::catch_unwind(AssertUnwindSafe(|| entry.def.close_instance(&instance)));
      if closed.is_err() {
        warn!(node_id = self.id, object = %name, "close function panicked");
        self.sink.report(&Error::ClosePanicked { name });
      }
    }
  }

  /// Removes this node from its parent, finishing a deferred parent
  /// deletion if this was its last child.
  fn detach(&self) {
    let Some(parent) = self.parent() else {
      return;
    };

    let finish_parent = {
      let mut state = parent.state.lock();
      state.children.remove(&self.id);
      state.throwaway.remove(&self.id);
      state.delete_requested && !state.closed && state.children.is_empty()
    };

    if finish_parent {
      debug!(node_id = parent.id, "last sub-container deleted, running deferred deletion");
      parent.delete();
    }
  }
}

/// Counts a build (or a teardown) running in a node. The last one to finish
/// runs the node's deferred close pass.
struct InFlight<'a> {
  node: &'a Node,
}

impl<'a> InFlight<'a> {
  fn enter(node: &'a Node) -> Result<Self> {
    let mut state = node.state.lock();
    if state.closed {
      return Err(node.closed_error());
    }
    state.in_flight += 1;
    Ok(Self { node })
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    let built = {
      let mut state = self.node.state.lock();
      state.in_flight -= 1;
      if state.in_flight > 0 || !state.close_deferred {
        return;
      }
      state.close_deferred = false;
      std::mem::take(&mut state.built)
    };

    self.node.close_objects(built);
    self.node.detach();
  }
}

/// Releases a build claim if the build function unwinds, so that waiters
/// are not parked forever.
struct Claim<'a> {
  node: &'a Node,
  name: &'a str,
  slot: &'a BuildSlot,
}

impl Drop for Claim<'_> {
  fn drop(&mut self) {
    if self.slot.is_done() {
      return;
    }
    self.node.state.lock().pending.remove(self.name);
    self.slot.complete(Err(Error::BuildPanicked {
      name: self.name.to_owned(),
    }));
  }
}
