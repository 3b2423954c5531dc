//! Core, non-public machinery shared by every container node.

use crate::definition::Instance;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::thread::{self, Thread};

thread_local! {
  // The builds currently in progress on this thread, outermost first.
  // A (node, name) pair showing up twice means the definition graph loops
  // back on itself.
  static RESOLVING_STACK: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// An RAII guard to detect circular dependencies.
///
/// When created, it pushes the (node, name) pair on the thread-local
/// resolution stack and fails with `Error::Cycle` if the pair is already
/// there. When dropped, it pops the pair again.
pub(crate) struct ResolutionGuard {
  node: u64,
}

impl ResolutionGuard {
  pub(crate) fn enter(node: u64, name: &str) -> Result<Self> {
    RESOLVING_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();
      if let Some(start) = stack.iter().position(|(n, s)| *n == node && s == name) {
        let mut path: Vec<String> = stack[start..].iter().map(|(_, s)| s.clone()).collect();
        path.push(name.to_owned());
        return Err(Error::Cycle { path });
      }
      stack.push((node, name.to_owned()));
      Ok(Self { node })
    })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();
      // Guards are strictly nested, so ours is on top.
      if let Some((node, _)) = stack.last() {
        if *node == self.node {
          stack.pop();
        }
      }
    });
  }
}

enum State {
  Building,
  Done(Result<Instance>),
}

struct Inner {
  state: State,
  waiters: VecDeque<Thread>,
}

/// A claim on building one name in one node.
///
/// The first caller to miss the cache becomes the leader: it inserts a slot
/// in the node's pending map, runs the build without holding the node lock
/// and completes the slot. Every other caller for the same name parks on the
/// slot and receives the leader's result.
pub(crate) struct BuildSlot {
  inner: Mutex<Inner>,
}

impl BuildSlot {
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Building,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Stores the outcome of the build and wakes all waiters. Only the first
  /// completion is kept.
  pub(crate) fn complete(&self, result: Result<Instance>) {
    let mut inner = self.inner.lock();
    if let State::Done(_) = inner.state {
      return;
    }
    inner.state = State::Done(result);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  pub(crate) fn is_done(&self) -> bool {
    matches!(self.inner.lock().state, State::Done(_))
  }

  /// Blocks the current thread until the leader completes the slot.
  pub(crate) fn wait(&self) -> Result<Instance> {
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        State::Done(result) => return result.clone(),
        State::Building => {
          inner.waiters.push_back(thread::current());
          drop(inner); // Unlock before parking.
          thread::park();
          inner = self.inner.lock();
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  #[test]
  fn nested_guards_detect_a_repeated_name_on_the_same_node() {
    let _a = ResolutionGuard::enter(1, "a").unwrap();
    let _b = ResolutionGuard::enter(1, "b").unwrap();

    match ResolutionGuard::enter(1, "a") {
      Err(Error::Cycle { path }) => assert_eq!(path, vec!["a", "b", "a"]),
      _ => panic!("expected a cycle"),
    }

    // The same name on another node is a different object.
    assert!(ResolutionGuard::enter(2, "a").is_ok());
  }

  #[test]
  fn guard_is_released_on_drop() {
    {
      let _a = ResolutionGuard::enter(7, "a").unwrap();
    }
    assert!(ResolutionGuard::enter(7, "a").is_ok());
  }

  #[test]
  fn waiters_receive_the_leaders_result() {
    let slot = Arc::new(BuildSlot::new());

    let handles: Vec<_> = (0..4)
      .map(|_| {
        let slot = slot.clone();
        thread::spawn(move || slot.wait())
      })
      .collect();

    thread::sleep(Duration::from_millis(20));
    assert!(!slot.is_done());
    slot.complete(Ok(Arc::new(Arc::new(42u32)) as Instance));

    for handle in handles {
      let instance = handle.join().unwrap().unwrap();
      assert_eq!(**instance.downcast_ref::<Arc<u32>>().unwrap(), 42);
    }
  }

  #[test]
  fn only_the_first_completion_is_kept() {
    let slot = BuildSlot::new();
    slot.complete(Err(Error::BuildPanicked { name: "x".into() }));
    slot.complete(Ok(Arc::new(Arc::new(1u8)) as Instance));
    assert!(matches!(slot.wait(), Err(Error::BuildPanicked { .. })));
  }
}
