//! Where `Container::get` sends the errors it does not return.

use crate::error::Error;

/// Receives the errors swallowed by the `Option`-returning accessors.
///
/// A sink is handed to the root container at construction and shared by every
/// container created below it. Closures can be used directly:
///
/// ```
/// use fibre_scope::{Container, Error, Registry, Scopes};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = seen.clone();
/// let registry = Registry::builder(Scopes::default()).build().unwrap();
/// let app = Container::with_error_sink(registry, move |err: &Error| {
///   log.lock().unwrap().push(err.to_string());
/// });
///
/// assert!(app.get(&fibre_scope::Key::<u32>::new("missing")).is_none());
/// assert_eq!(seen.lock().unwrap().len(), 1);
/// ```
pub trait ErrorSink: Send + Sync {
  fn report(&self, error: &Error);
}

/// The default sink: logs every error through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
  fn report(&self, error: &Error) {
    tracing::error!(error = %error, "could not retrieve object from container");
  }
}

impl<F> ErrorSink for F
where
  F: Fn(&Error) + Send + Sync,
{
  fn report(&self, error: &Error) {
    self(error)
  }
}
