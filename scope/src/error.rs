use std::sync::Arc;
use thiserror::Error;

/// A boxed error returned by user-supplied build functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for the `fibre_scope` library.
///
/// Errors are `Clone` so that a single failed build can be handed to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
  /// The scope list or the set of definitions is invalid. Raised while the
  /// registry is assembled, never by a resolution.
  #[error("Invalid configuration: {0}")]
  Config(String),

  /// No definition with this name yields the requested type.
  #[error("No definition named '{name}' producing {type_name}")]
  NotFound {
    name: String,
    type_name: &'static str,
  },

  /// The requested object cannot be reached from the current container.
  #[error("Scope error: {0}")]
  Scope(String),

  /// A definition transitively depends on itself.
  #[error("Circular dependency detected: {}", .path.join(" -> "))]
  Cycle { path: Vec<String> },

  /// The container has been deleted.
  #[error("Container in scope '{scope}' is closed")]
  Closed { scope: String },

  /// The build function of a definition failed. The underlying error is
  /// kept unchanged and exposed through `source()`.
  #[error("Could not build '{name}': {source}")]
  Build {
    name: String,
    #[source]
    source: Arc<dyn std::error::Error + Send + Sync>,
  },

  /// The build function of a definition panicked.
  #[error("Build function of '{name}' panicked")]
  BuildPanicked { name: String },

  /// The close function of an object panicked during teardown. The other
  /// objects are still closed. Only ever sent to the container's error sink.
  #[error("Close function of '{name}' panicked")]
  ClosePanicked { name: String },
}

impl Error {
  pub(crate) fn build(name: &str, source: BoxError) -> Self {
    Error::Build {
      name: name.to_owned(),
      source: Arc::from(source),
    }
  }

  pub(crate) fn not_found<T: ?Sized>(name: &str) -> Self {
    Error::NotFound {
      name: name.to_owned(),
      type_name: std::any::type_name::<T>(),
    }
  }

  pub(crate) fn closed(scope: &str) -> Self {
    Error::Closed {
      scope: scope.to_owned(),
    }
  }

  /// Returns `true` if the error comes from a build function rather than
  /// from the container itself.
  pub fn is_build(&self) -> bool {
    matches!(self, Error::Build { .. } | Error::BuildPanicked { .. })
  }

  /// The error returned by the failing build function, if any.
  pub fn build_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
    match self {
      Error::Build { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

/// A specialized `Result` type for `fibre_scope` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
