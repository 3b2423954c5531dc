//! Typed names used to register and retrieve objects.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

/// The name of a definition, tagged with the type it produces.
///
/// Keys are usually declared once as constants and shared between the code
/// that registers a definition and the code that retrieves the object:
///
/// ```
/// use fibre_scope::Key;
///
/// struct Pool;
/// const DB_POOL: Key<Pool> = Key::new("db-pool");
/// assert_eq!(DB_POOL.name(), "db-pool");
/// ```
pub struct Key<T: ?Sized> {
  name: Cow<'static, str>,
  _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> Key<T> {
  pub const fn new(name: &'static str) -> Self {
    Self {
      name: Cow::Borrowed(name),
      _marker: PhantomData,
    }
  }

  /// Creates a key from a name only known at runtime.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: Cow::Owned(name.into()),
      _marker: PhantomData,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl<T: ?Sized + Any> Key<T> {
  pub(crate) fn value_type_id(&self) -> TypeId {
    TypeId::of::<T>()
  }
}

impl<T: ?Sized> Clone for Key<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T: ?Sized> fmt::Debug for Key<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Key({}: {})", self.name, std::any::type_name::<T>())
  }
}

impl<T: ?Sized> fmt::Display for Key<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}
