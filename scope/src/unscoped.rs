use crate::container::Container;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An object obtained with `Container::try_get_unscoped`.
///
/// When the object belongs to a narrower scope than the container it was
/// requested from, it lives in throwaway sub-containers that stay open until
/// [`release`](Self::release) is called. Dropping an `Unscoped` does not
/// release anything.
pub struct Unscoped<T: ?Sized> {
  value: Arc<T>,
  holder: Option<Container>,
}

impl<T: ?Sized> Unscoped<T> {
  pub(crate) fn new(value: Arc<T>, holder: Option<Container>) -> Self {
    Self { value, holder }
  }

  pub fn value(&self) -> &Arc<T> {
    &self.value
  }

  /// The throwaway sub-container holding the object, if one was needed.
  pub fn holder(&self) -> Option<&Container> {
    self.holder.as_ref()
  }

  /// Deletes the throwaway sub-containers, closing the object. The returned
  /// handle stays valid as memory but must not be used as a live resource.
  pub fn release(self) -> Arc<T> {
    if let Some(holder) = &self.holder {
      holder.delete_with_sub_containers();
    }
    self.value
  }

  pub fn into_parts(self) -> (Arc<T>, Option<Container>) {
    (self.value, self.holder)
  }
}

impl<T: ?Sized> Deref for Unscoped<T> {
  type Target = T;

  fn deref(&self) -> &T {
    &self.value
  }
}

impl<T: ?Sized> fmt::Debug for Unscoped<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Unscoped")
      .field("type", &std::any::type_name::<T>())
      .field("holder", &self.holder)
      .finish()
  }
}
