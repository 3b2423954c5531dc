//! The ordered hierarchy of scopes a container tree is built on.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// The process-wide scope.
pub const APP: &str = "app";
/// The scope of one unit of work, such as an inbound request.
pub const REQUEST: &str = "request";
/// A scope nested inside a request.
pub const SUB_REQUEST: &str = "subrequest";

/// An ordered list of scope names, from the widest to the narrowest.
///
/// The root container always lives in the first scope. Each call to
/// `Container::sub_container` moves one step towards the end of the list.
#[derive(Clone, PartialEq, Eq)]
pub struct Scopes {
  names: Arc<[String]>,
}

impl Scopes {
  /// Creates a scope list. Fails if the list is empty or has duplicates.
  pub fn new<I, S>(names: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
      return Err(Error::Config("at least one scope is required".to_string()));
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
      if name.is_empty() {
        return Err(Error::Config("scope names cannot be empty".to_string()));
      }
      if !seen.insert(name.as_str()) {
        return Err(Error::Config(format!("scope '{}' is listed more than once", name)));
      }
    }

    Ok(Self {
      names: names.into(),
    })
  }

  /// Number of scopes in the hierarchy.
  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// Position of `name` in the hierarchy, `0` being the widest scope.
  pub fn index_of(&self, name: &str) -> Option<usize> {
    self.names.iter().position(|n| n == name)
  }

  /// Name of the scope at `index`.
  pub fn name(&self, index: usize) -> Option<&str> {
    self.names.get(index).map(String::as_str)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index_of(name).is_some()
  }

  /// Name of the widest scope.
  pub fn root(&self) -> &str {
    &self.names[0]
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  /// Scopes strictly wider than the scope at `index`.
  pub(crate) fn wider_than(&self, index: usize) -> Vec<String> {
    self.names[..index].to_vec()
  }

  /// Scopes strictly narrower than the scope at `index`.
  pub(crate) fn narrower_than(&self, index: usize) -> Vec<String> {
    self.names[index + 1..].to_vec()
  }
}

impl Default for Scopes {
  fn default() -> Self {
    Self {
      names: vec![APP.to_string(), REQUEST.to_string(), SUB_REQUEST.to_string()].into(),
    }
  }
}

impl fmt::Debug for Scopes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.names.iter()).finish()
  }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Scopes {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(self.names.iter())
  }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Scopes {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    Scopes::new(names).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_scopes_are_ordered_wide_to_narrow() {
    let scopes = Scopes::default();
    assert_eq!(scopes.len(), 3);
    assert_eq!(scopes.root(), APP);
    assert_eq!(scopes.index_of(REQUEST), Some(1));
    assert_eq!(scopes.name(2), Some(SUB_REQUEST));
    assert_eq!(scopes.wider_than(2), vec![APP.to_string(), REQUEST.to_string()]);
    assert!(scopes.narrower_than(2).is_empty());
  }

  #[test]
  fn duplicate_scope_is_rejected() {
    let err = Scopes::new(["app", "request", "app"]).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }

  #[test]
  fn empty_scope_list_is_rejected() {
    let err = Scopes::new(Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
  }
}
