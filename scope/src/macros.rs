//! Public macros for ergonomic object retrieval.

/// Retrieves an object from a container, panicking if it cannot be built.
///
/// This is meant for wiring code where a missing object is a programming
/// error. For a non-panicking version, use `Container::try_get` or
/// `Container::get`.
///
/// # Panics
///
/// Panics with the retrieval error if the object cannot be resolved.
///
/// # Examples
///
/// ```
/// use fibre_scope::{resolve, Container, Definition, Key, Registry, Scopes, APP};
///
/// const GREETING: Key<String> = Key::new("greeting");
///
/// let registry = Registry::builder(Scopes::default())
///   .with(
///     Definition::builder(&GREETING, APP)
///       .build(|_| Ok::<_, std::convert::Infallible>("hello".to_string()))
///       .finish()
///       .unwrap(),
///   )
///   .unwrap()
///   .build()
///   .unwrap();
/// let app = Container::new(registry);
///
/// // By key.
/// assert_eq!(*resolve!(app, &GREETING), "hello");
/// // By type and name.
/// assert_eq!(*resolve!(app, String, "greeting"), "hello");
/// ```
///
/// Trait objects registered with `build_shared` are resolved with the
/// `trait` form:
///
/// ```
/// use fibre_scope::{resolve, Container, Definition, Key, Registry, Scopes, APP};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct English;
/// impl Greeter for English { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// const GREETER: Key<dyn Greeter> = Key::new("greeter");
///
/// let registry = Registry::builder(Scopes::default())
///   .with(
///     Definition::builder(&GREETER, APP)
///       .build_shared(|_| Ok::<_, std::convert::Infallible>(Arc::new(English) as Arc<dyn Greeter>))
///       .finish()
///       .unwrap(),
///   )
///   .unwrap()
///   .build()
///   .unwrap();
/// let app = Container::new(registry);
///
/// let greeter = resolve!(app, trait Greeter, "greeter");
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // resolve!(container, trait MyTrait, "name")
    ($container:expr, trait $trait_ident:ident, $name:expr) => {
        $container
            .try_get(&$crate::Key::<dyn $trait_ident>::named($name))
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required trait object '{}' ({}): {}",
                    $name,
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    // resolve!(container, MyType, "name")
    ($container:expr, $type:ty, $name:expr) => {
        $container
            .try_get(&$crate::Key::<$type>::named($name))
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required object '{}' ({}): {}",
                    $name,
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };

    // resolve!(container, &KEY)
    ($container:expr, $key:expr) => {{
        let key = $key;
        $container
            .try_get(key)
            .unwrap_or_else(|err| panic!("Failed to resolve required object '{}': {}", key, err))
    }};
}
