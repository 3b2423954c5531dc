//! # Fibre Scope
//!
//! A scoped, thread-safe object lifecycle container for Rust.
//!
//! Fibre Scope lazily builds objects from declarative definitions, caches each
//! object in the container matching the scope it belongs to, and tears
//! everything down in dependency order. Containers form a tree that mirrors
//! nested units of work: one root container for the whole process, one
//! sub-container per request, and so on.
//!
//! ## Core Concepts
//!
//! - **Scopes**: an ordered hierarchy of lifetimes, widest first. The default
//!   is `app` > `request` > `subrequest`.
//! - **Definitions**: how to build (and optionally close) a named object, the
//!   scope it belongs to and the definitions it depends on. They are checked
//!   once, when the [`Registry`] is built.
//! - **Containers**: caches of built objects for one scope. A request
//!   container asking for an `app` object gets the single instance cached in
//!   the root container.
//! - **Teardown**: [`Container::delete`] waits for sub-containers before
//!   closing; [`Container::delete_with_sub_containers`] closes the whole
//!   subtree at once. Objects are closed in reverse build order.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_scope::{Container, Definition, Key, Registry, Scopes, APP, REQUEST};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Pool { opened: AtomicUsize }
//! struct Conn { pool: Arc<Pool> }
//!
//! const DB_POOL: Key<Pool> = Key::new("db-pool");
//! const DB_CONN: Key<Conn> = Key::new("db-conn");
//!
//! let registry = Registry::builder(Scopes::default())
//!   .with(
//!     Definition::builder(&DB_POOL, APP)
//!       .build(|_| Ok::<_, std::io::Error>(Pool { opened: AtomicUsize::new(0) }))
//!       .finish()
//!       .unwrap(),
//!   )
//!   .unwrap()
//!   .with(
//!     Definition::builder(&DB_CONN, REQUEST)
//!       .depends_on(&DB_POOL)
//!       .build(|deps| {
//!         let pool = deps.get(&DB_POOL)?;
//!         pool.opened.fetch_add(1, Ordering::SeqCst);
//!         Ok::<_, fibre_scope::Error>(Conn { pool })
//!       })
//!       .close(|conn| {
//!         conn.pool.opened.fetch_sub(1, Ordering::SeqCst);
//!       })
//!       .finish()
//!       .unwrap(),
//!   )
//!   .unwrap()
//!   .build()
//!   .unwrap();
//!
//! let app = Container::new(registry);
//! let request = app.sub_container().unwrap();
//!
//! let conn = request.try_get(&DB_CONN).unwrap();
//! let pool = app.try_get(&DB_POOL).unwrap();
//! assert!(Arc::ptr_eq(&conn.pool, &pool));
//! assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
//!
//! request.delete();
//! assert_eq!(pool.opened.load(Ordering::SeqCst), 0);
//! app.delete();
//! ```

mod container;
mod core;
mod definition;
mod error;
mod key;
mod macros;
mod node;
mod registry;
mod scope;
mod sink;
mod unscoped;

pub use container::Container;
pub use definition::{Definition, DefinitionBuilder, Dependencies};
pub use error::{BoxError, Error, Result};
pub use key::Key;
pub use registry::{Registry, RegistryBuilder};
pub use scope::{Scopes, APP, REQUEST, SUB_REQUEST};
pub use sink::{ErrorSink, TracingSink};
pub use unscoped::Unscoped;
