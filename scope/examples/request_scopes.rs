use fibre_scope::{Container, Definition, Error, Key, Registry, Scopes, APP, REQUEST};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

// A connection pool shared by the whole process.
struct Pool {
  checked_out: AtomicUsize,
}

// A connection borrowed from the pool for the duration of one request.
struct Conn {
  pool: Arc<Pool>,
  request: usize,
}

const DB_POOL: Key<Pool> = Key::new("db-pool");
const DB_CONN: Key<Conn> = Key::new("db-conn");

static REQUEST_IDS: AtomicUsize = AtomicUsize::new(0);

fn main() -> Result<(), Error> {
  tracing_subscriber::fmt()
    .with_env_filter("fibre_scope=debug")
    .init();

  let registry = Registry::builder(Scopes::default())
    .with(
      Definition::builder(&DB_POOL, APP)
        .build(|_| {
          println!("Opening the pool (once per process)...");
          Ok::<_, Error>(Pool {
            checked_out: AtomicUsize::new(0),
          })
        })
        .close(|_| println!("Closing the pool."))
        .finish()?,
    )?
    .with(
      Definition::builder(&DB_CONN, REQUEST)
        .depends_on(&DB_POOL)
        .build(|deps| {
          let pool = deps.get(&DB_POOL)?;
          pool.checked_out.fetch_add(1, Ordering::SeqCst);
          Ok::<_, Error>(Conn {
            pool,
            request: REQUEST_IDS.fetch_add(1, Ordering::SeqCst),
          })
        })
        .close(|conn| {
          conn.pool.checked_out.fetch_sub(1, Ordering::SeqCst);
          println!("Returned the connection of request #{}.", conn.request);
        })
        .finish()?,
    )?
    .build()?;

  // The root container lives as long as the process.
  let app = Container::new(registry);

  // One request container per unit of work, each on its own thread.
  thread::scope(|s| {
    let workers: Vec<_> = (0..4)
      .map(|_| {
        s.spawn(|| -> Result<(), Error> {
          let request = app.sub_container()?;
          let conn = request.try_get(&DB_CONN)?;
          println!("Request #{} is using the shared pool.", conn.request);
          request.delete();
          Ok(())
        })
      })
      .collect();
    workers
      .into_iter()
      .try_for_each(|worker| worker.join().expect("request thread panicked"))
  })?;

  let pool = app.try_get(&DB_POOL)?;
  assert_eq!(pool.checked_out.load(Ordering::SeqCst), 0);

  // Deleting the root closes the pool last.
  app.delete();
  Ok(())
}
