use fibre_scope::{Container, Definition, Error, Key, Registry, Scopes, APP, REQUEST, SUB_REQUEST};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Config;

struct Handler {
  serial: usize,
}

struct Step;

const CONFIG: Key<Config> = Key::new("config");
const HANDLER: Key<Handler> = Key::new("handler");
const STEP: Key<Step> = Key::new("step");

struct Counters {
  built: Arc<AtomicUsize>,
  closed: Arc<AtomicUsize>,
}

fn registry() -> (Registry, Counters) {
  let built = Arc::new(AtomicUsize::new(0));
  let closed = Arc::new(AtomicUsize::new(0));
  let (b, c, step_closed) = (built.clone(), closed.clone(), closed.clone());

  let registry = Registry::builder(Scopes::default())
    .with(
      Definition::builder(&CONFIG, APP)
        .build(|_| Ok::<_, Error>(Config))
        .finish()
        .unwrap(),
    )
    .unwrap()
    .with(
      Definition::builder(&HANDLER, REQUEST)
        .depends_on(&CONFIG)
        .build(move |_| {
          Ok::<_, Error>(Handler {
            serial: b.fetch_add(1, Ordering::SeqCst),
          })
        })
        .close(move |_| {
          c.fetch_add(1, Ordering::SeqCst);
        })
        .finish()
        .unwrap(),
    )
    .unwrap()
    .with(
      Definition::builder(&STEP, SUB_REQUEST)
        .depends_on(&HANDLER)
        .build(|_| Ok::<_, Error>(Step))
        .close(move |_| {
          step_closed.fetch_add(1, Ordering::SeqCst);
        })
        .finish()
        .unwrap(),
    )
    .unwrap()
    .build()
    .unwrap();

  (registry, Counters { built, closed })
}

#[test]
fn test_narrower_object_is_built_in_a_throwaway_child() {
  // Arrange
  let (registry, counters) = registry();
  let app = Container::new(registry);

  // Act
  let handler = app.try_get_unscoped(&HANDLER).unwrap();

  // Assert
  assert_eq!(handler.serial, 0);
  let holder = handler.holder().unwrap().clone();
  assert_eq!(holder.scope(), REQUEST);
  assert_eq!(app.children_count(), 1);

  handler.release();
  assert!(holder.is_closed());
  assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
  assert_eq!(app.children_count(), 0);
}

#[test]
fn test_every_unscoped_get_uses_a_fresh_child() {
  let (registry, counters) = registry();
  let app = Container::new(registry);

  let first = app.try_get_unscoped(&HANDLER).unwrap();
  let second = app.try_get_unscoped(&HANDLER).unwrap();

  assert!(!Arc::ptr_eq(first.value(), second.value()));
  assert_eq!(counters.built.load(Ordering::SeqCst), 2);
  first.release();
  second.release();
}

#[test]
fn test_object_two_scopes_down_creates_a_chain() {
  let (registry, counters) = registry();
  let app = Container::new(registry);

  let step = app.try_get_unscoped(&STEP).unwrap();
  let holder = step.holder().unwrap().clone();
  assert_eq!(holder.scope(), REQUEST);
  assert_eq!(holder.children_count(), 1);

  step.release();
  // The step and the handler it depends on are both closed.
  assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
  assert_eq!(app.children_count(), 0);
}

#[test]
fn test_object_in_reach_needs_no_child() {
  let (registry, _) = registry();
  let app = Container::new(registry);
  let request = app.sub_container().unwrap();

  let config = request.try_get_unscoped(&CONFIG).unwrap();
  assert!(config.holder().is_none());
  assert!(Arc::ptr_eq(&config.release(), &app.try_get(&CONFIG).unwrap()));
  assert!(!app.is_closed());
}

#[test]
fn test_clean_deletes_all_throwaway_children() {
  // Arrange
  let (registry, counters) = registry();
  let app = Container::new(registry);
  let request = app.sub_container().unwrap();
  let _a = app.try_get_unscoped(&HANDLER).unwrap();
  let _b = app.try_get_unscoped(&HANDLER).unwrap();
  assert_eq!(app.children_count(), 3);

  // Act
  app.clean();

  // Assert: only the regular sub-container is left.
  assert_eq!(app.children_count(), 1);
  assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
  assert!(!request.is_closed());
}

#[test]
fn test_unscoped_errors_leave_no_child_behind() {
  let (registry, _) = registry();
  let app = Container::new(registry);

  let err = app.try_get_unscoped(&Key::<Step>::new("missing")).unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
  assert_eq!(app.children_count(), 0);

  let reported = app.get_unscoped(&Key::<Handler>::new("missing"));
  assert!(reported.is_none());
}
