use fibre_scope::{Container, Definition, Error, Key, Registry, Scopes, APP, REQUEST};

struct Settings {
  greeting: String,
}

// Normally built once per request.
struct Report {
  body: String,
}

const SETTINGS: Key<Settings> = Key::new("settings");
const REPORT: Key<Report> = Key::new("report");

fn main() -> Result<(), Error> {
  let registry = Registry::builder(Scopes::default())
    .with(
      Definition::builder(&SETTINGS, APP)
        .build(|_| {
          Ok::<_, Error>(Settings {
            greeting: "Nightly report".to_string(),
          })
        })
        .finish()?,
    )?
    .with(
      Definition::builder(&REPORT, REQUEST)
        .depends_on(&SETTINGS)
        .build(|deps| {
          let settings = deps.get(&SETTINGS)?;
          Ok::<_, Error>(Report {
            body: format!("{}: all green", settings.greeting),
          })
        })
        .close(|_| println!("Report closed."))
        .finish()?,
    )?
    .build()?;

  let app = Container::new(registry);

  // A background job running at app scope has no request container.
  match app.try_get(&REPORT) {
    Err(err) => println!("Scoped retrieval fails as expected: {}", err),
    Ok(_) => unreachable!("a request object cannot live in the app container"),
  }

  // The unscoped variant builds it in a throwaway request container...
  let report = app.try_get_unscoped(&REPORT)?;
  println!("{}", report.body);

  // ...which the caller must release.
  report.release();
  assert_eq!(app.children_count(), 0);

  app.delete();
  Ok(())
}
