use fibre_scope::{Container, Error, Registry, Scopes};
use serde::Deserialize;

#[derive(Deserialize)]
struct AppConfig {
  scopes: Scopes,
}

#[test]
fn test_scopes_from_configuration() {
  let config: AppConfig = serde_json::from_str(r#"{ "scopes": ["process", "tenant", "job"] }"#).unwrap();

  let app = Container::new(Registry::builder(config.scopes).build().unwrap());
  let tenant = app.sub_container().unwrap();

  assert_eq!(app.scope(), "process");
  assert_eq!(tenant.scope(), "tenant");
  assert_eq!(tenant.sub_scopes(), vec!["job".to_string()]);
}

#[test]
fn test_duplicate_scopes_are_rejected_on_load() {
  let result = serde_json::from_str::<Scopes>(r#"["app", "app"]"#);
  assert!(result.is_err());
}

#[test]
fn test_scopes_serialize_as_a_list() {
  let json = serde_json::to_string(&Scopes::default()).unwrap();
  assert_eq!(json, r#"["app","request","subrequest"]"#);

  let err = Scopes::new(Vec::<String>::new()).unwrap_err();
  assert!(matches!(err, Error::Config(_)));
}
