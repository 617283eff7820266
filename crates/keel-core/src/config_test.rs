use super::*;
use crate::database_url::DbType;
use std::collections::HashMap;
use tempfile::tempdir;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.migrations_dir, "migrations");
    assert_eq!(config.database.migrations_table, "schema_migrations");
    assert_eq!(config.database.lock_table, "schema_migrations_lock");
    assert!(!config.prod);
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
database:
  url: "duckdb:///tmp/app.duckdb"
  migrations_table: app_versions
  lock_table: app_lock
  schema: ops
migrations_dir: db/migrations
require_contiguous: true
prod: true
verify:
  relations:
    - users
    - public.orders
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.database.schema.as_deref(), Some("ops"));
    assert_eq!(config.migrations_dir, "db/migrations");
    assert!(config.require_contiguous);
    assert!(config.prod);
    assert_eq!(config.verify.relations, vec!["users", "public.orders"]);
    assert_eq!(config.database_url().unwrap().db_type(), DbType::DuckDb);
}

#[test]
fn test_unknown_fields_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("migration_dir: typo\n");
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_bad_table_names() {
    let mut config = Config::default();
    config.database.migrations_table = "drop table; --".to_string();
    assert!(matches!(
        config.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));

    let mut config = Config::default();
    config.database.lock_table = config.database.migrations_table.clone();
    assert!(matches!(
        config.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_env_database_url_precedence() {
    let mut config = Config::default();
    config.apply_env(env(&[
        ("PG_URL", "postgres://legacy/app"),
        ("KEEL_DATABASE_URL", "postgres://primary/app"),
    ]));
    assert_eq!(config.database.url.as_deref(), Some("postgres://primary/app"));

    let mut config = Config::default();
    config.apply_env(env(&[("PG_URL", "postgres://legacy/app")]));
    assert_eq!(config.database.url.as_deref(), Some("postgres://legacy/app"));
}

#[test]
fn test_env_empty_values_ignored() {
    let mut config = Config::default();
    config.database.url = Some("duckdb::memory:".to_string());
    config.apply_env(env(&[("KEEL_DATABASE_URL", "  "), ("KEEL_MIGRATIONS_DIR", "")]));
    assert_eq!(config.database.url.as_deref(), Some("duckdb::memory:"));
    assert_eq!(config.migrations_dir, "migrations");
}

#[test]
fn test_env_prod_flag() {
    for (value, expected) in [("true", true), ("YES", true), ("1", true), ("no", false), ("", false)] {
        let mut config = Config::default();
        config.apply_env(env(&[("PROD", value)]));
        assert_eq!(config.prod, expected, "PROD={value:?}");
    }

    let mut config = Config {
        prod: true,
        ..Config::default()
    };
    config.apply_env(env(&[]));
    assert!(config.prod, "unset PROD keeps the file value");
}

#[test]
fn test_default_database_url() {
    let url = Config::default().database_url().unwrap();
    assert_eq!(url.db_type(), DbType::Postgres);
    assert_eq!(url.database_name(), "example");
}

#[test]
fn test_migrations_path() {
    let root = Path::new("/srv/app");
    let mut config = Config::default();
    assert_eq!(config.migrations_path(root), root.join("migrations"));
    config.migrations_dir = "/opt/migrations".to_string();
    assert_eq!(config.migrations_path(root), PathBuf::from("/opt/migrations"));
}

#[test]
fn test_load_from_dir() {
    let temp = tempdir().unwrap();
    assert_eq!(Config::load_from_dir(temp.path()).unwrap(), Config::default());

    std::fs::write(temp.path().join("keel.yaml"), "migrations_dir: sql\n").unwrap();
    let config = Config::load_from_dir(temp.path()).unwrap();
    assert_eq!(config.migrations_dir, "sql");
}

#[test]
fn test_load_missing_file() {
    let temp = tempdir().unwrap();
    let err = Config::load(&temp.path().join("keel.yml")).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
fn test_parse_env_flag() {
    assert!(parse_env_flag("True"));
    assert!(parse_env_flag(" yes "));
    assert!(!parse_env_flag("on"));
    assert!(!parse_env_flag("0"));
}
