use blog_migrate::load_config::{
    load_config, medium_token_from_env, storage_credentials_from_env, DEFAULT_API_BASE,
    MEDIUM_TOKEN_ENV, SPACES_KEY_ENV, SPACES_SECRET_ENV,
};
use blog_migrate_core::config::{FileErrorPolicy, RunMode};
use blog_migrate_core::error::ConfigError;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
fn loads_full_config() {
    let file = config_file(
        r#"
site:
  url: https://blog.example.com
  posts_glob: "_posts/**/*.markdown"
  image_mirror: ./site
storage:
  endpoint: https://nyc3.digitaloceanspaces.com
  bucket: blog-assets
  region: nyc3
platform:
  api_base: https://medium.example.test/v1
  publication_id: abc123
ledger:
  completed: state/done.txt
  redirects: state/redirects.jsonl
migration:
  on_file_error: abort
  keep_fence_language: true
"#,
    );
    let config = load_config(file.path()).expect("Config should load");
    assert_eq!(config.site.posts_glob, "_posts/**/*.markdown");
    assert_eq!(config.site.image_mirror, PathBuf::from("./site"));
    assert_eq!(config.storage.bucket, "blog-assets");
    assert_eq!(config.platform.api_base, "https://medium.example.test/v1");
    assert_eq!(config.ledger.completed, PathBuf::from("state/done.txt"));

    let migration = config.migration_config(RunMode::Live).unwrap();
    assert_eq!(migration.publication_id, "abc123");
    assert_eq!(migration.on_file_error, FileErrorPolicy::Abort);
    assert!(migration.transform.keep_fence_language);
    assert_eq!(migration.mode, RunMode::Live);
}

#[test]
fn optional_sections_take_defaults() {
    let file = config_file(
        r#"
site:
  url: https://blog.example.com
  image_mirror: ./site
storage:
  endpoint: https://nyc3.digitaloceanspaces.com
  bucket: blog-assets
"#,
    );
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.site.posts_glob, "_posts/*.md");
    assert_eq!(config.storage.region, "us-east-1");
    assert_eq!(config.platform.api_base, DEFAULT_API_BASE);
    assert_eq!(config.ledger.completed, PathBuf::from("migrated.txt"));
    assert_eq!(config.ledger.redirects, PathBuf::from("redirects.jsonl"));
    assert_eq!(config.migration.on_file_error, FileErrorPolicy::Skip);
    assert!(!config.migration.keep_fence_language);
}

#[test]
fn migration_requires_publication_id() {
    let file = config_file(
        r#"
site:
  url: https://blog.example.com
  image_mirror: ./site
storage:
  endpoint: https://nyc3.digitaloceanspaces.com
  bucket: blog-assets
"#,
    );
    let config = load_config(file.path()).unwrap();
    let err = config.migration_config(RunMode::DryRun).unwrap_err();
    assert!(
        matches!(err, ConfigError::Missing(ref name) if name == "platform.publication_id"),
        "got {err:?}"
    );
}

#[test]
fn invalid_yaml_is_reported() {
    let file = config_file("not-yaml: [:::");
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn missing_file_is_reported() {
    let msg = load_config("/definitely/not/here.yaml")
        .unwrap_err()
        .to_string();
    assert!(msg.contains("Failed to read config file"), "got: {msg}");
}

#[test]
#[serial]
fn secrets_come_from_environment() {
    env::set_var(MEDIUM_TOKEN_ENV, "tok");
    env::set_var(SPACES_KEY_ENV, "key");
    env::set_var(SPACES_SECRET_ENV, "secret");

    assert_eq!(medium_token_from_env().unwrap(), "tok");
    let creds = storage_credentials_from_env().unwrap();
    assert_eq!(creds.access_key_id, "key");
    assert_eq!(creds.secret_access_key, "secret");
    assert!(!format!("{creds:?}").contains("secret\""));
}

#[test]
#[serial]
fn missing_or_blank_secret_refuses_to_start() {
    env::remove_var(MEDIUM_TOKEN_ENV);
    assert!(matches!(
        medium_token_from_env(),
        Err(ConfigError::Missing(ref name)) if name == MEDIUM_TOKEN_ENV
    ));

    env::set_var(SPACES_KEY_ENV, "key");
    env::set_var(SPACES_SECRET_ENV, "   ");
    assert!(matches!(
        storage_credentials_from_env(),
        Err(ConfigError::Missing(ref name)) if name == SPACES_SECRET_ENV
    ));
}
