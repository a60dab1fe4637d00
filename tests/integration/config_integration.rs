//! Integration tests for Configuration System

use super::test_utils::{increment, with_env_vars};
use settle::{ConfigError, ConfigLoader, DigestError, Scope};
use tempfile::TempDir;

#[test]
fn test_config_file_sets_digest_budget() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("settle.toml");
    std::fs::write(
        &config_file,
        r#"
[digest]
ttl = 1

[logging]
level = "debug"
format = "json"

[logging.modules]
settle = "trace"
"#,
    )
    .unwrap();

    let config = with_env_vars(&[], || ConfigLoader::load(Some(&config_file)).unwrap());
    assert_eq!(config.digest.ttl, 1);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    assert_eq!(
        config.logging.modules.get("settle"),
        Some(&"trace".to_string())
    );

    let scope = Scope::builder().config(config.digest).build();
    scope.watch(
        |s| Ok(s.get("n")),
        |_, _, s| {
            increment(s, "n");
            Ok(())
        },
    );
    assert!(matches!(
        scope.digest(),
        Err(DigestError::StabilizationExceeded { ttl: 1 })
    ));
}

#[test]
fn test_environment_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("settle.toml");
    std::fs::write(&config_file, "[digest]\nttl = 4\n").unwrap();

    let config = with_env_vars(&[("SETTLE__DIGEST__TTL", "7")], || {
        ConfigLoader::load(Some(&config_file)).unwrap()
    });
    assert_eq!(config.digest.ttl, 7);
}

#[test]
fn test_invalid_values_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("settle.toml");
    std::fs::write(&config_file, "[logging]\nformat = \"xml\"\n").unwrap();

    let result = with_env_vars(&[], || ConfigLoader::load(Some(&config_file)));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));

    let result = ConfigLoader::from_toml_str("[digest]\nttl = \"many\"\n");
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_defaults_without_file() {
    let config = with_env_vars(&[], || ConfigLoader::load(None).unwrap());
    assert!(config.validate().is_ok());
    assert_eq!(config.logging.output, "stderr");
}
