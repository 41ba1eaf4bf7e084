use ogcsos::AuthMode;
use ogcsos::time::default_utc_offset;
use sosconfig::{Config, DEFAULT_ENDPOINT};
use tempfile::TempDir;

fn config_in(yaml: Option<&str>) -> (TempDir, Config) {
    let temp_dir = tempfile::tempdir().unwrap();
    if let Some(yaml) = yaml {
        std::fs::write(temp_dir.path().join("config.yaml"), yaml).unwrap();
    }
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();
    (temp_dir, config)
}

#[test]
fn defaults_without_config_file() {
    let (temp_dir, config) = config_in(None);

    assert_eq!(config.get_endpoint(), DEFAULT_ENDPOINT);
    assert_eq!(config.get_token(), None);
    assert_eq!(config.get_auth_mode(), AuthMode::QueryParameter);
    assert_eq!(config.get_utc_offset(), default_utc_offset());
    assert!(!config.get_dump_exchanges());
    assert_eq!(config.get_log_min_level(), "INFO");

    // Loading never writes the file.
    assert!(!temp_dir.path().join("config.yaml").exists());
}

#[test]
fn file_values_override_defaults() {
    let (_temp_dir, config) = config_in(Some(
        "SOS:\n  Endpoint: https://sos.example.com/api\n  token: 0123\n  auth_mode: header\n  utc_offset: \"-05:30\"\n  dump_exchanges: true\n",
    ));

    let settings = config.session_settings();
    assert_eq!(settings.endpoint, "https://sos.example.com/api");
    assert_eq!(settings.auth_mode, AuthMode::Header);
    assert_eq!(settings.utc_offset.local_minus_utc(), -(5 * 3600 + 30 * 60));
    assert!(settings.dump_exchanges);
    assert!(!settings.token.is_empty());
    // Untouched sections keep their defaults.
    assert_eq!(config.get_log_min_level(), "INFO");
}

#[test]
fn invalid_values_fall_back() {
    let (_temp_dir, config) = config_in(Some(
        "sos:\n  auth_mode: carrier-pigeon\n  utc_offset: somewhere\n",
    ));

    assert_eq!(config.get_auth_mode(), AuthMode::QueryParameter);
    assert_eq!(config.get_utc_offset(), default_utc_offset());
}

#[test]
fn setters_persist_to_config_file() {
    let (temp_dir, config) = config_in(None);

    config.set_token("SECRET".to_string()).unwrap();
    config.set_auth_mode(AuthMode::Header).unwrap();

    let path = temp_dir.path().join("config.yaml");
    assert!(path.exists());

    let reloaded = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();
    assert_eq!(reloaded.get_token().as_deref(), Some("SECRET"));
    assert_eq!(reloaded.get_auth_mode(), AuthMode::Header);
    assert_eq!(reloaded.get_endpoint(), DEFAULT_ENDPOINT);
}

#[test]
fn missing_config_dir_is_created_on_save() {
    let temp_dir = tempfile::tempdir().unwrap();
    let nested = temp_dir.path().join("nested").join(".ogcsos");
    let config = Config::load_config(nested.to_str().unwrap()).unwrap();
    assert_eq!(config.config_dir(), nested.to_str().unwrap());

    config.set_dump_exchanges(true).unwrap();
    assert!(nested.join("config.yaml").exists());
}
