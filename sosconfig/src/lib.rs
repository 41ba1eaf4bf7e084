//! # OGC SOS client configuration
//!
//! This crate loads the client configuration:
//! - an embedded default YAML document,
//! - merged with `config.yaml` from the configuration directory,
//! - then overridden by `OGCSOS_CONFIG__<SECTION>__<KEY>` environment variables.
//!
//! There is no global instance: load a [`Config`] and hand its
//! [`SessionSettings`] to the session.
//!
//! ## Usage
//!
//! ```no_run
//! use sosconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let settings = config.session_settings();
//! println!("endpoint: {}", settings.endpoint);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use chrono::FixedOffset;
use dirs::home_dir;
use ogcsos::time::{default_utc_offset, parse_utc_offset};
use ogcsos::{AuthMode, SessionSettings};
use serde_yaml::{Mapping, Value};
use std::{env, fs, path::Path, sync::Mutex};
use tracing::{info, warn};

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("ogcsos.yaml");

const ENV_CONFIG_DIR: &str = "OGCSOS_CONFIG";
const ENV_PREFIX: &str = "OGCSOS_CONFIG__";

const CONFIG_DIR_NAME: &str = ".ogcsos";

pub const DEFAULT_ENDPOINT: &str = "https://cs.listenfield.com/OGCAPIV2.jsp";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_DUMP_EXCHANGES: bool = false;

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(value) => scalar_to_string(&value)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| $default.to_string()),
                Err(_) => $default.to_string(),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration of the SOS client.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        CONFIG_DIR_NAME.to_string()
    }

    /// Loads the configuration.
    ///
    /// The directory is searched in the following order:
    /// 1. `directory` if not empty
    /// 2. the `OGCSOS_CONFIG` environment variable
    /// 3. `.ogcsos` in the current directory
    /// 4. `.ogcsos` in the user's home directory
    ///
    /// A missing directory or `config.yaml` is not an error: the embedded
    /// defaults are used and nothing is written until a setter is called.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file=%path, "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file=%path, "Config file not found, using default embedded config");
            }
        }

        let mut config_value = lower_keys_value(config_value);
        apply_env_overrides(&mut config_value, env::vars());

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to `config.yaml`, creating the
    /// configuration directory if needed.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        let data = self.lock()?;
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["sos", "token"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock()?;
        set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock()?;
        get_value_internal(&data, path)
    }

    impl_string_config!(
        get_endpoint,
        set_endpoint,
        &["sos", "endpoint"],
        DEFAULT_ENDPOINT
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_dump_exchanges,
        set_dump_exchanges,
        &["sos", "dump_exchanges"],
        DEFAULT_DUMP_EXCHANGES
    );

    /// The API token, `None` when unset or empty.
    pub fn get_token(&self) -> Option<String> {
        self.get_value(&["sos", "token"])
            .ok()
            .and_then(|v| scalar_to_string(&v))
            .filter(|t| !t.is_empty())
    }

    pub fn set_token(&self, token: String) -> Result<()> {
        self.set_value(&["sos", "token"], Value::String(token))
    }

    pub fn get_auth_mode(&self) -> AuthMode {
        match self.get_value(&["sos", "auth_mode"]) {
            Ok(Value::String(s)) => s.parse().unwrap_or_else(|err| {
                warn!("{}, using default {}", err, AuthMode::default());
                AuthMode::default()
            }),
            _ => AuthMode::default(),
        }
    }

    pub fn set_auth_mode(&self, mode: AuthMode) -> Result<()> {
        self.set_value(&["sos", "auth_mode"], Value::String(mode.to_string()))
    }

    /// Offset appended to request timestamps, `+09:00` by default.
    pub fn get_utc_offset(&self) -> FixedOffset {
        match self.get_value(&["sos", "utc_offset"]) {
            Ok(value) => match scalar_to_string(&value) {
                Some(text) => parse_utc_offset(&text).unwrap_or_else(|| {
                    warn!("Invalid UTC offset '{}', using default +09:00", text);
                    default_utc_offset()
                }),
                None => default_utc_offset(),
            },
            Err(_) => default_utc_offset(),
        }
    }

    /// Session settings assembled from the `sos` section.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            endpoint: self.get_endpoint(),
            token: self.get_token().unwrap_or_default(),
            auth_mode: self.get_auth_mode(),
            utc_offset: self.get_utc_offset(),
            dump_exchanges: self.get_dump_exchanges(),
        }
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key = path[0].to_lowercase();
        let key_value = Value::String(key);
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            let key = key.to_lowercase();

            if let Some(next) = map.get(Value::String(key)) {
                current = next;
            } else {
                return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
            }
        } else {
            return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

/// Applies `OGCSOS_CONFIG__A__B=value` pairs; values are read as YAML.
fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let yaml_value = convert_env_value(&value);
            if let Err(err) = set_value_internal(config, &key_path, yaml_value) {
                warn!(env_var=%key, "Ignoring environment override: {}", err);
            }
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
        return parsed;
    }
    Value::String(value.to_string())
}

/// Tokens and offsets may come back as YAML numbers.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                if let Value::String(s) = k {
                    new_map.insert(Value::String(s.to_lowercase()), lower_keys_value(v));
                } else {
                    new_map.insert(k, lower_keys_value(v));
                }
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // An empty file or key leaves the default in place.
        (_, Value::Null) => {}
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Value {
        lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG).unwrap())
    }

    #[test]
    fn env_overrides_nested_keys() {
        let mut config = defaults();
        let vars = vec![
            ("OGCSOS_CONFIG__SOS__TOKEN".to_string(), "12345".to_string()),
            ("OGCSOS_CONFIG__SOS__AUTH_MODE".to_string(), "header".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        apply_env_overrides(&mut config, vars.into_iter());

        let token = get_value_internal(&config, &["sos", "token"]).unwrap();
        assert_eq!(scalar_to_string(&token).as_deref(), Some("12345"));
        assert_eq!(
            get_value_internal(&config, &["sos", "auth_mode"]).unwrap(),
            Value::String("header".to_string())
        );
        assert!(get_value_internal(&config, &["unrelated"]).is_err());
    }

    #[test]
    fn merge_keeps_unset_defaults() {
        let mut config = defaults();
        let external: Value = serde_yaml::from_str("SOS:\n  Token: abc\n").unwrap();
        merge_yaml(&mut config, &lower_keys_value(external));

        assert_eq!(
            get_value_internal(&config, &["sos", "token"]).unwrap(),
            Value::String("abc".to_string())
        );
        assert_eq!(
            get_value_internal(&config, &["sos", "endpoint"]).unwrap(),
            Value::String(DEFAULT_ENDPOINT.to_string())
        );
    }

    #[test]
    fn missing_path_is_an_error() {
        let config = defaults();
        assert!(get_value_internal(&config, &["sos", "nothing"]).is_err());
        assert!(get_value_internal(&config, &["sos", "token", "deeper"]).is_err());
    }
}
