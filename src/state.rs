use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::db::{ContactDb, DbError};
use crate::types::Config;

/// Shared state handed to every HTTP handler.
///
/// The single store connection sits behind a non-poisoning mutex; handlers
/// take it on a blocking thread for the duration of one identify transaction.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Mutex<ContactDb>>,
}

impl AppState {
    pub fn new(config: Config, db: ContactDb) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the configured contact store and wrap it.
    pub fn open(config: Config) -> Result<Self, DbError> {
        let db = ContactDb::open(config.db_path.as_deref())?;
        Ok(Self::new(config, db))
    }
}

/// Location of the config file: `$IDENTIFY_CONFIG`, else `~/.identify/config.json`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("IDENTIFY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".identify").join("config.json"))
}

/// Load configuration from disk (defaults if the file is absent), then apply
/// environment overrides.
pub fn load_config() -> Result<Config, String> {
    let mut config = match config_path() {
        Some(path) if path.exists() => load_config_from(&path)?,
        Some(path) => {
            log::info!("No config at {}, using defaults", path.display());
            Config::default()
        }
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// `IDENTIFY_HTTP_BIND` wins over `PORT` (which binds all interfaces);
/// `IDENTIFY_DB_PATH` replaces the store location.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(bind) = non_empty("IDENTIFY_HTTP_BIND") {
        config.bind = bind.trim().to_string();
    } else if let Some(port) = non_empty("PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => config.bind = format!("0.0.0.0:{port}"),
            Err(_) => log::warn!("Ignoring invalid PORT value '{port}'"),
        }
    }

    if let Some(db_path) = non_empty("IDENTIFY_DB_PATH") {
        config.db_path = Some(PathBuf::from(db_path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_port_binds_all_interfaces() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("PORT", "8081")]));
        assert_eq!(config.bind, "0.0.0.0:8081");
    }

    #[test]
    fn test_explicit_bind_beats_port() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[("PORT", "8081"), ("IDENTIFY_HTTP_BIND", "127.0.0.1:9999")]),
        );
        assert_eq!(config.bind, "127.0.0.1:9999");
    }

    #[test]
    fn test_invalid_port_keeps_default() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("PORT", "eighty")]));
        assert_eq!(config.bind, Config::default().bind);
    }

    #[test]
    fn test_db_path_override() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("IDENTIFY_DB_PATH", "/var/lib/identify.db")]));
        assert_eq!(config.db_path, Some(PathBuf::from("/var/lib/identify.db")));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"bind": "127.0.0.1:4000"}"#).unwrap();
        let config = load_config_from(&path).expect("parse");
        assert_eq!(config.bind, "127.0.0.1:4000");
        assert_eq!(config.db_path, None);

        std::fs::write(&path, "not json").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"), "{err}");
    }

    #[test]
    fn test_open_uses_configured_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("state.db");
        let config = Config {
            db_path: Some(db_path.clone()),
            ..Config::default()
        };
        let state = AppState::open(config).expect("open");
        assert!(db_path.exists());
        assert!(state.db.lock().list_contacts().unwrap().is_empty());
    }
}
