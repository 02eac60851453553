use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Settings;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MVM_CONFIG";

/// Error type for settings I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not serialize settings: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("could not edit {path}: {source}")]
    EditError {
        path: PathBuf,
        source: toml_edit::TomlError,
    },
    #[error("unknown setting '{0}' (expected section.key, see `mvm config show`)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {source}")]
    InvalidValue {
        key: String,
        source: toml::de::Error,
    },
}

/// Config file path, respecting MVM_CONFIG and XDG_CONFIG_HOME.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("marvin-mirror").join("config.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Load settings. A missing file means defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Effective settings as TOML.
pub fn render_settings(settings: &Settings) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(settings)?)
}

/// Set `section.key` in the config file, keeping the rest of the file's
/// formatting and comments. The edited file must still load.
pub fn set_value(path: &Path, key: &str, raw_value: &str) -> Result<(), ConfigError> {
    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    let default = default_value(section, field)?
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

    let text = if path.exists() {
        fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        String::new()
    };
    let mut doc: toml_edit::DocumentMut = text.parse().map_err(|e| ConfigError::EditError {
        path: path.to_path_buf(),
        source: e,
    })?;

    if !doc.contains_key(section) {
        doc[section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[section][field] = typed_value(raw_value, &default);

    let edited = doc.to_string();
    toml::from_str::<Settings>(&edited).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        source: e,
    })?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ConfigError::WriteError {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, edited).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Default value of `section.field`, or `None` for an unknown key.
fn default_value(section: &str, field: &str) -> Result<Option<toml::Value>, ConfigError> {
    let defaults = toml::Value::try_from(Settings::default())?;
    Ok(defaults
        .get(section)
        .and_then(toml::Value::as_table)
        .and_then(|table| table.get(field))
        .cloned())
}

/// Parse `raw` as the type of the key's default. A value that does not parse
/// stays a string so loading reports it as invalid.
fn typed_value(raw: &str, default: &toml::Value) -> toml_edit::Item {
    let trimmed = raw.trim();
    match default {
        toml::Value::Boolean(_) => match trimmed.parse::<bool>() {
            Ok(b) => toml_edit::value(b),
            Err(_) => toml_edit::value(raw),
        },
        toml::Value::Integer(_) => match trimmed.parse::<i64>() {
            Ok(n) => toml_edit::value(n),
            Err(_) => toml_edit::value(raw),
        },
        _ => toml_edit::value(raw),
    }
}
