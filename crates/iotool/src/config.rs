//! Runtime configuration from `IOTOOL_*` environment variables.
//!
//! Invalid values are reported as [`ConfigError`] diagnostics and the
//! default is kept; configuration never aborts startup.

use std::env;
use std::fmt;
use std::path::PathBuf;

use iotool_core::editor::EditorConfig;
use iotool_core::history::DEFAULT_CAPACITY;
use iotool_core::line_buffer::DEFAULT_MAX_LEN;

use crate::access::{AccessConfig, DEFAULT_MEM_DEVICE};

pub const ENV_PROMPT: &str = "IOTOOL_PROMPT";
pub const ENV_HISTORY_BYTES: &str = "IOTOOL_HISTORY_BYTES";
pub const ENV_LINE_MAX: &str = "IOTOOL_LINE_MAX";
pub const ENV_MEM_DEVICE: &str = "IOTOOL_MEM_DEVICE";
pub const ENV_PORT_IO: &str = "IOTOOL_PORT_IO";
pub const ENV_LOG: &str = "IOTOOL_LOG";
pub const ENV_LOG_FILE: &str = "IOTOOL_LOG_FILE";

pub const DEFAULT_PROMPT: &str = "io> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    pub history_bytes: usize,
    pub line_max: usize,
    pub mem_device: PathBuf,
    pub port_io: bool,
    /// `tracing` filter directive. Logging is off when unset.
    pub log_filter: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            history_bytes: DEFAULT_CAPACITY,
            line_max: DEFAULT_MAX_LEN,
            mem_device: PathBuf::from(DEFAULT_MEM_DEVICE),
            port_io: true,
            log_filter: None,
            log_file: None,
        }
    }
}

/// Parsed config plus any problems found along the way.
#[derive(Debug, Clone)]
pub struct ConfigParse {
    pub config: Config,
    pub errors: Vec<ConfigError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> ConfigParse {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Parse config from an arbitrary lookup.
    pub fn from_env_with<F>(mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_PROMPT) {
            config.prompt = value;
        }

        if let Some(value) = get(ENV_HISTORY_BYTES) {
            match parse_usize(&value) {
                Some(parsed) if parsed > 0 => config.history_bytes = parsed,
                Some(parsed) => validate_positive("history_bytes", parsed, &mut errors),
                None => errors.push(ConfigError::new(
                    "history_bytes",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Some(value) = get(ENV_LINE_MAX) {
            match parse_usize(&value) {
                Some(parsed) if parsed > 0 => config.line_max = parsed,
                Some(parsed) => validate_positive("line_max", parsed, &mut errors),
                None => errors.push(ConfigError::new(
                    "line_max",
                    value,
                    "expected positive integer",
                )),
            }
        }

        if let Some(value) = get(ENV_MEM_DEVICE) {
            if value.trim().is_empty() {
                errors.push(ConfigError::new("mem_device", value, "expected a path"));
            } else {
                config.mem_device = PathBuf::from(value);
            }
        }

        if let Some(value) = get(ENV_PORT_IO) {
            match parse_bool(&value) {
                Some(parsed) => config.port_io = parsed,
                None => errors.push(ConfigError::new(
                    "port_io",
                    value,
                    "expected bool (1/0/true/false)",
                )),
            }
        }

        if let Some(value) = get(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            config.log_filter = Some(value);
        }

        if let Some(value) = get(ENV_LOG_FILE).filter(|v| !v.trim().is_empty()) {
            config.log_file = Some(PathBuf::from(value));
        }

        ConfigParse { config, errors }
    }

    #[must_use]
    pub fn editor(&self) -> EditorConfig {
        EditorConfig {
            max_line_len: self.line_max,
            history_capacity: self.history_bytes,
        }
    }

    #[must_use]
    pub fn access(&self) -> AccessConfig {
        AccessConfig {
            mem_device: self.mem_device.clone(),
            port_io: self.port_io,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}

fn validate_positive(field: &'static str, value: usize, errors: &mut Vec<ConfigError>) {
    if value == 0 {
        errors.push(ConfigError::new(field, value.to_string(), "must be >= 1"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(env: &HashMap<&str, &str>) -> ConfigParse {
        Config::from_env_with(|key| env.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn defaults_without_env() {
        let parsed = parse(&HashMap::new());
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config, Config::default());
        assert_eq!(parsed.config.prompt, "io> ");
        assert_eq!(parsed.config.history_bytes, 4096);
        assert_eq!(parsed.config.line_max, 256);
        assert_eq!(parsed.config.mem_device, PathBuf::from("/dev/mem"));
        assert!(parsed.config.port_io);
    }

    #[test]
    fn overrides_applied() {
        let mut env = HashMap::new();
        env.insert(ENV_PROMPT, "hw$ ");
        env.insert(ENV_HISTORY_BYTES, " 128 ");
        env.insert(ENV_LINE_MAX, "80");
        env.insert(ENV_MEM_DEVICE, "/tmp/fake-mem");
        env.insert(ENV_PORT_IO, "off");
        env.insert(ENV_LOG, "iotool=debug");
        env.insert(ENV_LOG_FILE, "/tmp/iotool.log");

        let parsed = parse(&env);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let config = parsed.config;
        assert_eq!(config.prompt, "hw$ ");
        assert_eq!(config.history_bytes, 128);
        assert_eq!(config.line_max, 80);
        assert_eq!(config.mem_device, PathBuf::from("/tmp/fake-mem"));
        assert!(!config.port_io);
        assert_eq!(config.log_filter.as_deref(), Some("iotool=debug"));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/iotool.log")));

        let editor = config.editor();
        assert_eq!(editor.max_line_len, 80);
        assert_eq!(editor.history_capacity, 128);
        assert!(!config.access().port_io);
    }

    #[test]
    fn invalid_values_reported_and_defaults_kept() {
        let mut env = HashMap::new();
        env.insert(ENV_HISTORY_BYTES, "lots");
        env.insert(ENV_LINE_MAX, "0");
        env.insert(ENV_PORT_IO, "maybe");
        env.insert(ENV_MEM_DEVICE, "  ");

        let parsed = parse(&env);
        assert_eq!(parsed.config, Config::default());
        for field in ["history_bytes", "line_max", "port_io", "mem_device"] {
            assert!(
                parsed.errors.iter().any(|err| err.field == field),
                "missing diagnostic for {field}"
            );
        }
        let zero = parsed
            .errors
            .iter()
            .find(|err| err.field == "line_max")
            .unwrap();
        assert_eq!(zero.to_string(), "line_max=0 (must be >= 1)");
    }

    #[test]
    fn empty_log_settings_are_ignored() {
        let mut env = HashMap::new();
        env.insert(ENV_LOG, "");
        env.insert(ENV_LOG_FILE, " ");
        let parsed = parse(&env);
        assert_eq!(parsed.config.log_filter, None);
        assert_eq!(parsed.config.log_file, None);
    }

    #[test]
    fn bool_spellings() {
        for yes in ["1", "true", "YES", " on "] {
            assert_eq!(parse_bool(yes), Some(true), "{yes}");
        }
        for no in ["0", "False", "no", "OFF"] {
            assert_eq!(parse_bool(no), Some(false), "{no}");
        }
        assert_eq!(parse_bool("2"), None);
    }
}
