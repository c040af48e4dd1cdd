//! Upload limits and polling cadence for structured-data imports.
//!
//! The values are externally supplied constants; nothing here is
//! computed from the data being imported.

use std::time::Duration;

use crate::error::CoreError;
use crate::file_selection::format_file_size;

/// Interval between job status polls.
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 5000;

/// Maximum accepted file size (50 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Extensions accepted by the file selector.
pub const DEFAULT_ALLOWED_FILE_TYPES: &[&str] = &[".json"];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Limits applied by the file selector and the progress monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Fixed delay between job status fetches.
    pub polling_interval: Duration,
    /// Largest accepted file, in bytes. The bound is inclusive.
    pub max_file_size: u64,
    /// Lower-cased extensions including the leading dot, e.g. `.json`.
    pub allowed_file_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_file_types: DEFAULT_ALLOWED_FILE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Load the upload limits from environment variables with defaults.
    ///
    /// | Env Var               | Default    |
    /// |-----------------------|------------|
    /// | `POLLING_INTERVAL_MS` | `5000`     |
    /// | `MAX_FILE_SIZE_BYTES` | `52428800` |
    /// | `ALLOWED_FILE_TYPES`  | `.json`    |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through
    /// `lookup`, so callers (and tests) can supply their own source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let polling_interval = match lookup("POLLING_INTERVAL_MS") {
            Some(raw) => {
                let ms = parse_positive("POLLING_INTERVAL_MS", &raw)?;
                Duration::from_millis(ms)
            }
            None => defaults.polling_interval,
        };

        let max_file_size = match lookup("MAX_FILE_SIZE_BYTES") {
            Some(raw) => parse_positive("MAX_FILE_SIZE_BYTES", &raw)?,
            None => defaults.max_file_size,
        };

        let allowed_file_types = match lookup("ALLOWED_FILE_TYPES") {
            Some(raw) => {
                let types = parse_extensions(&raw);
                if types.is_empty() {
                    return Err(CoreError::Validation(
                        "ALLOWED_FILE_TYPES must list at least one extension".to_string(),
                    ));
                }
                types
            }
            None => defaults.allowed_file_types,
        };

        Ok(Self {
            polling_interval,
            max_file_size,
            allowed_file_types,
        })
    }

    /// Whether `extension` (with or without the leading dot, any case)
    /// is in the allowed list.
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let normalized = normalize_extension(extension);
        self.allowed_file_types.iter().any(|t| *t == normalized)
    }

    /// Human-readable size limit, e.g. `50MB`. Limits under a megabyte
    /// use the file size units instead, e.g. `40 KB`.
    pub fn max_file_size_label(&self) -> String {
        if self.max_file_size < BYTES_PER_MB {
            format_file_size(self.max_file_size)
        } else if self.max_file_size % BYTES_PER_MB == 0 {
            format!("{}MB", self.max_file_size / BYTES_PER_MB)
        } else {
            format!("{:.1}MB", self.max_file_size as f64 / BYTES_PER_MB as f64)
        }
    }

    /// Human-readable list of accepted kinds, e.g. `JSON` or `JSON or CSV`.
    pub fn allowed_types_label(&self) -> String {
        let labels: Vec<String> = self
            .allowed_file_types
            .iter()
            .map(|t| t.trim_start_matches('.').to_uppercase())
            .collect();

        match labels.split_last() {
            None => String::new(),
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
        }
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, CoreError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(CoreError::Validation(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
        Ok(value) => Ok(value),
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_extension)
        .collect()
}

fn normalize_extension(extension: &str) -> String {
    let lower = extension.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_dashboard_limits() {
        let config = UploadConfig::default();
        assert_eq!(config.polling_interval, Duration::from_millis(5000));
        assert_eq!(config.max_file_size, 52_428_800);
        assert_eq!(config.allowed_file_types, vec![".json".to_string()]);
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = UploadConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, UploadConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = UploadConfig::from_lookup(lookup_from(&[
            ("POLLING_INTERVAL_MS", "250"),
            ("MAX_FILE_SIZE_BYTES", "1024"),
            ("ALLOWED_FILE_TYPES", "JSON, .ndjson"),
        ]))
        .unwrap();

        assert_eq!(config.polling_interval, Duration::from_millis(250));
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(
            config.allowed_file_types,
            vec![".json".to_string(), ".ndjson".to_string()]
        );
    }

    #[test]
    fn zero_or_garbage_interval_is_rejected() {
        assert!(UploadConfig::from_lookup(lookup_from(&[("POLLING_INTERVAL_MS", "0")])).is_err());
        assert!(UploadConfig::from_lookup(lookup_from(&[("POLLING_INTERVAL_MS", "soon")])).is_err());
    }

    #[test]
    fn blank_extension_list_is_rejected() {
        assert!(UploadConfig::from_lookup(lookup_from(&[("ALLOWED_FILE_TYPES", " , ")])).is_err());
    }

    #[test]
    fn extension_check_ignores_case_and_dot() {
        let config = UploadConfig::default();
        assert!(config.is_allowed_extension(".json"));
        assert!(config.is_allowed_extension("JSON"));
        assert!(!config.is_allowed_extension(".csv"));
    }

    #[test]
    fn labels() {
        let mut config = UploadConfig::default();
        assert_eq!(config.max_file_size_label(), "50MB");
        assert_eq!(config.allowed_types_label(), "JSON");

        config.max_file_size = 1536 * 1024;
        config.allowed_file_types = vec![".json".into(), ".csv".into(), ".ndjson".into()];
        assert_eq!(config.max_file_size_label(), "1.5MB");
        assert_eq!(config.allowed_types_label(), "JSON, CSV or NDJSON");
    }

    #[test]
    fn small_limits_are_not_rounded_to_zero_megabytes() {
        let mut config = UploadConfig::default();
        config.max_file_size = 40 * 1024;
        assert_eq!(config.max_file_size_label(), "40 KB");

        config.max_file_size = 512;
        assert_eq!(config.max_file_size_label(), "512 B");
    }
}
