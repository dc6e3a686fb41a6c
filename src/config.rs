//! Engine configuration.
//!
//! Settings come from defaults, an optional TOML file, then `FILTERWORKS_*`
//! environment variables, each layer overriding the previous one.

use crate::core::error::{FilterError, FilterResult};
use crate::core::types::BackendApi;
use crate::execution::cache::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the kernel cache directory.
pub const ENV_CACHE_DIR: &str = "FILTERWORKS_CACHE_DIR";
/// Overrides the log level.
pub const ENV_LOG: &str = "FILTERWORKS_LOG";
/// Overrides the backend API (`opencl`, `metal` or `directx12`).
pub const ENV_BACKEND: &str = "FILTERWORKS_BACKEND";
/// Overrides the device index.
pub const ENV_DEVICE: &str = "FILTERWORKS_DEVICE";

/// Settings for opening a context and the logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendApi,
    pub device_id: u32,
    pub cache_dir: Option<PathBuf>,
    pub kernel_source_dir: Option<PathBuf>,
    pub program_cache_capacity: usize,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendApi::OpenCl,
            device_id: 0,
            cache_dir: None,
            kernel_source_dir: None,
            program_cache_capacity: DEFAULT_CAPACITY,
            log_level: "warn".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> FilterResult<Self> {
        toml::from_str(text)
            .map_err(|e| FilterError::InvalidParameter(format!("invalid configuration: {}", e)))
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> FilterResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| FilterError::io(path.display(), e))?;
        Self::from_toml_str(&text)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> FilterResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| FilterError::Internal(format!("serializing configuration: {}", e)))
    }

    /// Defaults, overridden by `path` when given, then by the environment.
    pub fn load(path: Option<&Path>) -> FilterResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Apply `FILTERWORKS_*` overrides from the process environment.
    pub fn apply_env(self) -> FilterResult<Self> {
        self.apply_overrides(read_var)
    }

    fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> FilterResult<Option<String>>,
    ) -> FilterResult<Self> {
        if let Some(dir) = lookup(ENV_CACHE_DIR)? {
            self.cache_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }
        if let Some(level) = lookup(ENV_LOG)? {
            self.log_level = level;
        }
        if let Some(raw) = lookup(ENV_BACKEND)? {
            self.backend = parse_backend(&raw)?;
        }
        if let Some(raw) = lookup(ENV_DEVICE)? {
            self.device_id = raw.parse().map_err(|_| {
                FilterError::InvalidParameter(format!(
                    "{} must be a device index, got '{}'",
                    ENV_DEVICE, raw
                ))
            })?;
        }
        Ok(self)
    }
}

fn read_var(key: &str) -> FilterResult<Option<String>> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(FilterError::InvalidParameter(format!(
            "failed to read {}: {}",
            key, e
        ))),
    }
}

/// Parse a backend name as written in configuration files.
pub fn parse_backend(raw: &str) -> FilterResult<BackendApi> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "opencl" | "cl" => Ok(BackendApi::OpenCl),
        "metal" => Ok(BackendApi::Metal),
        "directx12" | "dx12" | "d3d12" => Ok(BackendApi::DirectX12),
        other => Err(FilterError::InvalidParameter(format!(
            "unknown backend '{}', expected opencl, metal or directx12",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> FilterResult<Option<String>> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| Ok(map.get(key).cloned())
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            backend = "metal"
            cache_dir = "/tmp/fw-cache"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendApi::Metal);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/fw-cache")));
        assert_eq!(config.program_cache_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_toml() {
        let err = EngineConfig::from_toml_str("backend = \"vulkan\"").unwrap_err();
        assert_eq!(err.status(), crate::core::error::Status::InvalidParameter);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filterworks.toml");
        let config = EngineConfig {
            backend: BackendApi::DirectX12,
            device_id: 0,
            kernel_source_dir: Some(dir.path().join("kernels")),
            ..EngineConfig::default()
        };
        fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);

        let missing = EngineConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(missing.status(), crate::core::error::Status::IoError);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default()
            .apply_overrides(env_of(&[
                (ENV_CACHE_DIR, "/var/cache/fw"),
                (ENV_LOG, "debug"),
                (ENV_BACKEND, "DX12"),
                (ENV_DEVICE, "0"),
            ]))
            .unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/fw")));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backend, BackendApi::DirectX12);

        let cleared = config.apply_overrides(env_of(&[(ENV_CACHE_DIR, "")])).unwrap();
        assert!(cleared.cache_dir.is_none());
    }

    #[test]
    fn test_bad_env_values() {
        let err = EngineConfig::default()
            .apply_overrides(env_of(&[(ENV_DEVICE, "first")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_DEVICE));
        assert!(EngineConfig::default()
            .apply_overrides(env_of(&[(ENV_BACKEND, "vulkan")]))
            .is_err());
    }
}
