use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::chunk::DEFAULT_CHUNK_SIZE;

/// Default upper bound on the number of threads serializing chunks of one tensor.
pub const DEFAULT_MAX_SERIALIZER_THREADS: usize = 16;

static GLOBAL: RwLock<SerializationConfig> = RwLock::new(SerializationConfig::new());

/// Configuration IO error.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Invalid format.
    #[error("Config error => Invalid format: {0}")]
    InvalidFormat(String),

    /// File not found.
    #[error("Config error => File not found: {0}")]
    FileNotFound(String),
}

/// Process-wide serialization settings.
///
/// Fields missing from a loaded file keep their default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationConfig {
    /// Number of elements per chunk when the caller asks for the default chunk size.
    pub chunk_size: usize,
    /// Upper bound on the worker threads used to serialize the chunks of one tensor.
    pub max_serializer_threads: usize,
    /// Store half-precision floats as raw bytes instead of int32 holders.
    pub fp16_as_bytes: bool,
    /// Store every narrow type eligible for it as raw bytes instead of int32 holders.
    pub bytes_as_holder: bool,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializationConfig {
    /// The default configuration.
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_serializer_threads: DEFAULT_MAX_SERIALIZER_THREADS,
            fp16_as_bytes: false,
            bytes_as_holder: false,
        }
    }

    /// Sets the default chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the worker thread bound.
    pub fn with_max_serializer_threads(mut self, max_serializer_threads: usize) -> Self {
        self.max_serializer_threads = max_serializer_threads;
        self
    }

    /// Sets whether half-precision floats are stored as raw bytes.
    pub fn with_fp16_as_bytes(mut self, fp16_as_bytes: bool) -> Self {
        self.fp16_as_bytes = fp16_as_bytes;
        self
    }

    /// Sets whether narrow types are stored as raw bytes.
    pub fn with_bytes_as_holder(mut self, bytes_as_holder: bool) -> Self {
        self.bytes_as_holder = bytes_as_holder;
        self
    }

    /// A copy of the process-wide configuration.
    pub fn global() -> Self {
        *GLOBAL.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the process-wide configuration, returning the previous one.
    pub fn set_global(config: Self) -> Self {
        let mut global = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Setting serialization config {config:?}");
        core::mem::replace(&mut *global, config)
    }

    /// Converts the configuration to a JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|err| ConfigError::InvalidFormat(format!("{err}")))
    }

    /// Saves the configuration to a file.
    pub fn save<P: AsRef<std::path::Path>>(&self, file: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(file, json)
    }

    /// Loads the configuration from a file.
    pub fn load<P: AsRef<std::path::Path>>(file: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(file.as_ref())
            .map_err(|_| ConfigError::FileNotFound(file.as_ref().to_string_lossy().to_string()))?;
        Self::from_json(&content)
    }

    /// Loads the configuration from a binary buffer.
    pub fn load_binary(data: &[u8]) -> Result<Self, ConfigError> {
        let content = core::str::from_utf8(data).map_err(|_| {
            ConfigError::InvalidFormat("Could not parse data as utf-8.".to_string())
        })?;
        Self::from_json(content)
    }

    fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|err| ConfigError::InvalidFormat(format!("{err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults() {
        let config = SerializationConfig::default();

        assert_eq!(config.chunk_size, 1_000_000);
        assert_eq!(config.max_serializer_threads, 16);
        assert!(!config.fp16_as_bytes);
        assert!(!config.bytes_as_holder);
    }

    #[test]
    fn json_roundtrip() {
        let config = SerializationConfig::new()
            .with_chunk_size(64)
            .with_bytes_as_holder(true);
        let json = config.to_json().unwrap();

        assert_eq!(SerializationConfig::load_binary(json.as_bytes()).unwrap(), config);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = SerializationConfig::load_binary(br#"{ "fp16_as_bytes": true }"#).unwrap();

        assert_eq!(config, SerializationConfig::new().with_fp16_as_bytes(true));
    }

    #[test]
    fn invalid_content_is_reported() {
        assert!(matches!(
            SerializationConfig::load_binary(&[0xff, 0xfe]),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(matches!(
            SerializationConfig::load_binary(b"[1, 2]"),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir().join(format!(
            "tensorblob-config-{}.json",
            std::process::id()
        ));
        let config = SerializationConfig::new().with_max_serializer_threads(3);

        config.save(&path).unwrap();
        let loaded = SerializationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(matches!(
            SerializationConfig::load(&path),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    #[serial]
    fn global_can_be_replaced() {
        let custom = SerializationConfig::new().with_chunk_size(7);
        let previous = SerializationConfig::set_global(custom);

        assert_eq!(SerializationConfig::global().chunk_size, 7);

        SerializationConfig::set_global(previous);
        assert_eq!(SerializationConfig::global(), previous);
    }
}
