use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FLOOR_ANCHOR: &str = "first-floor-anchor";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Session negotiation and frame-loop settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Exclusive reality session when true, non-exclusive augmentation otherwise.
    pub create_virtual_reality: bool,
    pub start_presenting: bool,
    pub depth_near: f32,
    pub depth_far: f32,
    pub floor_anchor_name: String,
    /// Wait before requesting the session, for displays that publish their
    /// parameters late.
    pub session_request_delay_ms: u64,
    pub max_frames: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            create_virtual_reality: true,
            start_presenting: true,
            depth_near: 0.1,
            depth_far: 1000.0,
            floor_anchor_name: DEFAULT_FLOOR_ANCHOR.to_string(),
            session_request_delay_ms: 0,
            max_frames: 90,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.depth_near > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "depth_near must be positive, got {}",
                self.depth_near
            )));
        }
        if !(self.depth_far > self.depth_near) {
            return Err(ConfigError::Invalid(format!(
                "depth_far ({}) must exceed depth_near ({})",
                self.depth_far, self.depth_near
            )));
        }
        if self.floor_anchor_name.is_empty() {
            return Err(ConfigError::Invalid(
                "floor_anchor_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_request_delay(&self) -> Duration {
        Duration::from_millis(self.session_request_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_device_expectations() {
        let config = SessionConfig::default();
        assert!(config.create_virtual_reality);
        assert!(config.start_presenting);
        assert_eq!(config.depth_near, 0.1);
        assert_eq!(config.depth_far, 1000.0);
        assert_eq!(config.floor_anchor_name, "first-floor-anchor");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json_str(r#"{ "create_virtual_reality": false, "max_frames": 3 }"#)
                .expect("valid config");
        assert!(!config.create_virtual_reality);
        assert_eq!(config.max_frames, 3);
        assert_eq!(config.depth_far, 1000.0);
    }

    #[test]
    fn inverted_depth_range_is_rejected() {
        let err = SessionConfig::from_json_str(r#"{ "depth_near": 10.0, "depth_far": 1.0 }"#)
            .expect_err("depth range should be validated");
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("depth_far"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SessionConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "floor_anchor_name": "lobby", "session_request_delay_ms": 5 }}"#)
            .expect("write config");

        let config = SessionConfig::from_path(file.path()).expect("config loads");
        assert_eq!(config.floor_anchor_name, "lobby");
        assert_eq!(config.session_request_delay(), Duration::from_millis(5));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let err = SessionConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
