//! Configuration for the face comparison pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SimilarityError;

/// Environment variable naming the rotation/preprocessing service URL.
pub const PRE_PROCESS_URL: &str = "PRE_PROCESS_URL";
/// Environment variable naming the face detection service URL.
pub const FACE_DETECT_URL: &str = "FACE_DETECT_URL";
/// Environment variable naming the face encoding service URL.
pub const FACE_ENCODING_URL: &str = "FACE_ENCODING_URL";
/// Environment variable naming the proxy scheme for non-loopback endpoints.
pub const SCHEMES: &str = "SCHEMES";

/// Main configuration for the comparison pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// HTTP client tuning
    #[serde(default)]
    pub http: HttpConfig,

    /// Outbound proxy selection
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Tokio worker threads (null = num CPUs)
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

/// Remote service endpoints.
///
/// All three are required before a comparison can run; a missing entry is
/// reported per-call as [`SimilarityError::ConfigurationMissing`] rather
/// than at startup, so failure handling stays uniform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Rotation/preprocessing service (image/rotate-by-angle)
    #[serde(default)]
    pub rotate_url: Option<String>,

    /// Face detection service (image/face-detect)
    #[serde(default)]
    pub detect_url: Option<String>,

    /// Face encoding service (image/face-encoding)
    #[serde(default)]
    pub encoding_url: Option<String>,
}

impl EndpointConfig {
    /// Rotation service URL, or the configuration error naming its variable.
    pub fn rotate(&self) -> Result<&str, SimilarityError> {
        require(self.rotate_url.as_deref(), PRE_PROCESS_URL)
    }

    /// Detection service URL, or the configuration error naming its variable.
    pub fn detect(&self) -> Result<&str, SimilarityError> {
        require(self.detect_url.as_deref(), FACE_DETECT_URL)
    }

    /// Encoding service URL, or the configuration error naming its variable.
    pub fn encoding(&self) -> Result<&str, SimilarityError> {
        require(self.encoding_url.as_deref(), FACE_ENCODING_URL)
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, SimilarityError> {
    value.ok_or_else(|| {
        tracing::info!("{} > not found", name);
        SimilarityError::ConfigurationMissing {
            name: name.to_string(),
        }
    })
}

/// HTTP client tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout in seconds (covers the whole request; there is no
    /// aggregate deadline across a round or the pipeline)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum idle pooled connections per host
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
        }
    }
}

/// Outbound proxy selection for non-loopback endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Scheme name selecting the `<scheme>_proxy` environment entry
    /// (e.g. "http" or "https"). Loopback endpoints never use it.
    #[serde(default)]
    pub scheme: Option<String>,
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // YAML is a superset of JSON
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from the process environment.
    ///
    /// Reads `PRE_PROCESS_URL`, `FACE_DETECT_URL`, `FACE_ENCODING_URL` and
    /// `SCHEMES`. Absent entries stay unset and surface per-call.
    pub fn from_env() -> Self {
        Self {
            endpoints: EndpointConfig {
                rotate_url: std::env::var(PRE_PROCESS_URL).ok(),
                detect_url: std::env::var(FACE_DETECT_URL).ok(),
                encoding_url: std::env::var(FACE_ENCODING_URL).ok(),
            },
            http: HttpConfig::default(),
            proxy: ProxyConfig {
                scheme: std::env::var(SCHEMES).ok(),
            },
            worker_threads: None,
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    ///
    /// Endpoint presence is deliberately not checked here (per-call concern);
    /// this rejects values that can never work.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            (PRE_PROCESS_URL, &self.endpoints.rotate_url),
            (FACE_DETECT_URL, &self.endpoints.detect_url),
            (FACE_ENCODING_URL, &self.endpoints.encoding_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("{} must be an http(s) URL, got '{}'", name, url);
                }
            }
        }
        if self.http.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be > 0");
        }
        if self.http.connect_timeout_secs == 0 {
            anyhow::bail!("Connect timeout must be > 0");
        }
        if self.http.pool_max_idle_per_host == 0 {
            anyhow::bail!("Connection pool size must be > 0");
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_pool_max_idle_per_host() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_endpoints() -> Config {
        Config {
            endpoints: EndpointConfig {
                rotate_url: Some("http://rotate.local/image/rotate-by-angle".to_string()),
                detect_url: Some("http://detect.local/image/face-detect".to_string()),
                encoding_url: Some("http://encode.local/image/face-encoding".to_string()),
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.request_timeout_secs, 30);
        assert_eq!(config.http.connect_timeout_secs, 5);
        assert_eq!(config.http.pool_max_idle_per_host, 32);
        assert!(config.endpoints.rotate_url.is_none());
        assert!(config.proxy.scheme.is_none());
    }

    #[test]
    fn test_endpoint_accessors() {
        let config = config_with_endpoints();
        assert!(config.endpoints.rotate().is_ok());
        assert!(config.endpoints.detect().is_ok());
        assert!(config.endpoints.encoding().is_ok());
    }

    #[test]
    fn test_missing_endpoint_names_the_variable() {
        let config = Config::default();
        match config.endpoints.detect() {
            Err(SimilarityError::ConfigurationMissing { name }) => {
                assert_eq!(name, FACE_DETECT_URL);
            }
            other => panic!("expected ConfigurationMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
endpoints:
  rotate_url: "http://127.0.0.1:9001/image/rotate-by-angle"
  detect_url: "http://127.0.0.1:9002/image/face-detect"
  encoding_url: "http://127.0.0.1:9003/image/face-encoding"
http:
  request_timeout_secs: 10
proxy:
  scheme: "http"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.endpoints.rotate().unwrap(),
            "http://127.0.0.1:9001/image/rotate-by-angle"
        );
        assert_eq!(config.http.request_timeout_secs, 10);
        // Unspecified fields fall back to defaults
        assert_eq!(config.http.connect_timeout_secs, 5);
        assert_eq!(config.proxy.scheme.as_deref(), Some("http"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = config_with_endpoints();
        let yaml = config.to_yaml().unwrap();
        let restored = Config::from_yaml(&yaml).unwrap();
        assert_eq!(restored.endpoints.rotate_url, config.endpoints.rotate_url);
        assert_eq!(
            restored.http.request_timeout_secs,
            config.http.request_timeout_secs
        );
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"endpoints": {"detect_url": "http://127.0.0.1:9002/detect"}}"#,
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.endpoints.detect().unwrap(),
            "http://127.0.0.1:9002/detect"
        );
        assert!(config.endpoints.rotate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_http_url() {
        let mut config = config_with_endpoints();
        config.endpoints.detect_url = Some("ftp://detect.local".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = config_with_endpoints();
        config.http.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_unset_endpoints() {
        // Presence is a per-call concern, not a validation failure.
        assert!(Config::default().validate().is_ok());
    }
}
