//! Daemon configuration with TOML file support.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! CLI flags and environment variables are applied on top by `main`.

use nexus_types::{PairingParams, VerificationParams};
use nexus_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shortest accepted upload signing secret, in bytes.
pub const MIN_SIGNING_SECRET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serializing configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NexusConfig {
    pub listen_addr: IpAddr,
    pub port: u16,
    /// LMDB environment lives in `{data_dir}/lmdb`.
    pub data_dir: PathBuf,
    pub map_size: usize,
    pub log_format: LogFormat,
    pub log_level: String,
    pub pairing: PairingParams,
    pub verification: VerificationParams,
    pub object_store: ObjectStoreConfig,
    pub providers: ProvidersConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub root: PathBuf,
    /// Base URL clients use to reach `PUT /objects/*key`.
    pub public_base_url: String,
    /// HMAC key for upload URLs. Normally supplied via `NEXUS_SIGNING_SECRET`
    /// and never written back out.
    #[serde(skip_serializing)]
    pub signing_secret: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ocr_url: String,
    pub biometrics_url: String,
    pub timeout_secs: u64,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 7080,
            data_dir: PathBuf::from("./nexus_data"),
            map_size: nexus_store_lmdb::DEFAULT_MAP_SIZE,
            log_format: LogFormat::Human,
            log_level: "info".to_string(),
            pairing: PairingParams::default(),
            verification: VerificationParams::default(),
            object_store: ObjectStoreConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./nexus_data/objects"),
            public_base_url: "http://127.0.0.1:7080".to_string(),
            signing_secret: None,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ocr_url: "http://127.0.0.1:7090".to_string(),
            biometrics_url: "http://127.0.0.1:7091".to_string(),
            timeout_secs: 15,
        }
    }
}

impl NexusConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.port)
    }

    pub fn lmdb_dir(&self) -> PathBuf {
        self.data_dir.join("lmdb")
    }

    /// Reject combinations the engines would misbehave with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.verification;
        if !(0.0..=100.0).contains(&v.review_threshold)
            || !(0.0..=100.0).contains(&v.verified_threshold)
        {
            return Err(ConfigError::Invalid(
                "similarity thresholds must lie within 0..=100".into(),
            ));
        }
        if v.review_threshold > v.verified_threshold {
            return Err(ConfigError::Invalid(format!(
                "review threshold {} is above verified threshold {}",
                v.review_threshold, v.verified_threshold
            )));
        }
        if self.providers.timeout_secs == 0 {
            return Err(ConfigError::Invalid("providers.timeout_secs must be non-zero".into()));
        }
        if self.object_store.public_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("object_store.public_base_url is empty".into()));
        }
        match &self.object_store.signing_secret {
            Some(secret) if secret.len() >= MIN_SIGNING_SECRET_LEN => Ok(()),
            Some(_) => Err(ConfigError::Invalid(format!(
                "signing secret must be at least {MIN_SIGNING_SECRET_LEN} bytes"
            ))),
            None => Err(ConfigError::Invalid(
                "no upload signing secret (set NEXUS_SIGNING_SECRET)".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret(mut config: NexusConfig) -> NexusConfig {
        config.object_store.signing_secret = Some("0123456789abcdef-secret".into());
        config
    }

    #[test]
    fn empty_toml_is_the_default() {
        let config = NexusConfig::from_toml_str("").unwrap();
        assert_eq!(config, NexusConfig::default());
        assert_eq!(config.pairing.step_secs, 30);
        assert_eq!(config.verification.review_threshold, 80.0);
    }

    #[test]
    fn partial_sections_override_only_their_fields() {
        let config = NexusConfig::from_toml_str(
            r#"
            port = 9000
            log_format = "json"

            [pairing]
            skew_steps = 2

            [verification]
            upload_ttl_secs = 120

            [providers]
            ocr_url = "http://ocr.internal"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.pairing.skew_steps, 2);
        assert_eq!(config.pairing.digits, 6);
        assert_eq!(config.verification.effective_upload_ttl(), 120);
        assert_eq!(config.providers.ocr_url, "http://ocr.internal");
        assert_eq!(config.providers.timeout_secs, 15);
    }

    #[test]
    fn secret_is_never_serialized() {
        let config = with_secret(NexusConfig::default());
        let text = config.to_toml_string().unwrap();
        assert!(!text.contains("0123456789abcdef"));
        let back = NexusConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.object_store.signing_secret, None);
    }

    #[test]
    fn validation_catches_bad_thresholds_and_missing_secret() {
        assert!(with_secret(NexusConfig::default()).validate().is_ok());
        assert!(matches!(
            NexusConfig::default().validate(),
            Err(ConfigError::Invalid(_))
        ));

        let mut inverted = with_secret(NexusConfig::default());
        inverted.verification.review_threshold = 95.0;
        assert!(inverted.validate().is_err());

        let mut short = NexusConfig::default();
        short.object_store.signing_secret = Some("short".into());
        assert!(short.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NexusConfig::from_toml_file(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn unknown_log_format_is_a_parse_error() {
        assert!(matches!(
            NexusConfig::from_toml_str(r#"log_format = "xml""#),
            Err(ConfigError::Parse(_))
        ));
    }
}
