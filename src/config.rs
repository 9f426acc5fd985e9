use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::cluster::DEFAULT_THRESHOLD;
use crate::inference::{DEFAULT_UPLOAD_FIELD, MAX_UPLOAD_BYTES};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/upload";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct TreecountConfigFile {
    endpoint: Option<String>,
    threshold: Option<f64>,
    upload: Option<UploadConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadConfigFile {
    field: Option<String>,
    timeout_secs: Option<u64>,
    max_bytes: Option<usize>,
}

/// Runtime configuration: JSON config file named by `TREECOUNT_CONFIG`,
/// then environment overrides, then validation.
#[derive(Debug, Clone)]
pub struct TreecountConfig {
    pub endpoint: String,
    pub threshold: f64,
    pub upload_field: String,
    pub timeout: Duration,
    pub max_upload_bytes: usize,
}

impl TreecountConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TREECOUNT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TreecountConfigFile) -> Self {
        let endpoint = file
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let threshold = file.threshold.unwrap_or(DEFAULT_THRESHOLD);
        let upload_field = file
            .upload
            .as_ref()
            .and_then(|upload| upload.field.clone())
            .unwrap_or_else(|| DEFAULT_UPLOAD_FIELD.to_string());
        let timeout = Duration::from_secs(
            file.upload
                .as_ref()
                .and_then(|upload| upload.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        let max_upload_bytes = file
            .upload
            .and_then(|upload| upload.max_bytes)
            .unwrap_or(MAX_UPLOAD_BYTES);
        Self {
            endpoint,
            threshold,
            upload_field,
            timeout,
            max_upload_bytes,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("TREECOUNT_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(threshold) = std::env::var("TREECOUNT_THRESHOLD") {
            if !threshold.trim().is_empty() {
                self.threshold = threshold
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("TREECOUNT_THRESHOLD must be a number of pixels"))?;
            }
        }
        if let Ok(timeout) = std::env::var("TREECOUNT_TIMEOUT_SECS") {
            if !timeout.trim().is_empty() {
                let seconds: u64 = timeout.trim().parse().map_err(|_| {
                    anyhow!("TREECOUNT_TIMEOUT_SECS must be an integer number of seconds")
                })?;
                self.timeout = Duration::from_secs(seconds);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", self.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "endpoint scheme must be http(s), got '{}'",
                endpoint.scheme()
            ));
        }
        if !self.threshold.is_finite() {
            return Err(anyhow!("threshold must be finite"));
        }
        if self.timeout.as_secs() == 0 {
            return Err(anyhow!("upload timeout must be greater than zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("upload max_bytes must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TreecountConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}
