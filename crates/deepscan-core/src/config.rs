//! Configuration module
//!
//! Client configuration is read from `DEEPSCAN_*` environment variables (a
//! `.env` file is honoured) with typed defaults.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::validation::{AcceptPolicy, UploadPolicy, MAX_UPLOAD_SIZE_BYTES};

// Common constants
const API_URL: &str = "http://localhost:8000";
const MAX_FILE_SIZE_MB: u64 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const ANALYSIS_TIMEOUT_SECS: u64 = 300;
const MOCK_STEP_DELAY_MS: u64 = 200;
const MOCK_PROCESSING_DELAY_MS: u64 = 1500;

/// Analysis backend types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process simulation with an in-memory history
    #[default]
    Mock,
    /// Remote prediction service over HTTP
    Http,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "http" => Ok(Backend::Http),
            _ => Err(anyhow::anyhow!("Invalid analysis backend: {}", s)),
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Backend::Mock => write!(f, "mock"),
            Backend::Http => write!(f, "http"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub backend: Backend,
    pub accept: AcceptPolicy,
    pub max_file_size_bytes: u64,
    pub request_timeout_secs: u64,
    /// Upper bound for a whole analysis, upload included. 0 = no limit.
    pub analysis_timeout_secs: u64,
    pub mock_step_delay_ms: u64,
    pub mock_processing_delay_ms: u64,
    /// Seed the in-memory history with sample analyses (mock backend only).
    pub seed_history: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            backend: Backend::Mock,
            accept: AcceptPolicy::Media,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            analysis_timeout_secs: ANALYSIS_TIMEOUT_SECS,
            mock_step_delay_ms: MOCK_STEP_DELAY_MS,
            mock_processing_delay_ms: MOCK_PROCESSING_DELAY_MS,
            seed_history: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let backend = match env::var("DEEPSCAN_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => Backend::Mock,
        };

        let accept = match env::var("DEEPSCAN_ACCEPT") {
            Ok(value) => value.parse()?,
            Err(_) => AcceptPolicy::Media,
        };

        let max_file_size_mb = env::var("DEEPSCAN_MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let config = ClientConfig {
            api_url: env::var("DEEPSCAN_API_URL")
                .unwrap_or_else(|_| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            backend,
            accept,
            max_file_size_bytes: megabytes_to_bytes(max_file_size_mb)?,
            request_timeout_secs: env::var("DEEPSCAN_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            analysis_timeout_secs: env::var("DEEPSCAN_ANALYSIS_TIMEOUT_SECS")
                .unwrap_or_else(|_| ANALYSIS_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(ANALYSIS_TIMEOUT_SECS),
            mock_step_delay_ms: env::var("DEEPSCAN_MOCK_STEP_DELAY_MS")
                .unwrap_or_else(|_| MOCK_STEP_DELAY_MS.to_string())
                .parse()
                .unwrap_or(MOCK_STEP_DELAY_MS),
            mock_processing_delay_ms: env::var("DEEPSCAN_MOCK_PROCESSING_DELAY_MS")
                .unwrap_or_else(|_| MOCK_PROCESSING_DELAY_MS.to_string())
                .parse()
                .unwrap_or(MOCK_PROCESSING_DELAY_MS),
            seed_history: env::var("DEEPSCAN_SEED_HISTORY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.backend == Backend::Http
            && !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://"))
        {
            return Err(anyhow::anyhow!(
                "DEEPSCAN_API_URL must be an http(s) URL when using the http backend"
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "DEEPSCAN_MAX_FILE_SIZE_MB must be greater than zero"
            ));
        }

        if self.max_file_size_bytes > MAX_UPLOAD_SIZE_BYTES {
            return Err(anyhow::anyhow!(
                "DEEPSCAN_MAX_FILE_SIZE_MB must not exceed {}",
                MAX_FILE_SIZE_MB
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "DEEPSCAN_REQUEST_TIMEOUT_SECS must be greater than zero"
            ));
        }

        Ok(())
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::new(self.accept, self.max_file_size_bytes)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Option<Duration> {
        match self.analysis_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn mock_step_delay(&self) -> Duration {
        Duration::from_millis(self.mock_step_delay_ms)
    }

    pub fn mock_processing_delay(&self) -> Duration {
        Duration::from_millis(self.mock_processing_delay_ms)
    }
}

fn megabytes_to_bytes(megabytes: u64) -> Result<u64, anyhow::Error> {
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("DEEPSCAN_MAX_FILE_SIZE_MB is too large: {}", megabytes))
}
