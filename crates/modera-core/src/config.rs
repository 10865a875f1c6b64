//! Configuration module
//!
//! All settings come from the environment (optionally seeded from a `.env`
//! file). `Config::validate` is called once at startup so misconfiguration
//! fails fast instead of surfacing mid-workflow.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::models::Branch;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const URL_EXPIRATION_SECS: u64 = 300;
const TEXT_MIN_CONFIDENCE: f32 = 0.5;
const IMAGE_MIN_CONFIDENCE: f32 = 0.7;
const VIDEO_MIN_CONFIDENCE: f32 = 0.7;
const VIDEO_POLL_INTERVAL_SECS: u64 = 5;
const VIDEO_JOB_TIMEOUT_SECS: u64 = 600;
const BACKEND_MAX_ATTEMPTS: u32 = 3;
const WORKFLOW_TIMEOUT_SECS: u64 = 900;
const MAX_CONCURRENT_WORKFLOWS: usize = 16;
const SINK_MAX_ATTEMPTS: u32 = 3;
const SEVERE_THRESHOLD: f32 = 0.8;
const MODERATE_THRESHOLD: f32 = 0.7;
const SEVERE_LABELS: &str = "HATE_SPEECH,VIOLENCE_OR_THREAT";

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}

/// How the decision aggregator turns a branch's findings into a status.
///
/// `Tiered` applies severe/moderate thresholds (pass/review/fail);
/// `AnyFinding` fails on the presence of any finding at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
    Tiered,
    AnyFinding,
}

impl FromStr for BranchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiered" => Ok(BranchPolicy::Tiered),
            "any_finding" | "any-finding" | "legacy" => Ok(BranchPolicy::AnyFinding),
            _ => Err(anyhow::anyhow!("Invalid branch policy: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    /// `json` for structured logs, anything else for human-readable
    pub log_format: String,
}

impl ServerConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub aws_region: Option<String>,
    pub upload_bucket: String,
    pub results_bucket: String,
    /// Custom endpoint for S3-compatible providers (MinIO, LocalStack)
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub url_expiration_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Without a URL verdicts are only written to the results bucket
    pub url: Option<String>,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub text_language_code: String,
    pub text_min_confidence: f32,
    pub image_min_confidence: f32,
    pub video_min_confidence: f32,
    pub video_poll_interval_secs: u64,
    pub video_job_timeout_secs: u64,
    pub backend_max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub sink_max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct AggregationConfig {
    pub severe_threshold: f32,
    pub moderate_threshold: f32,
    pub severe_labels: Vec<String>,
    pub text_policy: BranchPolicy,
    pub image_policy: BranchPolicy,
    pub video_policy: BranchPolicy,
}

impl AggregationConfig {
    pub fn policy_for(&self, branch: Branch) -> BranchPolicy {
        match branch {
            Branch::Text => self.text_policy,
            Branch::Image => self.image_policy,
            Branch::Video => self.video_policy,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            severe_threshold: SEVERE_THRESHOLD,
            moderate_threshold: MODERATE_THRESHOLD,
            severe_labels: split_list(SEVERE_LABELS),
            text_policy: BranchPolicy::Tiered,
            image_policy: BranchPolicy::AnyFinding,
            video_policy: BranchPolicy::AnyFinding,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            text_language_code: "en".to_string(),
            text_min_confidence: TEXT_MIN_CONFIDENCE,
            image_min_confidence: IMAGE_MIN_CONFIDENCE,
            video_min_confidence: VIDEO_MIN_CONFIDENCE,
            video_poll_interval_secs: VIDEO_POLL_INTERVAL_SECS,
            video_job_timeout_secs: VIDEO_JOB_TIMEOUT_SECS,
            backend_max_attempts: BACKEND_MAX_ATTEMPTS,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            timeout_secs: WORKFLOW_TIMEOUT_SECS,
            max_concurrent: MAX_CONCURRENT_WORKFLOWS,
            sink_max_attempts: SINK_MAX_ATTEMPTS,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub classifiers: ClassifierConfig,
    pub workflow: WorkflowConfig,
    pub aggregation: AggregationConfig,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T, anyhow::Error> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (the process
    /// environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server = ServerConfig {
            port: parse_or(get("SERVER_PORT").or_else(|| get("PORT")), "SERVER_PORT", SERVER_PORT)?,
            environment: get("ENVIRONMENT")
                .or_else(|| get("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            log_format: get("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
        };

        let storage = StorageConfig {
            backend: parse_or(get("STORAGE_BACKEND"), "STORAGE_BACKEND", StorageBackend::S3)?,
            aws_region: get("AWS_REGION").or_else(|| get("S3_REGION")),
            upload_bucket: get("UPLOAD_BUCKET")
                .unwrap_or_else(|| "content-moderation-input".to_string()),
            results_bucket: get("RESULTS_BUCKET")
                .unwrap_or_else(|| "content-moderation-results".to_string()),
            s3_endpoint: get("S3_ENDPOINT"),
            local_storage_path: get("LOCAL_STORAGE_PATH"),
            url_expiration_secs: parse_or(
                get("URL_EXPIRATION_SECS").or_else(|| get("URL_EXPIRATION")),
                "URL_EXPIRATION_SECS",
                URL_EXPIRATION_SECS,
            )?,
        };

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            timeout_seconds: parse_or(
                get("DB_TIMEOUT_SECONDS"),
                "DB_TIMEOUT_SECONDS",
                CONNECTION_TIMEOUT_SECS,
            )?,
        };

        let classifiers = ClassifierConfig {
            text_language_code: get("TEXT_LANGUAGE_CODE").unwrap_or_else(|| "en".to_string()),
            text_min_confidence: parse_or(
                get("TEXT_MIN_CONFIDENCE"),
                "TEXT_MIN_CONFIDENCE",
                TEXT_MIN_CONFIDENCE,
            )?,
            image_min_confidence: parse_or(
                get("IMAGE_MIN_CONFIDENCE"),
                "IMAGE_MIN_CONFIDENCE",
                IMAGE_MIN_CONFIDENCE,
            )?,
            video_min_confidence: parse_or(
                get("VIDEO_MIN_CONFIDENCE"),
                "VIDEO_MIN_CONFIDENCE",
                VIDEO_MIN_CONFIDENCE,
            )?,
            video_poll_interval_secs: parse_or(
                get("VIDEO_POLL_INTERVAL_SECS"),
                "VIDEO_POLL_INTERVAL_SECS",
                VIDEO_POLL_INTERVAL_SECS,
            )?,
            video_job_timeout_secs: parse_or(
                get("VIDEO_JOB_TIMEOUT_SECS"),
                "VIDEO_JOB_TIMEOUT_SECS",
                VIDEO_JOB_TIMEOUT_SECS,
            )?,
            backend_max_attempts: parse_or(
                get("BACKEND_MAX_ATTEMPTS"),
                "BACKEND_MAX_ATTEMPTS",
                BACKEND_MAX_ATTEMPTS,
            )?,
        };

        let workflow = WorkflowConfig {
            timeout_secs: parse_or(
                get("WORKFLOW_TIMEOUT_SECS"),
                "WORKFLOW_TIMEOUT_SECS",
                WORKFLOW_TIMEOUT_SECS,
            )?,
            max_concurrent: parse_or(
                get("MAX_CONCURRENT_WORKFLOWS"),
                "MAX_CONCURRENT_WORKFLOWS",
                MAX_CONCURRENT_WORKFLOWS,
            )?,
            sink_max_attempts: parse_or(get("SINK_MAX_ATTEMPTS"), "SINK_MAX_ATTEMPTS", SINK_MAX_ATTEMPTS)?,
        };

        let defaults = AggregationConfig::default();
        let aggregation = AggregationConfig {
            severe_threshold: parse_or(get("SEVERE_THRESHOLD"), "SEVERE_THRESHOLD", SEVERE_THRESHOLD)?,
            moderate_threshold: parse_or(
                get("MODERATE_THRESHOLD"),
                "MODERATE_THRESHOLD",
                MODERATE_THRESHOLD,
            )?,
            severe_labels: get("SEVERE_LABELS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.severe_labels),
            text_policy: parse_or(get("TEXT_POLICY"), "TEXT_POLICY", defaults.text_policy)?,
            image_policy: parse_or(get("IMAGE_POLICY"), "IMAGE_POLICY", defaults.image_policy)?,
            video_policy: parse_or(get("VIDEO_POLICY"), "VIDEO_POLICY", defaults.video_policy)?,
        };

        Ok(Config {
            server,
            storage,
            database,
            classifiers,
            workflow,
            aggregation,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let unit = |name: &str, value: f32| {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
            }
            Ok(())
        };

        unit("SEVERE_THRESHOLD", self.aggregation.severe_threshold)?;
        unit("MODERATE_THRESHOLD", self.aggregation.moderate_threshold)?;
        unit("TEXT_MIN_CONFIDENCE", self.classifiers.text_min_confidence)?;
        unit("IMAGE_MIN_CONFIDENCE", self.classifiers.image_min_confidence)?;
        unit("VIDEO_MIN_CONFIDENCE", self.classifiers.video_min_confidence)?;

        if self.aggregation.moderate_threshold > self.aggregation.severe_threshold {
            anyhow::bail!(
                "MODERATE_THRESHOLD ({}) must not exceed SEVERE_THRESHOLD ({})",
                self.aggregation.moderate_threshold,
                self.aggregation.severe_threshold
            );
        }

        if self.classifiers.video_poll_interval_secs == 0 {
            anyhow::bail!("VIDEO_POLL_INTERVAL_SECS must be greater than 0");
        }
        if self.classifiers.video_poll_interval_secs >= self.classifiers.video_job_timeout_secs {
            anyhow::bail!("VIDEO_POLL_INTERVAL_SECS must be shorter than VIDEO_JOB_TIMEOUT_SECS");
        }
        if self.classifiers.backend_max_attempts == 0 {
            anyhow::bail!("BACKEND_MAX_ATTEMPTS must be at least 1");
        }
        if self.workflow.timeout_secs == 0 {
            anyhow::bail!("WORKFLOW_TIMEOUT_SECS must be greater than 0");
        }
        if self.workflow.max_concurrent == 0 {
            anyhow::bail!("MAX_CONCURRENT_WORKFLOWS must be at least 1");
        }
        if self.workflow.sink_max_attempts == 0 {
            anyhow::bail!("SINK_MAX_ATTEMPTS must be at least 1");
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.results_bucket.trim().is_empty() {
                    anyhow::bail!("RESULTS_BUCKET must be set for the s3 storage backend");
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    anyhow::bail!("LOCAL_STORAGE_PATH must be set for the local storage backend");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(!config.server.json_logs());
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.url_expiration_secs, 300);
        assert_eq!(config.classifiers.video_poll_interval_secs, 5);
        assert!((config.classifiers.image_min_confidence - 0.7).abs() < f32::EPSILON);
        assert!((config.aggregation.severe_threshold - 0.8).abs() < f32::EPSILON);
        assert!((config.aggregation.moderate_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(
            config.aggregation.severe_labels,
            vec!["HATE_SPEECH".to_string(), "VIOLENCE_OR_THREAT".to_string()]
        );
        assert_eq!(config.aggregation.policy_for(Branch::Text), BranchPolicy::Tiered);
        assert_eq!(config.aggregation.policy_for(Branch::Image), BranchPolicy::AnyFinding);
        assert!(config.database.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SERVER_PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("IMAGE_POLICY", "tiered"),
            ("SEVERE_LABELS", "HATE_SPEECH, GRAPHIC ,"),
            ("WORKFLOW_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 8081);
        assert!(config.server.json_logs());
        assert_eq!(config.aggregation.image_policy, BranchPolicy::Tiered);
        assert_eq!(
            config.aggregation.severe_labels,
            vec!["HATE_SPEECH".to_string(), "GRAPHIC".to_string()]
        );
        assert_eq!(config.workflow.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = config_from(&[("SEVERE_THRESHOLD", "high")]).unwrap_err();
        assert!(err.to_string().contains("SEVERE_THRESHOLD"));
    }

    #[test]
    fn test_validate_threshold_order() {
        let config = config_from(&[("SEVERE_THRESHOLD", "0.6"), ("MODERATE_THRESHOLD", "0.7")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MODERATE_THRESHOLD"));
    }

    #[test]
    fn test_validate_poll_interval_shorter_than_timeout() {
        let config = config_from(&[
            ("VIDEO_POLL_INTERVAL_SECS", "60"),
            ("VIDEO_JOB_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_backend_requires_path() {
        let config = config_from(&[("STORAGE_BACKEND", "local")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/modera"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }
}
