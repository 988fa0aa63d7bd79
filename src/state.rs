//! Application state
//!
//! Configuration is read from the environment once at startup into
//! [`AppConfig`] and handed to every component; nothing reads env vars later.

use crate::access_pipeline::AccessEventPipeline;
use crate::actuation_channel::ActuationChannel;
use crate::error::{Error, Result};
use crate::identity_resolver::FaceMatcher;
use crate::labeling_pipeline::LabelingPipeline;
use crate::notifier::NotificationSink;
use crate::object_store::ObjectStore;
use crate::rate_limiter::RateLimitStore;
use crate::second_factor::{AuthorizationFunction, FunctionRef, SecondFactorConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Bucket holding intake and classified artifacts
    pub bucket_name: String,
    /// Directory the filesystem object store lives under
    pub storage_root: PathBuf,
    /// Base URL the bucket is publicly served from
    pub public_base_url: String,
    /// Topic the door controller subscribes to
    pub iot_topic: String,
    /// Command-publish endpoint
    pub actuation_url: String,
    /// Chat incoming-webhook URL
    pub teams_webhook: String,
    /// Face matcher base URL
    pub face_matcher_url: String,
    /// Face collection id
    pub collection_id: String,
    /// Grace window for open events; rate limiting is off when unset
    pub open_rate_seconds: Option<i64>,
    /// MySQL URL for the rate-limit store; in-process store when unset
    pub database_url: Option<String>,
    /// Rate-limit table name
    pub rate_limit_table: String,
    /// Second-factor gate; off when unset
    pub second_factor: Option<SecondFactorConfig>,
    /// Target of the triage card's label / discard actions
    pub train_url: String,
    /// Keep discarded artifacts under `discarded/` instead of only deleting them
    pub archive_discarded: bool,
    /// Username published by the manual open trigger
    pub trigger_username: String,
    /// Shared secret the manual trigger must present; trigger disabled when unset
    pub trigger_token: Option<String>,
}

impl AppConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", p)))?,
            None => 8080,
        };

        let open_rate_seconds = match get("OPEN_RATE_SECONDS") {
            Some(v) => {
                let secs: i64 = v.parse().map_err(|_| {
                    Error::Config(format!("OPEN_RATE_SECONDS is not an integer: {}", v))
                })?;
                if secs < 0 {
                    return Err(Error::Config(format!(
                        "OPEN_RATE_SECONDS must not be negative: {}",
                        secs
                    )));
                }
                Some(secs)
            }
            None => None,
        };

        let rate_limit_table = get("RATE_LIMIT_TABLE").unwrap_or_else(|| "rate_limits".to_string());
        if !rate_limit_table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(format!(
                "RATE_LIMIT_TABLE must be a plain identifier: {}",
                rate_limit_table
            )));
        }

        let second_factor = match get("MFA_ARN") {
            Some(arn) => Some(SecondFactorConfig {
                function: arn.parse::<FunctionRef>()?,
                endpoint: get("MFA_ENDPOINT"),
                users: parse_user_map(get("MFA_USERS").as_deref().unwrap_or(""))?,
            }),
            None => None,
        };

        let archive_discarded = match get("ARCHIVE_DISCARDED") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| Error::Config(format!("ARCHIVE_DISCARDED is not a bool: {}", v)))?,
            None => false,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            bucket_name: get("BUCKET_NAME").unwrap_or_else(|| "concierge".to_string()),
            storage_root: get("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/var/lib/concierge/buckets")),
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "https://s3.amazonaws.com".to_string()),
            iot_topic: get("IOT_TOPIC").unwrap_or_else(|| "doorman".to_string()),
            actuation_url: get("ACTUATION_URL")
                .unwrap_or_else(|| "http://localhost:8443".to_string()),
            teams_webhook: get("TEAMS_WEBHOOK")
                .unwrap_or_else(|| "http://localhost:9090/webhook".to_string()),
            face_matcher_url: get("FACE_MATCHER_URL")
                .unwrap_or_else(|| "http://localhost:9000".to_string()),
            collection_id: get("REKOGNITION_COLLECTION_ID")
                .unwrap_or_else(|| "concierge".to_string()),
            open_rate_seconds,
            database_url: get("DATABASE_URL"),
            rate_limit_table,
            second_factor,
            train_url: get("TRAIN_URL")
                .unwrap_or_else(|| format!("http://localhost:{}/api/label", port)),
            archive_discarded,
            trigger_username: get("TRIGGER_USERNAME").unwrap_or_else(|| "concierge".to_string()),
            trigger_token: get("TRIGGER_TOKEN"),
        })
    }
}

/// Parse `identity=authUser,identity2=authUser2`. A bare identity authorizes as itself.
fn parse_user_map(raw: &str) -> Result<HashMap<String, String>> {
    let mut users = HashMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (identity, auth_user) = match entry.split_once('=') {
            Some((i, u)) => (i.trim(), u.trim()),
            None => (entry, entry),
        };
        if identity.is_empty() || auth_user.is_empty() {
            return Err(Error::Config(format!("malformed MFA_USERS entry: {}", entry)));
        }
        users.insert(identity.to_string(), auth_user.to_string());
    }

    Ok(users)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// External capabilities the pipelines are built from
#[derive(Clone)]
pub struct Capabilities {
    pub face_matcher: Arc<dyn FaceMatcher>,
    pub object_store: Arc<dyn ObjectStore>,
    pub actuation: Arc<dyn ActuationChannel>,
    pub notifier: Arc<dyn NotificationSink>,
    /// Required when `open_rate_seconds` is set
    pub rate_limit_store: Option<Arc<dyn RateLimitStore>>,
    /// Required when `second_factor` is set
    pub authorization: Option<Arc<dyn AuthorizationFunction>>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: Arc<AppConfig>,
    /// Capture pipeline
    pub access_pipeline: Arc<AccessEventPipeline>,
    /// Label / discard pipeline
    pub labeling_pipeline: Arc<LabelingPipeline>,
}

impl AppState {
    /// Wire pipelines from config and capabilities
    pub fn build(config: AppConfig, caps: &Capabilities) -> Result<Self> {
        let access_pipeline = AccessEventPipeline::new(&config, caps)?;
        let labeling_pipeline = LabelingPipeline::new(&config, caps);

        Ok(Self {
            config: Arc::new(config),
            access_pipeline: Arc::new(access_pipeline),
            labeling_pipeline: Arc::new(labeling_pipeline),
        })
    }
}
