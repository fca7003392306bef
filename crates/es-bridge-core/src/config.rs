//! Configuration types for the ES event bridge
//!
//! Uses the `config` crate for layered configuration from files and environment.

use crate::error::Result;
use crate::event_config::EventConfig;
use crate::shaper::ApiGeneration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Target Elasticsearch configuration
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,

    /// Backend API configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Event kinds to store, with per-kind options. Absent means defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<BTreeMap<String, Value>>,

    /// Log submission failures
    #[serde(default)]
    pub print_errors: bool,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================================================
// Elasticsearch Configuration
// ============================================================================

/// Elasticsearch connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Elasticsearch hosts
    #[serde(default = "default_es_hosts")]
    pub hosts: Vec<String>,

    /// Optional username for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Optional password for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Optional API key for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Connection timeout
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Request timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_es_hosts() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            hosts: default_es_hosts(),
            username: None,
            password: None,
            api_key: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Backend API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Client generation documents are shaped for
    #[serde(default)]
    pub api_generation: ApiGeneration,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

impl BridgeConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Add default values
        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        // Add config file if specified
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Add environment variables with prefix ES_BRIDGE_
        builder = builder.add_source(
            config::Environment::with_prefix("ES_BRIDGE")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Resolve the configured event kinds
    pub fn event_config(&self) -> Result<EventConfig> {
        match self.events {
            Some(ref requested) => EventConfig::from_requested(requested),
            None => Ok(EventConfig::default()),
        }
    }
}
