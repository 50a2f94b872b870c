//! Configuration types and loading.
//!
//! A Tidewatch deployment is described by one TOML file:
//!
//! ```toml
//! [global]
//! interval = "30s"
//! worker_count = 4
//!
//! [telemetry]
//! api_key = "..."
//! account_id = "12345"
//!
//! [[alerts.channels]]
//! type = "log"
//! name = "local"
//!
//! [[sources]]
//! name = "inventory"
//! url = "https://data.example.com/inventory.json"
//! filter = "$.items"
//! [sources.staleness]
//! enabled = true
//! threshold = "10m"
//! behavior = "alert"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::freshness::StalenessPolicy;
use crate::transform::{AttributeValue, FilterExpr, PayloadFormat};
use crate::{CoreError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "tidewatch.toml";
pub const DEFAULT_EVENT_TYPE: &str = "TidewatchSample";
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const MAX_WORKER_COUNT: usize = 100;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidewatchConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,
}

/// Scheduling and feature toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Time between collection cycles.
    #[serde(default = "default_interval", with = "crate::utils::serde_duration")]
    pub interval: Duration,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit per-source and per-cycle measurements.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Dispatch staleness, error and health alerts.
    #[serde(default = "default_true")]
    pub enable_alerts: bool,

    /// Maximum number of sources processed concurrently.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long an in-flight cycle may keep running after shutdown is requested.
    #[serde(
        default = "default_shutdown_grace",
        with = "crate::utils::serde_duration"
    )]
    pub shutdown_grace: Duration,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            interval: default_interval(),
            log_level: default_log_level(),
            enable_metrics: true,
            enable_alerts: true,
            worker_count: DEFAULT_WORKER_COUNT,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn default_name() -> String {
    "tidewatch".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

/// Telemetry backend region, selecting the default endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    fn events_url_template(self) -> &'static str {
        match self {
            Region::Us => "https://insights-collector.newrelic.com/v1/accounts/{account_id}/events",
            Region::Eu => {
                "https://insights-collector.eu01.nr-data.net/v1/accounts/{account_id}/events"
            }
        }
    }

    fn metrics_url(self) -> &'static str {
        match self {
            Region::Us => "https://metric-api.newrelic.com/metric/v1",
            Region::Eu => "https://metric-api.eu.newrelic.com/metric/v1",
        }
    }
}

/// Where and how records and measurements are submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub account_id: String,

    #[serde(default)]
    pub region: Region,

    /// Record endpoint; `{account_id}` is substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_url: Option<String>,

    /// Reporting interval attached to measurement batches.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    30_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            account_id: String::new(),
            region: Region::default(),
            events_url: None,
            metrics_url: None,
            interval_ms: default_interval_ms(),
        }
    }
}

impl TelemetryConfig {
    pub fn events_endpoint(&self) -> String {
        let template = self
            .events_url
            .as_deref()
            .unwrap_or_else(|| self.region.events_url_template());
        template.replace("{account_id}", &self.account_id)
    }

    pub fn metrics_endpoint(&self) -> String {
        self.metrics_url
            .clone()
            .unwrap_or_else(|| self.region.metrics_url().to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<AlertChannelConfig>,
}

/// One configured alert destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertChannelConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: ChannelKind,
}

/// Channel kind plus its kind-specific settings.
///
/// Settings are optional here; a channel missing a required setting fails
/// when it is asked to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelKind {
    Webhook {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Sent as `Authorization: Bearer <api_key>`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        /// Sent as `X-Auth-Token`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(alias = "slack")]
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        webhook_url: Option<String>,
    },
    Log {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<String>,
    },
}

impl ChannelKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ChannelKind::Webhook { .. } => "webhook",
            ChannelKind::Chat { .. } => "chat",
            ChannelKind::Log { .. } => "log",
        }
    }
}

/// One data source to collect each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,

    /// Fetch target.
    pub url: String,

    /// Fetched once when the primary fetch fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,

    /// Freshness check target, when it differs from `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_url: Option<String>,

    #[serde(default)]
    pub format: PayloadFormat,

    /// JSONPath applied to JSON payloads before conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,

    /// Merged into every record from this source.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Category label records are submitted under.
    #[serde(default = "default_event_type")]
    pub event_type: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub staleness: StalenessPolicy,
}

fn default_event_type() -> String {
    DEFAULT_EVENT_TYPE.to_string()
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            fallback_url: None,
            check_url: None,
            format: PayloadFormat::default(),
            filter: None,
            attributes: BTreeMap::new(),
            event_type: default_event_type(),
            enabled: true,
            staleness: StalenessPolicy::default(),
        }
    }

    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_fallback_url(mut self, fallback_url: impl Into<String>) -> Self {
        self.fallback_url = Some(fallback_url.into());
        self
    }

    pub fn with_check_url(mut self, check_url: impl Into<String>) -> Self {
        self.check_url = Some(check_url.into());
        self
    }

    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Target probed for freshness: the policy override, then the source's
    /// check target, then the fetch target.
    pub fn freshness_target(&self) -> &str {
        self.staleness
            .check_url
            .as_deref()
            .or(self.check_url.as_deref())
            .unwrap_or(&self.url)
    }
}

impl TidewatchConfig {
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceSpec> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Check everything that parsing alone cannot.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.telemetry.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("telemetry.api_key".to_string()));
        }
        if self.telemetry.account_id.trim().is_empty() {
            return Err(ConfigError::MissingField("telemetry.account_id".to_string()));
        }

        if !LOG_LEVELS.contains(&self.global.log_level.to_ascii_lowercase().as_str()) {
            return Err(invalid(
                "global.log_level",
                format!(
                    "'{}' is not one of {}",
                    self.global.log_level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        if !(1..=MAX_WORKER_COUNT).contains(&self.global.worker_count) {
            return Err(invalid(
                "global.worker_count",
                format!("must be between 1 and {MAX_WORKER_COUNT}"),
            ));
        }
        if self.global.interval.is_zero() {
            return Err(invalid("global.interval", "must be greater than zero"));
        }

        if self.sources.is_empty() {
            return Err(ConfigError::MissingField("sources".to_string()));
        }
        let mut seen = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("sources[{index}].name")));
            }
            if source.url.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("sources[{index}].url")));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(invalid(
                    format!("sources[{index}].name"),
                    format!("duplicate source name '{}'", source.name),
                ));
            }
            if source.staleness.enabled && source.staleness.threshold.is_zero() {
                return Err(invalid(
                    format!("sources[{index}].staleness.threshold"),
                    "must be greater than zero when staleness is enabled",
                ));
            }
        }

        for (index, channel) in self.alerts.channels.iter().enumerate() {
            if channel.name.trim().is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "alerts.channels[{index}].name"
                )));
            }
        }

        Ok(())
    }

    /// [`validate`](Self::validate), reported against the file it came from.
    pub fn ensure_valid(&self, config_path: &Path) -> Result<()> {
        self.validate().map_err(|cause| {
            CoreError::config(
                config_path.display().to_string(),
                cause.field().unwrap_or("content").to_string(),
                "a valid tidewatch configuration",
                cause,
            )
        })
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Read and parse a configuration file. Does not validate.
pub async fn load_config(path: &Path) -> Result<TidewatchConfig> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        CoreError::config(
            path.display().to_string(),
            "file",
            "readable TOML file",
            ConfigError::Io(e.to_string()),
        )
    })?;

    TidewatchConfig::from_toml_str(&content).map_err(|cause| {
        CoreError::config(
            path.display().to_string(),
            "content",
            "valid TOML configuration",
            cause,
        )
    })
}

/// Candidate configuration locations, most specific first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("tidewatch").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".tidewatch").join("config.toml"));
    }

    paths
}

/// First existing path from [`config_paths`].
pub fn find_config() -> Option<PathBuf> {
    config_paths().into_iter().find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshness::StalenessBehavior;
    use pretty_assertions::assert_eq;

    const FULL_CONFIG: &str = r#"
[global]
name = "warehouse"
interval = "1m"
log_level = "debug"
worker_count = 8
shutdown_grace = "3s"

[telemetry]
api_key = "key-123"
account_id = "42"
region = "EU"

[[alerts.channels]]
type = "webhook"
name = "ops"
url = "https://hooks.example.com/alerts"
token = "secret"

[[alerts.channels]]
type = "slack"
name = "team"
webhook_url = "https://chat.example.com/hook"
enabled = false

[[alerts.channels]]
type = "log"
name = "local"
level = "error"

[[sources]]
name = "inventory"
url = "https://data.example.com/inventory.json"
filter = "$.items"
event_type = "InventorySample"
[sources.attributes]
team = "supply"
shard = 2
[sources.staleness]
enabled = true
threshold = "10m"
behavior = "alert"

[[sources]]
name = "prices"
url = "https://data.example.com/prices.csv"
format = "csv"
enabled = false
"#;

    fn minimal() -> TidewatchConfig {
        TidewatchConfig::from_toml_str(
            r#"
[telemetry]
api_key = "k"
account_id = "1"

[[sources]]
name = "a"
url = "http://localhost/a.json"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_full_config_parses() {
        let config = TidewatchConfig::from_toml_str(FULL_CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.global.name, "warehouse");
        assert_eq!(config.global.interval, Duration::from_secs(60));
        assert_eq!(config.global.worker_count, 8);
        assert_eq!(config.global.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.telemetry.region, Region::Eu);

        assert_eq!(config.alerts.channels.len(), 3);
        assert_eq!(
            config.alerts.channels[0].kind,
            ChannelKind::Webhook {
                url: Some("https://hooks.example.com/alerts".to_string()),
                api_key: None,
                token: Some("secret".to_string()),
            }
        );
        assert_eq!(config.alerts.channels[1].kind.type_name(), "chat");
        assert!(!config.alerts.channels[1].enabled);

        let inventory = &config.sources[0];
        assert_eq!(inventory.filter.as_ref().map(|f| f.as_str()), Some("$.items"));
        assert_eq!(inventory.attributes["shard"], AttributeValue::Integer(2));
        assert_eq!(inventory.staleness.threshold, Duration::from_secs(600));
        assert_eq!(inventory.staleness.behavior, StalenessBehavior::Alert);
        assert_eq!(config.sources[1].format, PayloadFormat::Csv);
        assert_eq!(config.enabled_sources().count(), 1);
    }

    #[test]
    fn test_defaults() {
        let config = minimal();
        assert_eq!(config.global.name, "tidewatch");
        assert_eq!(config.global.interval, Duration::from_secs(30));
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(config.global.shutdown_grace, Duration::from_secs(10));
        assert!(config.global.enable_metrics);
        assert!(config.global.enable_alerts);
        assert_eq!(config.telemetry.interval_ms, 30_000);

        let source = &config.sources[0];
        assert_eq!(source.event_type, DEFAULT_EVENT_TYPE);
        assert_eq!(source.format, PayloadFormat::Json);
        assert!(source.enabled);
        assert!(!source.staleness.enabled);
        assert_eq!(source.freshness_target(), "http://localhost/a.json");
    }

    #[test]
    fn test_telemetry_endpoints() {
        let mut telemetry = TelemetryConfig {
            account_id: "77".to_string(),
            ..Default::default()
        };
        assert_eq!(
            telemetry.events_endpoint(),
            "https://insights-collector.newrelic.com/v1/accounts/77/events"
        );
        assert_eq!(
            telemetry.metrics_endpoint(),
            "https://metric-api.newrelic.com/metric/v1"
        );

        telemetry.events_url = Some("http://127.0.0.1:9000/{account_id}/events".to_string());
        telemetry.metrics_url = Some("http://127.0.0.1:9000/metrics".to_string());
        assert_eq!(telemetry.events_endpoint(), "http://127.0.0.1:9000/77/events");
        assert_eq!(telemetry.metrics_endpoint(), "http://127.0.0.1:9000/metrics");
    }

    #[test]
    fn test_freshness_target_precedence() {
        let source = SourceSpec::new("a", "http://host/data.json")
            .with_check_url("http://host/data.json.meta");
        assert_eq!(source.freshness_target(), "http://host/data.json.meta");

        let source = source.with_staleness(
            StalenessPolicy::new(Duration::from_secs(60), StalenessBehavior::Skip)
                .with_check_url("http://host/stamp"),
        );
        assert_eq!(source.freshness_target(), "http://host/stamp");
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_requires_credentials() {
        let mut config = minimal();
        config.telemetry.api_key = String::new();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("telemetry.api_key"));

        let mut config = minimal();
        config.telemetry.account_id = "  ".to_string();
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("telemetry.account_id")
        );
    }

    #[test]
    fn test_validate_global_limits() {
        let mut config = minimal();
        config.global.worker_count = 0;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("global.worker_count")
        );

        config.global.worker_count = MAX_WORKER_COUNT + 1;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.global.log_level = "verbose".to_string();
        assert_eq!(config.validate().unwrap_err().field(), Some("global.log_level"));
    }

    #[test]
    fn test_validate_sources() {
        let mut config = minimal();
        config.sources.clear();
        assert_eq!(config.validate().unwrap_err().field(), Some("sources"));

        let mut config = minimal();
        config
            .sources
            .push(SourceSpec::new("a", "http://localhost/other.json"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("sources[1].name"));
        assert!(err.to_string().contains("duplicate"));

        let mut config = minimal();
        config.sources[0].staleness =
            StalenessPolicy::new(Duration::ZERO, StalenessBehavior::Skip);
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("sources[0].staleness.threshold")
        );
    }

    #[test]
    fn test_unknown_format_rejected_at_parse() {
        let result = TidewatchConfig::from_toml_str(
            "[[sources]]\nname = \"a\"\nurl = \"http://x\"\nformat = \"xml\"",
        );
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_invalid_filter_rejected_at_parse() {
        let result = TidewatchConfig::from_toml_str(
            "[[sources]]\nname = \"a\"\nurl = \"http://x\"\nfilter = \"$[?(\"",
        );
        assert!(result.is_err());
    }

    // ==================== Loading Tests ====================

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidewatch.toml");
        tokio::fs::write(&path, FULL_CONFIG).await.unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.sources.len(), 2);
        config.ensure_valid(&path).unwrap();
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        match load_config(&path).await {
            Err(CoreError::ConfigurationError { field, cause, .. }) => {
                assert_eq!(field, "file");
                assert!(matches!(cause, ConfigError::Io(_)));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_ensure_valid_reports_field() {
        let mut config = minimal();
        config.telemetry.api_key.clear();

        match config.ensure_valid(Path::new("tidewatch.toml")) {
            Err(CoreError::ConfigurationError {
                config_path, field, ..
            }) => {
                assert_eq!(config_path, "tidewatch.toml");
                assert_eq!(field, "telemetry.api_key");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_configuration_error_renders_help() {
        use miette::{GraphicalReportHandler, GraphicalTheme};

        let mut config = minimal();
        config.global.worker_count = 0;
        let err = config
            .ensure_valid(Path::new("/etc/tidewatch.toml"))
            .unwrap_err();

        let mut rendered = String::new();
        GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
            .with_width(200)
            .render_report(&mut rendered, &err)
            .unwrap();

        assert!(rendered.contains("tidewatch_core::configuration_error"));
        assert!(rendered.contains("global.worker_count"));
        assert!(rendered.contains("/etc/tidewatch.toml"));
    }
}
