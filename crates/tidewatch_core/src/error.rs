use miette::Diagnostic;
use thiserror::Error;

/// Configuration-specific errors
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Dotted path of the offending field, when the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) | Self::InvalidValue { field, .. } => Some(field),
            Self::Io(_) | Self::TomlParse(_) => None,
        }
    }
}

/// Failure while checking a source's freshness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("invalid check target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("HEAD request to {target} failed: {cause}")]
    Transport { target: String, cause: String },

    #[error("HEAD request to {target} returned status {status}")]
    Status { target: String, status: u16 },

    #[error("failed to parse Last-Modified header '{value}' from {target}")]
    InvalidTimestamp { target: String, value: String },
}

/// Failure while retrieving a source payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid fetch target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("GET request to {target} failed: {cause}")]
    Transport { target: String, cause: String },

    #[error("GET request to {target} returned status {status}")]
    Status { target: String, status: u16 },

    #[error("failed to read response body from {target}: {cause}")]
    Body { target: String, cause: String },
}

/// Unsupported or malformed payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("failed to parse JSON payload: {0}")]
    MalformedJson(String),

    #[error("unsupported data shape for conversion: expected object or array, found {found}")]
    UnexpectedShape { found: &'static str },

    #[error("failed to parse CSV payload: {0}")]
    MalformedCsv(String),
}

/// Filter/projection expression failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid filter expression '{expression}': {cause}")]
    InvalidExpression { expression: String, cause: String },
}

/// Everything that can go wrong while processing one source in a cycle.
///
/// Captured into that source's outcome; never escalates past the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("staleness check failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("failed to fetch data: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to process data: {0}")]
    Format(#[from] FormatError),

    #[error("filter failed: {0}")]
    Transform(#[from] TransformError),

    #[error("source processing panicked: {0}")]
    Panicked(String),
}

impl SourceError {
    /// Short name of the pipeline stage that failed, used in alerts and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Probe(_) => "staleness_check",
            Self::Fetch(_) => "fetch",
            Self::Format(_) | Self::Transform(_) => "transform",
            Self::Panicked(_) => "processing",
        }
    }
}

/// Which half of a flush a submission belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Records,
    Measurements,
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchKind::Records => write!(f, "records"),
            BatchKind::Measurements => write!(f, "measurements"),
        }
    }
}

/// Telemetry backend rejected a batch or was unreachable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("failed to send {kind} batch: {cause}")]
    Transport { kind: BatchKind, cause: String },

    #[error("telemetry backend returned status {status} for {kind} batch")]
    Rejected { kind: BatchKind, status: u16 },
}

/// Aggregate failure of a flush. Holds one entry per failed submission.
#[derive(Error, Debug, Clone)]
#[error("batch send failed: {}", join_errors(.failures))]
pub struct FlushError {
    pub failures: Vec<SubmissionError>,
}

/// One alert channel failed to deliver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel {channel}: {setting} not configured")]
    MissingSetting { channel: String, setting: String },

    #[error("channel {channel}: invalid webhook URL '{url}': {reason}")]
    InvalidUrl {
        channel: String,
        url: String,
        reason: String,
    },

    #[error("channel {channel}: request failed: {cause}")]
    Transport { channel: String, cause: String },

    #[error("channel {channel}: endpoint returned status {status}")]
    Status { channel: String, status: u16 },
}

impl ChannelError {
    pub fn channel(&self) -> &str {
        match self {
            Self::MissingSetting { channel, .. }
            | Self::InvalidUrl { channel, .. }
            | Self::Transport { channel, .. }
            | Self::Status { channel, .. } => channel,
        }
    }
}

/// Aggregate failure of an alert dispatch, listing every failed channel.
#[derive(Error, Debug, Clone)]
#[error("failed to send alert to {} channels: {}", .failures.len(), join_errors(.failures))]
pub struct DispatchError {
    pub failures: Vec<ChannelError>,
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Configuration error for field '{field}'")]
    #[diagnostic(
        code(tidewatch_core::configuration_error),
        help("Check configuration file at {config_path}\nExpected: {expected}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("IO error: {operation} failed")]
    #[diagnostic(
        code(tidewatch_core::io_error),
        help("Check file permissions and that the path exists")
    )]
    IoError {
        operation: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Telemetry {operation} failed")]
    #[diagnostic(
        code(tidewatch_core::telemetry_error),
        help("Check telemetry.api_key, telemetry.account_id and backend connectivity")
    )]
    TelemetryError {
        operation: String,
        #[source]
        cause: SubmissionError,
    },

    #[error("Alert delivery failed")]
    #[diagnostic(
        code(tidewatch_core::alert_delivery_failed),
        help("Failed channels: {channels}")
    )]
    AlertDeliveryFailed {
        channels: String,
        #[source]
        cause: DispatchError,
    },

    #[error("HTTP client setup failed: {cause}")]
    #[diagnostic(
        code(tidewatch_core::http_client),
        help("The TLS backend could not be initialised")
    )]
    HttpClient { cause: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn config(
        config_path: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        cause: ConfigError,
    ) -> Self {
        Self::ConfigurationError {
            config_path: config_path.into(),
            field: field.into(),
            expected: expected.into(),
            cause,
        }
    }

    pub fn alert_delivery(cause: DispatchError) -> Self {
        let channels = cause
            .failures
            .iter()
            .map(|f| f.channel())
            .collect::<Vec<_>>()
            .join(", ");
        Self::AlertDeliveryFailed { channels, cause }
    }
}
