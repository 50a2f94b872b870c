mod commands;
mod components;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tidewatch_core::config::{find_config, DEFAULT_CONFIG_FILE};
use tidewatch_core::{load_config, TidewatchConfig};
use tracing::info;

use crate::output::Output;

#[derive(Parser, Debug)]
#[command(name = "tidewatch")]
#[command(about = "Staleness-gated data collection with telemetry forwarding and alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file (defaults to the first of ./tidewatch.toml,
    /// the user config dir, ~/.tidewatch/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level (debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable debug logging with file and line information
    #[arg(long, global = true)]
    debug: bool,

    /// Telemetry API key, overriding the config file
    #[arg(long, env = "TIDEWATCH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Telemetry account id, overriding the config file
    #[arg(long, env = "TIDEWATCH_ACCOUNT_ID")]
    account_id: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run collection cycles on the configured interval (the default)
    Run {
        /// Run a single cycle, print its summary and exit
        #[arg(long)]
        once: bool,
    },
    /// Check the configuration and print what it describes
    Validate,
    /// Send a test alert through every enabled channel
    TestAlerts,
    /// Submit a health measurement to the telemetry backend
    Health,
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(find_config)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    fn apply_overrides(&self, config: &mut TidewatchConfig) {
        if let Some(api_key) = &self.api_key {
            config.telemetry.api_key = api_key.clone();
        }
        if let Some(account_id) = &self.account_id {
            config.telemetry.account_id = account_id.clone();
        }
        if let Some(level) = &self.log_level {
            config.global.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    let config_path = cli.config_path();
    let mut config = load_config(&config_path).await?;
    cli.apply_overrides(&mut config);

    let log_file = init_tracing(&config.global.log_level, cli.debug);
    info!(
        config = %config_path.display(),
        log_file = %log_file.path.display(),
        "tidewatch starting"
    );

    let output = Output::new();
    match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::Run { once } => {
            config.ensure_valid(&config_path)?;
            commands::run::run(config, once, &output).await
        }
        Commands::Validate => commands::validate::validate(&config, &config_path, &output),
        Commands::TestAlerts => commands::alerts::test_channels(&config, &output).await,
        Commands::Health => commands::health::check(&config, &output).await,
    }
}

/// Keeps the non-blocking file writer flushing until dropped.
struct LogFile {
    path: PathBuf,
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

fn init_tracing(level: &str, debug: bool) -> LogFile {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tidewatch")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = rolling::daily(&log_dir, "tidewatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let level = if debug { "debug" } else { filter_level(level) };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tidewatch_core={level},tidewatch={level},warn"))
    });

    let terminal_layer = if debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_timer(fmt::time::LocalTime::rfc_3339())
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    let file_env_filter = EnvFilter::new("tidewatch_core=debug,tidewatch=debug,info");
    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(non_blocking)
        .json();

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(file_env_filter))
        .init();

    LogFile {
        path: log_dir.join("tidewatch.log"),
        _guard: guard,
    }
}

/// Config levels as tracing directives. `fatal` has no tracing equivalent.
fn filter_level(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "fatal" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["tidewatch", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn run_once_and_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tidewatch", "run", "--once", "--debug", "-c", "x.toml"])
            .unwrap();
        assert_eq!(cli.command, Some(Commands::Run { once: true }));
        assert!(cli.debug);
        assert_eq!(cli.config_path(), PathBuf::from("x.toml"));
    }

    #[test]
    fn subcommand_names_are_kebab_case() {
        let cli = Cli::try_parse_from(["tidewatch", "test-alerts"]).unwrap();
        assert_eq!(cli.command, Some(Commands::TestAlerts));
        let cli = Cli::try_parse_from(["tidewatch", "health"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Health));
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "tidewatch",
            "--api-key",
            "cli-key",
            "--account-id",
            "42",
            "--log-level",
            "debug",
            "validate",
        ])
        .unwrap();
        let mut config = TidewatchConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.telemetry.api_key, "cli-key");
        assert_eq!(config.telemetry.account_id, "42");
        assert_eq!(config.global.log_level, "debug");
    }

    #[test]
    fn filter_levels() {
        assert_eq!(filter_level("WARN"), "warn");
        assert_eq!(filter_level("fatal"), "error");
        assert_eq!(filter_level("verbose"), "info");
    }
}
