use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the uidir binary.
#[derive(Debug, Parser)]
#[command(name = "uidir", version, about = "UI library directory service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "UIDIR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run migrations and serve the HTTP API.
    Serve(Box<ServeArgs>),
    /// Ask a running instance to revalidate site paths.
    Revalidate(RevalidateArgs),
    /// Fetch and print the registry statistics panel for one package.
    Stats(StatsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the deployment environment reported by /api/timestamp.
    #[arg(long = "environment", value_name = "NAME")]
    pub environment: Option<String>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle the in-memory caches.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of retries for transient data-store failures.
    #[arg(long = "retry-max-retries", value_name = "COUNT")]
    pub retry_max_retries: Option<u32>,

    /// Toggle the durable stats tier.
    #[arg(
        long = "stats-durable-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub stats_durable_enabled: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RevalidateArgs {
    /// Base URL of the running instance.
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url)]
    pub site: String,

    /// Site path to revalidate; repeat for several paths.
    #[arg(long = "path", value_name = "PATH", required = true)]
    pub paths: Vec<String>,

    /// Bearer token; falls back to `revalidation.token`.
    #[arg(
        long,
        env = "UIDIR_REVALIDATION_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct StatsArgs {
    /// Registry package name, e.g. `react` or `@radix-ui/react-select`.
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Trailing window in days (14 or 30).
    #[arg(long, value_name = "DAYS")]
    pub window: Option<u32>,

    /// Override the registry request timeout.
    #[arg(long = "registry-timeout-seconds", value_name = "SECONDS")]
    pub registry_timeout_seconds: Option<u64>,

    #[command(flatten)]
    pub logging: LoggingOverrides,
}
