//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::types::StatsWindow;

mod cli;

pub use cli::{
    CliArgs, Command, LoggingOverrides, RevalidateArgs, ServeArgs, ServeOverrides, StatsArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "uidir";
const ENV_PREFIX: &str = "UIDIR";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ENVIRONMENT: &str = "production";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DOWNLOADS_BASE_URL: &str = "https://api.npmjs.org/";
const DEFAULT_REGISTRY_BASE_URL: &str = "https://registry.npmjs.org/";
const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_USER_AGENT: &str = concat!("uidir/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CACHE_MAX_ENTRIES: usize = 512;
const DEFAULT_LIST_TTL_SECS: u64 = 60;
const DEFAULT_STATS_TTL_SECS: u64 = 60 * 60;
const DEFAULT_RETRY_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_DURABLE_TTL_HOURS: u64 = 24;
const DEFAULT_PURGE_API_BASE: &str = "https://api.netlify.com/";
const DEFAULT_PURGE_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub registry: RegistrySettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub stats: StatsSettings,
    pub revalidation: RevalidationSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub downloads_base_url: Url,
    pub registry_base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: NonZeroUsize,
    pub list_ttl: Duration,
    pub stats_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct StatsSettings {
    pub durable_enabled: bool,
    pub durable_ttl: Duration,
    pub default_window: StatsWindow,
}

/// Which purge backend the revalidation endpoint calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeBackend {
    Auto,
    BuildHook,
    PurgeApi,
}

impl FromStr for PurgeBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "build_hook" | "build-hook" => Ok(Self::BuildHook),
            "purge_api" | "purge-api" => Ok(Self::PurgeApi),
            other => Err(format!(
                "unknown backend `{other}` (expected auto|build_hook|purge_api)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RevalidationSettings {
    pub token: Option<String>,
    pub backend: PurgeBackend,
    pub build_hook_url: Option<Url>,
    pub api_base: Url,
    pub api_token: Option<String>,
    pub site_id: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Revalidate(args)) => raw.apply_logging_overrides(&args.logging),
        Some(Command::Stats(args)) => raw.apply_stats_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    registry: RawRegistrySettings,
    cache: RawCacheSettings,
    retry: RawRetrySettings,
    stats: RawStatsSettings,
    revalidation: RawRevalidationSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.server.environment = Some(environment.clone());
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(retries) = overrides.retry_max_retries {
            self.retry.max_retries = Some(retries);
        }
        if let Some(enabled) = overrides.stats_durable_enabled {
            self.stats.durable_enabled = Some(enabled);
        }

        self.apply_logging_overrides(&overrides.logging);
    }

    fn apply_stats_overrides(&mut self, args: &StatsArgs) {
        if let Some(window) = args.window {
            self.stats.default_window = Some(window);
        }
        if let Some(seconds) = args.registry_timeout_seconds {
            self.registry.timeout_seconds = Some(seconds);
        }
        self.apply_logging_overrides(&args.logging);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            registry,
            cache,
            retry,
            stats,
            revalidation,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            registry: build_registry_settings(registry)?,
            cache: build_cache_settings(cache)?,
            retry: build_retry_settings(retry),
            stats: build_stats_settings(stats)?,
            revalidation: build_revalidation_settings(revalidation)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let environment = non_blank(server.environment)
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        environment,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        max_connections,
    })
}

fn build_registry_settings(registry: RawRegistrySettings) -> Result<RegistrySettings, LoadError> {
    let downloads_base_url = parse_url(
        registry.downloads_base_url.as_deref(),
        DEFAULT_DOWNLOADS_BASE_URL,
        "registry.downloads_base_url",
    )?;
    let registry_base_url = parse_url(
        registry.registry_base_url.as_deref(),
        DEFAULT_REGISTRY_BASE_URL,
        "registry.registry_base_url",
    )?;
    let timeout = positive_seconds(
        registry.timeout_seconds,
        DEFAULT_REGISTRY_TIMEOUT_SECS,
        "registry.timeout_seconds",
    )?;

    Ok(RegistrySettings {
        downloads_base_url,
        registry_base_url,
        timeout,
        user_agent: non_blank(registry.user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries = NonZeroUsize::new(cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES))
        .ok_or_else(|| LoadError::invalid("cache.max_entries", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        max_entries,
        list_ttl: Duration::from_secs(cache.list_ttl_seconds.unwrap_or(DEFAULT_LIST_TTL_SECS)),
        stats_ttl: Duration::from_secs(cache.stats_ttl_seconds.unwrap_or(DEFAULT_STATS_TTL_SECS)),
    })
}

fn build_retry_settings(retry: RawRetrySettings) -> RetrySettings {
    RetrySettings {
        max_retries: retry.max_retries.unwrap_or(DEFAULT_RETRY_MAX_RETRIES),
        delay: Duration::from_millis(retry.delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS)),
    }
}

fn build_stats_settings(stats: RawStatsSettings) -> Result<StatsSettings, LoadError> {
    let hours = stats.durable_ttl_hours.unwrap_or(DEFAULT_DURABLE_TTL_HOURS);
    if hours == 0 {
        return Err(LoadError::invalid(
            "stats.durable_ttl_hours",
            "must be greater than zero",
        ));
    }

    let default_window = match stats.default_window {
        Some(days) => StatsWindow::try_from(days)
            .map_err(|err| LoadError::invalid("stats.default_window", err.to_string()))?,
        None => StatsWindow::default(),
    };

    Ok(StatsSettings {
        durable_enabled: stats.durable_enabled.unwrap_or(true),
        durable_ttl: Duration::from_secs(hours * 60 * 60),
        default_window,
    })
}

fn build_revalidation_settings(
    revalidation: RawRevalidationSettings,
) -> Result<RevalidationSettings, LoadError> {
    let backend = match revalidation.backend.as_deref() {
        Some(value) => PurgeBackend::from_str(value)
            .map_err(|reason| LoadError::invalid("revalidation.backend", reason))?,
        None => PurgeBackend::Auto,
    };

    let build_hook_url = match non_blank(revalidation.build_hook_url) {
        Some(raw) => Some(
            Url::parse(&raw)
                .map_err(|err| LoadError::invalid("revalidation.build_hook_url", err.to_string()))?,
        ),
        None => None,
    };

    let api_base = parse_url(
        revalidation.api_base.as_deref(),
        DEFAULT_PURGE_API_BASE,
        "revalidation.api_base",
    )?;
    let api_token = non_blank(revalidation.api_token);
    let site_id = non_blank(revalidation.site_id);

    match backend {
        PurgeBackend::BuildHook if build_hook_url.is_none() => {
            return Err(LoadError::invalid(
                "revalidation.build_hook_url",
                "required when backend is build_hook",
            ));
        }
        PurgeBackend::PurgeApi if api_token.is_none() || site_id.is_none() => {
            return Err(LoadError::invalid(
                "revalidation.api_token",
                "api_token and site_id are required when backend is purge_api",
            ));
        }
        _ => {}
    }

    let timeout = positive_seconds(
        revalidation.timeout_seconds,
        DEFAULT_PURGE_TIMEOUT_SECS,
        "revalidation.timeout_seconds",
    )?;

    Ok(RevalidationSettings {
        token: non_blank(revalidation.token),
        backend,
        build_hook_url,
        api_base,
        api_token,
        site_id,
        timeout,
        user_agent: DEFAULT_USER_AGENT.to_string(),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRegistrySettings {
    downloads_base_url: Option<String>,
    registry_base_url: Option<String>,
    timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    max_entries: Option<usize>,
    list_ttl_seconds: Option<u64>,
    stats_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRetrySettings {
    max_retries: Option<u32>,
    delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStatsSettings {
    durable_enabled: Option<bool>,
    durable_ttl_hours: Option<u64>,
    default_window: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRevalidationSettings {
    token: Option<String>,
    backend: Option<String>,
    build_hook_url: Option<String>,
    api_base: Option<String>,
    api_token: Option<String>,
    site_id: Option<String>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: Option<&str>, default: &str, key: &'static str) -> Result<Url, LoadError> {
    let raw = value.map(str::trim).filter(|raw| !raw.is_empty()).unwrap_or(default);
    Url::parse(raw).map_err(|err| LoadError::invalid(key, format!("invalid url `{raw}`: {err}")))
}

fn positive_seconds(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    let seconds = value.unwrap_or(default);
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests;
