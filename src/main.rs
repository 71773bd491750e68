use std::{future::IntoFuture, process, sync::Arc};

use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uidir::{
    application::{
        directory::DirectoryService,
        error::AppError,
        repos::{FrameworksRepo, LibrariesRepo, StatsCacheRepo},
        retry::{RetryExecutor, RetryPolicy},
        revalidation::{LocalCache, RevalidationService},
        stats::{PackageRegistry, StatsConfig, StatsService},
    },
    cache::CacheConfig,
    config,
    domain::types::PackageName,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, DatabaseHealth, HttpState, RouterState},
        purge::purger_from_settings,
        registry::RegistryClient,
        revalidate_client::{RevalidateClientError, RevalidationClient},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Revalidate(args) => run_revalidate(settings, args).await,
        config::Command::Stats(args) => run_stats(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache_config = CacheConfig::from(&settings.cache);

    let stats = build_stats_service(
        &settings,
        Some(repositories.clone() as Arc<dyn StatsCacheRepo>),
        &cache_config,
    )?;
    let directory = Arc::new(DirectoryService::new(
        repositories.clone() as Arc<dyn LibrariesRepo>,
        repositories.clone() as Arc<dyn FrameworksRepo>,
        stats,
        Arc::new(RetryExecutor::new(RetryPolicy::from(&settings.retry))),
        &cache_config,
    ));

    let purger = purger_from_settings(&settings.revalidation)?;
    if settings.revalidation.token.is_none() {
        warn!(
            target = "uidir::serve",
            "revalidation token is not configured; /api/revalidate will answer 500"
        );
    }
    if purger.is_none() {
        warn!(
            target = "uidir::serve",
            "no purge backend configured; /api/revalidate will answer 500"
        );
    }
    let revalidation = Arc::new(RevalidationService::new(
        settings.revalidation.token.as_deref(),
        purger,
        Some(directory.clone() as Arc<dyn LocalCache>),
    ));

    let state = RouterState {
        http: HttpState {
            db: repositories as Arc<dyn DatabaseHealth>,
            environment: Arc::from(settings.server.environment.as_str()),
        },
        api: ApiState {
            directory,
            revalidation,
        },
    };

    serve_http(&settings, state).await
}

async fn run_revalidate(
    settings: config::Settings,
    args: config::RevalidateArgs,
) -> Result<(), AppError> {
    let token = args
        .token
        .or(settings.revalidation.token)
        .ok_or(RevalidateClientError::MissingToken)?;
    let client = RevalidationClient::new(&args.site, token)?;

    info!(
        target = "uidir::revalidate",
        endpoint = %client.endpoint(),
        paths = args.paths.len(),
        "requesting revalidation"
    );
    let response = client.revalidate(args.paths).await?;

    println!("{}", response.message);
    for outcome in &response.results {
        match &outcome.error {
            None => println!("  ok      {}", outcome.path),
            Some(err) => println!("  failed  {} ({err})", outcome.path),
        }
    }

    let failed = response.failed().count();
    if failed > 0 {
        return Err(AppError::unexpected(format!(
            "{failed} path(s) failed to revalidate"
        )));
    }
    Ok(())
}

async fn run_stats(settings: config::Settings, args: config::StatsArgs) -> Result<(), AppError> {
    let package = PackageName::parse(&args.package)?;
    let cache_config = CacheConfig::from(&settings.cache);
    let stats = build_stats_service(&settings, None, &cache_config)?;

    let panel = stats.panel(&package, stats.default_window()).await;
    let rendered = serde_json::to_string_pretty(&panel)
        .map_err(|err| AppError::unexpected(format!("failed to render stats: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn build_stats_service(
    settings: &config::Settings,
    durable: Option<Arc<dyn StatsCacheRepo>>,
    cache_config: &CacheConfig,
) -> Result<Arc<StatsService>, AppError> {
    let registry = RegistryClient::new(&settings.registry)?;
    Ok(Arc::new(StatsService::new(
        Arc::new(registry) as Arc<dyn PackageRegistry>,
        durable,
        StatsConfig::from(&settings.stats),
        cache_config,
    )))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let app = http::build_app(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "uidir::serve", addr = %settings.server.addr, "listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let mut graceful_rx = stop_rx.clone();
    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let mut deadline_rx = stop_rx;
    let deadline = async move {
        let _ = deadline_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(
                target = "uidir::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "uidir::serve", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "uidir::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "uidir::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "uidir::serve", "shutdown signal received");
}
