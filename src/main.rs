use std::{net::SocketAddr, process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use pressroom::{
    application::{
        analytics::AnalyticsService,
        categories::CategoryQueryService,
        error::AppError,
        jobs::{
            FlushCountersContext, JobWorkerContext, flush_counters_schedule,
            process_flush_counters_job, process_record_view_job,
        },
        listing::Listing,
        posts::PostQueryService,
        repos::{AnalyticsRepo, CategoriesRepo, JobsRepo, PostsRepo},
    },
    cache::{CacheConfig, ReadCache},
    config,
    counters::{CounterFlusher, CounterStore, MemoryCounterStore},
    domain::types::JobType,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HealthState, RouterState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories.clone(), &settings);

    let monitor_handle = spawn_job_monitor(job_repositories, app.flusher.clone(), &settings)?;

    let router_state = RouterState {
        api: app.api_state,
        health: Some(HealthState {
            db: http_repositories,
        }),
    };
    let result = serve_http(&settings, router_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    // Pending impressions live only in memory; write them out before exiting.
    match tokio::time::timeout(settings.server.graceful_shutdown, app.flusher.flush_once()).await
    {
        Ok(report) => info!(
            target = "pressroom::shutdown",
            flushed = report.flushed,
            failed = report.failed,
            "final counter flush finished"
        ),
        Err(_) => warn!(
            target = "pressroom::shutdown",
            "final counter flush timed out; pending impressions were dropped"
        ),
    }

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = database_url(&settings)?;
    let pool = PostgresRepositories::connect(database_url, 1)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    apply_migrations(&pool).await?;
    info!(target = "pressroom::migrate", "migrations applied");
    Ok(())
}

struct ApplicationContext {
    api_state: ApiState,
    flusher: CounterFlusher,
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let categories_repo: Arc<dyn CategoriesRepo> = repositories.clone();
    let analytics_repo: Arc<dyn AnalyticsRepo> = repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = repositories;

    let counters: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = cache_config
        .enabled
        .then(|| Arc::new(ReadCache::new(&cache_config)));
    let listing = Listing::new(cache, counters.clone());
    let page_size = settings.pagination.page_size.get();

    let posts = Arc::new(PostQueryService::new(
        posts_repo.clone(),
        categories_repo.clone(),
        listing.clone(),
        page_size,
    ));
    let categories = Arc::new(CategoryQueryService::new(
        categories_repo.clone(),
        listing,
        page_size,
    ));
    let analytics = Arc::new(AnalyticsService::new(
        posts_repo,
        categories_repo,
        analytics_repo.clone(),
        jobs_repo,
    ));

    ApplicationContext {
        api_state: ApiState {
            posts,
            categories,
            analytics,
        },
        flusher: CounterFlusher::new(counters, analytics_repo),
    }
}

fn database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

async fn apply_migrations(pool: &sqlx::PgPool) -> Result<(), AppError> {
    PostgresRepositories::run_migrations(pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresStorage::<()>::setup(pool)
        .await
        .map_err(|err| AppError::from(InfraError::job_queue(err.to_string())))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = database_url(settings)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    apply_migrations(&http_pool).await?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    flusher: CounterFlusher,
    settings: &config::Settings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let record_view_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::RecordView.as_str()),
    );
    let record_view_concurrency = settings.jobs.record_view_concurrency.get() as usize;

    let analytics: Arc<dyn AnalyticsRepo> = repositories;
    let record_view_worker = WorkerBuilder::new("record-view-worker")
        .concurrency(record_view_concurrency)
        .data(JobWorkerContext::new(analytics))
        .backend(record_view_storage)
        .build_fn(process_record_view_job);

    let schedule = flush_counters_schedule(&settings.analytics.flush_schedule)
        .map_err(|err| AppError::validation(format!("analytics.flush_schedule: {err}")))?;
    let flush_counters_worker = WorkerBuilder::new("flush-counters-worker")
        .data(FlushCountersContext { flusher })
        .backend(CronStream::new(schedule))
        .build_fn(process_flush_counters_job);

    let monitor = Monitor::new()
        .register(record_view_worker)
        .register(flush_counters_worker);

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pressroom::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "pressroom::serve", "shutdown signal received");
}
