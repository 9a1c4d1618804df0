use std::process;
use std::sync::Arc;

use circle::{
    application::{
        error::AppError,
        follows::FollowService,
        likes::LikeService,
        replies::ReplyService,
        repos::{FollowsRepo, LikesRepo, RepliesRepo, ThreadsRepo, UsersRepo},
        sessions::SessionService,
        threads::ThreadService,
        users::UserService,
    },
    cache::{CacheInvalidator, CacheStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
        uploads::UploadStorage,
    },
    realtime::FanoutChannel,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
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
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate => run_migrate(settings).await,
    }
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

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!("migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_api_state(repositories, &settings)?;

    let router = http::build_router(state, settings.uploads.max_request_bytes as usize);

    let listener = tokio::net::TcpListener::bind(settings.server.listen_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.listen_addr, "Circle listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

fn build_api_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApiState, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let threads_repo: Arc<dyn ThreadsRepo> = repositories.clone();
    let replies_repo: Arc<dyn RepliesRepo> = repositories.clone();
    let likes_repo: Arc<dyn LikesRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();

    let session_secret = settings
        .auth
        .session_secret
        .as_deref()
        .ok_or_else(|| InfraError::configuration("auth.session_secret is not configured"))
        .map_err(AppError::from)?;
    let sessions = Arc::new(SessionService::new(
        session_secret,
        time::Duration::hours(settings.auth.session_ttl_hours as i64),
    ));

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let cache = Arc::new(CacheStore::new(settings.cache.ttl()));
    let invalidator = CacheInvalidator::new(cache.clone(), settings.cache.scan_page_size);
    let fanout = FanoutChannel::new(settings.realtime.channel_capacity);

    let users = Arc::new(UserService::new(
        users_repo.clone(),
        cache.clone(),
        invalidator.clone(),
        fanout.clone(),
        sessions.clone(),
    ));
    let threads = Arc::new(ThreadService::new(
        threads_repo.clone(),
        cache.clone(),
        invalidator.clone(),
        fanout.clone(),
    ));
    let replies = Arc::new(ReplyService::new(
        replies_repo,
        threads_repo.clone(),
        cache.clone(),
        invalidator.clone(),
        fanout.clone(),
    ));
    let likes = Arc::new(LikeService::new(likes_repo, threads_repo, fanout.clone()));
    let follows = Arc::new(FollowService::new(
        follows_repo,
        users_repo,
        invalidator,
        fanout.clone(),
    ));

    Ok(ApiState {
        users,
        threads,
        replies,
        likes,
        follows,
        sessions,
        fanout,
        upload_storage,
        secure_cookies: settings.auth.secure_cookies,
    })
}
