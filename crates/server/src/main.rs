//! Agora server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use agora_api::{middleware::AppState, router as api_router};
use agora_common::Config;
use agora_core::{
    ActivityService, ContentService, EventPublisherService, FundingService, LifecyclePolicies,
    LifecycleService, NoOpEventPublisher, PollService, RegistrationService,
};
use agora_db::repositories::{
    ActivityRepository, ContentRepository, FundingRepository, PollRepository,
    RegistrationRepository,
};
use agora_queue::{RedisPubSub, SchedulerConfig, run_scheduler};
use axum::{Router, middleware};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting agora server...");

    let config = Config::load()?;

    let db = agora_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    agora_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Realtime change notifications
    let pubsub = if config.redis.publish_events {
        info!("Connecting to Redis...");
        let pubsub = RedisPubSub::new(&config.redis.url, &config.redis.prefix).await?;
        pubsub.start().await?;
        Some(Arc::new(pubsub))
    } else {
        info!("Realtime events disabled");
        None
    };
    let event_publisher: EventPublisherService = match &pubsub {
        Some(pubsub) => Arc::clone(pubsub) as EventPublisherService,
        None => Arc::new(NoOpEventPublisher),
    };

    // Repositories
    let content_repo = ContentRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let activity_repo = ActivityRepository::new(Arc::clone(&db));
    let registration_repo = RegistrationRepository::new(Arc::clone(&db));
    let funding_repo = FundingRepository::new(Arc::clone(&db));

    // Services
    let mut lifecycle_service = LifecycleService::new(
        content_repo.clone(),
        poll_repo.clone(),
        activity_repo.clone(),
        LifecyclePolicies::from_config(&config.lifecycle),
    );
    lifecycle_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut content_service = ContentService::new(
        content_repo.clone(),
        poll_repo.clone(),
        activity_repo.clone(),
        registration_repo.clone(),
    );
    content_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut poll_service = PollService::new(content_repo.clone(), poll_repo);
    poll_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut registration_service = RegistrationService::new(
        content_repo.clone(),
        registration_repo,
        lifecycle_service.clone(),
    );
    registration_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut activity_service =
        ActivityService::new(activity_repo, content_repo.clone(), lifecycle_service.clone());
    activity_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut funding_service =
        FundingService::new(content_repo, funding_repo, lifecycle_service.clone());
    funding_service.set_event_publisher(event_publisher);

    // Lifecycle sweeper
    let sweeper = match SchedulerConfig::from_lifecycle(&config.lifecycle) {
        Some(scheduler_config) => Some(run_scheduler(
            scheduler_config,
            Arc::new(lifecycle_service.clone()),
        )),
        None => {
            info!("Lifecycle sweeper disabled");
            None
        }
    };

    let state = AppState {
        content_service,
        poll_service,
        registration_service,
        activity_service,
        funding_service,
        lifecycle_service,
        payment_secret: Arc::from(config.payments.webhook_secret.as_str()),
    };

    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn(agora_api::middleware::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    if let Some(pubsub) = pubsub
        && let Err(e) = pubsub.shutdown().await
    {
        warn!(error = %e, "Failed to shut down Redis Pub/Sub");
    }

    info!("Server shutdown complete");
    Ok(())
}
