use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mr_reviewer_bot::{
    app_state::{AppState, WebhookSettings},
    config::{AppConfig, RoutingConfig},
    routes,
    services::{
        assignment::{AssignmentSettings, ReviewerAssigner},
        cache::AvailabilityCache,
        dispatcher::{Dispatcher, DispatcherConfig},
        filter::EventFilter,
        gitlab::{GitLabClient, IssueTracker},
        observer::{Observer, PrometheusObserver},
        selector::ReviewerSelector,
        slack::SlackClient,
    },
};

/// GitLab merge request payloads are small; anything larger is not ours.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing mr-reviewer-bot");

    let routing = RoutingConfig::load(&config.routing_config_path)
        .expect("Failed to load routing configuration");
    tracing::info!(
        path = %config.routing_config_path.display(),
        groups = routing.group_channels().len(),
        statuses = routing.user_statuses().len(),
        "Loaded routing configuration"
    );
    let routing = Arc::new(routing);

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");
    let observer: Arc<dyn Observer> = Arc::new(PrometheusObserver);

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let gitlab = GitLabClient::new(&config.gitlab_url, &config.gitlab_token, timeout)
        .expect("Failed to initialize GitLab client");
    let slack = SlackClient::new(&config.slack_token, timeout).expect("Failed to initialize Slack client");

    // Events caused by our own reviewer updates must be recognised and dropped.
    let bot = gitlab
        .current_user()
        .await
        .expect("Failed to get bot user identity");
    tracing::info!(bot_id = bot.id, bot_username = %bot.username, "Resolved bot identity");

    if !config.slack_notifications {
        tracing::warn!("Slack notifications disabled, reviewers will not be notified");
    }

    let cache = Arc::new(AvailabilityCache::new(observer.clone()));
    let assigner = ReviewerAssigner::new(
        Arc::new(gitlab),
        Arc::new(slack),
        cache.clone(),
        routing.clone(),
        ReviewerSelector::new(config.selection_seed),
        AssignmentSettings::new(config.slack_notifications, &config.unavailable_statuses),
        observer.clone(),
    );

    let (queue, dispatcher) = Dispatcher::start(
        DispatcherConfig {
            workers: config.workers(),
            queue_capacity: config.queue_capacity,
            policy: config.queue_full_policy,
        },
        Arc::new(assigner),
        observer.clone(),
    );

    let state = AppState::new(
        queue,
        EventFilter::new(bot.id, observer.clone()),
        WebhookSettings::new(config.gitlab_webhook_secret.clone(), config.accepted_events.clone()),
        cache,
        routing,
        observer,
    );

    let app = routes::router(state)
        .merge(routes::metrics::router(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // The router owned the last queue handle; workers now drain what is left.
    tracing::info!("HTTP server stopped, draining job queue");
    let summary = dispatcher.join().await;
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        "Shutdown complete"
    );
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
    }
}
