mod handlers;
mod telegram;

use anima_core::{AnimaConfig, ConversationEngine, DryRunSender, EngineSettings, MessageSender, ProfileStore};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::telegram::TelegramSender;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<AnimaConfig>,
    pub(crate) engine: Arc<ConversationEngine>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[anima-gateway] .env not loaded: {} (using system environment)", e);
    }

    let config = Arc::new(AnimaConfig::load()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(ProfileStore::open_path(config.database_path())?);
    let sender: Arc<dyn MessageSender> = if config.dry_run() {
        tracing::warn!(target: "anima::telegram", "TELEGRAM_BOT_TOKEN is empty; outbound messages are only logged");
        Arc::new(DryRunSender)
    } else {
        Arc::new(TelegramSender::new(
            &config.telegram_api_base,
            &config.telegram_bot_token,
            Duration::from_secs(config.send_timeout_secs),
        )?)
    };
    if config.reports_token.is_empty() {
        tracing::warn!(target: "anima::reports", "REPORTS_TOKEN is empty; reporting endpoints are open");
    }
    if config.webhook_secret.is_empty() {
        tracing::warn!(target: "anima::telegram", "WEBHOOK_SECRET is empty; webhook requests are not authenticated");
    }

    let engine = Arc::new(ConversationEngine::new(
        store,
        sender,
        EngineSettings::from(config.as_ref()),
    ));

    if config.reminder_interval_secs > 0 {
        tokio::spawn(heartbeat_loop(
            Arc::clone(&engine),
            Duration::from_secs(config.reminder_interval_secs),
        ));
    }

    let app = build_app(AppState {
        config: Arc::clone(&config),
        engine,
    });

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(target: "anima::daemon", "{} listening on {}", config.app_title, addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodic homework reminder sweep.
async fn heartbeat_loop(engine: Arc<ConversationEngine>, tick: Duration) {
    tracing::info!(
        target: "anima::daemon",
        tick_rate_secs = tick.as_secs(),
        "Reminder heartbeat started"
    );
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let today = chrono::Utc::now().date_naive();
        if let Err(e) = engine.sweep_reminders(today).await {
            tracing::warn!(target: "anima::daemon", error = %e, "Reminder sweep failed");
        }
    }
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook/telegram", post(handlers::webhook::telegram_webhook))
        .route("/reports/summary", get(handlers::reports::summary))
        .route("/reports/user/:uid", get(handlers::reports::user))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// GET / – liveness.
async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "app": state.config.app_title, "status": "ok" }))
}

/// GET /health – status of every store collection.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let collections = state.engine.store().get_all_status();
    let all_connected = collections.iter().all(|s| s.connected);
    Json(serde_json::json!({
        "status": if all_connected { "ok" } else { "degraded" },
        "app": state.config.app_title,
        "dry_run": state.config.dry_run(),
        "collections": collections,
    }))
}
