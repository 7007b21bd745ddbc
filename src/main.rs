mod app;
mod auth;
mod cache;
mod categories;
mod clients;
mod config;
mod error;
mod events;
mod expenses;
mod extract;
mod metrics;
mod reports;
mod state;
mod util;

use crate::state::{AppState, Service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "spendtrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let service = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SERVICE").ok())
        .as_deref()
        .and_then(Service::parse)
        .ok_or_else(|| {
            anyhow::anyhow!("usage: spendtrack <auth|category|expense|report> (or set SERVICE)")
        })?;

    let state = AppState::init(service).await?;

    // Each service owns its schema; only its own migrations run here.
    let migrator = match service {
        Service::Auth => sqlx::migrate!("./migrations/auth"),
        Service::Category => sqlx::migrate!("./migrations/category"),
        Service::Expense => sqlx::migrate!("./migrations/expense"),
        Service::Report => sqlx::migrate!("./migrations/report"),
    };
    if let Err(e) = migrator.run(&state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    if service == Service::Report {
        let consumer_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = reports::consumer::run(consumer_state).await {
                tracing::error!(error = %e, "event consumer stopped");
            }
        });
    }

    let app = app::build_app(state);
    app::serve(app, service).await
}
