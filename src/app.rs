use std::net::SocketAddr;

use axum::extract::State;
use axum::{middleware, routing::get, Json, Router};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::{AppState, Service};
use crate::{auth, categories, expenses, metrics, reports};

pub fn build_app(state: AppState) -> Router {
    let service_router = match state.service {
        Service::Auth => auth::router(),
        Service::Category => categories::router(),
        Service::Expense => expenses::router(),
        Service::Report => reports::router(),
    };

    Router::new()
        .nest("/api/v1", service_router)
        .route("/health", get(health))
        .route("/metrics", get(metrics::render))
        .layer(middleware::from_fn_with_state(state.clone(), metrics::track))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": state.service.name() }))
}

pub async fn serve(app: Router, service: Service) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("PORT").unwrap_or_else(|_| "3000".into())
    )
    .parse()?;

    tracing::info!(service = service.name(), "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
