use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::cache::Cache;
use crate::clients::ServiceClients;
use crate::config::AppConfig;
use crate::events::EventPublisher;
use crate::metrics::AppMetrics;

/// Which of the four services this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Auth,
    Category,
    Expense,
    Report,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Auth => "auth-service",
            Service::Category => "category-service",
            Service::Expense => "expense-service",
            Service::Report => "report-service",
        }
    }

    pub fn parse(value: &str) -> Option<Service> {
        match value {
            "auth" => Some(Service::Auth),
            "category" => Some(Service::Category),
            "expense" => Some(Service::Expense),
            "report" => Some(Service::Report),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Service,
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub cache: Cache,
    pub clients: ServiceClients,
    pub metrics: Arc<AppMetrics>,
    /// Present only in the expense service; everything else never publishes.
    pub events: Option<EventPublisher>,
}

impl AppState {
    pub async fn init(service: Service) -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = PgPoolOptions::new()
            .max_connections(20)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        let cache = Cache::open(&config.redis_url)?;
        let clients = ServiceClients::new(Arc::clone(&config));

        let events = if service == Service::Expense {
            match EventPublisher::connect(&config.amqp_url).await {
                Ok(publisher) => Some(publisher),
                Err(e) => {
                    // Writes still succeed without the broker; caches go stale
                    // until their TTL lapses.
                    tracing::warn!(error = %e, "message broker unavailable, events disabled");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            service,
            db,
            config,
            cache,
            clients,
            metrics: Arc::new(AppMetrics::default()),
            events,
        })
    }

    #[cfg(test)]
    pub fn for_tests(service: Service) -> Self {
        let config = Arc::new(AppConfig::for_tests());
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool should construct");
        let cache = Cache::open(&config.redis_url).expect("redis client should construct");
        let clients = ServiceClients::new(Arc::clone(&config));
        Self {
            service,
            db,
            config,
            cache,
            clients,
            metrics: Arc::new(AppMetrics::default()),
            events: None,
        }
    }
}
