use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::state::AppState;

/// Latency buckets in seconds for the request duration histogram.
const DURATION_BUCKETS: &[f64] = &[0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];

type LabelKey = (String, String, u16); // method, route, status_code

/// Fixed-bucket latency histogram. Only cumulative bucket counts and the sum
/// are kept, so memory stays constant however many requests are recorded.
#[derive(Debug, Default, Clone)]
struct Histogram {
    buckets: [u64; DURATION_BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl Histogram {
    fn observe(&mut self, seconds: f64) {
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if seconds <= *bound {
                self.buckets[i] += 1;
            }
        }
        self.sum += seconds;
        self.count += 1;
    }
}

/// In-process request metrics, rendered as Prometheus text exposition.
#[derive(Default)]
pub struct AppMetrics {
    counts: Mutex<HashMap<LabelKey, u64>>,
    errors: Mutex<HashMap<LabelKey, u64>>,
    latency_secs: Mutex<HashMap<LabelKey, Histogram>>,
}

impl AppMetrics {
    pub async fn record(&self, method: &str, route: &str, status: u16, seconds: f64) {
        let key = (method.to_string(), route.to_string(), status);
        *self.counts.lock().await.entry(key.clone()).or_insert(0) += 1;
        if status >= 400 {
            *self.errors.lock().await.entry(key.clone()).or_insert(0) += 1;
        }
        self.latency_secs
            .lock()
            .await
            .entry(key)
            .or_default()
            .observe(seconds);
    }

    pub async fn render(&self, service: &str) -> String {
        let mut body = String::new();

        let mut counts: Vec<_> = self.counts.lock().await.clone().into_iter().collect();
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        body.push_str("# HELP http_requests_total Total number of HTTP requests\n");
        body.push_str("# TYPE http_requests_total counter\n");
        for ((method, route, status), count) in &counts {
            body.push_str(&format!(
                "http_requests_total{{method=\"{method}\",route=\"{route}\",status_code=\"{status}\",service=\"{service}\"}} {count}\n"
            ));
        }

        let mut errors: Vec<_> = self.errors.lock().await.clone().into_iter().collect();
        errors.sort_by(|a, b| a.0.cmp(&b.0));
        body.push_str("# HELP http_request_errors_total Total number of HTTP request errors\n");
        body.push_str("# TYPE http_request_errors_total counter\n");
        for ((method, route, status), count) in &errors {
            body.push_str(&format!(
                "http_request_errors_total{{method=\"{method}\",route=\"{route}\",status_code=\"{status}\",service=\"{service}\"}} {count}\n"
            ));
        }

        let mut latency: Vec<_> = self.latency_secs.lock().await.clone().into_iter().collect();
        latency.sort_by(|a, b| a.0.cmp(&b.0));
        body.push_str(
            "# HELP http_request_duration_seconds Duration of HTTP requests in seconds\n",
        );
        body.push_str("# TYPE http_request_duration_seconds histogram\n");
        for ((method, route, status), histogram) in &latency {
            let labels = format!(
                "method=\"{method}\",route=\"{route}\",status_code=\"{status}\",service=\"{service}\""
            );
            push_histogram(&mut body, "http_request_duration_seconds", &labels, histogram);
        }

        body
    }
}

fn push_histogram(body: &mut String, name: &str, labels: &str, histogram: &Histogram) {
    for (i, bucket) in DURATION_BUCKETS.iter().enumerate() {
        body.push_str(&format!(
            "{name}_bucket{{{labels},le=\"{bucket}\"}} {}\n",
            histogram.buckets[i]
        ));
    }
    body.push_str(&format!(
        "{name}_bucket{{{labels},le=\"+Inf\"}} {}\n",
        histogram.count
    ));
    body.push_str(&format!("{name}_sum{{{labels}}} {}\n", histogram.sum));
    body.push_str(&format!("{name}_count{{{labels}}} {}\n", histogram.count));
}

/// Middleware recording every request against the matched route template.
pub async fn track(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    state
        .metrics
        .record(
            &method,
            &route,
            response.status().as_u16(),
            start.elapsed().as_secs_f64(),
        )
        .await;
    response
}

pub async fn render(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.render(state.service.name()).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_counts_and_errors() {
        let metrics = AppMetrics::default();
        metrics.record("GET", "/api/v1/expenses", 200, 0.05).await;
        metrics.record("GET", "/api/v1/expenses", 200, 0.2).await;
        metrics.record("POST", "/api/v1/expenses", 400, 0.01).await;

        let body = metrics.render("expense-service").await;
        assert!(body.contains(
            "http_requests_total{method=\"GET\",route=\"/api/v1/expenses\",status_code=\"200\",service=\"expense-service\"} 2"
        ));
        assert!(body.contains(
            "http_request_errors_total{method=\"POST\",route=\"/api/v1/expenses\",status_code=\"400\",service=\"expense-service\"} 1"
        ));
    }

    #[tokio::test]
    async fn histogram_buckets_are_cumulative() {
        let metrics = AppMetrics::default();
        metrics.record("GET", "/health", 200, 0.05).await;
        metrics.record("GET", "/health", 200, 0.6).await;

        let body = metrics.render("auth-service").await;
        assert!(body.contains("le=\"0.1\"} 1"));
        assert!(body.contains("le=\"1\"} 2"));
        assert!(body.contains("le=\"+Inf\"} 2"));
        assert!(body.contains("http_request_duration_seconds_count"));
    }

    #[test]
    fn histogram_storage_is_fixed_size() {
        let mut histogram = Histogram::default();
        for _ in 0..10_000 {
            histogram.observe(0.25);
        }
        assert_eq!(histogram.count, 10_000);
        assert_eq!(histogram.buckets.len(), DURATION_BUCKETS.len());
        assert_eq!(histogram.buckets[0], 0); // 0.25 > 0.1
        assert_eq!(histogram.buckets[1], 10_000); // cumulative at 0.3
        assert_eq!(histogram.buckets[8], 10_000);
        assert_eq!(histogram.sum, 2500.0);
    }
}
