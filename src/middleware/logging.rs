//! Request logging middleware.
//!
//! One line per request with method, path, status, and latency. Health probes
//! are skipped; 5xx responses log at warn so infrastructure failures stand
//! out in the scheduler noise.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if status >= 500 {
        warn!(%method, %path, status, latency_ms, "Request failed");
    } else if status >= 400 {
        info!(%method, %path, status, latency_ms, "Request rejected");
    } else {
        info!(%method, %path, status, latency_ms, "Request completed");
    }

    response
}
