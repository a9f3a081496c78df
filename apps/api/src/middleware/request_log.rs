use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::{self, header::USER_AGENT},
    middleware::Next,
    response::Response,
};
use tower_http::trace::MakeSpan;
use tracing::{error, info, info_span, warn, Span};

use crate::middleware::correlation_id;

/// Builds the `request` span every log line of a request is nested under.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> Span {
        let correlation_id = correlation_id(request.headers()).unwrap_or_default();
        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user_agent = request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");

        info_span!(
            "request",
            correlation_id = %correlation_id,
            client = %client,
            user_agent = %user_agent,
        )
    }
}

/// Emits exactly one line per request once the response is known.
/// Observes only: the response is returned untouched.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let latency_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        error!(%method, %path, status, latency_ms, "request completed");
    } else if response.status().is_client_error() {
        warn!(%method, %path, status, latency_ms, "request completed");
    } else {
        info!(%method, %path, status, latency_ms, "request completed");
    }

    response
}
