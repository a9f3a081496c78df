pub mod cors;
pub mod error_handling;
pub mod request_log;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::{middleware::from_fn, Router};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::CorsSettings;

/// Request/response header carrying the per-request correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Reads the correlation id assigned by [`SetRequestIdLayer`].
pub fn correlation_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Mints a v4 UUID for requests that arrive without a correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Wraps `router` in the service's middleware stack.
///
/// Outermost first: correlation id assignment and propagation, the `request`
/// span, the request logger, CORS, then the error catcher right around the
/// routes. The logger sits outside the catcher so it always sees a response,
/// and outside CORS so preflights are logged too.
pub fn apply(router: Router, cors: &CorsSettings) -> Router {
    let header = HeaderName::from_static(CORRELATION_ID_HEADER);

    router
        .layer(from_fn(error_handling::handle_errors))
        .layer(cors::cors_layer(cors))
        .layer(from_fn(request_log::log_requests))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_log::RequestSpan)
                .on_request(())
                .on_response(())
                .on_body_chunk(())
                .on_eos(())
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::new(header.clone()))
        .layer(SetRequestIdLayer::new(header, MakeCorrelationId))
}
