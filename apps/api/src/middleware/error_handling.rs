use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use futures::FutureExt;
use tracing::error;

use crate::errors::ErrorEnvelope;
use crate::middleware::correlation_id;

/// Turns a panic anywhere below this layer into the uniform 500 envelope.
/// Responses the handlers produce themselves, error statuses included, are
/// returned as-is.
pub async fn handle_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let correlation_id = correlation_id(request.headers());

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic_message(&*panic);
            error!(
                %method,
                %path,
                correlation_id = correlation_id.as_deref().unwrap_or("none"),
                error_kind = "panic",
                error = %message,
                "Unhandled error while handling request"
            );

            ErrorEnvelope::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An unexpected error occurred",
            )
            .with_correlation_id(correlation_id)
            .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
