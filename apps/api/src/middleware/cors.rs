use std::collections::BTreeSet;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::{AllowList, CorsSettings};
use crate::middleware::CORRELATION_ID_HEADER;

/// Builds the CORS layer from settings.
///
/// Browsers reject `*` on credentialed requests, so with credentials enabled a
/// wildcard is answered by echoing the request's origin, method or headers.
/// Entries that are not valid header values are skipped.
pub fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let credentials = settings.allow_credentials;

    let origin = match &settings.origins {
        AllowList::Any if credentials => AllowOrigin::mirror_request(),
        AllowList::Any => AllowOrigin::any(),
        AllowList::Only(origins) => AllowOrigin::list(parse_all(origins, "origin", |origin| {
            HeaderValue::from_str(origin).ok()
        })),
    };

    let methods = match &settings.methods {
        AllowList::Any if credentials => AllowMethods::mirror_request(),
        AllowList::Any => AllowMethods::any(),
        AllowList::Only(methods) => AllowMethods::list(parse_all(methods, "method", |method| {
            Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()
        })),
    };

    let headers = match &settings.headers {
        AllowList::Any if credentials => AllowHeaders::mirror_request(),
        AllowList::Any => AllowHeaders::any(),
        AllowList::Only(headers) => AllowHeaders::list(parse_all(headers, "header", |header| {
            HeaderName::from_bytes(header.to_ascii_lowercase().as_bytes()).ok()
        })),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(credentials)
        .expose_headers([HeaderName::from_static(CORRELATION_ID_HEADER)])
}

fn parse_all<T>(
    values: &BTreeSet<String>,
    kind: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| {
            let parsed = parse(value);
            if parsed.is_none() {
                warn!("Ignoring invalid CORS {kind} '{value}'");
            }
            parsed
        })
        .collect()
}
