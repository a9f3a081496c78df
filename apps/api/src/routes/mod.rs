pub mod docs;
pub mod health;
pub mod root;

use axum::{http::Uri, routing::get, Router};

use crate::errors::AppError;
use crate::middleware;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Route table only, without the middleware stack.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root::root_handler))
        .route("/health", get(health::health_handler))
        .route("/docs", get(docs::docs_handler))
        .route("/openapi.json", get(docs::openapi_handler))
        .fallback(not_found)
        .with_state(state)
}

pub fn build_router(state: AppState) -> Router {
    let cors = state.settings.cors.clone();
    middleware::apply(routes(state), &cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    use crate::config::{LogLevel, LogRotation, LoggingSettings, Settings};
    use crate::logging::LoggingContext;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let mut map: HashMap<String, String> = HashMap::from([
            ("LOG_FILE".to_string(), String::new()),
            ("APP_VERSION".to_string(), "0.1.0".to_string()),
        ]);
        for (key, value) in vars {
            map.insert(key.to_string(), value.to_string());
        }
        Settings::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    async fn boom() -> &'static str {
        panic!("handler blew up")
    }

    /// The full application plus a route that panics.
    fn app() -> Router {
        let state = AppState::new(settings(&[]));
        let cors = state.settings.cors.clone();
        middleware::apply(routes(state).route("/boom", get(boom)), &cors)
    }

    async fn send(request: Request<Body>) -> Response {
        app().oneshot(request).await.unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_returns_welcome_and_correlation_id() {
        let response = send(get_request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let header_id = response.headers()["x-correlation-id"]
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(header_id.len(), 36);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let body = body_json(response).await;
        assert_eq!(body["message"], "Hello World! Welcome to Resume Tailor AI");
        assert_eq!(body["correlation_id"], header_id.as_str());
    }

    #[tokio::test]
    async fn test_incoming_correlation_id_is_kept() {
        let request = Request::builder()
            .uri("/")
            .header("x-correlation-id", "client-supplied-42")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;

        assert_eq!(response.headers()["x-correlation-id"], "client-supplied-42");
        let body = body_json(response).await;
        assert_eq!(body["correlation_id"], "client-supplied-42");
    }

    #[tokio::test]
    async fn test_health_reports_application_and_system() {
        let response = send(get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "Resume Tailor AI");
        assert_eq!(body["version"], "0.1.0");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(body["response_time_ms"].is_number());
        assert_eq!(body["checks"]["application"]["status"], "healthy");
        assert_eq!(body["checks"]["system"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_health_can_run_a_subset() {
        let response = send(get_request("/health?checks=system")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["checks"].get("application").is_none());
        assert_eq!(body["checks"]["system"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_health_rejects_unknown_check() {
        let response = send(get_request("/health?checks=system,disk")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "Unknown health check 'disk'");
    }

    #[tokio::test]
    async fn test_health_rejects_empty_selection() {
        for uri in ["/health?checks=,", "/health?checks=%20,%20"] {
            let response = send(get_request(uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

            let body = body_json(response).await;
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
            assert_eq!(body["error"]["message"], "No health checks selected");
        }
    }

    #[tokio::test]
    async fn test_docs_and_openapi() {
        let docs = send(get_request("/docs")).await;
        assert_eq!(docs.status(), StatusCode::OK);
        assert!(docs.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));

        let openapi = body_json(send(get_request("/openapi.json")).await).await;
        assert_eq!(openapi["info"]["title"], "Resume Tailor AI");
        assert!(openapi["paths"]["/health"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_path_is_enveloped_404() {
        let response = send(get_request("/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "No route for /nope");
    }

    #[tokio::test]
    async fn test_panicking_route_gets_structured_500_with_cors() {
        let response = send(get_request("/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let header_id = response.headers()["x-correlation-id"]
            .to_str()
            .unwrap()
            .to_string();
        let body = body_json(response).await;
        assert_eq!(body["error"]["status"], 500);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["correlation_id"], header_id.as_str());
        assert!(!body.to_string().contains("handler blew up"));
    }

    #[tokio::test]
    async fn test_preflight_is_answered() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = send(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        for name in [
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::ACCESS_CONTROL_ALLOW_METHODS,
            header::ACCESS_CONTROL_ALLOW_HEADERS,
        ] {
            assert!(response.headers().contains_key(&name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_exactly_one_request_line_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = LoggingContext::new(&LoggingSettings {
            level: LogLevel::Info,
            file: Some(path.clone()),
            console: false,
            json: true,
            rotation: LogRotation::Never,
            retention_count: 0,
        })
        .unwrap();
        let guard = tracing::dispatcher::set_default(&logger.dispatch());

        for uri in ["/", "/health", "/boom", "/nope"] {
            send(get_request(uri)).await;
        }

        drop(guard);
        drop(logger);

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        let completed: Vec<&serde_json::Value> = records
            .iter()
            .filter(|r| r["message"] == "request completed")
            .collect();
        assert_eq!(completed.len(), 4);

        let statuses: Vec<(String, u64)> = completed
            .iter()
            .map(|r| {
                (
                    r["path"].as_str().unwrap().to_string(),
                    r["status"].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("/".to_string(), 200),
                ("/health".to_string(), 200),
                ("/boom".to_string(), 500),
                ("/nope".to_string(), 404),
            ]
        );
        assert_eq!(completed[2]["level"], "ERROR");
        assert!(completed[0]["span"]["correlation_id"].is_string());

        let unhandled: Vec<&serde_json::Value> = records
            .iter()
            .filter(|r| r["message"] == "Unhandled error while handling request")
            .collect();
        assert_eq!(unhandled.len(), 1);
        assert_eq!(unhandled[0]["path"], "/boom");
        assert_eq!(unhandled[0]["error"], "handler blew up");
    }
}
