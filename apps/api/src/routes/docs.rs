use axum::{extract::State, response::Html, Json};
use serde_json::{json, Value};

use crate::state::AppState;

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/", "Welcome message with the request's correlation id"),
    ("GET", "/health", "Service and dependency health report"),
    ("GET", "/docs", "This page"),
    ("GET", "/openapi.json", "OpenAPI description of the service"),
];

/// GET /docs
pub async fn docs_handler(State(state): State<AppState>) -> Html<String> {
    let app = &state.settings.app;
    let rows: String = ENDPOINTS
        .iter()
        .map(|(method, path, summary)| {
            format!("<tr><td>{method}</td><td><code>{path}</code></td><td>{summary}</td></tr>")
        })
        .collect();

    Html(format!(
        "<!doctype html>\
         <html><head><meta charset=\"utf-8\"><title>{name} - API docs</title></head>\
         <body><h1>{name} <small>v{version}</small></h1><p>{description}</p>\
         <table><thead><tr><th>Method</th><th>Path</th><th>Summary</th></tr></thead>\
         <tbody>{rows}</tbody></table>\
         <p><a href=\"/openapi.json\">openapi.json</a></p></body></html>",
        name = escape(&app.name),
        version = escape(&app.version),
        description = escape(&app.description),
    ))
}

/// GET /openapi.json
pub async fn openapi_handler(State(state): State<AppState>) -> Json<Value> {
    let app = &state.settings.app;
    let error = json!({ "$ref": "#/components/schemas/ErrorEnvelope" });

    Json(json!({
        "openapi": "3.0.3",
        "info": {
            "title": app.name,
            "version": app.version,
            "description": app.description,
        },
        "paths": {
            "/": {
                "get": {
                    "summary": ENDPOINTS[0].2,
                    "responses": { "200": { "description": "Welcome message" } }
                }
            },
            "/health": {
                "get": {
                    "summary": ENDPOINTS[1].2,
                    "parameters": [{
                        "name": "checks",
                        "in": "query",
                        "required": false,
                        "schema": { "type": "string" },
                        "description": "Comma-separated check names to run"
                    }],
                    "responses": {
                        "200": { "description": "Healthy or degraded" },
                        "400": { "description": "Unknown check name", "content": { "application/json": { "schema": error } } },
                        "503": { "description": "No check is healthy" }
                    }
                }
            },
            "/docs": {
                "get": {
                    "summary": ENDPOINTS[2].2,
                    "responses": { "200": { "description": "HTML page" } }
                }
            },
            "/openapi.json": {
                "get": {
                    "summary": ENDPOINTS[3].2,
                    "responses": { "200": { "description": "OpenAPI document" } }
                }
            }
        },
        "components": {
            "schemas": {
                "ErrorEnvelope": {
                    "type": "object",
                    "properties": {
                        "error": {
                            "type": "object",
                            "required": ["status", "code", "message"],
                            "properties": {
                                "status": { "type": "integer" },
                                "code": { "type": "string" },
                                "message": { "type": "string" },
                                "correlation_id": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    }))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
