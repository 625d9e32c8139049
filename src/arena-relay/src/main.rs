//! Arena relay - same-origin proxy for the generation provider.
//!
//! Accepts `POST /api/chat`, injects the provider credential, and forwards
//! the upstream status and body verbatim. Fails closed when no credential
//! is configured.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use clap::Parser;
use std::env;
use tracing::{info, warn};

const DEFAULT_UPSTREAM: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Parser)]
#[command(
    name = "arena-relay",
    version,
    about = "Credential-injecting relay for the AI Arena generation boundary"
)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8787", value_name = "ADDR")]
    listen: String,

    /// Upstream chat-completions endpoint
    #[arg(long, default_value = DEFAULT_UPSTREAM, value_name = "URL")]
    upstream: String,
}

#[derive(Clone)]
struct AppState {
    client: reqwest::Client,
    api_key: Option<String>,
    upstream: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let api_key = env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty());
    if api_key.is_none() {
        warn!("OPENROUTER_API_KEY not set; all /api/chat requests will be rejected");
    }

    let state = AppState {
        client: reqwest::Client::new(),
        api_key,
        upstream: cli.upstream,
    };

    let app = Router::new().route("/api/chat", post(chat)).with_state(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("relay listening on {}", cli.listen);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(State(state): State<AppState>, body: String) -> Response {
    let Some(api_key) = state.api_key.as_deref() else {
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing OPENROUTER_API_KEY in environment.",
        );
    };

    if serde_json::from_str::<serde_json::Value>(&body).is_err() {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON body.");
    }

    let upstream = state
        .client
        .post(&state.upstream)
        .bearer_auth(api_key)
        .header("HTTP-Referer", "https://ai-arena-app.com")
        .header("X-Title", "AI Arena")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(response) => {
            // Status and body are forwarded verbatim.
            let status = StatusCode::from_u16(response.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let body = response.text().await.unwrap_or_default();
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(e) => {
            warn!("upstream request failed: {e}");
            json_error(StatusCode::BAD_GATEWAY, "Upstream request failed.")
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "error": { "message": message } }).to_string();
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(api_key: Option<&str>) -> AppState {
        AppState {
            client: reqwest::Client::new(),
            api_key: api_key.map(str::to_string),
            upstream: "http://127.0.0.1:9/unreachable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_credential_fails_closed() {
        let response = chat(State(state(None)), "{}".to_string()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let response = chat(State(state(Some("k"))), "not json".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let response = chat(State(state(Some("k"))), "{}".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
