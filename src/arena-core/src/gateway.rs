//! Remote call gateway: retry, backoff, and graceful degradation around
//! the chat-completion relay.
//!
//! Every generation-path failure is absorbed here. Callers always get
//! finished text back; the debate must never stall because the provider
//! failed.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::ArenaError;
use crate::sanitize::sanitize;

const MAX_ATTEMPTS: u32 = 3;
/// 429 backoff is multiplied by the attempt number: 3s, 6s, 9s.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_millis(3000);
const GENERIC_BACKOFF: Duration = Duration::from_millis(1000);

const MAX_TOKENS: u32 = 180;
const TEMPERATURE: f32 = 1.0;
const FREQUENCY_PENALTY: f32 = 1.2;
const PRESENCE_PENALTY: f32 = 0.8;
const TOP_P: f32 = 0.95;

/// One line of bounded history carried by a [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct HistoryLine {
    /// Whether the target persona spoke this line itself.
    pub own: bool,
    pub author: String,
    pub text: String,
}

/// Ephemeral bundle for a single generation call. Not persisted; no retry
/// state survives between calls.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<HistoryLine>,
    pub speaker_name: String,
}

/// Request body for the chat-completion exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

/// Raw HTTP reply from the relay: status and verbatim body.
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// The wire seam, mockable in tests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<TransportReply, ArenaError>;
}

/// Production transport posting JSON to the relay endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ArenaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ArenaError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<TransportReply, ArenaError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ArenaError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ArenaError::NetworkError(e.to_string()))?;

        Ok(TransportReply { status, body })
    }
}

/// Wraps the relay exchange with bounded retry and fallback-on-exhaustion.
pub struct Gateway {
    transport: Arc<dyn ChatTransport>,
    model: String,
    fallbacks: Vec<String>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn ChatTransport>, model: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            fallbacks,
        }
    }

    /// Run one generation call. Infallible from the caller's view: a
    /// non-retryable provider error comes back as a visible `[Error: ...]`
    /// line, exhaustion comes back as a canned fallback rebuttal.
    pub async fn generate(&self, request: &GenerationRequest) -> String {
        let wire = self.to_wire(request);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.transport.send(&wire).await {
                Ok(reply) if reply.status == 429 => {
                    warn!(attempt, "rate limited by provider, backing off");
                    tokio::time::sleep(RATE_LIMIT_BACKOFF * attempt).await;
                }
                Ok(reply) if reply.status >= 500 => {
                    warn!(status = reply.status, attempt, "transient server error, retrying");
                    tokio::time::sleep(GENERIC_BACKOFF).await;
                }
                Ok(reply) if !(200..300).contains(&reply.status) => {
                    // Non-retryable client error: surface the provider's
                    // message verbatim as the turn's text.
                    let message = serde_json::from_str::<ChatResponse>(&reply.body)
                        .ok()
                        .and_then(|r| r.error)
                        .map(|e| e.message)
                        .unwrap_or_else(|| "API Issue".to_string());
                    warn!(status = reply.status, "non-retryable provider error: {message}");
                    return format!("[Error: {}]", message);
                }
                Ok(reply) => {
                    let content = serde_json::from_str::<ChatResponse>(&reply.body)
                        .ok()
                        .and_then(|r| r.choices.into_iter().next())
                        .and_then(|c| c.message.content);
                    match content {
                        Some(raw) => {
                            let clean = sanitize(&raw, &request.speaker_name);
                            if clean.is_empty() {
                                // Degenerate output: retry within the budget.
                                warn!(attempt, "empty generation output, retrying");
                            } else {
                                return clean;
                            }
                        }
                        None => warn!(attempt, "malformed generation payload, retrying"),
                    }
                }
                Err(e) => {
                    warn!(attempt, "transport failure: {e}");
                    tokio::time::sleep(GENERIC_BACKOFF).await;
                }
            }
        }

        self.fallback_line()
    }

    fn fallback_line(&self) -> String {
        self.fallbacks
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| "No comment. 🤐".to_string())
    }

    fn to_wire(&self, request: &GenerationRequest) -> ChatRequest {
        let mut messages = vec![WireMessage {
            role: "system".to_string(),
            content: request.system_prompt.clone(),
        }];

        for line in &request.history {
            if line.own {
                messages.push(WireMessage {
                    role: "assistant".to_string(),
                    content: line.text.clone(),
                });
            } else {
                messages.push(WireMessage {
                    role: "user".to_string(),
                    content: format!("[{}]: {}", line.author, line.text),
                });
            }
        }

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            frequency_penalty: FREQUENCY_PENALTY,
            presence_penalty: PRESENCE_PENALTY,
            top_p: TOP_P,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Scripted transport: pops replies front-to-back and records every
    /// request body it saw.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<TransportReply, ArenaError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportReply, ArenaError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, request: &ChatRequest) -> Result<TransportReply, ArenaError> {
            self.seen.lock().unwrap().push(request.clone());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(TransportReply {
                    status: 500,
                    body: String::new(),
                });
            }
            script.remove(0)
        }
    }

    fn ok_body(content: &str) -> TransportReply {
        TransportReply {
            status: 200,
            body: format!(
                r#"{{"choices":[{{"message":{{"content":"{content}"}}}}]}}"#
            ),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_prompt: "be brief".to_string(),
            history: vec![
                HistoryLine {
                    own: false,
                    author: "Rex".to_string(),
                    text: "Dogs are loyal.".to_string(),
                },
                HistoryLine {
                    own: true,
                    author: "Nova".to_string(),
                    text: "Cats are liquid.".to_string(),
                },
            ],
            speaker_name: "Nova".to_string(),
        }
    }

    fn fallbacks() -> Vec<String> {
        vec!["Fallback one. 🕳️".to_string(), "Fallback two. 🎯".to_string()]
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_rate_limits_exhaust_with_full_backoff() {
        let rate_limited = || {
            Ok(TransportReply {
                status: 429,
                body: String::new(),
            })
        };
        let transport = ScriptedTransport::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let gateway = Gateway::new(transport.clone(), "m", fallbacks());

        let start = Instant::now();
        let text = gateway.generate(&request()).await;

        assert_eq!(transport.attempts(), 3);
        // 3s + 6s + 9s of backoff, auto-advanced by the paused clock.
        assert_eq!(start.elapsed(), Duration::from_millis(18_000));
        assert!(fallbacks().contains(&text), "unexpected fallback: {text}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_then_success() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportReply {
                status: 503,
                body: String::new(),
            }),
            Ok(ok_body("Dogs win. 🐶")),
        ]);
        let gateway = Gateway::new(transport.clone(), "m", fallbacks());

        let text = gateway.generate(&request()).await;
        assert_eq!(text, "Dogs win. 🐶");
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_surfaces_verbatim_without_retry() {
        let transport = ScriptedTransport::new(vec![Ok(TransportReply {
            status: 402,
            body: r#"{"error":{"message":"Insufficient credits"}}"#.to_string(),
        })]);
        let gateway = Gateway::new(transport.clone(), "m", fallbacks());

        let start = Instant::now();
        let text = gateway.generate(&request()).await;
        assert_eq!(text, "[Error: Insufficient credits]");
        assert_eq!(transport.attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_is_soft_failure() {
        let transport = ScriptedTransport::new(vec![
            Ok(ok_body("   ")),
            Ok(ok_body("A real answer. 🎯")),
        ]);
        let gateway = Gateway::new(transport.clone(), "m", fallbacks());

        let text = gateway.generate(&request()).await;
        assert_eq!(text, "A real answer. 🎯");
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_output_is_sanitized() {
        let transport =
            ScriptedTransport::new(vec![Ok(ok_body(r#"Nova: \"Cats are liquid.\""#))]);
        let gateway = Gateway::new(transport, "m", fallbacks());

        let text = gateway.generate(&request()).await;
        assert_eq!(text, "Cats are liquid.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_degrade_to_fallback() {
        let failing = || Err(ArenaError::NetworkError("connection refused".to_string()));
        let transport = ScriptedTransport::new(vec![failing(), failing(), failing()]);
        let gateway = Gateway::new(transport.clone(), "m", fallbacks());

        let text = gateway.generate(&request()).await;
        assert_eq!(transport.attempts(), 3);
        assert!(fallbacks().contains(&text));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wire_request_shape() {
        let transport = ScriptedTransport::new(vec![Ok(ok_body("hi"))]);
        let gateway = Gateway::new(transport.clone(), "test-model", fallbacks());
        gateway.generate(&request()).await;

        let seen = transport.seen.lock().unwrap();
        let wire = &seen[0];
        assert_eq!(wire.model, "test-model");
        assert_eq!(wire.max_tokens, 180);
        assert_eq!(wire.temperature, 1.0);
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].role, "user");
        assert_eq!(wire.messages[1].content, "[Rex]: Dogs are loyal.");
        assert_eq!(wire.messages[2].role, "assistant");
        assert_eq!(wire.messages[2].content, "Cats are liquid.");
    }
}
