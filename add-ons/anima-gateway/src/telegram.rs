//! Outbound Telegram Bot API transport.

use anima_core::{MessageSender, SendError};
use std::time::Duration;

pub struct TelegramSender {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramSender {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        })
    }
}

#[async_trait::async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            // The URL carries the bot token; keep it out of error messages.
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Status(status.as_u16()));
        }
        tracing::debug!(target: "anima::telegram", chat_id, "message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    async fn serve(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/bottest-token/sendMessage",
                post(
                    move |State(seen): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                          Json(body): Json<serde_json::Value>| async move {
                        seen.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/"), seen)
    }

    #[tokio::test]
    async fn posts_chat_id_and_text() {
        let (base, seen) = serve(StatusCode::OK).await;
        let sender = TelegramSender::new(&base, "test-token", Duration::from_secs(5)).unwrap();
        sender.send(42, "hello").await.unwrap();
        let bodies = seen.lock().unwrap().clone();
        assert_eq!(bodies, vec![serde_json::json!({ "chat_id": 42, "text": "hello" })]);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (base, _seen) = serve(StatusCode::BAD_REQUEST).await;
        let sender = TelegramSender::new(&base, "test-token", Duration::from_secs(5)).unwrap();
        let err = sender.send(42, "hello").await.unwrap_err();
        assert!(matches!(err, SendError::Status(400)));
    }
}
