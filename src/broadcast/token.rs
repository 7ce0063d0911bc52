use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::backend::wire::{TokenRequest, TokenRole};
use super::backend::BroadcastBackend;
use super::errors::TokenError;
use super::types::RtcToken;

/// Fetches channel tokens. Tokens are never cached: each session asks for a
/// fresh one so a reused channel never publishes with an expiring credential.
pub struct TokenProvider {
    backend: Arc<dyn BroadcastBackend>,
    timeout: Duration,
}

impl TokenProvider {
    pub fn new(backend: Arc<dyn BroadcastBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn fetch(&self, channel: &str, uid: u32, role: TokenRole) -> Result<RtcToken, TokenError> {
        let request = TokenRequest {
            uid,
            channel_name: channel.to_string(),
            role,
        };

        let response = tokio::time::timeout(self.timeout, self.backend.rtc_token(&request))
            .await
            .map_err(|_| TokenError::Timeout(self.timeout))??;

        if response.token.trim().is_empty() {
            return Err(TokenError::Empty);
        }

        tracing::debug!(target: "broadcast", "[TOKEN] Issued token for channel={} uid={}", channel, uid);

        Ok(RtcToken {
            value: response.token,
            issued_at: Utc::now(),
        })
    }
}
