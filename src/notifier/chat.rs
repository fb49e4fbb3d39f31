//! Chat webhook alerting (Slack-compatible incoming webhook payload).

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use serde_json::json;

use crate::errors::NotifierError;
use crate::http::HttpClient;
use crate::parser::mask_webhook;

const TIMEOUT: Duration = Duration::from_secs(10);

pub async fn send(client: &Arc<HttpClient>, webhook_url: &str, text: &str) -> Result<(), NotifierError> {
    let payload = json!({
        "text": text,
        "username": "AI DevOps Monitor",
        "icon_emoji": ":rotating_light:",
    });

    info!("[notifier:chat] sending (webhook={})", mask_webhook(webhook_url));

    let request = client
        .post(webhook_url)
        .json(&payload)
        .map_err(|e| NotifierError::Chat(e.to_string()))?
        .timeout(TIMEOUT)
        .build(client)
        .map_err(|e| NotifierError::Chat(e.to_string()))?;

    let response = client.execute(request).await.map_err(|e| NotifierError::Chat(e.to_string()))?;

    if !response.is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("[notifier:chat] failed: HTTP {status} | {}", &body[..body.len().min(200)]);
        return Err(NotifierError::Chat(format!("HTTP {status}")));
    }

    info!("[notifier:chat] alert sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_webhook_used_for_logging_never_panics_on_short_urls() {
        assert_eq!(mask_webhook(""), "");
    }
}
