//! Webhook notifier
//!
//! Delivers check reports to a group-robot webhook as markdown messages.
//! Delivery failures are logged and reported to the caller, never raised
//! as panics; an unconfigured webhook silently drops messages.

use crate::config::WebhookConfig;
use crate::error::CheckResult;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    mentions: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            mentions: config.mentions.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }

    /// Send one titled markdown message. Returns whether the channel
    /// accepted it.
    pub async fn notify(&self, title: &str, body: &str) -> CheckResult<bool> {
        if !self.is_enabled() {
            debug!("webhook not configured, dropping notification");
            return Ok(false);
        }

        let content = format!("## {}\n\n{}", title, body);
        let payload = json!({
            "msgtype": "markdown",
            "markdown": {
                "content": content,
                "mentioned_mobile_list": self.mentions,
            }
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "webhook returned non-success status");
            return Ok(false);
        }

        let result: Value = response.json().await?;
        if result.get("errcode").and_then(Value::as_i64) == Some(0) {
            info!("webhook notification delivered");
            Ok(true)
        } else {
            let errmsg = rejection_reason(&result);
            error!(errmsg, "webhook rejected notification");
            Ok(false)
        }
    }
}

/// Error message of a channel rejection response
fn rejection_reason(result: &Value) -> &str {
    result
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}
