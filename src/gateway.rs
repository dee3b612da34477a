//! Completion gateway: one persona system prompt plus the user's latest
//! message in, plain text out. Provider failures of any kind come back as a
//! diagnostic string so the conversational turn always produces a reply.

use std::time::Duration;

use crate::config::{env_optional, env_u64};

pub(crate) trait CompletionGateway {
    fn complete(&self, system_prompt: &str, user_text: &str) -> String;
}

// ── Anthropic messages API ───────────────────────────────────────────────

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u64 = 600;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub(crate) struct AnthropicGateway {
    api_key: Option<String>,
    model: Option<String>,
    base_url: String,
    version: String,
    max_tokens: u64,
    timeout: Duration,
}

impl AnthropicGateway {
    pub(crate) fn from_env() -> Self {
        let timeout_secs = env_u64("ANTHROPIC_TIMEOUT", DEFAULT_TIMEOUT_SECS)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_tokens =
            env_u64("ANTHROPIC_MAX_TOKENS", DEFAULT_MAX_TOKENS).unwrap_or(DEFAULT_MAX_TOKENS);
        Self {
            api_key: env_optional("ANTHROPIC_API_KEY"),
            model: env_optional("ANTHROPIC_MODEL"),
            base_url: env_optional("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            version: env_optional("ANTHROPIC_VERSION")
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            max_tokens,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[cfg(test)]
    pub(crate) fn unconfigured() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Concatenated text blocks of a messages-API response body.
pub(crate) fn completion_text(payload: &serde_json::Value) -> Option<String> {
    let content = payload.get("content").and_then(|v| v.as_array())?;
    let mut parts = Vec::new();
    for block in content {
        if block.get("type").and_then(|v| v.as_str()) != Some("text") {
            continue;
        }
        if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("\n").trim().to_string())
}

impl CompletionGateway for AnthropicGateway {
    // Exactly one attempt per user turn: no retries, no fallback endpoints.
    fn complete(&self, system_prompt: &str, user_text: &str) -> String {
        let Some(api_key) = &self.api_key else {
            return "Model API key not set.".to_string();
        };
        let Some(model) = &self.model else {
            return "Model identifier not set.".to_string();
        };

        let payload = serde_json::json!({
            "model": model,
            "max_tokens": self.max_tokens,
            "system": system_prompt,
            "messages": [
                {"role": "user", "content": [{"type": "text", "text": user_text}]}
            ],
        });

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.timeout)
            .timeout_read(self.timeout)
            .timeout_write(self.timeout)
            .build();

        let response = agent
            .post(&self.base_url)
            .set("content-type", "application/json")
            .set("x-api-key", api_key)
            .set("anthropic-version", &self.version)
            .send_json(payload);

        let body = match response {
            Ok(resp) => match resp.into_string() {
                Ok(body) => body,
                Err(err) => return format!("Model error: {err}"),
            },
            Err(ureq::Error::Status(code, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                let text = text.trim();
                if text.is_empty() {
                    return format!("Model error: status {code}");
                }
                return format!("Model error: status {code}: {text}");
            }
            Err(ureq::Error::Transport(err)) => {
                return format!("Model error: {err}");
            }
        };

        let parsed: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => return format!("Model error: invalid response: {err}"),
        };
        match completion_text(&parsed) {
            Some(text) => text,
            None => "Model error: response contained no text.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completion_text_single_block() {
        let payload = json!({
            "content": [{"type": "text", "text": "  Greetings.  "}]
        });
        assert_eq!(completion_text(&payload).as_deref(), Some("Greetings."));
    }

    #[test]
    fn completion_text_joins_blocks_and_skips_non_text() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "one"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "two"}
            ]
        });
        assert_eq!(completion_text(&payload).as_deref(), Some("one\ntwo"));
    }

    #[test]
    fn completion_text_missing_content() {
        assert_eq!(completion_text(&json!({"error": "boom"})), None);
        assert_eq!(completion_text(&json!({"content": []})), None);
        assert_eq!(
            completion_text(&json!({"content": [{"type": "text", "text": ""}]})),
            None
        );
    }

    #[test]
    fn unconfigured_gateway_degrades_to_text() {
        let gateway = AnthropicGateway::unconfigured();
        let reply = gateway.complete("system", "hello");
        assert_eq!(reply, "Model API key not set.");
    }
}
