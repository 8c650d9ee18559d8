//! LLM transport (C10, §4.10). One `POST` per call, a strict response
//! envelope, fenced-code stripping, and a best-effort repair pass for
//! responses truncated mid-string by a token limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use codegraph_core::domain::LlmConfig;
use codegraph_core::{CodegraphError, Result, Settings};

const REPAIR_TAIL_WINDOW: usize = 100;
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub model_id: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl LlmClientConfig {
    /// Resolves endpoint/model/key/max-tokens with per-organization override
    /// taking precedence over process-level settings, per §6's LLM surface
    /// precedence rule. A field left empty on the organization's override
    /// falls back to the process setting rather than winning with a blank.
    pub fn resolve(settings: &Settings, org_override: Option<&LlmConfig>) -> Self {
        let (base_url, model_id, api_key, max_tokens) = match org_override {
            Some(o) => (
                non_empty(&o.base_url, &settings.llm_base_url),
                non_empty(&o.model_id, &settings.llm_model_id),
                if !o.api_key.is_empty() {
                    o.api_key.clone()
                } else {
                    settings.llm_api_key.clone().unwrap_or_default()
                },
                if o.max_tokens > 0 { o.max_tokens } else { settings.llm_max_tokens },
            ),
            None => (
                settings.llm_base_url.clone(),
                settings.llm_model_id.clone(),
                settings.llm_api_key.clone().unwrap_or_default(),
                settings.llm_max_tokens,
            ),
        };

        Self {
            base_url,
            model_id,
            api_key,
            max_tokens,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

fn non_empty(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

pub struct LlmClient {
    http: reqwest::Client,
    config: LlmClientConfig,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentEnvelope {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: ContentEnvelope,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.base_url.is_empty() || config.api_key.is_empty() {
            return Err(CodegraphError::infra(
                "llm client requires a base_url and api_key; configure llm_base_url/llm_api_key \
                 via process settings or an organization override",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CodegraphError::infra(format!("failed to build http client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Sends `prompt` as a single user turn and returns the parsed JSON
    /// value found in the model's reply.
    pub async fn call(&self, prompt: &str, max_tokens: Option<u32>) -> Result<Value> {
        let body = CompletionRequest {
            model: self.config.model_id.clone(),
            max_tokens: max_tokens.unwrap_or(self.config.max_tokens),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = self
            .http
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CodegraphError::llm_failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let truncated: String = text.chars().take(500).collect();
            return Err(CodegraphError::llm_failure(format!(
                "llm returned status {status}: {truncated}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CodegraphError::llm_failure(format!("invalid response envelope: {e}")))?;

        let text = extract_text(parsed.content);
        parse_json_response(&text)
    }
}

fn extract_text(content: ContentEnvelope) -> String {
    match content {
        ContentEnvelope::Text(s) => s,
        ContentEnvelope::Blocks(blocks) => blocks
            .into_iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""),
    }
}

/// Strips a leading/trailing fenced code block (` ```json ` or plain ` ``` `)
/// if present, leaving the inner text untouched otherwise.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_prefix('\n').unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parses `text` as JSON, attempting the truncated-string repair pass
/// described in §4.10 if the first attempt fails on an unterminated string
/// near the end of the payload.
fn parse_json_response(text: &str) -> Result<Value> {
    let candidate = strip_code_fence(text);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(e) => {
            if !is_truncation_error(&e, candidate) {
                return Err(CodegraphError::llm_failure(format!(
                    "failed to parse llm response as json: {e}"
                )));
            }

            let repaired = repair_truncated_json(candidate);
            serde_json::from_str(&repaired).map_err(|_| {
                CodegraphError::llm_failure(format!(
                    "failed to parse llm response as json (repair attempt also failed): {e}"
                ))
            })
        }
    }
}

fn is_truncation_error(err: &serde_json::Error, candidate: &str) -> bool {
    let message = err.to_string();
    let looks_truncated =
        message.contains("EOF while parsing a string") || message.contains("unterminated string");
    if !looks_truncated {
        return false;
    }

    let line = err.line();
    let offset_from_end = candidate
        .lines()
        .take(line)
        .map(|l| l.len() + 1)
        .sum::<usize>();
    candidate.len().saturating_sub(offset_from_end) <= REPAIR_TAIL_WINDOW
}

/// Closes the dangling string the parser choked on, then balances any
/// still-open `{`/`[` counted from the start of the payload.
fn repair_truncated_json(candidate: &str) -> String {
    let chars: Vec<char> = candidate.chars().collect();
    let string_start = find_unterminated_string_start(&chars);

    let mut repaired: String = chars.iter().collect();
    if string_start.is_some() {
        repaired.push('"');
    }

    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in repaired.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => stack.push(ch),
            '}' => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                }
            }
            ']' => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    for opener in stack.into_iter().rev() {
        repaired.push(if opener == '{' { '}' } else { ']' });
    }

    repaired
}

/// Walks backward from the end of `chars` to find the quote that opened the
/// string the parser never saw closed — the quote immediately preceded (at
/// the start of the payload, or after one of `:`, `,`, `{`, `[`, a space, or
/// a newline) by something that is not itself inside a string.
fn find_unterminated_string_start(chars: &[char]) -> Option<usize> {
    let mut depth_in_string = false;
    let mut quote_positions = Vec::new();
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == '"' {
            quote_positions.push(i);
            depth_in_string = !depth_in_string;
        }
    }

    if !depth_in_string {
        return None;
    }

    quote_positions.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_plain_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn passes_through_unfenced_text() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn extracts_text_blocks_only() {
        let content = ContentEnvelope::Blocks(vec![
            ContentBlock {
                block_type: "text".into(),
                text: "hello ".into(),
            },
            ContentBlock {
                block_type: "tool_use".into(),
                text: "ignored".into(),
            },
            ContentBlock {
                block_type: "text".into(),
                text: "world".into(),
            },
        ]);
        assert_eq!(extract_text(content), "hello world");
    }

    #[test]
    fn parses_well_formed_json() {
        let value = parse_json_response("{\"flow_name\": \"x\"}").unwrap();
        assert_eq!(value["flow_name"], "x");
    }

    #[test]
    fn repairs_truncated_string_and_braces() {
        let truncated = r#"{"steps": [{"title": "do the thi"#;
        let repaired = repair_truncated_json(truncated);
        let value: Value = serde_json::from_str(&repaired).expect("repaired json should parse");
        assert_eq!(value["steps"][0]["title"], "do the thi");
    }

    #[test]
    fn rejects_unparseable_non_truncation_error() {
        assert!(parse_json_response("not json at all").is_err());
    }
}
