use anyhow::{Context, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    Message, MessagePart, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage,
    ToolSpec, format_error_parts,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub(crate) const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
// Dense pages produce long block lists.
const MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone)]
pub struct Claude {
    key: String,
    model: String,
    messages: Vec<Message>,
    tools: Vec<ToolSpec>,
}

impl Claude {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    fn find_tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

impl Provider for Claude {
    fn append_system_input(mut self, input: String) -> Self {
        self.messages.push(Message::system(input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.messages.push(Message::user(input));
        self
    }

    fn append_user_data(mut self, data: crate::data::DataAttachment) -> Self {
        self.messages.push(Message::user_data(data));
        self
    }

    fn register_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    fn call_tool(self, tool_name: &str) -> ProviderFuture {
        let tool_name = tool_name.to_string();
        Box::pin(async move {
            let tool = self
                .find_tool(&tool_name)
                .cloned()
                .ok_or_else(|| anyhow!("tool '{}' not registered", tool_name))?;
            let client = reqwest::Client::new();
            let body = request_body(&self.model, self.messages, &tool);

            let response = client
                .post(base_url())
                .header("x-api-key", &self.key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .with_context(|| "failed to reach Claude")?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!(
                    "Claude API error ({}): {}",
                    status,
                    extract_claude_error(&text).unwrap_or(text)
                ));
            }
            extract_tool_response(&text, &tool_name, &self.model)
        })
    }
}

fn base_url() -> String {
    std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn request_body(model: &str, messages: Vec<Message>, tool: &ToolSpec) -> Value {
    let (system_inputs, user_inputs): (Vec<Message>, Vec<Message>) = messages
        .into_iter()
        .partition(|message| matches!(message.role, MessageRole::System));

    let system = system_inputs
        .into_iter()
        .flat_map(|message| message.parts)
        .filter_map(|part| match part {
            MessagePart::Text(text) => Some(text),
            MessagePart::Data(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let messages = user_inputs
        .into_iter()
        .map(|message| {
            let content = message
                .parts
                .into_iter()
                .map(|part| match part {
                    MessagePart::Text(text) => json!({"type": "text", "text": text}),
                    MessagePart::Data(data) => {
                        let kind = if data.mime.starts_with("image/") {
                            "image"
                        } else {
                            "document"
                        };
                        json!({
                            "type": kind,
                            "source": {
                                "type": "base64",
                                "media_type": data.mime,
                                "data": BASE64.encode(&data.bytes)
                            }
                        })
                    }
                })
                .collect::<Vec<_>>();
            json!({
                "role": "user",
                "content": content
            })
        })
        .collect::<Vec<_>>();

    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": messages,
        "tools": [
            {
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.parameters
            }
        ],
        "tool_choice": {"type": "tool", "name": tool.name}
    });
    if !system.trim().is_empty() {
        body["system"] = json!(system);
    }
    body
}

fn extract_tool_response(
    text: &str,
    tool_name: &str,
    fallback_model: &str,
) -> Result<ProviderResponse, anyhow::Error> {
    let payload: ClaudeResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Claude response JSON: {}", err))?;
    for block in &payload.content {
        if block.kind == "tool_use" && block.name.as_deref() == Some(tool_name) {
            let input = block
                .input
                .clone()
                .ok_or_else(|| anyhow!("Claude tool_use missing input"))?;
            let model = payload
                .model
                .filter(|value| !value.trim().is_empty())
                .or_else(|| Some(fallback_model.to_string()));
            let usage = payload.usage.map(|usage| ProviderUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage
                    .input_tokens
                    .zip(usage.output_tokens)
                    .map(|(input, output)| input + output),
            });
            return Ok(ProviderResponse {
                args: input,
                model,
                usage,
            });
        }
    }

    Err(anyhow!("no tool call returned from Claude"))
}

fn extract_claude_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<ClaudeError>,
    }

    #[derive(Deserialize)]
    struct ClaudeError {
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(error.message, error.kind, None))
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
    model: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    input: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;
    use crate::data::{DataAttachment, PNG_MIME};

    #[test]
    fn extracts_tool_use_input() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/claude_tool_response.json"
        ));
        let response =
            extract_tool_response(payload, "deliver_image_translation", DEFAULT_MODEL).unwrap();
        assert_json_snapshot!(response, @r##"
        {
          "args": {
            "formattedTranslation": "# Exit\\nThis way",
            "translationBlocks": [
              {
                "boundingBox": {
                  "height": 8,
                  "width": 30,
                  "x": 10,
                  "y": 12.5
                },
                "originalText": "Sortie",
                "translatedText": "Exit"
              }
            ]
          },
          "model": "claude-sonnet-4-5-20250929",
          "usage": {
            "prompt_tokens": 1300,
            "completion_tokens": 200,
            "total_tokens": 1500
          }
        }
        "##);
    }

    #[test]
    fn other_tool_names_are_ignored() {
        let payload = r#"{"content":[{"type":"tool_use","name":"other","input":{}}]}"#;
        let err =
            extract_tool_response(payload, "deliver_image_translation", DEFAULT_MODEL).unwrap_err();
        assert_eq!(err.to_string(), "no tool call returned from Claude");
    }

    #[test]
    fn image_is_sent_as_base64_block() {
        let messages = vec![
            Message::system("sys".to_string()),
            Message::user_data(DataAttachment {
                bytes: vec![1, 2, 3],
                mime: PNG_MIME.to_string(),
                name: None,
            }),
        ];
        let tool = ToolSpec {
            name: "t".to_string(),
            description: "d".to_string(),
            parameters: json!({"type": "object"}),
        };
        let body = request_body(DEFAULT_MODEL, messages, &tool);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["max_tokens"], 8192);
        let block = &body["messages"][0]["content"][0];
        assert_eq!(block["type"], "image");
        assert_eq!(block["source"]["media_type"], "image/png");
        assert_eq!(block["source"]["data"], "AQID");
    }
}
