use std::fmt;

use nd_core::{Completion, CompletionRequest, ResponseFormat, Result, TokenUsage};
use serde_json::{Map, Value};

use super::CompletionModel;

/// Offline model: echoes the opening words of the user prompt, and for
/// structured requests fills the schema with that echo.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

fn sample(schema: &Value, seed: &str) -> Value {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => {
            let properties = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| {
                    props
                        .iter()
                        .map(|(key, prop)| (key.clone(), sample(prop, seed)))
                        .collect::<Map<_, _>>()
                })
                .unwrap_or_default();
            Value::Object(properties)
        }
        Some("array") => {
            let item = schema.get("items").map(|items| sample(items, seed)).unwrap_or(Value::Null);
            Value::Array(vec![item])
        }
        Some("integer") | Some("number") => Value::from(1),
        Some("boolean") => Value::Bool(false),
        _ => Value::String(seed.to_string()),
    }
}

#[async_trait::async_trait]
impl CompletionModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        // echo the opening 20 words of the prompt
        let words: Vec<&str> = request.user.split_whitespace().take(20).collect();
        let echo = words.join(" ");
        let text = match &request.response_format {
            ResponseFormat::Text => echo,
            ResponseFormat::Json { schema, .. } => sample(schema, &echo).to_string(),
        };
        let usage = TokenUsage {
            prompt_tokens: (request.system.split_whitespace().count() + request.user.split_whitespace().count()) as u64,
            completion_tokens: text.split_whitespace().count() as u64,
        };
        Ok(Completion { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(format: ResponseFormat) -> CompletionRequest {
        CompletionRequest {
            system: "You are a test.".to_string(),
            user: "This is a test article. It has multiple sentences. This is the third sentence.".to_string(),
            assistant: None,
            temperature: 0.0,
            max_tokens: 10,
            response_format: format,
        }
    }

    #[tokio::test]
    async fn test_dummy_model_echoes_text() {
        let model = DummyModel::new();
        let completion = model.complete(&request(ResponseFormat::Text)).await.unwrap();
        assert!(completion.text.starts_with("This is a test article."));
        assert!(completion.usage.prompt_tokens > 0);
    }

    #[tokio::test]
    async fn test_dummy_model_fills_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "headline": {"type": "string"},
                "blobs": {"type": "array", "items": {"type": "string"}},
                "count": {"type": "integer"}
            }
        });
        let model = DummyModel::new();
        let completion = model
            .complete(&request(ResponseFormat::Json { name: "test", schema }))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&completion.text).unwrap();
        assert!(value["headline"].as_str().unwrap().starts_with("This is"));
        assert_eq!(value["blobs"].as_array().unwrap().len(), 1);
        assert_eq!(value["count"], 1);
    }
}
