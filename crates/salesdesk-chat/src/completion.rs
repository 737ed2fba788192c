//! Chat-completion client.
//!
//! [`CompletionClient`] is the seam the orchestrator and email drafter call;
//! [`AzureOpenAiClient`] implements it over the deployment REST endpoint,
//! optionally grounding answers on a document search index.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use salesdesk_core::config::{OpenAiConfig, SearchConfig};
use salesdesk_core::types::{Citation, ModelMessage};

use crate::error::ChatError;

/// Minimum relevance the grounding search applies (1 lenient, 5 strict).
const GROUNDING_STRICTNESS: u8 = 4;

/// Document index a completion is grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundingSource {
    pub endpoint: String,
    pub key: String,
    pub index_name: String,
    pub top_n_documents: u32,
}

impl GroundingSource {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            key: config.api_key.clone(),
            index_name: config.grounding_index.clone(),
            top_n_documents: config.top_n_docs,
        }
    }

    /// The `data_sources` entry sent with the completion request.
    pub fn to_data_source(&self) -> Value {
        json!({
            "type": "azure_search",
            "parameters": {
                "endpoint": self.endpoint,
                "key": self.key,
                "index_name": self.index_name,
                "semantic_configuration": format!("{}-semantic-configuration", self.index_name),
                "query_type": "semantic",
                "fields_mapping": {},
                "in_scope": true,
                "filter": null,
                "strictness": GROUNDING_STRICTNESS,
                "top_n_documents": self.top_n_documents,
                "authentication": {
                    "type": "api_key",
                    "key": self.key,
                },
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ModelMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub grounding: Option<GroundingSource>,
    /// Ask for a single JSON object as the reply.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ModelMessage>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            messages,
            temperature,
            max_tokens,
            grounding: None,
            json_response: false,
        }
    }

    pub fn with_grounding(mut self, grounding: Option<GroundingSource>) -> Self {
        self.grounding = grounding;
        self
    }

    pub fn json_object(mut self) -> Self {
        self.json_response = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Reply text, trimmed.
    pub content: String,
    /// Documents the grounding search cited.
    pub citations: Vec<Citation>,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ChatError>;
}

// =============================================================================
// Azure OpenAI
// =============================================================================

#[derive(Clone)]
pub struct AzureOpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
    max_prompt_tokens: u32,
    max_total_tokens: u32,
}

impl AzureOpenAiClient {
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChatError::Completion(format!("failed to build client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            deployment: config.deployment.clone(),
            max_prompt_tokens: config.max_prompt_tokens,
            max_total_tokens: config.max_total_tokens,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    messages: &'a [ModelMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_sources: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    context: Option<MessageContext>,
}

#[derive(Debug, Deserialize)]
struct MessageContext {
    #[serde(default)]
    citations: Vec<RawCitation>,
    #[serde(default)]
    intent: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    filepath: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    chunk_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl CompletionClient for AzureOpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ChatError> {
        let body = ChatCompletionBody {
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
            data_sources: request
                .grounding
                .as_ref()
                .map(|g| vec![g.to_data_source()]),
            response_format: request
                .json_response
                .then(|| json!({ "type": "json_object" })),
        };

        debug!(
            messages = request.messages.len(),
            grounded = request.grounding.is_some(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Completion(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read completion error body".to_string());
            error!(status = status.as_u16(), body = %text, "Completion request failed");
            return Err(ChatError::Completion(format!("HTTP {}: {}", status, text)));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Completion(format!("invalid response: {}", e)))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                max_prompt_tokens = self.max_prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                max_total_tokens = self.max_total_tokens,
                "Token usage"
            );
        }

        into_completion(parsed)
    }
}

fn into_completion(response: ChatCompletionResponse) -> Result<Completion, ChatError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| ChatError::Completion("response has no choices".to_string()))?;

    let content = message
        .content
        .ok_or_else(|| ChatError::Completion("response has no content".to_string()))?
        .trim()
        .to_string();

    let citations = match message.context {
        Some(context) => {
            if let Some(intent) = &context.intent {
                debug!(intent = %intent, "Detected intent");
            }
            context.citations.into_iter().map(into_citation).collect()
        }
        None => Vec::new(),
    };

    Ok(Completion { content, citations })
}

fn into_citation(raw: RawCitation) -> Citation {
    let filepath = raw.filepath.unwrap_or_default();
    let url = citation_url(&filepath, raw.url.as_deref());
    Citation {
        title: raw.title.unwrap_or_default(),
        content: raw.content.unwrap_or_default(),
        filepath,
        url,
        chunk_id: raw.chunk_id.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }),
    }
}

/// Link served by the documents route: the cited file path, else the last
/// segment of the source URL, else empty.
pub fn citation_url(filepath: &str, url: Option<&str>) -> String {
    if !filepath.is_empty() {
        return format!("/documents/{}", filepath);
    }
    match url.filter(|u| !u.is_empty()) {
        Some(u) => format!("/documents/{}", u.rsplit('/').next().unwrap_or(u)),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: Value) -> Result<Completion, ChatError> {
        into_completion(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn test_data_source_shape() {
        let source = GroundingSource {
            endpoint: "https://search.example.com".to_string(),
            key: "secret".to_string(),
            index_name: "product-docs".to_string(),
            top_n_documents: 5,
        };
        let value = source.to_data_source();
        assert_eq!(value["type"], "azure_search");
        let params = &value["parameters"];
        assert_eq!(
            params["semantic_configuration"],
            "product-docs-semantic-configuration"
        );
        assert_eq!(params["query_type"], "semantic");
        assert_eq!(params["strictness"], 4);
        assert_eq!(params["top_n_documents"], 5);
        assert_eq!(params["in_scope"], true);
        assert!(params["filter"].is_null());
        assert_eq!(params["authentication"]["key"], "secret");
    }

    #[test]
    fn test_request_body_omits_absent_options() {
        let messages = vec![ModelMessage::user("hi")];
        let body = ChatCompletionBody {
            messages: &messages,
            temperature: 0.7,
            max_tokens: 100,
            stream: false,
            data_sources: None,
            response_format: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("data_sources").is_none());
        assert!(value.get("response_format").is_none());
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_citation_url() {
        assert_eq!(citation_url("Guide.pdf", None), "/documents/Guide.pdf");
        assert_eq!(
            citation_url("", Some("https://blob.example.com/docs/Guide.pdf")),
            "/documents/Guide.pdf"
        );
        assert_eq!(citation_url("", None), "");
        assert_eq!(citation_url("", Some("")), "");
    }

    #[test]
    fn test_completion_with_citations() {
        let completion = parse(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "  {\"confidence_level\": 8} Answer  ",
                    "context": {
                        "intent": "[\"stock levels\"]",
                        "citations": [
                            {"title": "Spec", "content": "...", "filepath": "Spec.pdf", "chunk_id": "0"},
                            {"title": "Web", "url": "https://x.example.com/a/b/Web.docx", "chunk_id": 3}
                        ]
                    }
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        assert_eq!(completion.content, "{\"confidence_level\": 8} Answer");
        assert_eq!(completion.citations.len(), 2);
        assert_eq!(completion.citations[0].url, "/documents/Spec.pdf");
        assert_eq!(completion.citations[0].chunk_id.as_deref(), Some("0"));
        assert_eq!(completion.citations[1].url, "/documents/Web.docx");
        assert_eq!(completion.citations[1].chunk_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_completion_without_choices_is_error() {
        assert!(matches!(
            parse(json!({"choices": []})),
            Err(ChatError::Completion(_))
        ));
        assert!(matches!(
            parse(json!({"choices": [{"message": {"content": null}}]})),
            Err(ChatError::Completion(_))
        ));
    }
}
