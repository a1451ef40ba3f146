//! Core protocol types for the Gemini `generateContent` family of endpoints
//!
//! These structures mirror the REST wire format (camelCase JSON). The design
//! prioritizes:
//! - Tolerance of fields the service adds over time (everything optional)
//! - Small builder helpers so callers rarely touch raw parts
//! - Manual tool execution: function calls are surfaced, never run implicitly

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a content block in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user input, also used for function responses
    User,
    /// Model output, including function call requests
    Model,
}

/// Inline binary payload (images for multimodal prompts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type, e.g. `image/jpeg`
    pub mime_type: String,
    /// Base64 encoded bytes
    pub data: String,
}

/// A function invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the declared function
    pub name: String,
    /// Arguments as a JSON object
    #[serde(default)]
    pub args: Value,
}

/// The result of a function invocation, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Name of the function that produced this result
    pub name: String,
    /// Result payload, conventionally `{"result": ...}`
    pub response: Value,
}

/// One part of a content block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    /// Plain text part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Inline image part from already base64-encoded data
    pub fn inline_image(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: base64_data.into(),
            }),
            ..Default::default()
        }
    }

    /// Function call part (mostly useful for building fixtures)
    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
            }),
            ..Default::default()
        }
    }

    /// Function response part wrapping `result` as `{"result": result}`
    pub fn function_response(name: impl Into<String>, result: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response: serde_json::json!({ "result": result }),
            }),
            ..Default::default()
        }
    }
}

/// A block of content with an optional role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// User turn with a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            parts: vec![Part::text(text)],
        }
    }

    /// Model turn with a single text part
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Model),
            parts: vec![Part::text(text)],
        }
    }

    /// User turn with arbitrary parts
    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::User),
            parts,
        }
    }

    /// Role-less content, used for `systemInstruction`
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts, `None` when there is none
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    /// All function calls contained in this content
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .collect()
    }
}

/// Generation parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// `application/json` turns on JSON mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,

    /// OpenAPI-style schema the output must follow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

/// Declaration of a callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Tool bundle sent with a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// Function calling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionCallingMode {
    /// Model decides between text and function calls
    Auto,
    /// Model must call a function
    Any,
    /// Function calling disabled
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    pub mode: FunctionCallingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub function_calling_config: FunctionCallingConfig,
}

impl ToolConfig {
    pub fn mode(mode: FunctionCallingMode) -> Self {
        Self {
            function_calling_config: FunctionCallingConfig { mode },
        }
    }
}

/// `generateContent` request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
}

impl GenerateContentRequest {
    /// Request with the given conversation contents
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            ..Default::default()
        }
    }

    /// Single user text turn
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Content::user_text(text)])
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(Content::system(instruction));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation_config
            .get_or_insert_with(GenerationConfig::default)
            .temperature = Some(temperature);
        self
    }

    /// Turn on JSON mode constrained by `schema`
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        let config = self
            .generation_config
            .get_or_insert_with(GenerationConfig::default);
        config.response_mime_type = Some("application/json".to_string());
        config.response_schema = Some(schema);
        self
    }

    /// Attach function declarations; the caller stays in charge of executing them
    pub fn with_functions(
        mut self,
        declarations: Vec<FunctionDeclaration>,
        mode: FunctionCallingMode,
    ) -> Self {
        if declarations.is_empty() {
            return self;
        }
        self.tools = Some(vec![Tool {
            function_declarations: declarations,
        }]);
        self.tool_config = Some(ToolConfig::mode(mode));
        self
    }
}

/// One generated candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Token accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

/// Feedback on the prompt, set when it was blocked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

/// `generateContent` response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Response holding one model content block
    pub fn from_content(content: Content) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(content),
                finish_reason: Some("STOP".to_string()),
                index: Some(0),
            }],
            ..Default::default()
        }
    }

    /// Response holding a single model text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_content(Content::model_text(text))
    }

    /// Content of the first candidate
    pub fn first_content(&self) -> Option<&Content> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }

    /// Concatenated text of the first candidate
    pub fn text(&self) -> Option<String> {
        self.first_content().and_then(Content::text)
    }

    /// Function calls requested by the first candidate
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.first_content()
            .map(Content::function_calls)
            .unwrap_or_default()
    }

    pub fn has_function_call(&self) -> bool {
        !self.function_calls().is_empty()
    }
}

/// `embedContent` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedContentRequest {
    /// Fully qualified model name, `models/{id}`
    pub model: String,
    pub content: Content,
}

impl EmbedContentRequest {
    pub fn new(model_id: &str, text: impl Into<String>) -> Self {
        Self {
            model: format!("models/{}", model_id),
            content: Content {
                role: None,
                parts: vec![Part::text(text)],
            },
        }
    }
}

/// `batchEmbedContents` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEmbedContentsRequest {
    pub requests: Vec<EmbedContentRequest>,
}

/// A single embedding vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentEmbedding {
    #[serde(default)]
    pub values: Vec<f32>,
}

/// `embedContent` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedContentResponse {
    pub embedding: ContentEmbedding,
}

/// `batchEmbedContents` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEmbedContentsResponse {
    #[serde(default)]
    pub embeddings: Vec<ContentEmbedding>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest::from_text("hi")
            .with_system_instruction("be brief")
            .with_temperature(0.3);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(value["systemInstruction"].get("role").is_none());
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_with_functions_sets_mode() {
        let decl = FunctionDeclaration {
            name: "get_current_weather".to_string(),
            description: "weather".to_string(),
            parameters: None,
        };
        let request = GenerateContentRequest::from_text("q")
            .with_functions(vec![decl], FunctionCallingMode::Auto);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            "get_current_weather"
        );
        assert_eq!(value["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
    }

    #[test]
    fn test_empty_declarations_leave_request_untouched() {
        let request =
            GenerateContentRequest::from_text("q").with_functions(vec![], FunctionCallingMode::Any);
        assert!(request.tools.is_none());
        assert!(request.tool_config.is_none());
    }

    #[test]
    fn test_response_text_and_calls() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me check. "},
                        {"functionCall": {"name": "get_current_weather", "args": {"city": "常州"}}},
                        {"text": "One moment."}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5, "totalTokenCount": 17}
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        assert_eq!(response.text().as_deref(), Some("Let me check. One moment."));
        assert!(response.has_function_call());
        assert_eq!(response.function_calls()[0].args["city"], "常州");
        assert_eq!(response.usage_metadata.unwrap().total_token_count, 17);
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        let raw = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert!(response.text().is_none());
        assert!(!response.has_function_call());
        assert_eq!(
            response.prompt_feedback.unwrap().block_reason.as_deref(),
            Some("SAFETY")
        );
    }

    #[test]
    fn test_function_response_wraps_result() {
        let part = Part::function_response("calculate_dog_food", json!(306));
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["functionResponse"]["response"]["result"], 306);
    }
}
