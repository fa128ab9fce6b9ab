use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Message sent to a pipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// Request to run a pipe
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    /// Pipe name
    pub name: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<HashMap<String, String>>,
}

/// Response from a pipe run
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    pub success: bool,
    pub completion: String,
    pub raw: Option<RawResponse>,
}

/// Raw model response details
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

impl PipeRequest {
    /// Create a new pipe request with name and messages
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
            variables: None,
        }
    }

    /// Add a single variable
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Build the pipe request for a generation request.
    ///
    /// Sampling options travel as pipe variables so the pipe definition
    /// decides how to honour them.
    pub fn from_generation(pipe: &str, request: &GenerationRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(request.prompt.clone()));

        let mut pipe_request = Self::new(pipe, messages);
        if let Some(max_tokens) = request.max_tokens {
            pipe_request = pipe_request.with_variable("max_tokens", max_tokens.to_string());
        }
        if let Some(temperature) = request.temperature {
            pipe_request = pipe_request.with_variable("temperature", temperature.to_string());
        }
        if request.expect_json {
            pipe_request = pipe_request.with_variable("response_format", "json");
        }
        pipe_request
    }
}

/// A single prompt for the text generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Whether the caller wants a JSON object back
    #[serde(default)]
    pub expect_json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl GenerationRequest {
    /// Plain-text request
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            expect_json: false,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Request that expects a JSON object
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            expect_json: true,
            ..Self::text(prompt)
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// What came back from a generator call.
///
/// Call sites branch on this instead of probing a maybe-present payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The response carried a JSON object
    Structured {
        text: String,
        payload: Map<String, Value>,
    },
    /// Text only; `error` is set when no JSON object could be extracted
    Raw { text: String, error: Option<String> },
    /// The generator call itself failed; there is no text
    Failed { error: String },
}

impl GenerationOutcome {
    /// Response text (empty when the transport failed)
    pub fn text(&self) -> &str {
        match self {
            Self::Structured { text, .. } | Self::Raw { text, .. } => text,
            Self::Failed { .. } => "",
        }
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Structured { payload, .. } => Some(payload),
            Self::Raw { .. } | Self::Failed { .. } => None,
        }
    }

    /// Whether the call failed before any text came back.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }

    /// Non-empty string field of the payload.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.payload()?
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// String field of the payload, or `default`.
    pub fn field_or(&self, key: &str, default: &str) -> String {
        self.field_str(key).unwrap_or(default).to_string()
    }

    /// First non-empty line of the response text.
    pub fn first_line(&self) -> Option<&str> {
        self.text().lines().map(str::trim).find(|l| !l.is_empty())
    }
}
