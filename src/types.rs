//! Hearth - Type Definitions
//!
//! Shared types for the chat host: the conversation data model, the
//! generation-engine capability set, and the tool interface.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::EngineError;

// ─── Conversation ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a conversation. Immutable once appended, except for an
/// assistant message under active generation, whose `text` is extended
/// incrementally by the turn that owns it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<StructuredContent>,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            content: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ChatRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, text)
    }

    pub fn with_content(mut self, content: StructuredContent) -> Self {
        self.content = Some(content);
        self
    }
}

/// Structured payload a message may carry alongside (or instead of) text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredContent {
    ToolCall(ToolCallContent),
    ToolResult(ToolResultContent),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallContent {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultContent {
    pub tool: String,
    pub output: String,
}

// ─── Turn Outcome ────────────────────────────────────────────────

/// How a generation turn finished. Cancellation is a first-class outcome,
/// distinct from both success and failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed,
}

// ─── Generation Engine ───────────────────────────────────────────

/// Decoding options for one generation session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    pub temperature: f64,
    pub max_length: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        // Deterministic decoding by default; 2048 matches the smallest
        // context window we target.
        Self {
            temperature: 0.0,
            max_length: 2048,
        }
    }
}

/// The token-generation engine, treated as an opaque capability set.
/// Encoding and session creation (prefill) are CPU-heavy and must be run
/// off the caller's execution context.
pub trait GenerationEngine: Send + Sync {
    /// The model's trained context window, in tokens. `max_length` beyond
    /// this is a configuration error.
    fn context_window(&self) -> usize;

    fn encode(&self, text: &str) -> Result<Vec<i64>, EngineError>;

    /// Ingest the prompt tokens and return a generation session. Engine
    /// resources held by the session are released when it is dropped.
    fn create_session(
        &self,
        tokens: Vec<i64>,
        options: &GenerationOptions,
    ) -> Result<Box<dyn EngineSession>, EngineError>;
}

/// One in-flight generation session. `generate` produces exactly one new
/// token and is CPU-heavy; `decode_latest` is cheap.
pub trait EngineSession: Send {
    fn is_done(&self) -> bool;

    fn generate(&mut self) -> Result<(), EngineError>;

    fn decode_latest(&mut self) -> Result<String, EngineError>;
}

// ─── Tool System ─────────────────────────────────────────────────

/// A pseudo-typed, human-readable parameter descriptor, rendered into the
/// system prompt so the model knows what to pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolParameter {
    pub name: String,
    pub type_hint: String,
    pub description: String,
}

impl ToolParameter {
    pub fn new(
        name: impl Into<String>,
        type_hint: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_hint: type_hint.into(),
            description: description.into(),
        }
    }
}

/// Trait every tool the model can invoke must implement.
#[async_trait]
pub trait ChatTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &[ToolParameter];

    async fn execute(&self, parameters: &[serde_json::Value]) -> anyhow::Result<String>;
}

/// One tool invocation parsed from the model's command payload. The
/// `parameters` field is required: a request without it fails the whole
/// batch rather than being skipped.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub parameters: Vec<serde_json::Value>,
}

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Path to the model assets. For the bundled scripted engine this is
    /// a JSON script file; a real engine would point at a model folder.
    pub model_path: String,
    pub system_prompt: String,
    pub enable_tooling: bool,
    pub temperature: f64,
    pub max_length: usize,
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Default host configuration. Callers override what they need.
pub fn default_config() -> HostConfig {
    HostConfig {
        model_path: "~/.hearth/script.json".to_string(),
        system_prompt: "You will be a helpful friendly assistant.".to_string(),
        enable_tooling: true,
        temperature: 0.0,
        max_length: 2048,
        log_level: LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_default_is_deterministic() {
        let options = GenerationOptions::default();
        assert_eq!(options.temperature, 0.0);
        assert_eq!(options.max_length, 2048);
    }

    #[test]
    fn test_default_config_values() {
        let config = default_config();
        assert!(config.enable_tooling);
        assert_eq!(config.max_length, 2048);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_chat_message_roundtrip() {
        let msg = ChatMessage::assistant("hello").with_content(StructuredContent::ToolCall(
            ToolCallContent {
                name: "current_time".to_string(),
                arguments: serde_json::json!({}),
            },
        ));
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, ChatRole::Assistant);
        assert_eq!(back.text, "hello");
        assert!(matches!(back.content, Some(StructuredContent::ToolCall(_))));
    }

    #[test]
    fn test_tool_invocation_requires_parameters() {
        let missing: Result<ToolInvocation, _> =
            serde_json::from_str(r#"{"tool":"current_time"}"#);
        assert!(missing.is_err());

        let ok: ToolInvocation =
            serde_json::from_str(r#"{"tool":"current_time","parameters":[]}"#).unwrap();
        assert_eq!(ok.tool, "current_time");
        assert!(ok.parameters.is_empty());
    }
}
