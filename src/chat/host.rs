//! Chat Host
//!
//! Drives one conversational turn at a time: compiles the prompt,
//! streams the engine's deltas through the marker protocol, surfaces
//! visible text into the conversation, and dispatches whatever tool
//! payload the reply carried. One turn runs at a time; the `&mut self`
//! receiver is the guard.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::conversation::Conversation;
use crate::chat::prompt;
use crate::engine::stream::{spawn_stream, StreamEnd, StreamEvent};
use crate::protocol::command::parse_invocations;
use crate::protocol::dispatch::dispatch;
use crate::protocol::{ProtocolMachine, Routed};
use crate::tools::registry::ToolRegistry;
use crate::types::{
    ChatMessage, GenerationEngine, GenerationOptions, StructuredContent, ToolCallContent,
    TurnOutcome,
};

/// Result of a buffered (non-streaming) completion.
#[derive(Clone, Debug)]
pub enum AssistantReply {
    Text(String),
    ToolCall(ToolCallContent),
}

pub struct ChatHost {
    engine: Arc<dyn GenerationEngine>,
    registry: ToolRegistry,
    conversation: Conversation,
    /// What the model sees next turn. Diverges from the conversation:
    /// it keeps raw marker transcripts, not the cleaned visible text.
    context: Vec<ChatMessage>,
    system_prompt: String,
    enable_tooling: bool,
    options: GenerationOptions,
}

impl ChatHost {
    pub fn new(
        engine: Arc<dyn GenerationEngine>,
        registry: ToolRegistry,
        system_prompt: impl Into<String>,
        enable_tooling: bool,
        options: GenerationOptions,
    ) -> Self {
        Self {
            engine,
            registry,
            conversation: Conversation::new(),
            context: Vec::new(),
            system_prompt: system_prompt.into(),
            enable_tooling,
            options,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// Swap the generation engine. Refused mid-turn so a running stream
    /// keeps the engine it started with.
    pub fn replace_engine(&mut self, engine: Arc<dyn GenerationEngine>) -> anyhow::Result<()> {
        if self.conversation.processing() {
            anyhow::bail!("cannot replace engine while a turn is processing");
        }
        self.engine = engine;
        Ok(())
    }

    /// Run one streamed turn. Blank input is a no-op that reports
    /// completion. Cancellation is a first-class outcome, not an error;
    /// `Err` is reserved for faults outside the turn itself.
    pub async fn send_message(
        &mut self,
        input: &str,
        cancel: CancellationToken,
    ) -> anyhow::Result<TurnOutcome> {
        if input.trim().is_empty() {
            return Ok(TurnOutcome::Completed);
        }

        self.conversation.set_processing(true);
        let outcome = self.run_turn(input, cancel).await;
        self.conversation.set_processing(false);
        outcome
    }

    async fn run_turn(
        &mut self,
        input: &str,
        cancel: CancellationToken,
    ) -> anyhow::Result<TurnOutcome> {
        let system = prompt::build_system_prompt(
            &self.system_prompt,
            &self.registry,
            self.enable_tooling,
        );

        let user = ChatMessage::user(input);
        self.conversation.push(user.clone());
        self.context.push(user);

        let mut turn_context = vec![ChatMessage::system(system)];
        turn_context.extend(self.context.iter().cloned());
        let compiled = prompt::compile(&turn_context);

        let assistant_index = self.conversation.push(ChatMessage::assistant(""));

        let mut machine = ProtocolMachine::new(self.enable_tooling);
        let mut stream = spawn_stream(
            Arc::clone(&self.engine),
            compiled,
            self.options.clone(),
            cancel.clone(),
        );

        let mut protocol_ended = false;
        let end = loop {
            match stream.next().await {
                Some(StreamEvent::Delta(delta)) => match machine.feed(&delta) {
                    Routed::Visible => self.conversation.append_text(assistant_index, &delta),
                    Routed::Ended => {
                        protocol_ended = true;
                        // The reply is over; stop the generator instead
                        // of draining it to its token limit.
                        cancel.cancel();
                    }
                    Routed::Command | Routed::Marker | Routed::Discarded => {}
                },
                Some(StreamEvent::Done(end)) => break end,
                None => break StreamEnd::Cancelled,
            }
        };

        if let StreamEnd::Failed(err) = end {
            warn!("generation failed: {err}");
            self.conversation
                .push(ChatMessage::system(format!("Error: {err}")));
            return Ok(TurnOutcome::Failed);
        }

        // The raw transcript, markers included, is what the model sees
        // of its own reply next turn.
        let raw = machine.raw_transcript();
        if !raw.is_empty() {
            self.context.push(ChatMessage::assistant(raw));
        }

        let payload = machine.command_payload();
        if !payload.trim().is_empty() {
            match parse_invocations(payload) {
                Some(requests) => {
                    info!(count = requests.len(), "dispatching tool requests");
                    for result in dispatch(&requests, &self.registry).await {
                        self.conversation.push(result);
                    }
                }
                None => debug!("discarding unparseable command payload"),
            }
        }

        if protocol_ended {
            return Ok(TurnOutcome::Completed);
        }
        Ok(match end {
            StreamEnd::Completed => TurnOutcome::Completed,
            StreamEnd::Cancelled => TurnOutcome::Cancelled,
            StreamEnd::Failed(_) => TurnOutcome::Failed,
        })
    }

    /// Buffered fallback for models that answer a tool prompt with bare
    /// JSON instead of the marker protocol. Aggregates the whole reply,
    /// then decides whether it was a tool call or plain text.
    pub async fn complete(
        &mut self,
        input: &str,
        cancel: CancellationToken,
    ) -> anyhow::Result<AssistantReply> {
        let system = prompt::build_system_prompt(
            &self.system_prompt,
            &self.registry,
            self.enable_tooling,
        );

        let user = ChatMessage::user(input);
        self.conversation.push(user.clone());
        self.context.push(user);

        let mut turn_context = vec![ChatMessage::system(system)];
        turn_context.extend(self.context.iter().cloned());
        let compiled = prompt::compile(&turn_context);

        let mut stream = spawn_stream(
            Arc::clone(&self.engine),
            compiled,
            self.options.clone(),
            cancel,
        );

        let mut buffer = String::new();
        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Delta(delta) => buffer.push_str(&delta),
                StreamEvent::Done(StreamEnd::Failed(err)) => {
                    warn!("generation failed: {err}");
                    self.conversation
                        .push(ChatMessage::system(format!("Error: {err}")));
                    return Ok(AssistantReply::Text(String::new()));
                }
                StreamEvent::Done(_) => break,
            }
        }

        let text = buffer.trim().to_string();
        let reply = detect_tool_call(&text)
            .map(AssistantReply::ToolCall)
            .unwrap_or_else(|| AssistantReply::Text(text.clone()));

        let message = match &reply {
            AssistantReply::ToolCall(call) => ChatMessage::assistant(&text)
                .with_content(StructuredContent::ToolCall(call.clone())),
            AssistantReply::Text(_) => ChatMessage::assistant(&text),
        };
        self.conversation.push(message.clone());
        self.context.push(message);

        Ok(reply)
    }
}

/// Heuristic tool-call detection for the buffered path: a reply that is
/// a JSON object carrying a `name` key is treated as a call.
fn detect_tool_call(text: &str) -> Option<ToolCallContent> {
    if text.len() <= 2 || !text.starts_with('{') || !text.contains("\"name\"") {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.to_string();
    let arguments = object
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    Some(ToolCallContent { name, arguments })
}
