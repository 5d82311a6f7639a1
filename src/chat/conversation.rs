//! Conversation Sink
//!
//! The observable message list a UI renders from. Mutations go through
//! the sink so every subscriber sees the same ordered event stream:
//! whole messages appended, streamed text grafted onto an existing
//! message, and the busy flag flipping.

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::ChatMessage;

/// Change notification emitted by [`Conversation`].
#[derive(Clone, Debug)]
pub enum ConversationEvent {
    /// A complete message was appended at `index`.
    MessageAppended { index: usize, message: ChatMessage },
    /// `delta` was appended to the text of the message at `index`.
    StreamingText { index: usize, delta: String },
    /// The host started or finished processing a turn.
    ProcessingChanged(bool),
}

#[derive(Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    processing: bool,
    subscribers: Vec<mpsc::UnboundedSender<ConversationEvent>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to change events. Dropped receivers are pruned on the
    /// next emit.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConversationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Append a message and return its index.
    pub fn push(&mut self, message: ChatMessage) -> usize {
        let index = self.messages.len();
        self.messages.push(message.clone());
        self.emit(ConversationEvent::MessageAppended { index, message });
        index
    }

    /// Append streamed text to the message at `index`. Out-of-range
    /// indices are ignored.
    pub fn append_text(&mut self, index: usize, delta: &str) {
        let Some(message) = self.messages.get_mut(index) else {
            debug!(index, "streaming text for unknown message index");
            return;
        };
        message.text.push_str(delta);
        self.emit(ConversationEvent::StreamingText {
            index,
            delta: delta.to_string(),
        });
    }

    /// Flip the busy flag, emitting only on an actual change.
    pub fn set_processing(&mut self, processing: bool) {
        if self.processing == processing {
            return;
        }
        self.processing = processing;
        self.emit(ConversationEvent::ProcessingChanged(processing));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn processing(&self) -> bool {
        self.processing
    }

    fn emit(&mut self, event: ConversationEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
