//! Streaming Protocol State Machine
//!
//! Classifies the inference loop's decoded deltas in production order
//! into human-visible text or a raw tool-command payload. The alphabet
//! is four marker literals compared against the trimmed delta: `>` opens
//! a marker, `!` begins a friendly-text span, `#` begins a tool-payload
//! span, and `END` terminates the turn. Markers are structural, never
//! content.

pub mod command;
pub mod dispatch;

/// Classification state for one generation session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolState {
    Idle,
    MarkerOpen,
    FriendlyText,
    ToolPayload,
    Ended,
}

/// Where a delta was routed. `Ended` means the turn should terminate:
/// the caller cancels the generation stream (a content-driven stop, not
/// an error).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    Visible,
    Command,
    Marker,
    Discarded,
    Ended,
}

/// Consumes deltas one at a time, accumulating visible text and command
/// payload as disjoint buffers. The raw, unclassified concatenation is
/// kept in parallel; it is what goes back into history as the
/// assistant's turn.
pub struct ProtocolMachine {
    state: ProtocolState,
    tooling: bool,
    visible: String,
    payload: String,
    raw: String,
}

impl ProtocolMachine {
    /// When `tooling` is false the machine bypasses classification and
    /// every delta is visible text.
    pub fn new(tooling: bool) -> Self {
        Self {
            state: ProtocolState::Idle,
            tooling,
            visible: String::new(),
            payload: String::new(),
            raw: String::new(),
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == ProtocolState::Ended
    }

    pub fn visible_text(&self) -> &str {
        &self.visible
    }

    pub fn command_payload(&self) -> &str {
        &self.payload
    }

    pub fn raw_transcript(&self) -> &str {
        &self.raw
    }

    /// Classify one delta. Deltas must be fed strictly in production
    /// order; every delta lands in exactly one buffer or is consumed as
    /// a marker.
    pub fn feed(&mut self, delta: &str) -> Routed {
        self.raw.push_str(delta);

        if !self.tooling {
            self.visible.push_str(delta);
            return Routed::Visible;
        }

        let trimmed = delta.trim();

        match self.state {
            ProtocolState::Ended => Routed::Discarded,

            ProtocolState::Idle => {
                if trimmed == ">" {
                    self.state = ProtocolState::MarkerOpen;
                    Routed::Marker
                } else {
                    // No marker opened yet: chatter before the protocol
                    // starts is dropped.
                    Routed::Discarded
                }
            }

            ProtocolState::MarkerOpen => match trimmed {
                "!" => {
                    self.state = ProtocolState::FriendlyText;
                    Routed::Marker
                }
                "#" => {
                    self.state = ProtocolState::ToolPayload;
                    Routed::Marker
                }
                "END" => {
                    self.state = ProtocolState::Ended;
                    Routed::Ended
                }
                // An unexpected delta between `>` and its selector is
                // dropped; the marker stays open.
                _ => Routed::Discarded,
            },

            ProtocolState::FriendlyText => {
                if trimmed == ">" {
                    self.state = ProtocolState::MarkerOpen;
                    Routed::Marker
                } else {
                    self.visible.push_str(delta);
                    Routed::Visible
                }
            }

            ProtocolState::ToolPayload => {
                if trimmed == ">" {
                    self.state = ProtocolState::MarkerOpen;
                    Routed::Marker
                } else {
                    self.payload.push_str(delta);
                    Routed::Command
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(machine: &mut ProtocolMachine, deltas: &[&str]) -> Vec<Routed> {
        deltas.iter().map(|d| machine.feed(d)).collect()
    }

    #[test]
    fn test_canonical_sequence_splits_buffers() {
        let mut machine = ProtocolMachine::new(true);
        feed_all(
            &mut machine,
            &[
                ">",
                "!",
                "Hello ",
                "world",
                ">",
                "#",
                "{\"tool\":\"x\",\"parameters\":[]}",
                ">",
                "END",
            ],
        );

        assert_eq!(machine.state(), ProtocolState::Ended);
        assert_eq!(machine.visible_text(), "Hello world");
        assert_eq!(
            machine.command_payload(),
            "{\"tool\":\"x\",\"parameters\":[]}"
        );
    }

    #[test]
    fn test_marker_free_stream_keeps_payload_empty() {
        let mut machine = ProtocolMachine::new(true);
        feed_all(&mut machine, &["just ", "some ", "prose"]);

        assert_eq!(machine.state(), ProtocolState::Idle);
        assert!(machine.command_payload().is_empty());
        // Tooling enabled and no marker yet: deltas are dropped from the
        // visible channel too.
        assert!(machine.visible_text().is_empty());
    }

    #[test]
    fn test_tooling_disabled_passes_everything_through() {
        let mut machine = ProtocolMachine::new(false);
        let routes = feed_all(&mut machine, &[">", "!", "raw ", "text"]);

        assert!(routes.iter().all(|r| *r == Routed::Visible));
        assert_eq!(machine.visible_text(), ">!raw text");
        assert_eq!(machine.state(), ProtocolState::Idle);
    }

    #[test]
    fn test_markers_are_trimmed_before_comparison() {
        let mut machine = ProtocolMachine::new(true);
        feed_all(&mut machine, &[" > ", " ! ", "hi", " > ", " END "]);

        assert_eq!(machine.state(), ProtocolState::Ended);
        assert_eq!(machine.visible_text(), "hi");
    }

    #[test]
    fn test_deltas_after_end_are_ignored() {
        let mut machine = ProtocolMachine::new(true);
        feed_all(&mut machine, &[">", "END"]);
        assert_eq!(machine.feed("late"), Routed::Discarded);
        assert_eq!(machine.state(), ProtocolState::Ended);
        assert!(machine.visible_text().is_empty());
    }

    #[test]
    fn test_stream_ending_mid_span_is_clean() {
        // Engine reports done while still in FriendlyText: whatever was
        // accumulated stands, no error.
        let mut machine = ProtocolMachine::new(true);
        feed_all(&mut machine, &[">", "!", "partial ", "answer"]);

        assert_eq!(machine.state(), ProtocolState::FriendlyText);
        assert_eq!(machine.visible_text(), "partial answer");
    }

    #[test]
    fn test_raw_transcript_retains_everything() {
        let mut machine = ProtocolMachine::new(true);
        feed_all(&mut machine, &[">", "!", "Hello", ">", "END"]);

        assert_eq!(machine.raw_transcript(), ">!Hello>END");
    }

    #[test]
    fn test_switching_spans_midway() {
        let mut machine = ProtocolMachine::new(true);
        feed_all(
            &mut machine,
            &[">", "#", "{\"a\":1}", ">", "!", "done", ">", "#", "{\"b\":2}"],
        );

        assert_eq!(machine.visible_text(), "done");
        assert_eq!(machine.command_payload(), "{\"a\":1}{\"b\":2}");
        assert_eq!(machine.state(), ProtocolState::ToolPayload);
    }

    #[test]
    fn test_unexpected_delta_keeps_marker_open() {
        let mut machine = ProtocolMachine::new(true);
        assert_eq!(machine.feed(">"), Routed::Marker);
        assert_eq!(machine.feed("noise"), Routed::Discarded);
        assert_eq!(machine.state(), ProtocolState::MarkerOpen);
        assert_eq!(machine.feed("!"), Routed::Marker);
        assert_eq!(machine.state(), ProtocolState::FriendlyText);
    }
}
