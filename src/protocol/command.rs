//! Command Sanitizer & Validator
//!
//! Turns the raw tool-payload buffer into validated tool invocations.
//! Sanitizing is a single pass that never grows the input; validation is
//! a structural JSON parse with no semantic interpretation. A malformed
//! payload is discarded (logged, never surfaced) so a bad tool command
//! cannot fail the turn.

use tracing::debug;

use crate::types::ToolInvocation;

/// Strip characters that commonly break model-emitted JSON: byte-order
/// marks, NULs, and control characters below 0x20 other than tab,
/// newline, and carriage return. Curly quotes are normalized to their
/// ASCII forms. Idempotent; output length never exceeds input length.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '\u{FEFF}' | '\0' => {}
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            c if (c as u32) < 32 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }

    out
}

/// Whether `text` parses as a JSON document. Blank input is invalid.
pub fn is_valid_json(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Sanitize and parse a raw command payload into tool invocations.
///
/// The payload is wrapped as a single-element array before parsing, so a
/// bare `{"tool": ..., "parameters": [...]}` object becomes a batch of
/// one. Returns `None` when the payload is malformed or any request in
/// the batch is missing its tool name or parameters -- the whole batch is
/// dropped rather than partially executed.
pub fn parse_invocations(raw: &str) -> Option<Vec<ToolInvocation>> {
    let sanitized = sanitize(raw);

    if !is_valid_json(&sanitized) {
        debug!("discarding tool payload: not valid JSON");
        return None;
    }

    let wrapped = format!("[{}]", sanitized);
    let invocations: Vec<ToolInvocation> = match serde_json::from_str(&wrapped) {
        Ok(list) => list,
        Err(e) => {
            debug!("discarding tool payload: {}", e);
            return None;
        }
    };

    // Fail closed: a request with a blank tool name voids the batch.
    if invocations.iter().any(|inv| inv.tool.trim().is_empty()) {
        debug!("discarding tool payload: blank tool name in batch");
        return None;
    }

    Some(invocations)
}
