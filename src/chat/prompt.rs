//! Prompt Compiler
//!
//! Turns an ordered chat history into a single model-input string with
//! role-tagged blocks, and builds the system prompt that teaches the
//! model the marker protocol and the registered tools.

use chrono::Local;

use crate::tools::registry::ToolRegistry;
use crate::types::{ChatMessage, ChatRole, StructuredContent};

/// Compile a history into the model's input text. Pure; an empty
/// history still emits the trailing open assistant tag that prompts
/// continuation.
pub fn compile(history: &[ChatMessage]) -> String {
    let mut out = String::new();

    for msg in history {
        match msg.role {
            ChatRole::System => {
                out.push_str(&format!("<|system|>\n{}<|end|>\n", msg.text));
            }
            ChatRole::User => {
                out.push_str(&format!("<|user|>\n{}<|end|>\n", msg.text));
            }
            ChatRole::Assistant => {
                // A prior tool call is replayed as its JSON form so the
                // model keeps tool history in context.
                let payload = match &msg.content {
                    Some(StructuredContent::ToolCall(call)) => serde_json::json!({
                        "name": call.name,
                        "arguments": call.arguments,
                    })
                    .to_string(),
                    _ => msg.text.clone(),
                };
                out.push_str(&format!("<|assistant|>\n >!{}<|end|>\n", payload));
            }
        }
    }

    out.push_str("<|assistant|>\n");
    out
}

/// Build the per-turn system prompt. With tooling disabled this is the
/// base prompt plus the current date; with tooling enabled it also
/// describes every registered tool and the strict response format.
pub fn build_system_prompt(base: &str, registry: &ToolRegistry, tooling: bool) -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M");

    if !tooling {
        return format!("{} Today's date and time is {}.", base, now);
    }

    let mut prompt = String::new();
    prompt.push_str("## Role\n");
    prompt.push_str(base);
    prompt.push_str("\n\n## Date\n");
    prompt.push_str(&format!("Date today: {}\n\n", now));
    prompt.push_str(&tools_section(registry));
    prompt.push_str(
        "\n## Rule\n\
         Respond in this strict format on every reply:\n\
         ```>! user_friendly_message ># json_data >END```\n\n\
         `>!` marks the start of the friendly message\n\
         `>#` marks the start of the tool payload\n\
         `>END` marks the end of the reply\n\n\
         The tool payload is a JSON object shaped \
         `{ \"tool\": \"tool_name\", \"parameters\": [...] }`. \
         Respond cleanly and respectfully, with no extra details.\n",
    );

    prompt
}

/// Render the registered tools into a system-prompt section.
pub fn tools_section(registry: &ToolRegistry) -> String {
    let mut section = String::from(
        "## Tools\nYou have access to the following tools:\n",
    );

    for tool in registry.iter() {
        section.push_str(&format!("tool: `{}`\n", tool.name()));
        section.push_str(&format!("description: {}\n", tool.description()));
        let params = tool
            .parameters()
            .iter()
            .map(|p| format!("{{ \"{}\": {} }}", p.name, p.type_hint))
            .collect::<Vec<_>>()
            .join(", ");
        section.push_str(&format!("pseudo_parameters: `[{}]`\n\n", params));
    }

    section
}
