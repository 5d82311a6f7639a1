//! Tool Dispatcher
//!
//! Resolves validated invocations against the registry and executes
//! them sequentially, in request order. For each request the first tool
//! whose name matches case-insensitively runs; unknown names are skipped
//! without error (the model may hallucinate tools), and one tool's
//! failure never aborts its siblings.

use tracing::{debug, warn};

use crate::tools::registry::ToolRegistry;
use crate::types::{ChatMessage, StructuredContent, ToolInvocation, ToolResultContent};

/// Execute a batch of invocations. Each successful result becomes an
/// assistant message carrying the tool output; ordering follows the
/// request order for conversational coherence.
pub async fn dispatch(
    requests: &[ToolInvocation],
    registry: &ToolRegistry,
) -> Vec<ChatMessage> {
    let mut results = Vec::new();

    for request in requests {
        let Some(tool) = registry
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(&request.tool))
        else {
            debug!("skipping unregistered tool '{}'", request.tool);
            continue;
        };

        match tool.execute(&request.parameters).await {
            Ok(output) => {
                debug!("tool '{}' returned {} bytes", tool.name(), output.len());
                results.push(
                    ChatMessage::assistant(output.clone()).with_content(
                        StructuredContent::ToolResult(ToolResultContent {
                            tool: tool.name().to_string(),
                            output,
                        }),
                    ),
                );
            }
            Err(err) => {
                warn!("tool '{}' failed: {:#}", tool.name(), err);
            }
        }
    }

    results
}
