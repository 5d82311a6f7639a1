//! Tool Registry
//!
//! An ordered lookup from tool name to executor. Names are unique
//! case-insensitively; registering a duplicate replaces the existing
//! tool in place, so registration order is preserved and the dispatcher
//! can scan it deterministically.

use std::sync::Arc;

use tracing::debug;

use crate::types::ChatTool;

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ChatTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A case-insensitive name conflict replaces the
    /// previously registered tool in its original slot.
    pub fn register(&mut self, tool: Arc<dyn ChatTool>) {
        if tool.name().trim().is_empty() {
            debug!("ignoring tool registration with empty name");
            return;
        }

        if let Some(existing) = self
            .tools
            .iter_mut()
            .find(|t| t.name().eq_ignore_ascii_case(tool.name()))
        {
            debug!("replacing registered tool '{}'", tool.name());
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Look up a tool by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ChatTool>> {
        self.tools.iter().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ChatTool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
