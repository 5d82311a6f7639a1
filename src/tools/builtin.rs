//! Built-in Tools
//!
//! The small set of tools registered by default. Parameters arrive as
//! the ordered list of opaque JSON values the model put in the command
//! payload; each tool interprets them itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;

use crate::tools::registry::ToolRegistry;
use crate::types::{ChatTool, ToolParameter};

/// Registry pre-loaded with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in create_builtin_tools() {
        registry.register(tool);
    }
    registry
}

pub fn create_builtin_tools() -> Vec<Arc<dyn ChatTool>> {
    vec![Arc::new(CurrentTimeTool::new()), Arc::new(SumTool::new())]
}

// --- current_time ---

pub struct CurrentTimeTool {
    parameters: Vec<ToolParameter>,
}

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current local date and time."
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    async fn execute(&self, _parameters: &[serde_json::Value]) -> anyhow::Result<String> {
        Ok(Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

// --- sum ---

pub struct SumTool {
    parameters: Vec<ToolParameter>,
}

impl SumTool {
    pub fn new() -> Self {
        Self {
            parameters: vec![ToolParameter::new(
                "values",
                "number[]",
                "Numbers to add together.",
            )],
        }
    }
}

impl Default for SumTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTool for SumTool {
    fn name(&self) -> &str {
        "sum"
    }

    fn description(&self) -> &str {
        "Adds up every number found in the parameters and returns the total."
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    async fn execute(&self, parameters: &[serde_json::Value]) -> anyhow::Result<String> {
        let mut total = 0.0;
        let mut count = 0usize;
        for value in parameters {
            collect_numbers(value, &mut total, &mut count);
        }

        if count == 0 {
            anyhow::bail!("no numbers in parameters");
        }
        Ok(format!("{}", total))
    }
}

fn collect_numbers(value: &serde_json::Value, total: &mut f64, count: &mut usize) {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                *total += f;
                *count += 1;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_numbers(item, total, count);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_numbers(item, total, count);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_current_time_returns_formatted_stamp() {
        let tool = CurrentTimeTool::new();
        let out = tool.execute(&[]).await.unwrap();
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(out.len(), 19);
    }

    #[tokio::test]
    async fn test_sum_adds_numbers_from_objects_and_arrays() {
        let tool = SumTool::new();
        let out = tool
            .execute(&[json!({"a": 1, "b": 2}), json!([3, 4.5])])
            .await
            .unwrap();
        assert_eq!(out, "10.5");
    }

    #[tokio::test]
    async fn test_sum_without_numbers_errors() {
        let tool = SumTool::new();
        assert!(tool.execute(&[json!({"a": "x"})]).await.is_err());
    }

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("current_time").is_some());
        assert!(registry.get("sum").is_some());
    }
}
