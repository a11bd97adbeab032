//! Tool trait and registry
//!
//! Tools are deterministic and stateless with respect to the conversation.
//! The registry is built once at startup and only read afterwards.

pub mod finance;
pub mod knowledge_search;
pub mod platform;
pub mod swot;

pub use finance::{FinanceCalculatorTool, FinanceProjection};
pub use knowledge_search::{KnowledgeSearchTool, NOT_FOUND_SENTINEL};
pub use platform::PlatformRecommenderTool;
pub use swot::SwotTool;

use crate::error::AdvisorError;
use crate::knowledge::KnowledgeStore;
use crate::models::{ToolInput, ToolSpec};
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the structured input record
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Tool registry for looking up tools. Registration order is preserved.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AdvisorError::DuplicateName(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Look a tool up by name. Falls back to an ASCII case-insensitive
    /// match since models often echo names with different casing.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        let name = name.trim();
        if let Some(&i) = self.index.get(name) {
            return Ok(self.tools[i].clone());
        }

        self.tools
            .iter()
            .find(|tool| tool.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| AdvisorError::UnknownTool(name.to_string()))
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a single text argument. Accepts a bare JSON string or an object
/// carrying one of `keys`.
pub(crate) fn require_text(input: &ToolInput, keys: &[&str]) -> Result<String> {
    let text = match &input.parameters {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    };

    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(AdvisorError::InvalidInput(format!(
            "{} expects a non-empty '{}' string",
            input.tool_name, keys[0]
        ))),
    }
}

/// Schema for tools taking one string field
pub(crate) fn text_schema(field: &str, description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            field: { "type": "string", "description": description }
        },
        "required": [field]
    })
}

/// Create the registry with the four advisor tools, in prompt order.
pub fn create_default_registry(knowledge: Arc<KnowledgeStore>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SwotTool))?;
    registry.register(Arc::new(FinanceCalculatorTool))?;
    registry.register(Arc::new(PlatformRecommenderTool))?;
    registry.register(Arc::new(KnowledgeSearchTool::new(knowledge)))?;

    Ok(registry)
}
