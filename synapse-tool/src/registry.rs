//! Registry of tools available to the loop.

use std::collections::HashMap;
use std::sync::Arc;

use synapse_types::{ToolDefinition, ToolDyn};

/// Holds tools as `Arc<dyn ToolDyn>` keyed by name.
///
/// Cloning is cheap: tools are reference-counted, so a sub-agent can be
/// handed a filtered copy without re-registering anything (see
/// `synapse-orch`).
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Every registered tool's definition, for inclusion in the provider
    /// request and for `SchemaValidator`'s schema snapshot.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A new registry containing only tools whose name passes `keep`. Used
    /// by the Sub-Agent Core to build a filtered tool set for a spawned
    /// agent without touching the parent's registry.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        Self {
            tools: self.tools.iter().filter(|(name, _)| keep(name)).map(|(n, t)| (n.clone(), t.clone())).collect(),
        }
    }
}
