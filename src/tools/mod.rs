pub mod builtin;

pub use builtin::{register_builtin_tools, ToolContext};

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// A tool handler takes JSON arguments and resolves to a JSON result.
/// Sync and async tools share this shape.
pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments object.
    pub parameters: Value,
    handler: ToolHandler,
}

impl ToolSpec {
    pub fn new(
        name: &'static str,
        description: &'static str,
        parameters: Value,
        handler: ToolHandler,
    ) -> Self {
        ToolSpec {
            name,
            description,
            parameters,
            handler,
        }
    }
}

/// Explicit registry of callable tools, built by registration calls at
/// startup. Registration order is preserved for listings.
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: Vec::new() }
    }

    pub fn register(&mut self, spec: ToolSpec) {
        if self.tools.iter().any(|t| t.name == spec.name) {
            log::info!("Tool {} already registered, skipping", spec.name);
            return;
        }
        log::info!("Registered tool: {}", spec.name);
        self.tools.push(spec);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow!("Unknown tool: {}", name))?;
        (tool.handler)(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        ToolRegistry::new()
    }
}

/// Wraps a synchronous function as a [`ToolHandler`].
pub fn sync_handler<F>(f: F) -> ToolHandler
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(move |args| -> BoxFuture<'static, Result<Value>> {
        let result = f(args);
        Box::pin(async move { result })
    })
}
