//! Hooks for watching an agent think

use serde_json::Value;
use tracing::info;

/// Callbacks fired while [`super::Agent`] runs
///
/// All methods default to no-ops, so implementors only override what
/// they want to show.
#[allow(unused_variables)]
pub trait AgentObserver: Send + Sync {
    /// A model call is about to start; `turn` counts from 1
    fn on_turn(&self, turn: u32) {}

    /// The model asked for a tool
    fn on_tool_call(&self, name: &str, args: &Value) {}

    /// A tool finished; errors arrive as `"Error: ..."` strings
    fn on_tool_result(&self, name: &str, result: &Value) {}

    /// The final answer is ready
    fn on_answer(&self, text: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {}

/// Observer that reports progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AgentObserver for TracingObserver {
    fn on_turn(&self, turn: u32) {
        info!(turn, "Thinking");
    }

    fn on_tool_call(&self, name: &str, args: &Value) {
        info!(tool = %name, args = %args, "Calling tool");
    }

    fn on_tool_result(&self, name: &str, result: &Value) {
        let preview: String = result.to_string().chars().take(500).collect();
        info!(tool = %name, result = %preview, "Tool returned");
    }

    fn on_answer(&self, text: &str) {
        info!(chars = text.chars().count(), "Answer ready");
    }
}
