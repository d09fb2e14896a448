//! MCP server exposing [`ToolDispatcher`]'s closed catalog over stdio
//! (spec §6 "Transport"). Grounded in the teacher's `neuron-mcp::McpServer`:
//! same `ServerHandler` shape, same stdio transport, same "tool failure
//! becomes a `CallToolResult::error`, not a protocol-level error" policy —
//! generalized from a dynamic `ToolRegistry` to this server's fixed catalog.

use std::borrow::Cow;
use std::sync::Arc;

use reasoning_arbiter::ProviderArbiter;
use reasoning_memory::MemoryProtocol;
use reasoning_session::SessionStore;
use reasoning_tool::ToolDispatcher;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::io::stdio;
use rmcp::{ErrorData, ServerHandler, ServiceExt};
use serde_json::json;

/// One entry in the closed tool catalog: name, description, and input
/// schema, exactly as enumerated in spec §4.8.
struct ToolSpec {
    name: &'static str,
    description: &'static str,
    schema: fn() -> serde_json::Value,
}

fn analysis_context_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "attempted_approaches": { "type": "array", "items": { "type": "string" } },
            "partial_findings": { "type": "array", "items": { "type": "string" } },
            "stuck_points": { "type": "array", "items": { "type": "string" } },
            "focus": {
                "type": "object",
                "properties": {
                    "files": { "type": "array", "items": { "type": "string" } },
                    "entry_points": { "type": "array", "items": { "type": "string" } },
                    "service_names": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["files"],
            },
            "budget_remaining_seconds": { "type": "number" },
        },
        "required": ["focus"],
    })
}

fn one_shot_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "context": analysis_context_schema() },
        "required": ["context"],
    })
}

const TOOL_CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: "escalate_analysis",
        description: "General-purpose escalation of a stuck analysis to an LLM provider.",
        schema: one_shot_schema,
    },
    ToolSpec {
        name: "trace_execution_path",
        description: "Trace an execution path across the given entry points and files.",
        schema: one_shot_schema,
    },
    ToolSpec {
        name: "cross_system_impact",
        description: "Assess cross-system/cross-service impact of a change.",
        schema: one_shot_schema,
    },
    ToolSpec {
        name: "performance_bottleneck",
        description: "Hunt for a performance bottleneck given context and focus files.",
        schema: one_shot_schema,
    },
    ToolSpec {
        name: "hypothesis_test",
        description: "Confirm or refute a single stated hypothesis against the given context.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "context": analysis_context_schema(),
                    "hypothesis": { "type": "string" },
                },
                "required": ["context", "hypothesis"],
            })
        },
    },
    ToolSpec {
        name: "start_conversation",
        description: "Start a new multi-turn conversational analysis session.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "analysis_type": { "type": "string" },
                    "context": analysis_context_schema(),
                    "initial_question": { "type": "string" },
                },
                "required": ["analysis_type", "context"],
            })
        },
    },
    ToolSpec {
        name: "continue_conversation",
        description: "Continue an existing conversational analysis session with a new message.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "message": { "type": "string" },
                },
                "required": ["session_id", "message"],
            })
        },
    },
    ToolSpec {
        name: "finalize_conversation",
        description: "Finalize a conversational session into a summarized result.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "format": { "type": "string", "enum": ["detailed", "concise", "actionable"] },
                },
                "required": ["session_id"],
            })
        },
    },
    ToolSpec {
        name: "get_conversation_status",
        description: "Get the current lifecycle state of a conversational session.",
        schema: || {
            json!({
                "type": "object",
                "properties": { "session_id": { "type": "string" } },
                "required": ["session_id"],
            })
        },
    },
    ToolSpec {
        name: "run_hypothesis_tournament",
        description: "Run a bracketed tournament over a generated set of competing hypotheses.",
        schema: || {
            json!({
                "type": "object",
                "properties": {
                    "context": analysis_context_schema(),
                    "issue": { "type": "string" },
                    "config": { "type": "object" },
                },
                "required": ["context", "issue"],
            })
        },
    },
    ToolSpec {
        name: "health_check",
        description: "Run a single named health check on demand.",
        schema: || {
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"],
            })
        },
    },
    ToolSpec {
        name: "health_summary",
        description: "Run every registered health check and return the aggregate summary.",
        schema: || json!({ "type": "object", "properties": {} }),
    },
    ToolSpec {
        name: "get_model_info",
        description: "List configured providers and their current availability.",
        schema: || json!({ "type": "object", "properties": {} }),
    },
    ToolSpec {
        name: "set_model",
        description: "Set the client's preferred provider by name.",
        schema: || {
            json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"],
            })
        },
    },
];

/// Wraps a [`ToolDispatcher`] and serves its catalog over stdio, recording
/// every completed call into the [`MemoryProtocol`] checkpoint ring.
pub struct McpServer {
    dispatcher: Arc<ToolDispatcher>,
    sessions: Arc<SessionStore>,
    arbiter: Arc<ProviderArbiter>,
    memory: Arc<MemoryProtocol>,
    name: String,
    version: String,
}

impl McpServer {
    /// Build a server wrapping `dispatcher`, identifying itself as `name`
    /// `version` in the MCP handshake.
    pub fn new(
        dispatcher: Arc<ToolDispatcher>,
        sessions: Arc<SessionStore>,
        arbiter: Arc<ProviderArbiter>,
        memory: Arc<MemoryProtocol>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            arbiter,
            memory,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Serve over stdin/stdout until the client disconnects or the
    /// process is asked to shut down. Blocks the calling task.
    pub async fn serve_stdio(self) -> Result<(), rmcp::ServiceError> {
        let transport = stdio();
        let handler = McpHandler {
            dispatcher: self.dispatcher,
            sessions: self.sessions,
            arbiter: self.arbiter,
            memory: self.memory,
            name: self.name,
            version: self.version,
        };
        let service = handler.serve(transport).await?;
        service.waiting().await?;
        Ok(())
    }
}

struct McpHandler {
    dispatcher: Arc<ToolDispatcher>,
    sessions: Arc<SessionStore>,
    arbiter: Arc<ProviderArbiter>,
    memory: Arc<MemoryProtocol>,
    name: String,
    version: String,
}

impl ServerHandler for McpHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools: Vec<McpTool> = TOOL_CATALOG
            .iter()
            .map(|spec| {
                let schema_obj = (spec.schema)().as_object().cloned().unwrap_or_default();
                McpTool {
                    name: Cow::Borrowed(spec.name),
                    title: None,
                    description: Some(Cow::Borrowed(spec.description)),
                    input_schema: Arc::new(schema_obj),
                    output_schema: None,
                    annotations: None,
                    execution: None,
                    icons: None,
                    meta: None,
                }
            })
            .collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let tool_name = &*request.name;
        let args = match request.arguments {
            Some(map) => serde_json::Value::Object(map),
            None => serde_json::Value::Object(serde_json::Map::new()),
        };

        let outcome = self.dispatcher.dispatch(tool_name, args).await;
        self.record_checkpoint(tool_name, &outcome).await;

        match outcome {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => {
                let message = format!("{}: {}", e.category(), e);
                tracing::warn!(tool = %tool_name, category = e.category(), "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(message)]))
            }
        }
    }
}

impl McpHandler {
    /// Feed the completed call into the checkpoint ring (spec §4.10): a
    /// from-cache analysis result counts as a cache hit, everything else
    /// that reached a provider counts as a miss.
    async fn record_checkpoint(&self, tool_name: &str, outcome: &Result<serde_json::Value, reasoning_tool::ToolError>) {
        let summary = match outcome {
            Ok(_) => format!("{tool_name}: success"),
            Err(e) => format!("{tool_name}: {}", e.category()),
        };
        self.memory.record_tool_result(summary).await;

        if let Ok(result) = outcome {
            if let Some(from_cache) = result.pointer("/metadata/from_cache").and_then(|v| v.as_bool()) {
                self.memory.record_cache_outcome(from_cache).await;
            }
        }

        let active_session_ids = self.sessions.active_ids().await.iter().map(|id| id.to_string()).collect();
        let provider_stats = self.arbiter.stats_snapshot().await;
        self.memory.record_turn(active_session_ids, provider_stats).await;
    }
}
