//! Tool executor
//!
//! Runs one model turn's tool calls in request order and appends exactly one
//! tool-result message per call. Adapter failures and timeouts become error
//! results; dispatch faults stop the batch.

use crate::error::AgentError;
use crate::models::{Message, ToolCallRequest, ToolInput, ToolResultStatus};
use crate::state::{ConversationState, PendingHumanInput};
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a batch ended when it did not fault.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Every call has a result.
    Completed,
    /// A tool asked for a human; later calls are carried in the payload.
    Interrupted(PendingHumanInput),
}

pub struct ExecutionEngine {
    tool_registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(tool_registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            tool_registry,
            tool_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Execute calls in order, appending results to `state`.
    pub async fn execute_batch(
        &self,
        state: &mut ConversationState,
        calls: &[ToolCallRequest],
        ctx: &ToolContext,
    ) -> Result<BatchOutcome> {
        debug!(thread_id = %state.thread_id, calls = calls.len(), "Executing tool batch");

        for (index, call) in calls.iter().enumerate() {
            let started = Instant::now();

            let Some(tool) = self.tool_registry.get(&call.name) else {
                warn!(thread_id = %state.thread_id, tool_name = %call.name, "Tool not registered");
                let fault = AgentError::ToolNotFound(call.name.clone());
                state.push(error_result(call, &fault.to_string()));
                skip_remaining(state, &calls[index + 1..], &call.name);
                return Err(fault);
            };

            let input = ToolInput {
                tool_name: call.name.clone(),
                parameters: call.arguments.clone(),
            };

            let outcome = tokio::time::timeout(self.tool_timeout, tool.execute(&input, ctx)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(Ok(ToolOutcome::Completed(value))) => {
                    debug!(tool_name = %call.name, elapsed_ms, "Tool completed");
                    state.push(Message::tool_result(call, ToolResultStatus::Success, value));
                }
                Ok(Ok(ToolOutcome::NotFound(reason))) => {
                    debug!(tool_name = %call.name, elapsed_ms, "Tool found nothing");
                    state.push(Message::tool_result(
                        call,
                        ToolResultStatus::NotFound,
                        Value::String(reason),
                    ));
                }
                Ok(Ok(ToolOutcome::Interrupt(query))) => {
                    info!(
                        thread_id = %state.thread_id,
                        tool_name = %call.name,
                        "Tool requested human input"
                    );
                    return Ok(BatchOutcome::Interrupted(PendingHumanInput {
                        tool_call: call.clone(),
                        query,
                        remaining: calls[index + 1..].to_vec(),
                    }));
                }
                Ok(Err(e)) if e.is_dispatch_fault() => {
                    warn!(tool_name = %call.name, error = %e, "Dispatch fault");
                    state.push(error_result(call, &e.to_string()));
                    skip_remaining(state, &calls[index + 1..], &call.name);
                    return Err(e);
                }
                Ok(Err(e)) => {
                    warn!(tool_name = %call.name, error = %e, elapsed_ms, "Tool execution failed");
                    state.push(error_result(call, &e.to_string()));
                }
                Err(_) => {
                    warn!(
                        tool_name = %call.name,
                        timeout_secs = self.tool_timeout.as_secs_f64(),
                        "Tool timed out"
                    );
                    state.push(error_result(
                        call,
                        &format!(
                            "Tool {} timed out after {:.1}s",
                            call.name,
                            self.tool_timeout.as_secs_f64()
                        ),
                    ));
                }
            }
        }

        Ok(BatchOutcome::Completed)
    }
}

fn error_result(call: &ToolCallRequest, message: &str) -> Message {
    Message::tool_result(call, ToolResultStatus::Error, json!(message))
}

/// Give every call after a fault its own result so none is left dangling.
fn skip_remaining(state: &mut ConversationState, rest: &[ToolCallRequest], failed: &str) {
    for call in rest {
        state.push(error_result(
            call,
            &format!("Not executed: an earlier call to {} in this batch failed", failed),
        ));
    }
}
