//! Conversation control loop
//!
//! AwaitingModel → ExecutingTool → AwaitingModel → … → UpdatingMemory? → Terminated
//!
//! The only suspension point is AwaitingHuman; the caller persists the state
//! and later calls `resume` with the human's answer.

use crate::classifier::{mentions_peer, BlueprintClassifier};
use crate::config::Settings;
use crate::error::AgentError;
use crate::execution::{BatchOutcome, ExecutionEngine};
use crate::llm::ChatModel;
use crate::memory::{update_peer_memory, MemoryStore};
use crate::models::{BlueprintExecutionStatus, HumanQuery, Message, ToolResultStatus};
use crate::state::{ConversationState, LoopPhase};
use crate::tools::{ToolContext, ToolRegistry};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const BASE_SYSTEM_PROMPT: &str = "You are a helpful financial research assistant. \
Use the tools to look up SEC filings, financial statements, stock quotes, analyst ratings, \
earnings, news and saved client records rather than answering from memory. \
When a company name is ambiguous, resolve it with get_ticker_given_name. \
Cite the figures you use.";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed { answer: String },
    Suspended { query: HumanQuery },
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_model_calls: u32,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for AgentConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_model_calls: settings.max_model_calls,
            model_timeout: settings.model_timeout,
            tool_timeout: settings.tool_timeout,
        }
    }
}

/// Drives one conversation at a time; share it behind an `Arc`.
pub struct Agent {
    model: Box<dyn ChatModel>,
    execution_engine: ExecutionEngine,
    memory: Arc<dyn MemoryStore>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        model: Box<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            execution_engine: ExecutionEngine::new(registry, config.tool_timeout),
            memory,
            config,
        }
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.execution_engine.registry()
    }

    /// Start a turn with a new user message.
    pub async fn submit_user_message(
        &self,
        state: &mut ConversationState,
        text: &str,
    ) -> Result<TurnOutcome> {
        match state.phase {
            LoopPhase::Terminated | LoopPhase::AwaitingModel => {}
            LoopPhase::AwaitingHuman(_) => {
                return Err(AgentError::InvalidState(
                    "conversation is waiting for human input; resume it first".to_string(),
                ))
            }
            ref other => {
                return Err(AgentError::InvalidState(format!(
                    "cannot accept a message while {}",
                    other.label()
                )))
            }
        }

        info!(thread_id = %state.thread_id, "User message received");
        state.push(Message::user(text));
        detect_blueprint(state, text);
        state.set_phase(LoopPhase::AwaitingModel);

        self.run(state).await
    }

    /// Answer the pending human request and continue the turn.
    pub async fn resume(&self, state: &mut ConversationState, answer: &str) -> Result<TurnOutcome> {
        let Some(pending) = state.pending_human_input().cloned() else {
            return Err(AgentError::InvalidState(format!(
                "no pending human request (phase: {})",
                state.phase.label()
            )));
        };

        let value = pending.query.resolve(answer);
        info!(
            thread_id = %state.thread_id,
            tool_name = %pending.tool_call.name,
            "Resuming with human answer"
        );
        state.push(Message::tool_result(
            &pending.tool_call,
            ToolResultStatus::Human,
            value,
        ));

        if pending.remaining.is_empty() {
            state.set_phase(LoopPhase::AwaitingModel);
        } else {
            state.set_phase(LoopPhase::ExecutingTool {
                pending: pending.remaining,
            });
        }

        self.run(state).await
    }

    /// Step until the turn terminates or suspends.
    pub async fn run(&self, state: &mut ConversationState) -> Result<TurnOutcome> {
        let mut model_calls: u32 = 0;

        loop {
            match state.phase.clone() {
                LoopPhase::AwaitingModel => {
                    if model_calls >= self.config.max_model_calls {
                        warn!(thread_id = %state.thread_id, model_calls, "Model call cap reached");
                        return Err(AgentError::MaxTurnsExceeded(format!(
                            "more than {} model calls in one turn",
                            self.config.max_model_calls
                        )));
                    }
                    model_calls += 1;
                    self.call_model(state).await?;
                }
                LoopPhase::ExecutingTool { pending } => {
                    let ctx = ToolContext {
                        memory: self.memory.clone(),
                        thread_id: state.thread_id,
                    };

                    match self.execution_engine.execute_batch(state, &pending, &ctx).await {
                        Ok(BatchOutcome::Completed) => state.set_phase(LoopPhase::AwaitingModel),
                        Ok(BatchOutcome::Interrupted(pending)) => {
                            let query = pending.query.clone();
                            state.set_phase(LoopPhase::AwaitingHuman(pending));
                            return Ok(TurnOutcome::Suspended { query });
                        }
                        Err(e) => {
                            // Every call has a result, so the log is consistent again
                            state.set_phase(LoopPhase::AwaitingModel);
                            return Err(e);
                        }
                    }
                }
                LoopPhase::AwaitingHuman(pending) => {
                    return Ok(TurnOutcome::Suspended {
                        query: pending.query,
                    });
                }
                LoopPhase::UpdatingMemory => {
                    let update = update_peer_memory(state, self.memory.as_ref()).await;
                    state.set_phase(LoopPhase::Terminated);
                    let update = update?;
                    debug!(thread_id = %state.thread_id, ?update, "Peer memory step finished");
                }
                LoopPhase::Terminated => {
                    let answer = state.final_answer().unwrap_or_default().to_string();
                    info!(thread_id = %state.thread_id, messages = state.message_count(), "Turn completed");
                    return Ok(TurnOutcome::Completed { answer });
                }
            }
        }
    }

    async fn call_model(&self, state: &mut ConversationState) -> Result<()> {
        let system = system_prompt(state);
        let specs = self.registry().specs();

        let response = tokio::time::timeout(
            self.config.model_timeout,
            self.model.complete(&system, state.messages(), &specs),
        )
        .await
        .map_err(|_| {
            AgentError::LlmError(format!(
                "model did not answer within {}s",
                self.config.model_timeout.as_secs()
            ))
        })??;

        debug!(
            thread_id = %state.thread_id,
            tool_calls = response.tool_calls.len(),
            "Model responded"
        );

        let calls = response.tool_calls.clone();
        state.push(Message::assistant(response.content, response.tool_calls));

        if !calls.is_empty() {
            state.set_phase(LoopPhase::ExecutingTool { pending: calls });
        } else if state
            .last_user_message()
            .and_then(Message::text)
            .is_some_and(mentions_peer)
        {
            state.set_phase(LoopPhase::UpdatingMemory);
        } else {
            state.set_phase(LoopPhase::Terminated);
        }
        Ok(())
    }
}

/// Set the session mode on the first message that decides it.
fn detect_blueprint(state: &mut ConversationState, text: &str) {
    if state.mode.is_some() {
        return;
    }

    let blueprint = BlueprintClassifier::detect(text);
    state.mode = Some(BlueprintClassifier::mode_for(blueprint));

    if let Some(blueprint) = blueprint {
        info!(thread_id = %state.thread_id, blueprint = %blueprint, "Blueprint detected");
        state.current_blueprint = Some(blueprint);
        state.blueprint_status = Some(BlueprintExecutionStatus::start(
            blueprint,
            Some(text.to_string()),
        ));
    }
}

fn system_prompt(state: &ConversationState) -> String {
    match state.current_blueprint {
        Some(blueprint) => format!(
            "{}\n\nThe user is running the {} blueprint. Gather the data that analysis needs before answering.",
            BASE_SYSTEM_PROMPT, blueprint
        ),
        None => BASE_SYSTEM_PROMPT.to_string(),
    }
}
