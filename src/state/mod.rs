//! Conversation state and checkpoint persistence
//!
//! A conversation is suspended only while it waits for a human. At that point
//! the whole state, including the tool calls still queued behind the
//! interrupted one, is serialized into a checkpoint so it can be resumed by
//! another process later.

use crate::error::AgentError;
use crate::models::{
    BlueprintExecutionStatus, BlueprintName, HumanQuery, Message, SessionMode, ToolCallRequest,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Human request held while the loop is suspended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingHumanInput {
    /// The call whose result the human will provide.
    pub tool_call: ToolCallRequest,
    pub query: HumanQuery,
    /// Calls from the same model turn that have not run yet, in request order.
    #[serde(default)]
    pub remaining: Vec<ToolCallRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopPhase {
    AwaitingModel,
    ExecutingTool { pending: Vec<ToolCallRequest> },
    AwaitingHuman(PendingHumanInput),
    UpdatingMemory,
    Terminated,
}

impl LoopPhase {
    pub fn label(&self) -> &'static str {
        match self {
            LoopPhase::AwaitingModel => "awaiting_model",
            LoopPhase::ExecutingTool { .. } => "executing_tool",
            LoopPhase::AwaitingHuman(_) => "awaiting_human",
            LoopPhase::UpdatingMemory => "updating_memory",
            LoopPhase::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub thread_id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    messages: Vec<Message>,
    #[serde(default)]
    pub mode: Option<SessionMode>,
    #[serde(default)]
    pub current_blueprint: Option<BlueprintName>,
    #[serde(default)]
    pub blueprint_status: Option<BlueprintExecutionStatus>,
    pub phase: LoopPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// A fresh conversation sits in `Terminated` until the first user message.
    pub fn new(user_id: Option<String>) -> Self {
        Self::with_thread_id(Uuid::new_v4(), user_id)
    }

    pub fn with_thread_id(thread_id: Uuid, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            user_id,
            messages: Vec::new(),
            mode: None,
            current_blueprint: None,
            blueprint_status: None,
            phase: LoopPhase::Terminated,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message. The log is append-only.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn set_phase(&mut self, phase: LoopPhase) {
        debug!(thread_id = %self.thread_id, from = self.phase.label(), to = phase.label(), "Phase transition");
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Index of the most recent user message.
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(Message::is_user)
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.last_user_index().map(|i| &self.messages[i])
    }

    /// Messages produced since the most recent user message (exclusive).
    pub fn current_turn(&self) -> &[Message] {
        match self.last_user_index() {
            Some(i) => &self.messages[i + 1..],
            None => &self.messages,
        }
    }

    /// Text of the last assistant message without tool calls.
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.is_user() && !m.is_tool_result() && m.tool_calls().is_empty())
            .and_then(Message::text)
    }

    pub fn pending_human_input(&self) -> Option<&PendingHumanInput> {
        match &self.phase {
            LoopPhase::AwaitingHuman(pending) => Some(pending),
            _ => None,
        }
    }
}

//
// ================= Checkpoints =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: Uuid,
    /// Serialized `ConversationState`; the hash covers exactly these bytes.
    pub state: String,
    pub state_hash: String,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn capture(state: &ConversationState) -> Result<Self> {
        let serialized = serde_json::to_string(state)?;
        Ok(Self {
            thread_id: state.thread_id,
            state_hash: compute_state_hash(&serialized),
            state: serialized,
            saved_at: Utc::now(),
        })
    }

    /// Check the stored bytes against their hash, then decode them.
    pub fn into_verified_state(self) -> Result<ConversationState> {
        if compute_state_hash(&self.state) != self.state_hash {
            return Err(AgentError::Checkpoint(format!(
                "Integrity check failed for thread {}",
                self.thread_id
            )));
        }
        Ok(serde_json::from_str(&self.state)?)
    }
}

/// Trait for checkpoint persistence
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, state: &ConversationState) -> Result<()>;
    async fn load(&self, thread_id: Uuid) -> Result<Option<ConversationState>>;
}

/// Keeps serialized checkpoints in a map.
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            checkpoints: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &ConversationState) -> Result<()> {
        let serialized = serde_json::to_string(&Checkpoint::capture(state)?)?;
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(state.thread_id, serialized);
        Ok(())
    }

    async fn load(&self, thread_id: Uuid) -> Result<Option<ConversationState>> {
        let checkpoints = self.checkpoints.read().await;
        match checkpoints.get(&thread_id) {
            Some(serialized) => {
                let checkpoint: Checkpoint = serde_json::from_str(serialized)?;
                checkpoint.into_verified_state().map(Some)
            }
            None => Ok(None),
        }
    }
}

/// One JSON file per thread under a directory; survives restarts.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, thread_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", thread_id))
    }
}

#[async_trait::async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, state: &ConversationState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let serialized = serde_json::to_vec_pretty(&Checkpoint::capture(state)?)?;
        let path = self.path_for(state.thread_id);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(thread_id = %state.thread_id, path = %path.display(), "Checkpoint written");
        Ok(())
    }

    async fn load(&self, thread_id: Uuid) -> Result<Option<ConversationState>> {
        let path = self.path_for(thread_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        checkpoint.into_verified_state().map(Some)
    }
}

/// SHA256 over the serialized state.
pub fn compute_state_hash(serialized: &str) -> String {
    hex::encode(Sha256::digest(serialized.as_bytes()))
}
