//! Error types for the research agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Dispatch Faults
    // =============================

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Memory store error: {0}")]
    MemoryStore(String),

    // =============================
    // Recoverable Tool Failures
    // =============================

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not configured: {0}")]
    Config(String),

    // =============================
    // Loop / Caller Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error("Max model calls exceeded: {0}")]
    MaxTurnsExceeded(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AgentError {
    /// Faults abort the current turn. Everything else raised by a tool is
    /// reported back to the model as an error tool result.
    pub fn is_dispatch_fault(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::InvalidToolInput(_)
                | AgentError::MemoryStore(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        assert!(AgentError::ToolNotFound("lookup_rating".into()).is_dispatch_fault());
        assert!(AgentError::InvalidToolInput("missing ticker".into()).is_dispatch_fault());
        assert!(AgentError::MemoryStore("pool closed".into()).is_dispatch_fault());

        assert!(!AgentError::Adapter("502 from upstream".into()).is_dispatch_fault());
        assert!(!AgentError::Timeout("get_stock_price".into()).is_dispatch_fault());
        assert!(!AgentError::Config("FINNHUB_API_KEY".into()).is_dispatch_fault());
    }
}
