//! Filings Research Agent
//!
//! A tool-calling research agent for SEC filings and market data that:
//! - Dispatches model tool calls to SEC EDGAR, Finnhub, Yahoo and Tavily adapters
//! - Pauses for a human when a lookup is ambiguous and resumes from a checkpoint
//! - Keeps client records and their peer lists in a namespaced memory store
//!
//! CONTROL LOOP:
//! USER MESSAGE → MODEL → TOOLS → MODEL → … → MEMORY UPDATE? → ANSWER

pub mod adapters;
pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod memory;
pub mod models;
pub mod state;
pub mod tools;

pub use error::{AgentError, Result};

// Re-export common types
pub use agent::{Agent, AgentConfig, TurnOutcome};
pub use config::Settings;
pub use models::*;
pub use state::{ConversationState, LoopPhase};
