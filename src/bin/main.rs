use filings_research_agent::{
    agent::{Agent, AgentConfig, TurnOutcome},
    config::Settings,
    llm::OpenAiChatModel,
    memory::build_memory_store,
    state::{CheckpointStore, ConversationState, FileCheckpointStore, InMemoryCheckpointStore},
    tools::create_default_registry,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn prompt(label: &str) {
    print!("{}", label);
    let _ = std::io::stdout().flush();
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed { answer } => println!("\nAssistant: {}\n", answer),
        TurnOutcome::Suspended { query } => println!("\n[needs your input] {}\n", query.query),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    let api_key = settings.openai_api_key.clone().unwrap_or_default();
    let model = OpenAiChatModel::new(api_key, settings.openai_model.clone(), &settings.openai_base_url)?;
    let registry = Arc::new(create_default_registry(&settings)?);
    let memory = build_memory_store(settings.database_url.as_deref());

    let checkpoints: Arc<dyn CheckpointStore> = match &settings.checkpoint_dir {
        Some(dir) => Arc::new(FileCheckpointStore::new(dir)),
        None => Arc::new(InMemoryCheckpointStore::new()),
    };

    info!(tools = registry.len(), model = %settings.openai_model, "Research agent starting");
    let agent = Agent::new(Box::new(model), registry, memory, AgentConfig::from(&settings));

    // `cargo run -- <thread-id>` continues a saved conversation
    let mut state = match std::env::args().nth(1).and_then(|id| Uuid::parse_str(&id).ok()) {
        Some(thread_id) => match checkpoints.load(thread_id).await? {
            Some(state) => state,
            None => {
                warn!(thread_id = %thread_id, "No checkpoint found, starting a new thread");
                ConversationState::with_thread_id(thread_id, None)
            }
        },
        None => ConversationState::new(None),
    };
    println!("Thread {} (type 'exit' to quit)", state.thread_id);

    if let Some(pending) = state.pending_human_input() {
        println!("\n[needs your input] {}\n", pending.query.query);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let suspended = state.pending_human_input().is_some();
        prompt(if suspended { "Answer: " } else { "You: " });

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let result = if suspended {
            agent.resume(&mut state, line).await
        } else {
            agent.submit_user_message(&mut state, line).await
        };

        match result {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("\nError: {}\n", e),
        }
        checkpoints.save(&state).await?;
    }

    Ok(())
}
