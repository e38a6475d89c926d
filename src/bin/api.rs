use filings_research_agent::{
    agent::{Agent, AgentConfig},
    api::start_server,
    config::Settings,
    llm::OpenAiChatModel,
    memory::build_memory_store,
    state::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore},
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    let api_key = settings.openai_api_key.clone().unwrap_or_else(|| {
        eprintln!("OPENAI_API_KEY not set in .env");
        String::new()
    });

    info!("Filings Research Agent - API Server");
    info!("Port: {}", settings.port);

    let model = OpenAiChatModel::new(api_key, settings.openai_model.clone(), &settings.openai_base_url)?;
    let registry = Arc::new(create_default_registry(&settings)?);
    let memory = build_memory_store(settings.database_url.as_deref());

    let checkpoints: Arc<dyn CheckpointStore> = match &settings.checkpoint_dir {
        Some(dir) => {
            info!("Checkpoints: {}", dir);
            Arc::new(FileCheckpointStore::new(dir))
        }
        None => Arc::new(InMemoryCheckpointStore::new()),
    };

    let agent = Arc::new(Agent::new(
        Box::new(model),
        registry,
        memory,
        AgentConfig::from(&settings),
    ));
    info!("Agent initialized with {} tools", agent.registry().len());

    start_server(agent, checkpoints, settings.port).await?;

    Ok(())
}
