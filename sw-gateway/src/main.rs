//! Studyweave gateway: wires the core services together and serves the
//! HTTP surface.

mod routes;
mod webpages;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use studyweave::agent::{AgentConfig, HybridAgent};
use studyweave::providers::{ChatModel, ExaSearch, OpenAiChat, WebSearchTool};
use studyweave::{AppConfig, ChatService, Router, SessionManager};
use sw_corpus::{
    Chunker, ChunkerConfig, DocumentLoader, Embedder, IngestionPipeline, LoaderConfig,
    OpenAiEmbedder, Retriever, SqliteVectorIndex, VectorIndex,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    let state = build_state(Arc::clone(&config)).await?;

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "studyweave gateway listening");
    axum::serve(listener, routes::router(state).into_make_service()).await?;

    Ok(())
}

async fn build_state(config: Arc<AppConfig>) -> Result<routes::AppState, Box<dyn std::error::Error>> {
    let index: Arc<dyn VectorIndex> =
        Arc::new(SqliteVectorIndex::open(&config.persist_dir).await?);
    tracing::info!(
        persist_dir = %config.persist_dir,
        chunks = index.len().await.unwrap_or(0),
        "vector index opened"
    );

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        &config.openai_api_key,
        &config.embedding_model,
        OpenAiEmbedder::DEFAULT_DIMENSIONS,
        config.provider_timeout,
    ));
    let retriever = Arc::new(Retriever::new(Arc::clone(&embedder), Arc::clone(&index)));

    let loader = Arc::new(DocumentLoader::new(LoaderConfig::default()));
    let chunker = Chunker::new(ChunkerConfig {
        chunk_tokens: config.chunk_tokens,
        overlap_tokens: config.chunk_overlap_tokens,
        min_chars: config.min_chars,
        max_digit_ratio: config.max_digit_ratio,
    });
    let pipeline = Arc::new(IngestionPipeline::new(
        loader,
        chunker,
        Arc::clone(&embedder),
        Arc::clone(&index),
        Default::default(),
    ));

    let chat_model: Arc<dyn ChatModel> = Arc::new(OpenAiChat::new(
        &config.openai_api_key,
        &config.llm_model,
        config.llm_temperature,
    ));

    let web: Option<Arc<dyn WebSearchTool>> = match (&config.web_search_api_key, config.use_hybrid_agent) {
        (Some(key), true) => Some(Arc::new(ExaSearch::new(key, config.provider_timeout)?)),
        _ => {
            tracing::info!("web retrieval disabled");
            None
        }
    };

    let router = Router::new(Some(Arc::clone(&chat_model)), config.provider_timeout);
    let agent = Arc::new(HybridAgent::new(
        router,
        Arc::clone(&retriever),
        Arc::clone(&index),
        web,
        chat_model,
        AgentConfig {
            search_k: config.default_search_k,
            relevance_threshold: config.relevance_threshold,
            web_results_limit: config.web_search_results_limit,
            web_days_back: config.web_search_days_back,
            retrieval_deadline: config.retrieval_deadline,
            context_char_budget: config.context_char_budget,
        },
    ));

    let sessions = Arc::new(SessionManager::new(config.max_history_messages));
    let chat = Arc::new(ChatService::new(agent, sessions, config.turn_deadline));

    let http = reqwest::Client::builder()
        .timeout(config.provider_timeout)
        .use_rustls_tls()
        .build()?;

    Ok(routes::AppState {
        chat,
        pipeline,
        retriever,
        index,
        config,
        http,
    })
}
