//! Shared mocks and fixtures for agent integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use sw_corpus::{
    Chunk, ChunkMetadata, CorpusError, Embedder, MockEmbedder, Retriever, ScoredChunk,
    SearchFilter, VectorIndex,
};

use studyweave::agent::{AgentConfig, HybridAgent};
use studyweave::error::ProviderError;
use studyweave::message::Message;
use studyweave::providers::{ChatModel, TokenStream, WebSearchTool};
use studyweave::routing::Router;
use studyweave::service::ChatService;
use studyweave::session::SessionManager;
use studyweave::sources::WebResult;

/// Brute-force in-memory vector index over mock embeddings.
#[derive(Default)]
pub struct MemoryIndex {
    chunks: Mutex<Vec<Chunk>>,
    pub search_calls: AtomicUsize,
    pub search_delay: Duration,
}

impl MemoryIndex {
    pub fn with_delay(search_delay: Duration) -> Self {
        Self {
            search_delay,
            ..Default::default()
        }
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, new: Vec<Chunk>) -> Result<usize, CorpusError> {
        let mut chunks = self.chunks.lock().unwrap();
        let mut written = 0;
        for chunk in new {
            if chunk.embedding.is_none() {
                continue;
            }
            chunks.retain(|existing| existing.id != chunk.id);
            chunks.push(chunk);
            written += 1;
        }
        Ok(written)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, CorpusError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }
        let chunks = self.chunks.lock().unwrap().clone();
        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .filter(|chunk| match filter.and_then(|f| f.subject.as_deref()) {
                Some(subject) => chunk.metadata.subject.as_deref() == Some(subject),
                None => true,
            })
            .filter_map(|chunk| {
                let embedding = chunk.embedding.clone()?;
                let score = cosine(query_vector, &embedding).clamp(0.0, 1.0);
                Some(ScoredChunk { chunk, score })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize, CorpusError> {
        Ok(self.chunks.lock().unwrap().len())
    }

    async fn delete_all(&self) -> Result<usize, CorpusError> {
        let mut chunks = self.chunks.lock().unwrap();
        let removed = chunks.len();
        chunks.clear();
        Ok(removed)
    }
}

/// Web search stub: fixed results, optional latency, optional failure.
pub struct MockWeb {
    pub results: Vec<WebResult>,
    pub delay: Duration,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl Default for MockWeb {
    fn default() -> Self {
        Self {
            results: vec![WebResult {
                title: "Quantum leaps".to_string(),
                url: "https://example.com/quantum".to_string(),
                published_date: Some("2025-05-01".to_string()),
                snippet: "Recent results in quantum error correction.".to_string(),
                score: 0.8,
            }],
            delay: Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockWeb {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn searches(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn run(&self) -> Result<Vec<WebResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ProviderError::Request("provider down".to_string()));
        }
        Ok(self.results.clone())
    }
}

#[async_trait]
impl WebSearchTool for MockWeb {
    async fn search_recent(
        &self,
        _query: &str,
        _num_results: usize,
        _days_back: u32,
    ) -> Result<Vec<WebResult>, ProviderError> {
        self.run().await
    }

    async fn search_educational(
        &self,
        _query: &str,
        _num_results: usize,
    ) -> Result<Vec<WebResult>, ProviderError> {
        self.run().await
    }
}

/// What the mock generator should do when streamed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ChatBehavior {
    /// Stream the configured deltas, then finish.
    Stream,
    /// Fail before producing any delta.
    UnavailableUpFront,
    /// Emit one delta, then fail mid-stream.
    FailMidStream,
}

/// Chat model stub that records the system prompts it was given.
pub struct MockChat {
    pub deltas: Vec<String>,
    pub delta_delay: Duration,
    pub behavior: ChatBehavior,
    pub classifier_label: Option<String>,
    pub captured_systems: Mutex<Vec<String>>,
}

impl Default for MockChat {
    fn default() -> Self {
        Self {
            deltas: vec!["Hello ".to_string(), "student!".to_string()],
            delta_delay: Duration::ZERO,
            behavior: ChatBehavior::Stream,
            classifier_label: None,
            captured_systems: Mutex::new(Vec::new()),
        }
    }
}

impl MockChat {
    pub fn streaming(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.captured_systems.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, ProviderError> {
        match &self.classifier_label {
            Some(label) => Ok(label.clone()),
            None => Err(ProviderError::Request("no classifier configured".to_string())),
        }
    }

    async fn stream(
        &self,
        system: &str,
        _history: &[Message],
        _prompt: &str,
    ) -> Result<TokenStream, ProviderError> {
        self.captured_systems
            .lock()
            .unwrap()
            .push(system.to_string());

        match self.behavior {
            ChatBehavior::UnavailableUpFront => {
                Err(ProviderError::Request("model offline".to_string()))
            }
            ChatBehavior::FailMidStream => {
                let items: Vec<Result<String, ProviderError>> = vec![
                    Ok("partial ".to_string()),
                    Err(ProviderError::Request("connection reset".to_string())),
                ];
                Ok(Box::pin(futures_util::stream::iter(items)))
            }
            ChatBehavior::Stream => {
                let delay = self.delta_delay;
                let items: Vec<Result<String, ProviderError>> =
                    self.deltas.iter().cloned().map(Ok).collect();
                let stream = futures_util::stream::iter(items).then(move |item| async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    item
                });
                Ok(Box::pin(stream))
            }
        }
    }
}

/// Seed chunk whose text embeds identically to an equal query string.
pub async fn seeded_chunk(text: &str, page: usize, subject: Option<&str>) -> Chunk {
    let embedder = MockEmbedder::default();
    let embedding = embedder.embed(text).await.unwrap();
    Chunk {
        id: format!("seed#{page}"),
        text: text.to_string(),
        metadata: ChunkMetadata {
            source: "class9_maths.pdf".to_string(),
            page,
            chunk_index: page,
            total_chunks: 8,
            subject: subject.map(str::to_string),
            chapter: Some(1),
            section: None,
            section_title: None,
            content_type: None,
            has_math: false,
        },
        embedding: Some(embedding),
    }
}

pub struct TestBed {
    pub service: ChatService,
    pub index: Arc<MemoryIndex>,
    pub web: Arc<MockWeb>,
    pub chat: Arc<MockChat>,
}

/// Wire an agent + service entirely from mocks.
///
/// `classifier` feeds the router's LLM fallback; `None` leaves the router
/// rules-only with the deterministic fallback.
pub fn testbed(
    index: MemoryIndex,
    web: Option<MockWeb>,
    chat: MockChat,
    classifier: Option<Arc<dyn ChatModel>>,
) -> TestBed {
    let index = Arc::new(index);
    let web = Arc::new(web.unwrap_or_default());
    let chat = Arc::new(chat);

    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::default());
    let index_dyn: Arc<dyn VectorIndex> = Arc::clone(&index) as Arc<dyn VectorIndex>;
    let retriever = Arc::new(Retriever::new(embedder, Arc::clone(&index_dyn)));

    let router = Router::new(classifier, Duration::from_millis(500));
    let agent = HybridAgent::new(
        router,
        retriever,
        index_dyn,
        Some(Arc::clone(&web) as Arc<dyn WebSearchTool>),
        Arc::clone(&chat) as Arc<dyn ChatModel>,
        AgentConfig {
            retrieval_deadline: Duration::from_secs(2),
            ..Default::default()
        },
    );

    let service = ChatService::new(
        Arc::new(agent),
        Arc::new(SessionManager::new(10)),
        Duration::from_secs(10),
    );

    TestBed {
        service,
        index,
        web,
        chat,
    }
}

/// Assert a successful stream matches `chunk* sources done` and return
/// the sources event.
pub fn assert_stream_shape(events: &[studyweave::TurnEvent]) -> &studyweave::TurnEvent {
    use studyweave::TurnEvent;

    assert!(!events.is_empty(), "stream must not be empty");
    let terminal = events.last().unwrap();
    assert!(matches!(terminal, TurnEvent::Done), "terminal must be done, got {terminal:?}");

    let sources_at = events.len() - 2;
    let sources = &events[sources_at];
    assert!(
        matches!(sources, TurnEvent::Sources { .. }),
        "sources must precede done, got {sources:?}"
    );
    for event in &events[..sources_at] {
        assert!(
            matches!(event, TurnEvent::Chunk { .. }),
            "only chunks may precede sources, got {event:?}"
        );
    }
    sources
}
