//! End-to-end tests for the ingest → retrieve → answer pipeline, with
//! stub embedding and generation collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use takwimu_rag::{
    AnswerComposer, BackendError, BackendSelector, EmbeddingProvider, ExtractorChain,
    FixedWindowChunker, GenerationBackend, GroundingPolicy, InMemoryVectorStore,
    IngestionPipeline, NO_EVIDENCE_TEXT, RagError, RawDocument, Retriever, SourceMeta,
    VectorStore,
};

const COLLECTION: &str = "knbs_reports";
const DIM: usize = 4;

/// Routes texts to fixed unit vectors by keyword, so tests control
/// distances exactly: same topic → distance 0, opposite topic → 2.
struct StubEmbeddings;

#[async_trait]
impl EmbeddingProvider for StubEmbeddings {
    async fn embed(&self, text: &str) -> takwimu_rag::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let v: [f32; DIM] = if lower.contains("gdp") {
            [1.0, 0.0, 0.0, 0.0]
        } else if lower.contains("inflation") {
            [0.0, 1.0, 0.0, 0.0]
        } else if lower.contains("eclipse") {
            [-1.0, 0.0, 0.0, 0.0]
        } else {
            [0.0, 0.0, 0.0, 1.0]
        };
        Ok(v.to_vec())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// A backend that always replies with a fixed text, counting its calls.
struct ScriptedBackend {
    id: &'static str,
    reply: String,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn new(id: &'static str, reply: impl Into<String>) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Arc::new(Self { id, reply: reply.into(), calls: calls.clone() }), calls)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn id(&self) -> &str {
        self.id
    }

    async fn generate(
        &self,
        _prompt: &str,
        _max_tokens: u32,
    ) -> std::result::Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// A backend that always fails the same way.
struct FailingBackend {
    id: &'static str,
    make_error: fn() -> BackendError,
}

#[async_trait]
impl GenerationBackend for FailingBackend {
    fn id(&self) -> &str {
        self.id
    }

    async fn generate(
        &self,
        _prompt: &str,
        _max_tokens: u32,
    ) -> std::result::Result<String, BackendError> {
        Err((self.make_error)())
    }
}

fn pipeline(
    store: Arc<InMemoryVectorStore>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::new(FixedWindowChunker::new(chunk_size, chunk_overlap).unwrap()),
        Arc::new(StubEmbeddings),
        store,
        ExtractorChain::default(),
        COLLECTION,
        64,
    )
    .unwrap()
}

fn retriever(store: Arc<InMemoryVectorStore>) -> Retriever {
    Retriever::new(Arc::new(StubEmbeddings), store, COLLECTION, 8, 1.1).unwrap()
}

fn composer(
    store: Arc<InMemoryVectorStore>,
    backends: Vec<Arc<dyn GenerationBackend>>,
    policy: GroundingPolicy,
) -> AnswerComposer {
    AnswerComposer::new(
        retriever(store),
        BackendSelector::new(backends).unwrap(),
        1024,
        4000,
        policy,
        None,
    )
}

fn survey_document() -> RawDocument {
    RawDocument::text(
        SourceMeta::new("Kenya Economic Survey 2024", "2024", "2024"),
        "The Kenya Economic Survey 2024 reports that GDP grew 4.7% in 2024, \
         supported by a recovery in agriculture and services.",
    )
}

const SURVEY_CITATION: &str =
    "[Source: Kenya Economic Survey 2024, Published: 2024, Data Period: 2024]";

#[tokio::test]
async fn gdp_scenario_retrieves_the_figure_and_cites_the_survey() {
    let store = Arc::new(InMemoryVectorStore::new());
    let report = pipeline(store.clone(), 800, 150).ingest(vec![survey_document()]).await.unwrap();
    assert_eq!(report.documents_succeeded, 1);
    assert_eq!(report.chunks_created, 1);

    // The retrieved evidence contains the figure.
    let retrieved = retriever(store.clone())
        .retrieve("What was Kenya's GDP growth in 2024?")
        .await
        .unwrap();
    assert!(!retrieved.is_empty());
    assert!(retrieved[0].chunk.text.contains("4.7%"));
    assert!(retrieved[0].distance <= 1.1);

    let (backend, _) = ScriptedBackend::new(
        "groq",
        format!("Kenya's GDP grew by 4.7% in 2024 {SURVEY_CITATION}."),
    );
    let answer = composer(store, vec![backend], GroundingPolicy::Strip)
        .answer("What was Kenya's GDP growth in 2024?")
        .await
        .unwrap();

    assert!(answer.text.contains("4.7%"));
    assert_eq!(answer.backend_used, "groq");
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].to_string(), SURVEY_CITATION);
}

#[tokio::test]
async fn off_corpus_query_returns_the_fixed_no_evidence_answer() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(store.clone(), 800, 150).ingest(vec![survey_document()]).await.unwrap();

    let (backend, calls) = ScriptedBackend::new("groq", "should never be used");
    let answer = composer(store, vec![backend], GroundingPolicy::Strip)
        .answer("How often do lunar eclipses occur over Kenya?")
        .await
        .unwrap();

    assert_eq!(answer.text, NO_EVIDENCE_TEXT);
    assert!(answer.citations.is_empty());
    assert_eq!(answer.backend_used, "none");
    // No backend was consulted for the refusal.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reingestion_fully_replaces_a_sources_chunks() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline(store.clone(), 40, 10);

    let long_text = "GDP statistics repeated over and over. ".repeat(8);
    let meta = SourceMeta::new("Kenya Economic Survey 2024", "2024", "2024");
    pipeline.ingest(vec![RawDocument::text(meta.clone(), long_text)]).await.unwrap();
    let initial_count = store.count(COLLECTION).await.unwrap();
    assert!(initial_count > 1);

    pipeline
        .ingest(vec![RawDocument::text(meta, "GDP grew 4.7% in 2024.")])
        .await
        .unwrap();

    // Exactly the new chunk set remains, no residue from the first pass.
    assert_eq!(store.count(COLLECTION).await.unwrap(), 1);
    let results = store.search(COLLECTION, &[1.0, 0.0, 0.0, 0.0], 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].chunk.text.contains("4.7%"));
}

#[tokio::test]
async fn unreadable_document_degrades_without_aborting_the_batch() {
    let store = Arc::new(InMemoryVectorStore::new());
    let report = pipeline(store.clone(), 800, 150)
        .ingest(vec![
            RawDocument::pdf(
                SourceMeta::new("corrupt_report", "2023", "2023"),
                b"this is not a pdf".to_vec(),
            ),
            survey_document(),
        ])
        .await
        .unwrap();

    assert_eq!(report.documents_attempted, 2);
    assert_eq!(report.documents_succeeded, 1);
    assert_eq!(report.documents_failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source_name, "corrupt_report");
    assert!(report.failures[0].reason.contains("extraction failed"));

    // The healthy document landed regardless.
    assert_eq!(store.count(COLLECTION).await.unwrap(), 1);
}

#[tokio::test]
async fn missing_source_name_is_recorded_as_a_failure() {
    let store = Arc::new(InMemoryVectorStore::new());
    let report = pipeline(store.clone(), 800, 150)
        .ingest(vec![RawDocument::text(SourceMeta::new("", "2024", "2024"), "orphan text")])
        .await
        .unwrap();

    assert_eq!(report.documents_failed, 1);
    assert!(report.failures[0].reason.contains("source_name"));
}

#[tokio::test]
async fn ingestion_infers_missing_metadata_from_text() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(store.clone(), 800, 150)
        .ingest(vec![RawDocument::text(
            SourceMeta::named("economic_survey"),
            "Kenya Economic Survey\nPublished: May 2024\nData Period: 2023\nGDP grew 4.7%.",
        )])
        .await
        .unwrap();

    let results = store.search(COLLECTION, &[1.0, 0.0, 0.0, 0.0], 10).await.unwrap();
    assert_eq!(results[0].chunk.meta.published, "2024");
    assert_eq!(results[0].chunk.meta.data_period, "2023");
}

#[tokio::test]
async fn exhausted_backends_fail_the_answer_with_every_reason() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(store.clone(), 800, 150).ingest(vec![survey_document()]).await.unwrap();

    let backends: Vec<Arc<dyn GenerationBackend>> = vec![
        Arc::new(FailingBackend {
            id: "groq",
            make_error: || BackendError::RateLimited("too many requests".into()),
        }),
        Arc::new(FailingBackend {
            id: "openai",
            make_error: || BackendError::Auth("key revoked".into()),
        }),
        Arc::new(FailingBackend {
            id: "gemini",
            make_error: || BackendError::Unavailable("GEMINI_API_KEY not set".into()),
        }),
    ];

    let err = composer(store, backends, GroundingPolicy::Strip)
        .answer("What was Kenya's GDP growth in 2024?")
        .await
        .unwrap_err();

    match &err {
        RagError::AllBackendsExhausted(failures) => {
            let names: Vec<&str> = failures.iter().map(|f| f.backend.as_str()).collect();
            assert_eq!(names, ["groq", "openai", "gemini"]);
        }
        other => panic!("expected exhaustion, got {other}"),
    }

    let rendered = err.to_string();
    assert!(rendered.contains("groq: rate limited: too many requests"));
    assert!(rendered.contains("openai: authentication failed: key revoked"));
    assert!(rendered.contains("gemini: unavailable: GEMINI_API_KEY not set"));
}

#[tokio::test]
async fn fabricated_citation_is_stripped_under_the_default_policy() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(store.clone(), 800, 150).ingest(vec![survey_document()]).await.unwrap();

    let (backend, _) = ScriptedBackend::new(
        "groq",
        format!(
            "GDP grew 4.7% {SURVEY_CITATION}. Inflation halved \
             [Source: Invented Inflation Watch, Published: 2021, Data Period: 2021]."
        ),
    );
    let answer = composer(store, vec![backend], GroundingPolicy::Strip)
        .answer("What was Kenya's GDP growth in 2024?")
        .await
        .unwrap();

    assert!(!answer.text.contains("Invented Inflation Watch"));
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].source_name, "Kenya Economic Survey 2024");
}

#[tokio::test]
async fn fabricated_citation_fails_the_answer_under_the_fail_policy() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(store.clone(), 800, 150).ingest(vec![survey_document()]).await.unwrap();

    let (backend, _) = ScriptedBackend::new(
        "groq",
        "Inflation halved [Source: Invented Inflation Watch, Published: 2021, Data Period: 2021].",
    );
    let err = composer(store, vec![backend], GroundingPolicy::Fail)
        .answer("What was Kenya's GDP growth in 2024?")
        .await
        .unwrap_err();

    assert!(
        matches!(err, RagError::Grounding { source_name } if source_name == "Invented Inflation Watch")
    );
}

#[tokio::test]
async fn fallback_answers_with_the_second_backend() {
    let store = Arc::new(InMemoryVectorStore::new());
    pipeline(store.clone(), 800, 150).ingest(vec![survey_document()]).await.unwrap();

    let (scripted, _) =
        ScriptedBackend::new("openai", format!("GDP grew 4.7% {SURVEY_CITATION}."));
    let backends: Vec<Arc<dyn GenerationBackend>> = vec![
        Arc::new(FailingBackend {
            id: "groq",
            make_error: || BackendError::Unavailable("GROQ_API_KEY not set".into()),
        }),
        scripted,
    ];

    let answer = composer(store, backends, GroundingPolicy::Strip)
        .answer("What was Kenya's GDP growth in 2024?")
        .await
        .unwrap();
    assert_eq!(answer.backend_used, "openai");
}
