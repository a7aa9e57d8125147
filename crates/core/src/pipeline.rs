use crate::config::{AppConfig, FailurePolicy};
use crate::error::AuditError;
use crate::extractor;
use crate::guidelines::{load_guidelines, GuidelineSet};
use crate::knowledge::{populate, EmbeddedKnowledgeStore, KnowledgeStore};
use crate::models::{AuditResult, SlideContent};
use crate::parser::parse_audit;
use crate::prompt::{build_prompt, build_question_prompt};
use crate::report::{AuditReport, SlideFailure};
use crate::retriever::{retrieve, CONTEXT_SEPARATOR};
use crate::vectorstore::{LocalVectorStore, QdrantStore, VectorStore};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use providers::gemini::{GeminiConfig, GeminiProvider, DEFAULT_BASE_URL as GEMINI_BASE_URL};
use providers::hashing::HashingEmbedder;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::{Attachment, LlmProvider, ProviderRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Reads the generator's API key from the environment variable named in the
/// configuration.
pub fn require_api_key(config: &AppConfig) -> Result<String, AuditError> {
    let var = config.generation.api_key_var();
    read_key(&var)
}

fn read_key(var: &str) -> Result<String, AuditError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(AuditError::Configuration(format!(
            "environment variable {var} is not set"
        ))),
    }
}

/// Key for the embedding provider: shared with the generator when both use
/// the same backend, otherwise read from that backend's default variable.
fn embedding_key(config: &AppConfig, generation_key: &str) -> Result<String, AuditError> {
    if config.embeddings.provider == config.generation.provider {
        return Ok(generation_key.to_string());
    }
    match config.embeddings.provider.as_str() {
        "openai" => read_key("OPENAI_API_KEY"),
        _ => read_key("GEMINI_API_KEY"),
    }
}

pub fn build_registry(config: &AppConfig, api_key: &str) -> Result<ProviderRegistry, AuditError> {
    let generation = &config.generation;
    let timeout = Duration::from_secs(generation.timeout_secs);
    let mut reg = ProviderRegistry::new()
        .with_embedding("hashing", Arc::new(HashingEmbedder::default()))
        .with_embedding("noop", Arc::new(NoopProvider))
        .with_llm("noop", Arc::new(NoopProvider));

    let uses = |name: &str| generation.provider == name || config.embeddings.provider == name;
    let key_for = |name: &str| -> Result<String, AuditError> {
        if generation.provider == name {
            Ok(api_key.to_string())
        } else {
            embedding_key(config, api_key)
        }
    };

    if uses("gemini") {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: key_for("gemini")?,
            base_url: generation
                .base_url
                .clone()
                .filter(|_| generation.provider == "gemini")
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            embedding_model: embedding_model(config, "gemini", "text-embedding-004"),
            chat_model: generation.model.clone(),
            temperature: generation.temperature,
            timeout,
        });
        reg = reg
            .with_embedding("gemini", Arc::new(provider.clone()))
            .with_llm("gemini", Arc::new(provider));
    }

    if uses("openai") {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key_for("openai")?,
            base_url: generation
                .base_url
                .clone()
                .filter(|_| generation.provider == "openai")
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            embedding_model: embedding_model(config, "openai", OPENAI_EMBEDDING_MODEL),
            chat_model: generation.model.clone(),
            temperature: generation.temperature,
            timeout,
        });
        reg = reg
            .with_embedding("openai", Arc::new(provider.clone()))
            .with_llm("openai", Arc::new(provider));
    }

    Ok(reg
        .set_preferred_embedding(&config.embeddings.provider)
        .set_preferred_llm(&generation.provider))
}

fn embedding_model(config: &AppConfig, provider: &str, fallback: &str) -> String {
    if config.embeddings.provider == provider {
        config.embeddings.model.clone()
    } else {
        fallback.to_string()
    }
}

pub async fn build_vector_store(config: &AppConfig) -> anyhow::Result<Box<dyn VectorStore>> {
    let knowledge = &config.knowledge;
    match knowledge.provider.as_str() {
        "local" => {
            let store = LocalVectorStore::open(&knowledge.path)
                .await
                .with_context(|| format!("open knowledge store {}", knowledge.path))?;
            Ok(Box::new(store))
        }
        "qdrant" => {
            let url = knowledge.url.clone().ok_or_else(|| {
                AuditError::Configuration("knowledge.url is required for qdrant".into())
            })?;
            let client = QdrantClient::new(QdrantConfig {
                url,
                collection: knowledge.collection.clone(),
                api_key: std::env::var("QDRANT_API_KEY").ok(),
                timeout: Duration::from_secs(config.retrieval.timeout_secs),
            });
            Ok(Box::new(QdrantStore::new(client)))
        }
        other => Err(AuditError::Configuration(format!(
            "unknown knowledge provider: {other} (expected local|qdrant)"
        ))
        .into()),
    }
}

pub async fn build_knowledge_store(
    config: &AppConfig,
    registry: &ProviderRegistry,
) -> anyhow::Result<Arc<dyn KnowledgeStore>> {
    let embedder = registry
        .embedding(None)
        .map_err(|e| AuditError::Configuration(e.to_string()))?;
    let vectors = build_vector_store(config).await?;
    Ok(Arc::new(EmbeddedKnowledgeStore::new(
        embedder,
        vectors,
        config.embeddings.batch_size.max(1),
    )))
}

pub fn load_guideline_set(config: &AppConfig) -> anyhow::Result<GuidelineSet> {
    match &config.guidelines.path {
        Some(path) => load_guidelines(Path::new(path))
            .with_context(|| format!("load guidelines from {path}")),
        None => Ok(GuidelineSet::default()),
    }
}

/// Knowledge store alone, for commands that never call the generator. Only
/// the embedding backend's key is required.
pub async fn open_knowledge(config: &AppConfig) -> anyhow::Result<Arc<dyn KnowledgeStore>> {
    let key = if config.embeddings.provider == config.generation.provider {
        require_api_key(config)?
    } else {
        String::new()
    };
    let registry = build_registry(config, &key)?;
    build_knowledge_store(config, &registry).await
}

/// Builds providers and the knowledge store, then makes sure the guideline
/// set is stored.
pub async fn prepare(config: &AppConfig) -> anyhow::Result<Auditor> {
    let api_key = require_api_key(config)?;
    let registry = build_registry(config, &api_key)?;
    let store = build_knowledge_store(config, &registry).await?;
    let guidelines = load_guideline_set(config)?;
    populate(store.as_ref(), &guidelines)
        .await
        .context("populate knowledge store")?;
    let llm = registry
        .llm(None)
        .map_err(|e| AuditError::Configuration(e.to_string()))?;
    Ok(Auditor::new(store, llm, config))
}

/// Runs the per-slide audit: retrieve, prompt, generate, parse, aggregate.
pub struct Auditor {
    store: Arc<dyn KnowledgeStore>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
    retrieval_timeout: Duration,
    timeout: Duration,
    policy: FailurePolicy,
    concurrency: usize,
}

impl Auditor {
    pub fn new(store: Arc<dyn KnowledgeStore>, llm: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        Self {
            store,
            llm,
            top_k: config.retrieval.top_k,
            retrieval_timeout: Duration::from_secs(config.retrieval.timeout_secs),
            timeout: Duration::from_secs(config.generation.timeout_secs),
            policy: config.audit.failure_policy,
            concurrency: config.audit.concurrency.max(1),
        }
    }

    pub fn store(&self) -> &dyn KnowledgeStore {
        self.store.as_ref()
    }

    pub async fn audit_deck(&self, path: &Path) -> Result<AuditReport, AuditError> {
        let slides = read_deck(path).await?;
        info!(deck = %path.display(), slides = slides.len(), "auditing deck");
        Ok(self.audit_slides(&slides).await)
    }

    /// Audits `slides` in order. With `concurrency > 1` up to that many slides
    /// are in flight; results are still aggregated in slide order.
    pub async fn audit_slides(&self, slides: &[SlideContent]) -> AuditReport {
        let outcomes: Vec<(usize, Result<AuditResult, AuditError>)> = stream::iter(slides)
            .map(|slide| async move { (slide.slide_number, self.audit_slide(slide).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = AuditReport::new();
        for (slide_number, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    debug!(slide = slide_number, finding = %result.overall_finding, "slide audited");
                    report.insert_result(slide_number, result);
                }
                Err(e @ AuditError::RetrievalEmpty { .. }) => {
                    info!(slide = slide_number, "{e}; slide skipped");
                }
                Err(e) => {
                    warn!(slide = slide_number, stage = e.stage(), error = %e, "slide audit failed");
                    if self.policy == FailurePolicy::Mark {
                        report.insert_failure(slide_number, SlideFailure::from(&e));
                    }
                }
            }
        }
        report
    }

    pub async fn audit_slide(&self, slide: &SlideContent) -> Result<AuditResult, AuditError> {
        let slide_number = slide.slide_number;
        let context = match tokio::time::timeout(
            self.retrieval_timeout,
            retrieve(self.store.as_ref(), &slide.text, self.top_k),
        )
        .await
        {
            Ok(Ok(context)) => context,
            Ok(Err(source)) => {
                return Err(AuditError::Retrieval {
                    slide: slide_number,
                    source,
                })
            }
            Err(_) => return Err(elapsed(slide_number, "retrieval", self.retrieval_timeout)),
        };
        if context.is_empty() {
            return Err(AuditError::RetrievalEmpty { slide: slide_number });
        }

        let prompt = build_prompt(&context);
        let attachments = slide_attachments(slide);
        let raw = self.generate(slide_number, &prompt, &attachments).await?;

        parse_audit(&raw).map_err(|e| {
            warn!(slide = slide_number, error = %e, raw = %raw, "unparseable model response");
            e
        })
    }

    /// Free-text answer about a whole deck, grounded on retrieved guidelines.
    pub async fn answer(&self, slides: &[SlideContent], question: &str) -> anyhow::Result<String> {
        let passages = tokio::time::timeout(
            self.retrieval_timeout,
            self.store.query(question, self.top_k),
        )
        .await
        .map_err(|_| elapsed(0, "retrieval", self.retrieval_timeout))??;
        let context = passages.join(CONTEXT_SEPARATOR);
        let prompt = build_question_prompt(question, &context);
        let mut attachments = Vec::new();
        for slide in slides {
            attachments.push(Attachment::Text(format!(
                "Slide {}:\n{}",
                slide.slide_number, slide.text
            )));
            attachments.extend(image_attachments(slide));
        }
        Ok(self.generate(0, &prompt, &attachments).await?)
    }

    async fn generate(
        &self,
        slide: usize,
        prompt: &str,
        attachments: &[Attachment],
    ) -> Result<String, AuditError> {
        match tokio::time::timeout(self.timeout, self.llm.generate(prompt, attachments)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(source)) => Err(AuditError::Generation { slide, source }),
            Err(_) => Err(elapsed(slide, "generation", self.timeout)),
        }
    }
}

fn elapsed(slide: usize, stage: &'static str, after: Duration) -> AuditError {
    AuditError::Timeout {
        slide,
        stage,
        secs: after.as_secs(),
    }
}

/// Slide text first, then its images in extraction order.
pub fn slide_attachments(slide: &SlideContent) -> Vec<Attachment> {
    let mut attachments = vec![Attachment::Text(slide.text.clone())];
    attachments.extend(image_attachments(slide));
    attachments
}

fn image_attachments(slide: &SlideContent) -> impl Iterator<Item = Attachment> + '_ {
    slide.images.iter().map(|img| Attachment::Image {
        mime: img.mime.clone(),
        data: img.data.clone(),
    })
}

/// Extracts a deck on the blocking pool.
pub async fn read_deck(path: &Path) -> Result<Vec<SlideContent>, AuditError> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extractor::extract_deck(&owned))
        .await
        .map_err(|e| AuditError::DocumentOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
}
