use std::path::PathBuf;
use thiserror::Error;

/// Failures of an audit run. Only `Configuration` and `DocumentOpen` stop
/// work; the rest are scoped to a single slide.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cannot open slide deck {path}: {reason}")]
    DocumentOpen { path: PathBuf, reason: String },
    #[error("no guideline passages retrieved for slide {slide}")]
    RetrievalEmpty { slide: usize },
    #[error("knowledge query failed for slide {slide}: {source}")]
    Retrieval {
        slide: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("generation failed for slide {slide}: {source}")]
    Generation {
        slide: usize,
        #[source]
        source: providers::ProviderError,
    },
    #[error("{stage} timed out for slide {slide} after {secs}s")]
    Timeout {
        slide: usize,
        stage: &'static str,
        secs: u64,
    },
    #[error("could not parse model response: {0}")]
    Parse(String),
}

impl AuditError {
    /// Short label of the stage that failed, used in failure markers.
    pub fn stage(&self) -> &'static str {
        match self {
            AuditError::Configuration(_) => "configuration",
            AuditError::DocumentOpen { .. } => "extraction",
            AuditError::RetrievalEmpty { .. } | AuditError::Retrieval { .. } => "retrieval",
            AuditError::Generation { .. } => "generation",
            AuditError::Timeout { stage, .. } => *stage,
            AuditError::Parse(_) => "parse",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuditError::Configuration(_) | AuditError::DocumentOpen { .. }
        )
    }
}
