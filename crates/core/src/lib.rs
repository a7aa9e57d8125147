//! Core library: deck extraction, guideline retrieval, prompting, parsing and
//! report aggregation.

pub mod config;
pub mod discover;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod guidelines;
pub mod knowledge;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod retriever;
pub mod vectorstore;

pub use error::AuditError;
pub use models::{AuditResult, SlideContent};
pub use report::AuditReport;
