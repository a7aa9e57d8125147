use crate::knowledge::KnowledgeStore;

pub const DEFAULT_TOP_K: usize = 4;
pub const QUERY_PREFIX: &str = "Audit the following content for compliance: ";
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Retrieves guideline context for a slide. An empty string means nothing
/// was retrieved and the slide cannot be audited.
pub async fn retrieve(
    store: &dyn KnowledgeStore,
    slide_text: &str,
    k: usize,
) -> anyhow::Result<String> {
    let query = format!("{}{}", QUERY_PREFIX, slide_text);
    let passages = store.query(&query, k).await?;
    Ok(passages.join(CONTEXT_SEPARATOR))
}
