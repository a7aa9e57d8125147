use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PassageRow {
    pub id: String,
    pub text: String,
    pub embedding_json: String,
    pub dim: i64,
}

impl PassageRow {
    pub fn new(id: &str, text: &str, embedding: &[f32]) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            embedding_json: serde_json::to_string(embedding).unwrap_or_else(|_| "[]".into()),
            dim: embedding.len() as i64,
        }
    }

    pub fn embedding(&self) -> serde_json::Result<Vec<f32>> {
        serde_json::from_str(&self.embedding_json)
    }
}
