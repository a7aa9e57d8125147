use crate::openai::check_status;
use crate::ProviderError;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    cfg: QdrantConfig,
}

impl QdrantClient {
    pub fn new(cfg: QdrantConfig) -> Self {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, cfg }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.cfg.url.trim_end_matches('/'),
            self.cfg.collection,
            suffix
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.cfg.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        check_status(resp).await
    }

    /// Like `send`, but a 404 means the collection has not been created yet
    /// and yields `None`. Every other failure status is an error.
    async fn send_to_collection(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<reqwest::Response>, ProviderError> {
        let resp = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(collection = %self.cfg.collection, "qdrant collection not found");
            return Ok(None);
        }
        check_status(resp).await.map(Some)
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self, dim: usize) -> Result<(), ProviderError> {
        let resp = self
            .authed(self.client.get(self.collection_url("")))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(());
        }
        if resp.status() != StatusCode::NOT_FOUND {
            check_status(resp).await?;
            return Ok(());
        }
        let body = serde_json::json!({
            "vectors": { "size": dim, "distance": "Cosine" }
        });
        self.send(self.client.put(self.collection_url("")).json(&body))
            .await?;
        Ok(())
    }

    pub async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<serde_json::Value>,
    ) -> Result<QdrantSearchResponse, ProviderError> {
        #[derive(Serialize)]
        struct SearchRequest {
            vector: Vec<f32>,
            limit: u64,
            with_payload: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            filter: Option<serde_json::Value>,
        }
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
            filter,
        };
        let Some(resp) = self
            .send_to_collection(
                self.client
                    .post(self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?
        else {
            return Ok(QdrantSearchResponse { result: Vec::new() });
        };
        resp.json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    pub async fn upsert(&self, points: Vec<QdrantPoint>) -> Result<(), ProviderError> {
        let req = QdrantUpsert { points };
        self.send(
            self.client
                .put(format!("{}?wait=true", self.collection_url("/points")))
                .json(&req),
        )
        .await?;
        Ok(())
    }

    /// Fetches the points with the given ids; missing ids are simply absent,
    /// and so is everything when the collection does not exist.
    pub async fn retrieve(&self, ids: Vec<String>) -> Result<QdrantRetrieveResponse, ProviderError> {
        let body = serde_json::json!({ "ids": ids, "with_payload": false, "with_vector": false });
        let Some(resp) = self
            .send_to_collection(self.client.post(self.collection_url("/points")).json(&body))
            .await?
        else {
            return Ok(QdrantRetrieveResponse { result: Vec::new() });
        };
        resp.json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Exact point count. A collection that does not exist holds zero points.
    pub async fn count(&self) -> Result<u64, ProviderError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: u64,
        }
        #[derive(Deserialize)]
        struct CountResponse {
            result: CountResult,
        }
        let body = serde_json::json!({ "exact": true });
        let Some(resp) = self
            .send_to_collection(
                self.client
                    .post(self.collection_url("/points/count"))
                    .json(&body),
            )
            .await?
        else {
            return Ok(0);
        };
        let parsed: CountResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result.count)
    }
}

#[derive(Debug, Serialize)]
pub struct QdrantUpsert {
    pub points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
pub struct QdrantPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct QdrantSearchResponse {
    pub result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: serde_json::Value,
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct QdrantRetrieveResponse {
    pub result: Vec<RetrievedPoint>,
}

#[derive(Debug, Deserialize)]
pub struct RetrievedPoint {
    pub id: serde_json::Value,
}
