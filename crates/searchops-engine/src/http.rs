//! REST implementation of the engine port.
//!
//! Wire-versioned against the engine's documented HTTP semantics:
//! `PUT /{index}`, `HEAD /{index}`, `GET /{index}/_count`,
//! `POST /{index}/_search`, `POST /_bulk`, `POST /_reindex`,
//! `POST /_aliases`, `POST /{index}/_refresh`, `GET /_alias/{name}`.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use searchops_core::{Document, Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::port::SearchEngine;
use crate::types::{
    AliasAction, AliasState, BulkItemStatus, BulkOp, ReindexStatus, SearchHit, SearchResult,
};

/// Engine client over HTTP.
pub struct HttpEngine {
    client: Client,
    base_url: String,
}

impl HttpEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fail(&self, context: &str, response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            return Error::Conflict(format!("{}: index already exists", context));
        }
        if status == StatusCode::NOT_FOUND {
            return Error::NotFound(format!("{}: {}", context, body));
        }
        Error::Engine(format!("{}: engine returned {}: {}", context, status, body))
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    took: u64,
    hits: RawHits,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    total: RawTotal,
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawTotal {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_source")]
    source: Document,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(default)]
    highlight: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawBulkResponse {
    items: Vec<RawBulkItem>,
}

#[derive(Debug, Deserialize)]
struct RawBulkItem {
    index: RawBulkItemDetail,
}

#[derive(Debug, Deserialize)]
struct RawBulkItemDetail {
    #[serde(rename = "_id")]
    id: String,
    status: u16,
    error: Option<RawBulkError>,
}

#[derive(Debug, Deserialize)]
struct RawBulkError {
    reason: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReindexResponse {
    took: u64,
    #[serde(default)]
    failures: Vec<serde_json::Value>,
}

#[async_trait]
impl SearchEngine for HttpEngine {
    async fn create_index(&self, name: &str, template: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .put(self.url(name))
            .json(template)
            .send()
            .await
            .map_err(|e| Error::Engine(format!("create index {}: {}", name, e)))?;
        if !response.status().is_success() {
            return Err(self.fail(&format!("create index {}", name), response).await);
        }
        debug!("Created index {}", name);
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.url(name))
            .send()
            .await
            .map_err(|e| Error::Engine(format!("check index {}: {}", name, e)))?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::Engine(format!(
                "check index {}: engine returned {}",
                name, status
            ))),
        }
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(name))
            .send()
            .await
            .map_err(|e| Error::Engine(format!("delete index {}: {}", name, e)))?;
        if !response.status().is_success() {
            return Err(self.fail(&format!("delete index {}", name), response).await);
        }
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let response = self
            .client
            .get(self.url(&format!("{}/_count", index)))
            .send()
            .await
            .map_err(|e| Error::Engine(format!("count {}: {}", index, e)))?;
        if !response.status().is_success() {
            return Err(self.fail(&format!("count {}", index), response).await);
        }
        let parsed: CountResponse = response
            .json()
            .await
            .map_err(|e| Error::Engine(format!("count {}: {}", index, e)))?;
        Ok(parsed.count)
    }

    async fn scan(&self, index: &str, from: usize, size: usize) -> Result<Vec<Document>> {
        let body = serde_json::json!({
            "from": from,
            "size": size,
            "query": { "match_all": {} },
            "sort": [ { "id": { "order": "asc" } } ]
        });
        let result = self.search(index, &body).await?;
        Ok(result.hits.into_iter().map(|h| h.document).collect())
    }

    async fn search(&self, target: &str, body: &serde_json::Value) -> Result<SearchResult> {
        let response = self
            .client
            .post(self.url(&format!("{}/_search", target)))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Engine(format!("search {}: {}", target, e)))?;
        if !response.status().is_success() {
            return Err(self.fail(&format!("search {}", target), response).await);
        }
        let parsed: RawSearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Engine(format!("search {}: {}", target, e)))?;
        Ok(SearchResult {
            total: parsed.hits.total.value,
            took_ms: parsed.took,
            hits: parsed
                .hits
                .hits
                .into_iter()
                .map(|h| SearchHit {
                    document: h.source,
                    score: h.score,
                    highlights: h.highlight,
                })
                .collect(),
        })
    }

    async fn bulk(&self, target: &str, ops: &[BulkOp]) -> Result<Vec<BulkItemStatus>> {
        let payload = ndjson_payload(ops)?;

        let response = self
            .client
            .post(self.url(&format!("{}/_bulk", target)))
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::Engine(format!("bulk to {}: {}", target, e)))?;
        if !response.status().is_success() {
            return Err(self.fail(&format!("bulk to {}", target), response).await);
        }
        let parsed: RawBulkResponse = response
            .json()
            .await
            .map_err(|e| Error::Engine(format!("bulk to {}: {}", target, e)))?;

        parsed
            .items
            .into_iter()
            .map(|item| {
                let detail = item.index;
                let id = detail
                    .id
                    .parse::<Uuid>()
                    .map_err(|e| Error::Engine(format!("bulk to {}: bad item id: {}", target, e)))?;
                let error = detail.error.map(|e| {
                    e.reason
                        .or(e.kind)
                        .unwrap_or_else(|| "unknown engine error".to_string())
                });
                Ok(BulkItemStatus {
                    id,
                    status: detail.status,
                    error,
                })
            })
            .collect()
    }

    async fn reindex(
        &self,
        source: &str,
        target: &str,
        wait_for_completion: bool,
        refresh: bool,
    ) -> Result<ReindexStatus> {
        let body = serde_json::json!({
            "source": { "index": source },
            "dest": { "index": target }
        });
        let response = self
            .client
            .post(self.url(&format!(
                "_reindex?wait_for_completion={}&refresh={}",
                wait_for_completion, refresh
            )))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Engine(format!("reindex {} -> {}: {}", source, target, e)))?;
        if !response.status().is_success() {
            return Err(self
                .fail(&format!("reindex {} -> {}", source, target), response)
                .await);
        }
        let parsed: RawReindexResponse = response
            .json()
            .await
            .map_err(|e| Error::Engine(format!("reindex {} -> {}: {}", source, target, e)))?;
        Ok(ReindexStatus {
            took_ms: parsed.took,
            failures: parsed.failures.iter().map(|f| f.to_string()).collect(),
        })
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        let actions: Vec<serde_json::Value> = actions
            .iter()
            .map(|action| match action {
                AliasAction::Remove { alias, index } => serde_json::json!({
                    "remove": { "index": index, "alias": alias, "must_exist": false }
                }),
                AliasAction::Add {
                    alias,
                    index,
                    is_write_index,
                } => serde_json::json!({
                    "add": { "index": index, "alias": alias, "is_write_index": is_write_index }
                }),
            })
            .collect();

        let response = self
            .client
            .post(self.url("_aliases"))
            .json(&serde_json::json!({ "actions": actions }))
            .send()
            .await
            .map_err(|e| Error::Engine(format!("update aliases: {}", e)))?;
        if !response.status().is_success() {
            return Err(self.fail("update aliases", response).await);
        }
        Ok(())
    }

    async fn alias_state(&self, read_alias: &str, write_alias: &str) -> Result<AliasState> {
        let read_targets = self.resolve_alias(read_alias).await?;
        let write_targets = self.resolve_alias(write_alias).await?;
        Ok(AliasState::new(read_targets, write_targets))
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("{}/_refresh", index)))
            .send()
            .await
            .map_err(|e| Error::Engine(format!("refresh {}: {}", index, e)))?;
        if !response.status().is_success() {
            return Err(self.fail(&format!("refresh {}", index), response).await);
        }
        Ok(())
    }
}

/// Action+source line pairs of the `_bulk` body.
fn ndjson_payload(ops: &[BulkOp]) -> Result<String> {
    let mut payload = String::new();
    for op in ops {
        payload.push_str(&serde_json::to_string(
            &serde_json::json!({ "index": { "_id": op.id } }),
        )?);
        payload.push('\n');
        payload.push_str(&serde_json::to_string(&op.document)?);
        payload.push('\n');
    }
    Ok(payload)
}

impl HttpEngine {
    /// Indices an alias currently resolves to; empty when the alias is unbound.
    async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url(&format!("_alias/{}", alias)))
            .send()
            .await
            .map_err(|e| Error::Engine(format!("resolve alias {}: {}", alias, e)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(self.fail(&format!("resolve alias {}", alias), response).await);
        }
        let parsed: HashMap<String, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::Engine(format!("resolve alias {}: {}", alias, e)))?;
        Ok(parsed.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use searchops_core::Document;

    #[test]
    fn test_ndjson_payload_alternates_action_and_source() {
        let doc = Document::new(
            Uuid::nil(),
            "title",
            None,
            "body",
            vec!["tag".to_string()],
            "cat",
            "author",
            chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            1.0,
        )
        .unwrap();
        let payload = ndjson_payload(&[BulkOp::index(doc)]).unwrap();

        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines.len(), 2);
        let action: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(
            action["index"]["_id"],
            "00000000-0000-0000-0000-000000000000"
        );
        let source: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["title"], "title");
        assert_eq!(source["publishedAt"], "2024-01-01T00:00:00Z");
        assert!(payload.ends_with('\n'));
    }

    #[test]
    fn test_url_joins_cleanly() {
        let engine = HttpEngine::new("http://localhost:9200/");
        assert_eq!(engine.url("docs_v1/_count"), "http://localhost:9200/docs_v1/_count");
        assert_eq!(engine.url("/_aliases"), "http://localhost:9200/_aliases");
    }
}
