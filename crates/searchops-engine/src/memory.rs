//! Deterministic in-memory engine used by tests.
//!
//! Stores documents per index in a `BTreeMap` keyed by document id, which
//! makes the ascending-id scan contract hold by construction. Search
//! interprets the subset of the scoring tree the composer emits (multi-match
//! over weighted fields, term/terms/range filters, phrase-prefix suggest).
//! Failure knobs let tests inject count mismatches, per-item bulk rejections
//! and transport faults.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use searchops_core::{Document, Error, Result};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::port::SearchEngine;
use crate::types::{
    AliasAction, AliasState, BulkItemStatus, BulkOp, ReindexStatus, SearchHit, SearchResult,
};

#[derive(Debug, Clone)]
struct AliasTarget {
    index: String,
    is_write: bool,
}

#[derive(Default)]
struct Inner {
    indices: HashMap<String, BTreeMap<Uuid, Document>>,
    aliases: HashMap<String, Vec<AliasTarget>>,
    count_overrides: HashMap<String, u64>,
    bulk_item_failures: HashMap<Uuid, u32>,
    bulk_transport_failures: u32,
    reindex_failures: Vec<String>,
}

/// In-memory engine port implementation.
#[derive(Default)]
pub struct MemoryEngine {
    inner: RwLock<Inner>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an index with documents, creating the index if needed.
    pub fn seed(&self, index: &str, docs: Vec<Document>) {
        let mut inner = self.inner.write();
        let map = inner.indices.entry(index.to_string()).or_default();
        for doc in docs {
            map.insert(doc.id, doc);
        }
    }

    /// Make `count(index)` report a fixed value instead of the real size.
    pub fn set_count_override(&self, index: &str, count: u64) {
        self.inner
            .write()
            .count_overrides
            .insert(index.to_string(), count);
    }

    /// Reject the given document id for the next `times` bulk passes.
    pub fn fail_bulk_item(&self, id: Uuid, times: u32) {
        self.inner.write().bulk_item_failures.insert(id, times);
    }

    /// Fail the next `times` bulk calls entirely (transport fault).
    pub fn fail_bulk_transport(&self, times: u32) {
        self.inner.write().bulk_transport_failures = times;
    }

    /// Make the next reindex report per-document failures.
    pub fn set_reindex_failures(&self, failures: Vec<String>) {
        self.inner.write().reindex_failures = failures;
    }

    fn resolve_read(inner: &Inner, target: &str) -> Result<String> {
        if inner.indices.contains_key(target) {
            return Ok(target.to_string());
        }
        if let Some(targets) = inner.aliases.get(target) {
            if let Some(first) = targets.first() {
                return Ok(first.index.clone());
            }
        }
        Err(Error::NotFound(format!("no such index or alias: {}", target)))
    }

    fn resolve_write(inner: &Inner, target: &str) -> Result<String> {
        if inner.indices.contains_key(target) {
            return Ok(target.to_string());
        }
        if let Some(targets) = inner.aliases.get(target) {
            if let Some(write) = targets.iter().find(|t| t.is_write) {
                return Ok(write.index.clone());
            }
            if let Some(first) = targets.first() {
                return Ok(first.index.clone());
            }
        }
        Err(Error::NotFound(format!("no such index or alias: {}", target)))
    }
}

/// One weighted text field of a multi-match clause.
struct WeightedField {
    name: String,
    boost: f64,
}

fn parse_weighted_fields(fields: &[serde_json::Value]) -> Vec<WeightedField> {
    fields
        .iter()
        .filter_map(|f| f.as_str())
        .map(|spec| match spec.split_once('^') {
            Some((name, boost)) => WeightedField {
                name: name.to_string(),
                boost: boost.parse().unwrap_or(1.0),
            },
            None => WeightedField {
                name: spec.to_string(),
                boost: 1.0,
            },
        })
        .collect()
}

fn field_text<'a>(doc: &'a Document, field: &str) -> &'a str {
    match field {
        "title" | "titleAutocomplete" => &doc.title,
        "summary" => doc.summary.as_deref().unwrap_or(""),
        "body" => &doc.body,
        _ => "",
    }
}

/// Token-containment score for a multi-match clause: each query token found
/// in a field contributes that field's boost.
fn text_score(doc: &Document, query: &str, fields: &[WeightedField]) -> f64 {
    let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    let mut score = 0.0;
    for field in fields {
        let haystack = field_text(doc, &field.name).to_lowercase();
        for token in &tokens {
            if haystack.contains(token.as_str()) {
                score += field.boost;
            }
        }
    }
    score
}

fn passes_filter(doc: &Document, filter: &serde_json::Value) -> bool {
    if let Some(term) = filter.get("term") {
        if let Some(category) = term.get("category").and_then(|v| v.as_str()) {
            return doc.category == category;
        }
        if let Some(author) = term.get("author").and_then(|v| v.as_str()) {
            return doc.author == author;
        }
        return true;
    }
    if let Some(terms) = filter.get("terms") {
        if let Some(tags) = terms.get("tags").and_then(|v| v.as_array()) {
            return tags
                .iter()
                .filter_map(|t| t.as_str())
                .any(|t| doc.tags.iter().any(|dt| dt == t));
        }
        return true;
    }
    if let Some(range) = filter.get("range").and_then(|r| r.get("publishedAt")) {
        if let Some(gte) = range.get("gte").and_then(|v| v.as_str()) {
            if let Ok(bound) = DateTime::parse_from_rfc3339(gte) {
                if doc.published_at < bound.with_timezone(&Utc) {
                    return false;
                }
            }
        }
        if let Some(lte) = range.get("lte").and_then(|v| v.as_str()) {
            if let Ok(bound) = DateTime::parse_from_rfc3339(lte) {
                if doc.published_at > bound.with_timezone(&Utc) {
                    return false;
                }
            }
        }
        return true;
    }
    true
}

/// Score a document against the query tree subset the composer produces.
/// Returns `None` when the document does not match.
fn score_document(doc: &Document, query: &serde_json::Value) -> Option<f64> {
    // Unwrap a function_score wrapper; the memory engine scores text only.
    let query = query.get("function_score").and_then(|fs| fs.get("query")).unwrap_or(query);

    if query.get("match_all").is_some() {
        return Some(1.0);
    }

    let bool_query = match query.get("bool") {
        Some(b) => b,
        None => return Some(1.0),
    };

    if let Some(filters) = bool_query.get("filter").and_then(|f| f.as_array()) {
        if !filters.iter().all(|f| passes_filter(doc, f)) {
            return None;
        }
    }

    let musts = bool_query
        .get("must")
        .and_then(|m| m.as_array())
        .cloned()
        .unwrap_or_default();
    if musts.is_empty() {
        return Some(1.0);
    }

    let mut score = 0.0;
    for must in &musts {
        if let Some(mm) = must.get("multi_match") {
            let text = mm.get("query").and_then(|q| q.as_str()).unwrap_or("");
            let fields = mm
                .get("fields")
                .and_then(|f| f.as_array())
                .map(|f| parse_weighted_fields(f))
                .unwrap_or_default();
            let clause = text_score(doc, text, &fields);
            if clause <= 0.0 {
                return None;
            }
            score += clause;
        } else if let Some(mpp) = must.get("match_phrase_prefix") {
            let (field, spec) = mpp.as_object()?.iter().next()?;
            let text = spec.get("query").and_then(|q| q.as_str()).unwrap_or("");
            let haystack = field_text(doc, field).to_lowercase();
            if !haystack.contains(&text.to_lowercase()) {
                return None;
            }
            score += 1.0;
        }
    }
    Some(score)
}

/// The text of the query tree's multi-match clause, if any.
fn query_text(query: &serde_json::Value) -> Option<String> {
    let query = query
        .get("function_score")
        .and_then(|fs| fs.get("query"))
        .unwrap_or(query);
    let musts = query.get("bool")?.get("must")?.as_array()?;
    for must in musts {
        if let Some(mm) = must.get("multi_match") {
            return mm.get("query").and_then(|q| q.as_str()).map(str::to_string);
        }
    }
    None
}

/// `<em>`-wrapped fragments per matched text field.
fn highlights_for(doc: &Document, tokens: &[String]) -> HashMap<String, Vec<String>> {
    let mut highlights = HashMap::new();
    for field in ["title", "summary", "body"] {
        let content = field_text(doc, field);
        if content.is_empty() {
            continue;
        }
        let lower = content.to_lowercase();
        let mut fragments = Vec::new();
        for token in tokens {
            if let Some(pos) = lower.find(token.as_str()) {
                let end = pos + token.len();
                if lower.len() == content.len()
                    && content.is_char_boundary(pos)
                    && content.is_char_boundary(end)
                {
                    fragments.push(format!(
                        "{}<em>{}</em>{}",
                        &content[..pos],
                        &content[pos..end],
                        &content[end..]
                    ));
                } else {
                    // Case folding moved byte offsets; fall back to the
                    // unmarked field content.
                    fragments.push(content.to_string());
                }
            }
        }
        if !fragments.is_empty() {
            highlights.insert(field.to_string(), fragments);
        }
    }
    highlights
}

/// True when the body's outer sort orders by `publishedAt` descending first.
fn sorts_by_recency(body: &serde_json::Value) -> bool {
    body.get("sort")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|first| first.get("publishedAt"))
        .is_some()
}

#[async_trait]
impl SearchEngine for MemoryEngine {
    async fn create_index(&self, name: &str, _template: &serde_json::Value) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.indices.contains_key(name) {
            return Err(Error::Conflict(format!("index {} already exists", name)));
        }
        inner.indices.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.inner.read().indices.contains_key(name))
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.indices.remove(name).is_none() {
            return Err(Error::NotFound(format!("no such index: {}", name)));
        }
        for targets in inner.aliases.values_mut() {
            targets.retain(|t| t.index != name);
        }
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let inner = self.inner.read();
        if let Some(count) = inner.count_overrides.get(index) {
            return Ok(*count);
        }
        let resolved = Self::resolve_read(&inner, index)?;
        Ok(inner.indices[&resolved].len() as u64)
    }

    async fn scan(&self, index: &str, from: usize, size: usize) -> Result<Vec<Document>> {
        let inner = self.inner.read();
        let resolved = Self::resolve_read(&inner, index)?;
        Ok(inner.indices[&resolved]
            .values()
            .skip(from)
            .take(size)
            .cloned()
            .collect())
    }

    async fn search(&self, target: &str, body: &serde_json::Value) -> Result<SearchResult> {
        let inner = self.inner.read();
        let resolved = Self::resolve_read(&inner, target)?;
        let query = body.get("query").cloned().unwrap_or_default();

        let mut matched: Vec<(f64, Document)> = inner.indices[&resolved]
            .values()
            .filter_map(|doc| score_document(doc, &query).map(|s| (s, doc.clone())))
            .collect();

        if sorts_by_recency(body) {
            matched.sort_by(|a, b| {
                b.1.published_at
                    .cmp(&a.1.published_at)
                    .then(b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal))
            });
        } else {
            matched.sort_by(|a, b| {
                b.0.partial_cmp(&a.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.1.published_at.cmp(&a.1.published_at))
                    .then(a.1.id.cmp(&b.1.id))
            });
        }

        let total = matched.len() as u64;
        let from = body.get("from").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let size = body.get("size").and_then(|v| v.as_u64()).unwrap_or(10) as usize;

        let highlight_tokens: Vec<String> = if body.get("highlight").is_some() {
            query_text(&query)
                .map(|text| text.split_whitespace().map(str::to_lowercase).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(SearchResult {
            total,
            took_ms: 1,
            hits: matched
                .into_iter()
                .skip(from)
                .take(size)
                .map(|(score, document)| {
                    let highlights = highlights_for(&document, &highlight_tokens);
                    SearchHit {
                        document,
                        score: Some(score),
                        highlights,
                    }
                })
                .collect(),
        })
    }

    async fn bulk(&self, target: &str, ops: &[BulkOp]) -> Result<Vec<BulkItemStatus>> {
        let mut inner = self.inner.write();
        if inner.bulk_transport_failures > 0 {
            inner.bulk_transport_failures -= 1;
            return Err(Error::Engine(format!(
                "bulk to {}: connection reset",
                target
            )));
        }
        let resolved = Self::resolve_write(&inner, target)?;

        let mut statuses = Vec::with_capacity(ops.len());
        for op in ops {
            let remaining = inner.bulk_item_failures.get(&op.id).copied().unwrap_or(0);
            if remaining > 0 {
                inner.bulk_item_failures.insert(op.id, remaining - 1);
                statuses.push(BulkItemStatus {
                    id: op.id,
                    status: 429,
                    error: Some("es_rejected_execution_exception".to_string()),
                });
                continue;
            }
            inner
                .indices
                .get_mut(&resolved)
                .expect("resolved index exists")
                .insert(op.id, op.document.clone());
            statuses.push(BulkItemStatus {
                id: op.id,
                status: 201,
                error: None,
            });
        }
        Ok(statuses)
    }

    async fn reindex(
        &self,
        source: &str,
        target: &str,
        _wait_for_completion: bool,
        _refresh: bool,
    ) -> Result<ReindexStatus> {
        let mut inner = self.inner.write();
        let failures = std::mem::take(&mut inner.reindex_failures);
        let docs: Vec<Document> = inner
            .indices
            .get(source)
            .ok_or_else(|| Error::NotFound(format!("no such index: {}", source)))?
            .values()
            .cloned()
            .collect();
        let dest = inner
            .indices
            .get_mut(target)
            .ok_or_else(|| Error::NotFound(format!("no such index: {}", target)))?;
        for doc in docs {
            dest.insert(doc.id, doc);
        }
        Ok(ReindexStatus {
            took_ms: 1,
            failures,
        })
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        let mut inner = self.inner.write();

        // Validate and apply against a copy so a failed transaction leaves
        // the live alias table untouched.
        let mut staged = inner.aliases.clone();
        for action in actions {
            match action {
                AliasAction::Remove { alias, index } => {
                    if let Some(targets) = staged.get_mut(alias) {
                        if index == "*" {
                            targets.clear();
                        } else {
                            targets.retain(|t| t.index != *index);
                        }
                    }
                }
                AliasAction::Add {
                    alias,
                    index,
                    is_write_index,
                } => {
                    if !inner.indices.contains_key(index) {
                        return Err(Error::NotFound(format!(
                            "alias {} cannot target missing index {}",
                            alias, index
                        )));
                    }
                    staged.entry(alias.clone()).or_default().push(AliasTarget {
                        index: index.clone(),
                        is_write: *is_write_index,
                    });
                }
            }
        }
        inner.aliases = staged;
        Ok(())
    }

    async fn alias_state(&self, read_alias: &str, write_alias: &str) -> Result<AliasState> {
        let inner = self.inner.read();
        let targets = |alias: &str| -> Vec<String> {
            inner
                .aliases
                .get(alias)
                .map(|ts| ts.iter().map(|t| t.index.clone()).collect())
                .unwrap_or_default()
        };
        Ok(AliasState::new(targets(read_alias), targets(write_alias)))
    }

    async fn refresh(&self, _index: &str) -> Result<()> {
        Ok(())
    }
}
