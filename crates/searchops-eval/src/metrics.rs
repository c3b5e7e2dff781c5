//! IR metric computation over top-K truncated hits.

use searchops_core::Document;
use serde::{Deserialize, Serialize};

/// A ranked hit paired with its judgement, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    pub judged: bool,
}

/// Per-query retrieval quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub mrr: f64,
    pub ndcg_at_k: f64,
    /// Positive-grade judgements in the full judgement set.
    pub relevant_judgements: usize,
    /// Positive-grade hits within the top K.
    pub relevant_retrieved: usize,
}

fn gain(grade: u8) -> f64 {
    (1u64 << grade) as f64 - 1.0
}

fn discount(position: usize) -> f64 {
    (position as f64 + 2.0).log2()
}

/// Compute Precision@K, Recall@K, MRR and nDCG@K.
///
/// `judgement_grades` are all grades of the query's full judgement set; the
/// ideal DCG is taken over their descending positive values truncated to K.
pub fn compute_metrics(hits: &[EvaluatedHit], judgement_grades: &[u8], k: usize) -> QueryMetrics {
    let top_k = &hits[..hits.len().min(k)];

    let relevant_retrieved = top_k
        .iter()
        .filter(|h| h.grade.unwrap_or(0) > 0)
        .count();
    let relevant_judgements = judgement_grades.iter().filter(|&&g| g > 0).count();

    // Guard against an empty hit list without turning precision into 0/0.
    let retrieved = top_k.len().max(1);
    let precision_at_k = relevant_retrieved as f64 / retrieved as f64;

    let recall_at_k = if relevant_judgements == 0 {
        0.0
    } else {
        relevant_retrieved as f64 / relevant_judgements as f64
    };

    let mrr = top_k
        .iter()
        .find(|h| h.grade.unwrap_or(0) > 0)
        .map(|h| 1.0 / h.rank as f64)
        .unwrap_or(0.0);

    let dcg: f64 = top_k
        .iter()
        .enumerate()
        .map(|(i, h)| gain(h.grade.unwrap_or(0)) / discount(i))
        .sum();

    let mut ideal: Vec<u8> = judgement_grades.iter().copied().filter(|&g| g > 0).collect();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    let idcg: f64 = ideal
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, &g)| gain(g) / discount(i))
        .sum();

    let ndcg_at_k = if idcg == 0.0 { 0.0 } else { dcg / idcg };

    QueryMetrics {
        precision_at_k,
        recall_at_k,
        mrr,
        ndcg_at_k,
        relevant_judgements,
        relevant_retrieved,
    }
}
