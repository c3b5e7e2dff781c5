//! Structured search requests and ranking tuning knobs.

use chrono::{DateTime, Utc};
use searchops_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How the final hit list is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortMode {
    #[default]
    Relevance,
    Recency,
    Popularity,
}

/// Multi-field text match strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultiMatchType {
    #[default]
    BestFields,
    MostFields,
    CrossFields,
}

impl MultiMatchType {
    /// Engine-native type string.
    pub fn as_engine_str(&self) -> &'static str {
        match self {
            MultiMatchType::BestFields => "best_fields",
            MultiMatchType::MostFields => "most_fields",
            MultiMatchType::CrossFields => "cross_fields",
        }
    }
}

/// How popularity contributes to scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PopularityMode {
    #[default]
    FieldValueFactor,
    RankFeature,
}

/// Combination modes of the function-score wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionScoreMode {
    #[default]
    Sum,
    Multiply,
    Avg,
    Max,
    Min,
}

impl FunctionScoreMode {
    pub fn as_engine_str(&self) -> &'static str {
        match self {
            FunctionScoreMode::Sum => "sum",
            FunctionScoreMode::Multiply => "multiply",
            FunctionScoreMode::Avg => "avg",
            FunctionScoreMode::Max => "max",
            FunctionScoreMode::Min => "min",
        }
    }
}

/// Gaussian recency-decay tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecencyTuning {
    pub enabled: bool,
    /// Decay scale, engine duration syntax (e.g. `"30d"`).
    pub scale: String,
    /// Score multiplier at one scale distance from now; must lie in [0, 1].
    pub decay: f64,
    pub weight: f64,
}

impl Default for RecencyTuning {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: "30d".to_string(),
            decay: 0.5,
            weight: 1.0,
        }
    }
}

/// Popularity boost tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PopularityTuning {
    pub enabled: bool,
    pub mode: PopularityMode,
    /// Field-value-factor multiplier.
    pub factor: f64,
    /// Optional field-value-factor modifier (e.g. `"log1p"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    /// Substitute for documents missing the popularity field.
    pub missing: f64,
    pub weight: f64,
    /// Saturation pivot, rank-feature mode only.
    pub pivot: f64,
    /// Clause boost, rank-feature mode only.
    pub boost: f64,
}

impl Default for PopularityTuning {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: PopularityMode::FieldValueFactor,
            factor: 1.2,
            modifier: Some("log1p".to_string()),
            missing: 0.0,
            weight: 1.0,
            pivot: 10.0,
            boost: 1.0,
        }
    }
}

/// All ranking knobs of a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingTuning {
    pub recency: RecencyTuning,
    pub popularity: PopularityTuning,
    pub score_mode: FunctionScoreMode,
    pub boost_mode: FunctionScoreMode,
}

impl RankingTuning {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.recency.decay) {
            return Err(Error::BadRequest(format!(
                "recency decay must lie in [0, 1], got {}",
                self.recency.decay
            )));
        }
        if self.recency.enabled && self.recency.weight <= 0.0 {
            return Err(Error::BadRequest(
                "recency weight must be positive".to_string(),
            ));
        }
        if self.popularity.enabled && self.popularity.weight <= 0.0 {
            return Err(Error::BadRequest(
                "popularity weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A structured search request, composed into the engine query tree by
/// [`crate::compose_search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub multi_match_type: MultiMatchType,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    /// Concrete index override; defaults to the read alias at execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<String>,
    #[serde(default)]
    pub ranking_tuning: RankingTuning,
}

fn default_size() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: None,
            tags: Vec::new(),
            author: None,
            published_from: None,
            published_to: None,
            sort: SortMode::default(),
            multi_match_type: MultiMatchType::default(),
            page: 0,
            size: default_size(),
            target_index: None,
            ranking_tuning: RankingTuning::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::BadRequest("query must be non-empty".to_string()));
        }
        if self.size == 0 {
            return Err(Error::BadRequest("size must be at least 1".to_string()));
        }
        if let (Some(from), Some(to)) = (self.published_from, self.published_to) {
            if from > to {
                return Err(Error::BadRequest(
                    "publishedFrom must not be after publishedTo".to_string(),
                ));
            }
        }
        self.ranking_tuning.validate()
    }
}

/// Title autocomplete request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default = "default_size")]
    pub size: usize,
}

impl SuggestRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            category: None,
            size: default_size(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(Error::BadRequest("prefix must be non-empty".to_string()));
        }
        if self.size == 0 {
            return Err(Error::BadRequest("size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_mode_wire_names() {
        assert_eq!(
            serde_json::to_value(SortMode::Relevance).unwrap(),
            serde_json::json!("RELEVANCE")
        );
        let parsed: SortMode = serde_json::from_value(serde_json::json!("RECENCY")).unwrap();
        assert_eq!(parsed, SortMode::Recency);
    }

    #[test]
    fn test_validate_rejects_bad_decay() {
        let mut request = SearchRequest::new("rust");
        request.ranking_tuning.recency.decay = 1.5;
        assert!(matches!(request.validate(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut request = SearchRequest::new("rust");
        request.published_from = Some("2024-06-01T00:00:00Z".parse().unwrap());
        request.published_to = Some("2024-01-01T00:00:00Z".parse().unwrap());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let request = SearchRequest::new("rust");
        assert_eq!(request.size, 10);
        assert_eq!(request.sort, SortMode::Relevance);
        assert_eq!(request.multi_match_type, MultiMatchType::BestFields);
        assert_eq!(request.ranking_tuning.score_mode, FunctionScoreMode::Sum);
        assert!(request.validate().is_ok());
    }
}
