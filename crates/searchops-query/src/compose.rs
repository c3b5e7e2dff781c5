//! Composition of requests into the engine's native query tree.

use chrono::SecondsFormat;
use serde_json::{json, Value};

use crate::request::{
    MultiMatchType, PopularityMode, SearchRequest, SortMode, SuggestRequest,
};

const TEXT_FIELDS: [&str; 3] = ["title^4", "summary^2", "body"];
const MOST_FIELDS_TIE_BREAKER: f64 = 0.2;
const SUGGEST_MAX_EXPANSIONS: u32 = 50;

/// Build the full search body for a request.
pub fn compose_search(request: &SearchRequest) -> Value {
    let mut bool_query = json!({
        "must": [ multi_match_clause(request) ]
    });

    let filters = filter_clauses(request);
    if !filters.is_empty() {
        bool_query["filter"] = Value::Array(filters);
    }

    let tuning = &request.ranking_tuning;
    if tuning.popularity.enabled && tuning.popularity.mode == PopularityMode::RankFeature {
        bool_query["should"] = json!([ rank_feature_clause(request) ]);
    }

    let mut body = json!({
        "from": request.page * request.size,
        "size": request.size,
        "track_total_hits": true,
        "query": {
            "function_score": {
                "query": { "bool": bool_query },
                "functions": score_functions(request),
                "score_mode": tuning.score_mode.as_engine_str(),
                "boost_mode": tuning.boost_mode.as_engine_str(),
            }
        },
        "highlight": {
            "fields": { "title": {}, "summary": {}, "body": {} }
        }
    });

    if request.sort == SortMode::Recency {
        body["sort"] = json!([ { "publishedAt": { "order": "desc" } }, "_score" ]);
    }

    body
}

/// Build the title-autocomplete body: phrase-prefix match, optional category
/// filter, ordered by score then recency, popularity-only function score.
pub fn compose_suggest(request: &SuggestRequest) -> Value {
    let mut bool_query = json!({
        "must": [ {
            "match_phrase_prefix": {
                "titleAutocomplete": {
                    "query": request.prefix,
                    "max_expansions": SUGGEST_MAX_EXPANSIONS,
                }
            }
        } ]
    });
    if let Some(category) = &request.category {
        bool_query["filter"] = json!([ { "term": { "category": category } } ]);
    }

    json!({
        "size": request.size,
        "query": {
            "function_score": {
                "query": { "bool": bool_query },
                "functions": [ field_value_factor_default() ],
                "score_mode": "sum",
                "boost_mode": "sum",
            }
        },
        "sort": [ "_score", { "publishedAt": { "order": "desc" } } ]
    })
}

fn multi_match_clause(request: &SearchRequest) -> Value {
    let mut clause = json!({
        "query": request.query,
        "fields": TEXT_FIELDS,
        "type": request.multi_match_type.as_engine_str(),
    });
    if request.multi_match_type == MultiMatchType::MostFields {
        clause["tie_breaker"] = json!(MOST_FIELDS_TIE_BREAKER);
    }
    json!({ "multi_match": clause })
}

/// Conjunctive non-scoring filters from the request's facets.
fn filter_clauses(request: &SearchRequest) -> Vec<Value> {
    let mut filters = Vec::new();
    if let Some(category) = &request.category {
        filters.push(json!({ "term": { "category": category } }));
    }
    if !request.tags.is_empty() {
        filters.push(json!({ "terms": { "tags": request.tags } }));
    }
    if let Some(author) = &request.author {
        filters.push(json!({ "term": { "author": author } }));
    }
    if request.published_from.is_some() || request.published_to.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(from) = request.published_from {
            range.insert(
                "gte".to_string(),
                json!(from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        if let Some(to) = request.published_to {
            range.insert(
                "lte".to_string(),
                json!(to.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        filters.push(json!({ "range": { "publishedAt": Value::Object(range) } }));
    }
    filters
}

fn rank_feature_clause(request: &SearchRequest) -> Value {
    let popularity = &request.ranking_tuning.popularity;
    json!({
        "rank_feature": {
            "field": "popularityScore",
            "saturation": { "pivot": popularity.pivot },
            "boost": popularity.boost,
        }
    })
}

/// Function-score entries selected by the sort mode.
fn score_functions(request: &SearchRequest) -> Vec<Value> {
    let tuning = &request.ranking_tuning;
    let mut functions = Vec::new();

    let decay_applies = match request.sort {
        SortMode::Relevance | SortMode::Recency => tuning.recency.enabled,
        SortMode::Popularity => false,
    };
    if decay_applies {
        functions.push(json!({
            "gauss": {
                "publishedAt": {
                    "origin": "now",
                    "scale": tuning.recency.scale,
                    "decay": tuning.recency.decay,
                }
            },
            "weight": tuning.recency.weight,
        }));
    }

    let popularity_applies = match request.sort {
        SortMode::Relevance | SortMode::Popularity => {
            tuning.popularity.enabled && tuning.popularity.mode == PopularityMode::FieldValueFactor
        }
        SortMode::Recency => false,
    };
    if popularity_applies {
        let popularity = &tuning.popularity;
        let mut fvf = json!({
            "field": "popularityScore",
            "factor": popularity.factor,
            "missing": popularity.missing,
        });
        if let Some(modifier) = &popularity.modifier {
            fvf["modifier"] = json!(modifier);
        }
        functions.push(json!({
            "field_value_factor": fvf,
            "weight": popularity.weight,
        }));
    }

    functions
}

fn field_value_factor_default() -> Value {
    json!({
        "field_value_factor": {
            "field": "popularityScore",
            "factor": 1.0,
            "modifier": "log1p",
            "missing": 0.0,
        },
        "weight": 1.0,
    })
}
