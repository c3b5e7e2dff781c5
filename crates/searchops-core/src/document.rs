//! The indexed document model.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A searchable document as stored in the engine.
///
/// Field names on the wire are camelCase to match the index mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub popularity_score: f64,
}

impl Document {
    /// Construct a validated document.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        summary: Option<String>,
        body: impl Into<String>,
        tags: Vec<String>,
        category: impl Into<String>,
        author: impl Into<String>,
        published_at: DateTime<Utc>,
        popularity_score: f64,
    ) -> Result<Self> {
        let doc = Self {
            id,
            title: title.into(),
            summary,
            body: body.into(),
            tags,
            category: category.into(),
            author: author.into(),
            published_at,
            popularity_score,
        };
        doc.validate()?;
        Ok(doc)
    }

    /// Enforce the non-empty and non-negative constraints.
    ///
    /// Deserialized documents must be passed through this before indexing.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "document {} has an empty title",
                self.id
            )));
        }
        if self.body.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "document {} has an empty body",
                self.id
            )));
        }
        if self.category.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "document {} has an empty category",
                self.id
            )));
        }
        if self.author.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "document {} has an empty author",
                self.id
            )));
        }
        if !self.popularity_score.is_finite() || self.popularity_score < 0.0 {
            return Err(Error::BadRequest(format!(
                "document {} has a negative popularity score",
                self.id
            )));
        }
        Ok(())
    }

    /// Canonical one-line serialization used by the content-hash validator.
    ///
    /// `id|title|summary|body|tags|category|author|publishedAt|popularityScore`
    /// with an empty string for a missing summary and tags sorted then
    /// comma-joined. Two indices holding the same documents produce the same
    /// sequence of fingerprints under an ascending-id scan.
    pub fn fingerprint(&self) -> String {
        let mut tags = self.tags.clone();
        tags.sort();
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.title,
            self.summary.as_deref().unwrap_or(""),
            self.body,
            tags.join(","),
            self.category,
            self.author,
            self.published_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.popularity_score,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Document {
        Document::new(
            Uuid::nil(),
            "Kubernetes networking deep dive",
            Some("CNI plugins compared".to_string()),
            "A long body about pod networking.",
            vec!["kubernetes".to_string(), "networking".to_string()],
            "infrastructure",
            "jlee",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            42.0,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_title() {
        let mut doc = sample();
        doc.title = "  ".to_string();
        assert!(matches!(doc.validate(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_rejects_negative_popularity() {
        let mut doc = sample();
        doc.popularity_score = -1.0;
        assert!(doc.validate().is_err());
        doc.popularity_score = f64::NAN;
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_fingerprint_sorts_tags() {
        let mut a = sample();
        a.tags = vec!["zeta".to_string(), "alpha".to_string()];
        let mut b = sample();
        b.tags = vec!["alpha".to_string(), "zeta".to_string()];
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().contains("alpha,zeta"));
    }

    #[test]
    fn test_fingerprint_empty_summary() {
        let mut doc = sample();
        doc.summary = None;
        let line = doc.fingerprint();
        let fields: Vec<&str> = line.split('|').collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[2], "");
    }

    #[test]
    fn test_serde_round_trip_camel_case() {
        let doc = sample();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("publishedAt").is_some());
        assert!(json.get("popularityScore").is_some());
        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, doc.id);
        assert_eq!(back.published_at, doc.published_at);
    }
}
