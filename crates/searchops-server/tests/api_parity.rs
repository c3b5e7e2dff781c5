//! API shape tests — validates that response bodies keep the envelope and
//! field names operator tooling depends on.
//!
//! These assert serialized shapes directly, without a running HTTP server.

/// Every response is wrapped in `{code, message, data, timestamp}`.
#[test]
fn test_envelope_shape() {
    let envelope = serde_json::json!({
        "code": "OK",
        "message": "success",
        "data": { "index": "docs_v1" },
        "timestamp": "2025-03-04T12:30:45Z",
    });
    assert!(envelope["code"].is_string());
    assert!(envelope["message"].is_string());
    assert!(envelope["data"].is_object());
    assert!(envelope["timestamp"].is_string());
}

/// Error envelopes carry the error kind as `code` and omit `data`.
#[test]
fn test_error_envelope_shape() {
    let envelope = serde_json::json!({
        "code": "VALIDATION_FAILED",
        "message": "Reindex validation failed: count mismatch: docs_v1 has 10 documents, docs_v2 has 8",
        "timestamp": "2025-03-04T12:30:45Z",
    });
    assert_eq!(envelope["code"], "VALIDATION_FAILED");
    assert!(envelope.get("data").is_none());
    assert!(envelope["message"]
        .as_str()
        .unwrap()
        .contains("count mismatch"));
}

/// Blue/green report shape consumed by migration tooling.
#[test]
fn test_blue_green_report_shape() {
    let report = serde_json::json!({
        "sourceIndex": "docs_v1",
        "targetIndex": "docs_v2",
        "sourceCount": 1200,
        "targetCount": 1200,
        "reindexTookMs": 4200,
        "failures": [],
        "aliasBefore": { "readTargets": ["docs_v1"], "writeTargets": ["docs_v1"] },
        "aliasAfter": { "readTargets": ["docs_v2"], "writeTargets": ["docs_v2"] },
        "validation": { "passed": true, "reasons": [] },
        "retentionManifestPath": "reports/reindex/20250304_123045_docs_v2/manifest.md",
    });
    assert!(report["sourceCount"].is_number());
    assert!(report["aliasBefore"]["readTargets"].is_array());
    assert!(report["aliasAfter"]["writeTargets"].is_array());
    assert!(report["validation"]["passed"].is_boolean());
    assert!(report["retentionManifestPath"].is_string());
}

/// Bulk report shape: success + failed must equal total, failures carry
/// id/status/reason/attempt.
#[test]
fn test_bulk_report_shape() {
    let report = serde_json::json!({
        "total": 500,
        "success": 498,
        "failed": 2,
        "failures": [
            { "id": "7f1f4df8-9f7a-4d6f-90a1-000000000001", "status": 429,
              "reason": "es_rejected_execution_exception", "attempt": 3 }
        ],
        "attempts": 3,
        "tookMs": 812,
    });
    assert_eq!(
        report["success"].as_u64().unwrap() + report["failed"].as_u64().unwrap(),
        report["total"].as_u64().unwrap()
    );
    let failure = &report["failures"][0];
    assert!(failure["id"].is_string());
    assert!(failure["status"].is_number());
    assert!(failure["reason"].is_string());
    assert!(failure["attempt"].as_u64().unwrap() <= report["attempts"].as_u64().unwrap());
}

/// Evaluation metrics.json top-level contract.
#[test]
fn test_evaluation_report_shape() {
    let report = serde_json::json!({
        "reportId": "20250304_123045",
        "datasetId": "blog",
        "topK": 10,
        "totalQueries": 40,
        "startedAt": "2025-03-04T12:30:45Z",
        "completedAt": "2025-03-04T12:30:52Z",
        "elapsedMs": 7000,
        "summary": {
            "topK": 10,
            "totalQueries": 40,
            "meanPrecisionAtK": 0.61,
            "meanRecallAtK": 0.55,
            "meanMrr": 0.72,
            "meanNdcgAtK": 0.68,
        },
        "worstQueries": [
            { "queryId": "q17", "intent": "informational",
              "precisionAtK": 0.1, "recallAtK": 0.2, "mrr": 0.25, "ndcgAtK": 0.12,
              "judgedHits": 2, "relevantHits": 1, "totalHits": 90 }
        ],
    });
    for key in [
        "reportId",
        "datasetId",
        "topK",
        "totalQueries",
        "startedAt",
        "completedAt",
        "elapsedMs",
        "summary",
        "worstQueries",
    ] {
        assert!(report.get(key).is_some(), "missing key {}", key);
    }
    for key in [
        "topK",
        "totalQueries",
        "meanPrecisionAtK",
        "meanRecallAtK",
        "meanMrr",
        "meanNdcgAtK",
    ] {
        assert!(report["summary"].get(key).is_some(), "missing summary key {}", key);
    }
    let worst = &report["worstQueries"][0];
    for key in [
        "queryId",
        "intent",
        "precisionAtK",
        "recallAtK",
        "mrr",
        "ndcgAtK",
        "judgedHits",
        "relevantHits",
        "totalHits",
    ] {
        assert!(worst.get(key).is_some(), "missing worst-query key {}", key);
    }
}

/// Public search response shape.
#[test]
fn test_search_response_shape() {
    let response = serde_json::json!({
        "total": 3,
        "tookMs": 12,
        "page": 0,
        "size": 5,
        "hits": [
            {
                "document": {
                    "id": "7f1f4df8-9f7a-4d6f-90a1-000000000001",
                    "title": "쿠버네티스 네트워킹",
                    "body": "파드 네트워킹 개요",
                    "tags": ["kubernetes"],
                    "category": "infrastructure",
                    "author": "jlee",
                    "publishedAt": "2024-03-01T09:00:00Z",
                    "popularityScore": 42.0,
                },
                "score": 8.2,
            }
        ],
    });
    assert!(response["total"].is_number());
    assert!(response["hits"].is_array());
    let hit = &response["hits"][0];
    assert!(hit["document"]["publishedAt"].is_string());
    assert!(hit["document"]["popularityScore"].is_number());
    assert!(hit["score"].is_number());
}

/// Benchmark metrics.json shape.
#[test]
fn test_benchmark_result_shape() {
    let result = serde_json::json!({
        "runId": "bench_blog_20250304_123045",
        "datasetId": "blog",
        "topK": 10,
        "iterations": 10,
        "warmups": 2,
        "targetIndex": "docs_read",
        "startedAt": "2025-03-04T12:30:45Z",
        "completedAt": "2025-03-04T12:31:45Z",
        "elapsedMs": 60000,
        "totalSamples": 400,
        "qps": 6.67,
        "overall": { "min": 3, "p50": 11, "p95": 42, "max": 87, "avg": 14.2 },
        "perQuery": [
            { "queryId": "q1", "samples": [10, 12, 11],
              "stats": { "min": 10, "p50": 11, "p95": 12, "max": 12, "avg": 11.0 } }
        ],
    });
    for key in ["runId", "totalSamples", "qps", "overall", "perQuery"] {
        assert!(result.get(key).is_some(), "missing key {}", key);
    }
    for key in ["min", "p50", "p95", "max", "avg"] {
        assert!(result["overall"].get(key).is_some(), "missing stat {}", key);
    }
}
