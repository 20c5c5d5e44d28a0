//! Authenticity scoring for uploaded documents. The call is bounded by a
//! timeout; any failure yields a neutral result instead of an error.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::DocumentMetadata;

pub const NEUTRAL_SCORE: f64 = 0.5;

const ACCEPTED_MIME_TYPES: [&str; 4] = ["application/pdf", "image/png", "image/jpeg", "image/tiff"];
const LARGE_UPLOAD_BYTES: i64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub title: String,
    pub content_locator: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

impl ScoreResult {
    pub fn neutral(reason: &str) -> Self {
        Self {
            score: NEUTRAL_SCORE,
            flags: Vec::new(),
            explanation: format!("Automated scoring unavailable ({}); neutral score applied", reason),
        }
    }

    pub fn apply_to(&self, metadata: &mut DocumentMetadata) {
        metadata.authenticity_score = Some(self.score);
        metadata.flags = self.flags.clone();
        metadata.explanation = Some(self.explanation.clone());
    }
}

#[async_trait]
pub trait AuthenticityScorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreResult, anyhow::Error>;
}

/// Remote scorer reached over HTTP.
pub struct HttpScorer {
    client: Client,
    url: String,
}

impl HttpScorer {
    pub fn new(url: &str) -> Self {
        tracing::info!(url = %url, "Authenticity scorer configured");
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl AuthenticityScorer for HttpScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreResult, anyhow::Error> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach scorer: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Scorer returned error status {}",
                response.status()
            ));
        }

        let result: ScoreResult = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse scorer response: {}", e))?;

        if !(0.0..=1.0).contains(&result.score) {
            return Err(anyhow::anyhow!("Scorer returned out-of-range score {}", result.score));
        }
        Ok(result)
    }
}

/// Deterministic local scorer used when no remote scorer is configured.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

#[async_trait]
impl AuthenticityScorer for HeuristicScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreResult, anyhow::Error> {
        let mut score: f64 = 0.9;
        let mut flags = Vec::new();

        if !ACCEPTED_MIME_TYPES.contains(&request.mime_type.to_lowercase().as_str()) {
            score -= 0.3;
            flags.push("unexpected_mime_type".to_string());
        }
        if request.size_bytes <= 0 {
            score -= 0.5;
            flags.push("empty_content".to_string());
        } else if request.size_bytes > LARGE_UPLOAD_BYTES {
            score -= 0.2;
            flags.push("unusually_large".to_string());
        }
        if request.content_hash.as_deref().map_or(true, |h| h.trim().is_empty()) {
            score -= 0.1;
            flags.push("missing_content_hash".to_string());
        }

        let explanation = if flags.is_empty() {
            "No anomalies detected by heuristic checks".to_string()
        } else {
            format!("Heuristic checks raised: {}", flags.join(", "))
        };

        Ok(ScoreResult {
            score: score.clamp(0.0, 1.0),
            flags,
            explanation,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    pub result: ScoreResult,
    pub fallback: bool,
}

pub async fn score_with_fallback(
    scorer: &dyn AuthenticityScorer,
    request: &ScoreRequest,
    timeout: Duration,
) -> ScoringOutcome {
    match tokio::time::timeout(timeout, scorer.score(request)).await {
        Ok(Ok(result)) => ScoringOutcome {
            result,
            fallback: false,
        },
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Authenticity scoring failed, using neutral score");
            super::metrics::record_scoring_fallback();
            ScoringOutcome {
                result: ScoreResult::neutral("scorer error"),
                fallback: true,
            }
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Authenticity scoring timed out");
            super::metrics::record_scoring_fallback();
            ScoringOutcome {
                result: ScoreResult::neutral("timeout"),
                fallback: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mime: &str, size: i64, hash: Option<&str>) -> ScoreRequest {
        ScoreRequest {
            doc_type: "Birth Certificate".into(),
            title: "Birth certificate".into(),
            content_locator: "s3://vault/abc".into(),
            mime_type: mime.into(),
            size_bytes: size,
            content_hash: hash.map(str::to_string),
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl AuthenticityScorer for FailingScorer {
        async fn score(&self, _: &ScoreRequest) -> Result<ScoreResult, anyhow::Error> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    struct SlowScorer;

    #[async_trait]
    impl AuthenticityScorer for SlowScorer {
        async fn score(&self, _: &ScoreRequest) -> Result<ScoreResult, anyhow::Error> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ScoreResult {
                score: 1.0,
                flags: vec![],
                explanation: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn clean_upload_scores_high_without_flags() {
        let result = HeuristicScorer
            .score(&request("application/pdf", 2048, Some("abc123")))
            .await
            .unwrap();
        assert!(result.flags.is_empty());
        assert!((result.score - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn heuristic_is_deterministic_and_flags_anomalies() {
        let req = request("application/x-msdownload", 0, None);
        let first = HeuristicScorer.score(&req).await.unwrap();
        let second = HeuristicScorer.score(&req).await.unwrap();
        assert_eq!(first, second);
        assert!(first.flags.contains(&"empty_content".to_string()));
        assert!(first.flags.contains(&"unexpected_mime_type".to_string()));
        assert!(first.score < 0.05);
    }

    #[tokio::test]
    async fn failure_yields_neutral_fallback() {
        let outcome = score_with_fallback(
            &FailingScorer,
            &request("application/pdf", 10, None),
            Duration::from_secs(1),
        )
        .await;
        assert!(outcome.fallback);
        assert_eq!(outcome.result.score, NEUTRAL_SCORE);
        assert!(outcome.result.flags.is_empty());
    }

    #[tokio::test]
    async fn timeout_yields_neutral_fallback() {
        let outcome = score_with_fallback(
            &SlowScorer,
            &request("application/pdf", 10, None),
            Duration::from_millis(20),
        )
        .await;
        assert!(outcome.fallback);
        assert!(outcome.result.explanation.contains("timeout"));
    }
}
