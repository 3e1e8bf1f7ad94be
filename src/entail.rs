use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

/// Fixed three-way probability shape every scorer response is parsed into.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntailScores {
    pub entail: f64,
    pub neutral: f64,
    pub contradict: f64,
}

/// Entailment-scoring collaborator: probability that `premise` entails,
/// is neutral to, or contradicts `hypothesis`.
#[async_trait::async_trait]
pub trait EntailmentScorer: Send + Sync {
    async fn score(&self, premise: &str, hypothesis: &str) -> Result<EntailScores>;
}

/// Map a backend's label vocabulary onto the fixed shape. Backends disagree
/// on names ("entailed" vs "entailment", "contradictory" vs "contradiction");
/// unrecognized labels contribute nothing instead of failing the lookup.
fn apply_label(out: &mut EntailScores, label: &str, score: f64) {
    match label.to_lowercase().as_str() {
        "entail" | "entailed" | "entailment" => out.entail = score,
        "neutral" => out.neutral = score,
        "contradict" | "contradictory" | "contradiction" => out.contradict = score,
        _ => {}
    }
}

/// Normalize a shape-varying scorer response into `EntailScores`.
///
/// Accepted shapes: a single `{label, score}` object, a flat list of them,
/// or a nested list (batch-of-one). Anything else scores zero across the
/// board, which routes the item to an unverifiable verdict downstream.
pub fn normalize_scores(raw: &Value) -> EntailScores {
    let entries: Vec<&Value> = match raw {
        Value::Object(_) => vec![raw],
        Value::Array(items) => match items.first() {
            Some(Value::Array(inner)) => inner.iter().collect(),
            _ => items.iter().collect(),
        },
        _ => vec![],
    };

    let mut out = EntailScores::default();
    for entry in entries {
        let (Some(label), Some(score)) = (
            entry.get("label").and_then(Value::as_str),
            entry.get("score").and_then(Value::as_f64),
        ) else {
            continue;
        };
        apply_label(&mut out, label, score);
    }
    out
}

/// HTTP adapter for an NLI inference endpoint that takes a premise/hypothesis
/// pair and answers with per-label scores in any of the shapes above.
pub struct HttpEntailScorer {
    http: Client,
    endpoint: String,
    retries: u32,
}

impl HttpEntailScorer {
    pub fn new(endpoint: String, timeout_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            retries: 2,
        })
    }
}

#[async_trait::async_trait]
impl EntailmentScorer for HttpEntailScorer {
    async fn score(&self, premise: &str, hypothesis: &str) -> Result<EntailScores> {
        let payload = serde_json::json!({
            "inputs": { "text": premise, "text_pair": hypothesis }
        });
        let mut backoff = Duration::from_millis(250);
        let mut attempt = 0;
        loop {
            let res = self
                .http
                .post(&self.endpoint)
                .json(&payload)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            match res {
                Ok(resp) => {
                    let raw: Value = resp.json().await?;
                    return Ok(normalize_scores(&raw));
                }
                Err(err) if attempt < self.retries => {
                    tracing::debug!(%err, attempt, "entailment request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_single_object() {
        let raw = json!({"label": "ENTAILMENT", "score": 0.91});
        let s = normalize_scores(&raw);
        assert!((s.entail - 0.91).abs() < 1e-9);
        assert_eq!(s.contradict, 0.0);
    }

    #[test]
    fn normalizes_flat_list() {
        let raw = json!([
            {"label": "entailment", "score": 0.7},
            {"label": "neutral", "score": 0.2},
            {"label": "contradiction", "score": 0.1}
        ]);
        let s = normalize_scores(&raw);
        assert!((s.entail - 0.7).abs() < 1e-9);
        assert!((s.neutral - 0.2).abs() < 1e-9);
        assert!((s.contradict - 0.1).abs() < 1e-9);
    }

    #[test]
    fn normalizes_nested_list() {
        let raw = json!([[
            {"label": "contradictory", "score": 0.8},
            {"label": "entailed", "score": 0.15}
        ]]);
        let s = normalize_scores(&raw);
        assert!((s.contradict - 0.8).abs() < 1e-9);
        assert!((s.entail - 0.15).abs() < 1e-9);
    }

    #[test]
    fn unknown_labels_are_ignored() {
        let raw = json!([
            {"label": "refuted", "score": 0.9},
            {"label": "neutral", "score": 0.1}
        ]);
        let s = normalize_scores(&raw);
        assert_eq!(s.entail, 0.0);
        assert_eq!(s.contradict, 0.0);
        assert!((s.neutral - 0.1).abs() < 1e-9);
    }

    #[test]
    fn garbage_scores_zero() {
        assert_eq!(normalize_scores(&json!("nope")), EntailScores::default());
        assert_eq!(normalize_scores(&json!(null)), EntailScores::default());
        assert_eq!(
            normalize_scores(&json!([{"label": "entailment"}])),
            EntailScores::default()
        );
    }
}
