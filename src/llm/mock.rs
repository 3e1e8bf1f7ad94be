use anyhow::Result;

use super::{Generator, Regenerator};
use crate::mitigate::grounded_rewrite;
use crate::types::EvidenceSnippet;

/// Deterministic offline generator for demos and tests. A small scripted set
/// of confidently wrong answers makes the detect-then-mitigate path visible;
/// everything else gets a hedged non-answer.
pub struct MockGenerator;

const WRONG_BASELINES: &[(&str, &str)] = &[
    (
        "Who wrote Pride and Prejudice?",
        "Pride and Prejudice was written by Charlotte Brontë.",
    ),
    (
        "When was Cornell University founded?",
        "Cornell University was founded in 1965.",
    ),
    (
        "What is the capital of Australia?",
        "Sydney is the capital of Australia.",
    ),
];

#[async_trait::async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, question: &str) -> Result<String> {
        for (q, a) in WRONG_BASELINES {
            if *q == question {
                return Ok((*a).to_string());
            }
        }
        Ok("not clearly documented".to_string())
    }
}

/// Offline regenerator: stitches a cited answer from the provided sources
/// instead of calling a chat model.
pub struct MockRegenerator;

#[async_trait::async_trait]
impl Regenerator for MockRegenerator {
    async fn regenerate(
        &self,
        _question: &str,
        sources: &[EvidenceSnippet],
        n: usize,
    ) -> Result<Vec<String>> {
        Ok(vec![grounded_rewrite(sources); n.max(1)])
    }
}
