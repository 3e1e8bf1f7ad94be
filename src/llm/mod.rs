use anyhow::Result;

use crate::types::EvidenceSnippet;

pub mod mock;
pub mod openai;

/// Answer-generation collaborator: produce a short span answer for a
/// benchmark question.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str) -> Result<String>;
}

/// Mitigation-generation collaborator: produce `n` alternative answers
/// constrained to the given sources.
#[async_trait::async_trait]
pub trait Regenerator: Send + Sync {
    async fn regenerate(
        &self,
        question: &str,
        sources: &[EvidenceSnippet],
        n: usize,
    ) -> Result<Vec<String>>;
}
