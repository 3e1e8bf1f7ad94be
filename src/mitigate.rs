use crate::entail::EntailmentScorer;
use crate::llm::Regenerator;
use crate::types::{EvidenceSnippet, Verdict};
use crate::verdict::best_verdict;

/// A regenerated candidate answer with its verdict against the original
/// evidence set.
#[derive(Debug, Clone)]
pub struct MitigationPick {
    pub answer: String,
    pub verdict: Verdict,
}

/// Regenerate `n` candidates constrained to `evidence`, re-score each against
/// the same evidence, and return the candidate with the highest verdict
/// confidence.
///
/// The sort key is confidence alone, not the label: a confidently
/// contradicted rewrite outranks a weakly supported one. That is existing
/// product behavior, kept on purpose.
pub async fn select_mitigation(
    regenerator: &dyn Regenerator,
    scorer: &dyn EntailmentScorer,
    question: &str,
    evidence: &[EvidenceSnippet],
    n: usize,
    tau: f64,
) -> Option<MitigationPick> {
    let candidates = match regenerator.regenerate(question, evidence, n).await {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::warn!(%err, "mitigation regeneration failed");
            return None;
        }
    };

    let mut scored = Vec::with_capacity(candidates.len());
    for answer in candidates {
        let verdict = best_verdict(scorer, question, &answer, evidence, tau).await;
        scored.push(MitigationPick { answer, verdict });
    }
    scored.sort_by(|a, b| {
        b.verdict
            .confidence
            .partial_cmp(&a.verdict.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.into_iter().next()
}

/// Offline fallback when no regenerator is configured: stitch a short cited
/// answer from the top two snippets.
pub fn grounded_rewrite(sources: &[EvidenceSnippet]) -> String {
    let mut bits = Vec::new();
    for (i, s) in sources.iter().take(2).enumerate() {
        let text = s.text.trim();
        if text.is_empty() {
            continue;
        }
        let clipped = if text.len() > 240 {
            let mut end = 240;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            let head = &text[..end];
            head.rsplit_once(' ').map(|(lead, _)| lead).unwrap_or(head)
        } else {
            text
        };
        bits.push(format!("{} [S{}]", clipped, i + 1));
    }
    if bits.is_empty() {
        "Insufficient evidence in the provided sources.".to_string()
    } else {
        bits.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entail::EntailScores;
    use crate::types::VerdictLabel;
    use crate::verdict::DEFAULT_TAU;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedRegenerator {
        candidates: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Regenerator for CannedRegenerator {
        async fn regenerate(
            &self,
            _question: &str,
            _sources: &[EvidenceSnippet],
            _n: usize,
        ) -> Result<Vec<String>> {
            Ok(self.candidates.clone())
        }
    }

    /// Scores per scorer call, cycled in order across candidates.
    struct SequenceScorer {
        script: Vec<EntailScores>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl crate::entail::EntailmentScorer for SequenceScorer {
        async fn score(&self, _p: &str, _h: &str) -> Result<EntailScores> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script[i % self.script.len()])
        }
    }

    fn snip(text: &str) -> EvidenceSnippet {
        EvidenceSnippet { source: "wikipedia".into(), title: "T".into(), text: text.into() }
    }

    #[tokio::test]
    async fn picks_highest_confidence_regardless_of_label() {
        let regen = CannedRegenerator {
            candidates: vec![
                "weakly supported long answer".into(),
                "confidently contradicted long answer".into(),
            ],
        };
        // candidate 1: entail 0.65 / contradict 0.0 -> supported, conf 0.65
        // candidate 2: entail 0.0 / contradict 0.95 -> contradicted, conf 0.95
        let scorer = SequenceScorer {
            script: vec![
                EntailScores { entail: 0.65, neutral: 0.35, contradict: 0.0 },
                EntailScores { entail: 0.0, neutral: 0.05, contradict: 0.95 },
            ],
            calls: AtomicUsize::new(0),
        };
        let evidence = [snip("one relevant evidence passage")];
        let pick = select_mitigation(&regen, &scorer, "Q?", &evidence, 2, DEFAULT_TAU)
            .await
            .unwrap();
        assert_eq!(pick.answer, "confidently contradicted long answer");
        assert_eq!(pick.verdict.label, VerdictLabel::Contradicted);
        assert_eq!(pick.verdict.confidence, 0.95);
    }

    #[tokio::test]
    async fn no_candidates_yields_none() {
        let regen = CannedRegenerator { candidates: vec![] };
        let scorer = SequenceScorer {
            script: vec![EntailScores::default()],
            calls: AtomicUsize::new(0),
        };
        let evidence = [snip("text")];
        assert!(select_mitigation(&regen, &scorer, "Q?", &evidence, 3, DEFAULT_TAU)
            .await
            .is_none());
    }

    #[test]
    fn grounded_rewrite_cites_top_sources() {
        let out = grounded_rewrite(&[snip("First passage."), snip("Second passage."), snip("Third.")]);
        assert_eq!(out, "First passage. [S1] Second passage. [S2]");
    }

    #[test]
    fn grounded_rewrite_without_sources() {
        assert_eq!(
            grounded_rewrite(&[]),
            "Insufficient evidence in the provided sources."
        );
    }
}
