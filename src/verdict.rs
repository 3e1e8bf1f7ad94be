use crate::claim::claimify;
use crate::entail::EntailmentScorer;
use crate::normalize::normalize;
use crate::types::{EvidenceSnippet, Verdict, VerdictLabel};

/// Default decision threshold for the entail/contradict maxima.
pub const DEFAULT_TAU: f64 = 0.60;

/// Confidence assigned when a short answer span is found verbatim in evidence.
const SPAN_MATCH_CONFIDENCE: f64 = 0.7;

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Span fast path: a normalized answer of at most three tokens that appears
/// literally inside a snippet's lowercased text is trusted without scoring.
/// Returns the index of the first matching snippet.
fn span_match(answer: &str, snippets: &[EvidenceSnippet]) -> Option<usize> {
    let a = normalize(answer);
    if a.is_empty() || a.split_whitespace().count() > 3 {
        return None;
    }
    snippets.iter().position(|s| s.text.to_lowercase().contains(&a))
}

/// Decide whether `answer` is supported, contradicted, or unverifiable given
/// the retrieved snippets.
///
/// The label is a pure function of the two score maxima and `tau`: the
/// contradicted branch is tested first, both branches require a strict
/// majority (`>`) over the other score, and anything else — below threshold
/// or an exact tie — is unverifiable. The attached evidence is the
/// best-entailing snippet regardless of the final label.
pub async fn best_verdict(
    scorer: &dyn EntailmentScorer,
    question: &str,
    answer: &str,
    snippets: &[EvidenceSnippet],
    tau: f64,
) -> Verdict {
    if snippets.is_empty() {
        return Verdict::unverifiable();
    }

    if let Some(idx) = span_match(answer, snippets) {
        return Verdict {
            label: VerdictLabel::Supported,
            confidence: SPAN_MATCH_CONFIDENCE,
            max_entail: SPAN_MATCH_CONFIDENCE,
            max_contradict: 0.0,
            evidence: Some(snippets[idx].clone()),
        };
    }

    let premises: Vec<&EvidenceSnippet> =
        snippets.iter().filter(|s| !s.text.is_empty()).collect();
    if premises.is_empty() {
        return Verdict::unverifiable();
    }

    let hypothesis = claimify(question, answer);

    let mut max_entail = 0.0_f64;
    let mut max_contradict = 0.0_f64;
    let mut best_idx: Option<usize> = None;
    for (i, snippet) in premises.iter().enumerate() {
        let scores = match scorer.score(&snippet.text, &hypothesis).await {
            Ok(scores) => scores,
            Err(err) => {
                tracing::warn!(%err, "entailment scoring failed, counting zero");
                continue;
            }
        };
        // strict > keeps the earliest snippet on ties
        if scores.entail > max_entail {
            max_entail = scores.entail;
            best_idx = Some(i);
        }
        if scores.contradict > max_contradict {
            max_contradict = scores.contradict;
        }
    }

    let confidence = (max_entail - max_contradict).abs();
    let label = if max_contradict >= tau && max_contradict > max_entail {
        VerdictLabel::Contradicted
    } else if max_entail >= tau && max_entail > max_contradict {
        VerdictLabel::Supported
    } else {
        VerdictLabel::Unverifiable
    };

    Verdict {
        label,
        confidence: round3(confidence),
        max_entail: round3(max_entail),
        max_contradict: round3(max_contradict),
        evidence: best_idx.map(|i| premises[i].clone()),
    }
}
