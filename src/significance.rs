use std::collections::BTreeMap;

use crate::normalize::exact_match;
use crate::types::{ResultRecord, VerdictLabel};

#[derive(Debug, thiserror::Error)]
pub enum SignificanceError {
    /// Paired lists of unequal length are a caller bug, never silently
    /// truncated.
    #[error("paired lists must have equal length (a={a_len}, b={b_len})")]
    LengthMismatch { a_len: usize, b_len: usize },
}

/// Discordant-pair counts and exact binomial p-value for one paired
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McNemarOutcome {
    /// A wrong, B right.
    pub b01: usize,
    /// A right, B wrong.
    pub b10: usize,
    pub p_value: f64,
}

/// One-sided exact binomial tail P(X <= k) for X ~ Binomial(n, 1/2),
/// accumulated in probability space so large n cannot overflow:
/// p_0 = 0.5^n, p_i = p_{i-1} * (n - i + 1) / i.
fn binomial_tail_half(k: usize, n: usize) -> f64 {
    let mut term = 0.5_f64.powi(n as i32);
    let mut tail = term;
    for i in 1..=k {
        term *= (n - i + 1) as f64 / i as f64;
        tail += term;
    }
    tail
}

/// Exact McNemar test (no continuity correction) on paired 0/1 outcomes.
///
/// With no discordant pairs there is no detectable difference and the
/// p-value is 1.0 by definition.
pub fn mcnemar(a_correct: &[bool], b_correct: &[bool]) -> Result<McNemarOutcome, SignificanceError> {
    if a_correct.len() != b_correct.len() {
        return Err(SignificanceError::LengthMismatch {
            a_len: a_correct.len(),
            b_len: b_correct.len(),
        });
    }

    let mut b01 = 0usize;
    let mut b10 = 0usize;
    for (&a, &b) in a_correct.iter().zip(b_correct.iter()) {
        match (a, b) {
            (false, true) => b01 += 1,
            (true, false) => b10 += 1,
            _ => {}
        }
    }

    let n = b01 + b10;
    if n == 0 {
        return Ok(McNemarOutcome { b01, b10, p_value: 1.0 });
    }

    let k = b01.min(b10);
    let tail = binomial_tail_half(k, n);
    let p_value = (2.0 * tail).min(1.0);
    Ok(McNemarOutcome { b01, b10, p_value })
}

/// Metrics a pairwise comparison is run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairedMetric {
    Exact,
    Soft,
}

impl PairedMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairedMetric::Exact => "exact",
            PairedMetric::Soft => "soft",
        }
    }

    fn correct(&self, r: &ResultRecord) -> bool {
        match self {
            PairedMetric::Exact => exact_match(&r.answer, &r.gold_answer),
            PairedMetric::Soft => r.label == VerdictLabel::Supported,
        }
    }
}

/// One row of the pairwise comparison table.
#[derive(Debug, Clone)]
pub struct PairwiseRow {
    pub metric: PairedMetric,
    pub n_shared: usize,
    pub outcome: McNemarOutcome,
}

pub fn index_by_id(records: &[ResultRecord]) -> BTreeMap<i64, &ResultRecord> {
    records.iter().map(|r| (r.id, r)).collect()
}

/// Compare two cohorts on the intersection of their item ids. Returns one
/// row per metric, or an empty vec when the cohorts share no ids (the
/// caller is expected to note the omission, not crash).
pub fn compare_cohorts(
    a: &[ResultRecord],
    b: &[ResultRecord],
) -> Result<Vec<PairwiseRow>, SignificanceError> {
    let idx_a = index_by_id(a);
    let idx_b = index_by_id(b);
    let shared: Vec<i64> = idx_a.keys().filter(|id| idx_b.contains_key(id)).copied().collect();
    if shared.is_empty() {
        return Ok(vec![]);
    }

    let mut rows = Vec::with_capacity(2);
    for metric in [PairedMetric::Exact, PairedMetric::Soft] {
        let a_correct: Vec<bool> = shared.iter().map(|id| metric.correct(idx_a[id])).collect();
        let b_correct: Vec<bool> = shared.iter().map(|id| metric.correct(idx_b[id])).collect();
        let outcome = mcnemar(&a_correct, &b_correct)?;
        rows.push(PairwiseRow { metric, n_shared: shared.len(), outcome });
    }
    Ok(rows)
}
