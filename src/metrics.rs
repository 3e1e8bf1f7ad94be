use std::collections::BTreeMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::normalize::{exact_match, loose_correct};
use crate::types::{MetricPack, ResultRecord, VerdictLabel};

/// Bootstrap configuration. The seed is fixed once per call so identical
/// inputs always produce identical intervals.
#[derive(Debug, Clone)]
pub struct StatConfig {
    pub n_boot: usize,
    pub alpha: f64,
    pub seed: u64,
    /// Token-F1 threshold for the loose-correctness cascade.
    pub loose_threshold: f64,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            n_boot: 10_000,
            alpha: 0.05,
            seed: 17,
            loose_threshold: 0.6,
        }
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Percentile bootstrap over a binary (or any numeric) sample.
/// Returns (mean, ci_low, ci_high); all NaN for empty input.
pub fn bootstrap_ci(values: &[f64], config: &StatConfig) -> (f64, f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut means = Vec::with_capacity(config.n_boot);
    for _ in 0..config.n_boot {
        let sum: f64 = (0..n)
            .map(|_| values[(rng.next_u64() % n as u64) as usize])
            .sum();
        means.push(sum / n as f64);
    }
    means.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let lo_idx = ((config.alpha / 2.0) * config.n_boot as f64).floor() as usize;
    let hi_idx = ((1.0 - config.alpha / 2.0) * config.n_boot as f64).floor() as usize;
    let lo = means[lo_idx.min(means.len() - 1)];
    let hi = means[hi_idx.min(means.len() - 1)];
    (mean, lo, hi)
}

fn pack(values: &[f64], config: &StatConfig) -> MetricPack {
    let (mean, lo, hi) = bootstrap_ci(values, config);
    MetricPack {
        mean: round3(mean),
        ci_low: round3(lo),
        ci_high: round3(hi),
        n: values.len(),
    }
}

/// The four binary indicators for one record.
#[derive(Debug, Clone, Copy)]
pub struct Indicators {
    pub exact: bool,
    pub loose: bool,
    pub soft: bool,
    pub recall_any: bool,
}

pub fn indicators(record: &ResultRecord, loose_threshold: f64) -> Indicators {
    Indicators {
        exact: exact_match(&record.answer, &record.gold_answer),
        loose: loose_correct(&record.answer, &record.gold_answer, loose_threshold),
        soft: record.label == VerdictLabel::Supported,
        recall_any: record.supported_gold_in_evidence == 1,
    }
}

/// Bootstrap packs for the four metrics over one population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBlock {
    pub exact: MetricPack,
    pub loose: MetricPack,
    pub soft: MetricPack,
    pub recall_any: MetricPack,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LabelCounts {
    pub supported: usize,
    pub contradicted: usize,
    pub unverifiable: usize,
}

/// Per-cohort summary: overall metrics, label counts, and a per-domain
/// breakdown (domains in sorted order for stable output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortSummary {
    pub overall: MetricBlock,
    pub label_counts: LabelCounts,
    pub by_domain: BTreeMap<String, MetricBlock>,
}

struct Tallies {
    exact: Vec<f64>,
    loose: Vec<f64>,
    soft: Vec<f64>,
    recall: Vec<f64>,
}

impl Tallies {
    fn new() -> Self {
        Self { exact: vec![], loose: vec![], soft: vec![], recall: vec![] }
    }

    fn push(&mut self, ind: Indicators) {
        self.exact.push(ind.exact as u8 as f64);
        self.loose.push(ind.loose as u8 as f64);
        self.soft.push(ind.soft as u8 as f64);
        self.recall.push(ind.recall_any as u8 as f64);
    }

    fn block(&self, config: &StatConfig) -> MetricBlock {
        MetricBlock {
            exact: pack(&self.exact, config),
            loose: pack(&self.loose, config),
            soft: pack(&self.soft, config),
            recall_any: pack(&self.recall, config),
            n: self.exact.len(),
        }
    }
}

pub fn summarize_cohort(records: &[ResultRecord], config: &StatConfig) -> CohortSummary {
    let mut overall = Tallies::new();
    let mut domains: BTreeMap<String, Tallies> = BTreeMap::new();
    let mut labels = LabelCounts::default();

    for r in records {
        let ind = indicators(r, config.loose_threshold);
        overall.push(ind);
        domains.entry(r.domain.clone()).or_insert_with(Tallies::new).push(ind);
        match r.label {
            VerdictLabel::Supported => labels.supported += 1,
            VerdictLabel::Contradicted => labels.contradicted += 1,
            VerdictLabel::Unverifiable => labels.unverifiable += 1,
        }
    }

    CohortSummary {
        overall: overall.block(config),
        label_counts: labels,
        by_domain: domains
            .into_iter()
            .map(|(d, t)| {
                let block = t.block(config);
                (d, block)
            })
            .collect(),
    }
}
