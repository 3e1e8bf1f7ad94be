use serde::{Deserialize, Serialize};

/// One benchmark question. Immutable input, read from JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub question: String,
    #[serde(default)]
    pub gold_answer: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

pub fn default_domain() -> String {
    "unknown".to_string()
}

fn default_label() -> VerdictLabel {
    VerdictLabel::Unverifiable
}

/// A short evidence passage returned by the search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceSnippet {
    pub source: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictLabel {
    Supported,
    Contradicted,
    Unverifiable,
}

impl VerdictLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLabel::Supported => "supported",
            VerdictLabel::Contradicted => "contradicted",
            VerdictLabel::Unverifiable => "unverifiable",
        }
    }
}

/// Outcome of checking one answer against one evidence set.
///
/// `confidence` is always |max_entail - max_contradict|, never the raw score
/// of whichever branch selected the label. `evidence` points at the
/// best-entailing snippet even when the label is Contradicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub confidence: f64,
    pub max_entail: f64,
    pub max_contradict: f64,
    pub evidence: Option<EvidenceSnippet>,
}

impl Verdict {
    pub fn unverifiable() -> Self {
        Verdict {
            label: VerdictLabel::Unverifiable,
            confidence: 0.0,
            max_entail: 0.0,
            max_contradict: 0.0,
            evidence: None,
        }
    }
}

/// One line of a result log: everything the statistics side needs about a
/// single (item, model) evaluation. Append-only once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: i64,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub gold_answer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default = "default_label")]
    pub label: VerdictLabel,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub max_entail: f64,
    #[serde(default)]
    pub max_contradict: f64,
    /// 0|1: gold answer found verbatim inside any retrieved snippet.
    #[serde(default)]
    pub supported_gold_in_evidence: u8,
    /// Titles of the retrieved snippets, at most five.
    #[serde(default)]
    pub retrieved_titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mit_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mit_label: Option<VerdictLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mit_confidence: Option<f64>,
}

/// Mean plus two-sided bootstrap interval for one binary metric over one
/// population.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricPack {
    pub mean: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub n: usize,
}
