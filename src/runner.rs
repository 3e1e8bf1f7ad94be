use std::path::Path;

use anyhow::{Context, Result};
use futures::{stream, StreamExt};

use crate::cache::EvidenceCache;
use crate::entail::EntailmentScorer;
use crate::llm::{Generator, Regenerator};
use crate::mitigate::select_mitigation;
use crate::normalize::normalize;
use crate::retrieve::retrieve_evidence;
use crate::search::Searcher;
use crate::types::{EvidenceSnippet, Item, ResultRecord, VerdictLabel};
use crate::verdict::best_verdict;

/// How many retrieved titles a record keeps.
const MAX_TITLES: usize = 5;

pub struct RunConfig {
    /// Cohort identifier written into every record.
    pub model: String,
    /// Snippets to retrieve per item.
    pub k: usize,
    /// Verdict decision threshold.
    pub tau: f64,
    /// Concurrent in-flight items.
    pub concurrency: usize,
    /// Regenerate-and-rescore items whose base verdict is not supported.
    pub mitigate: bool,
    /// Candidates per mitigation attempt.
    pub mitigation_n: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            k: 3,
            tau: crate::verdict::DEFAULT_TAU,
            concurrency: 8,
            mitigate: false,
            mitigation_n: 3,
        }
    }
}

/// Collaborators the runner drives for each item.
pub struct Collaborators<'a> {
    pub generator: &'a dyn Generator,
    pub searcher: &'a dyn Searcher,
    pub scorer: &'a dyn EntailmentScorer,
    pub regenerator: Option<&'a dyn Regenerator>,
    pub cache: &'a EvidenceCache,
}

/// Load benchmark items from JSONL; empty and malformed lines are skipped.
pub fn load_items(path: &Path) -> Result<Vec<Item>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read benchmark file {}", path.display()))?;
    let mut items = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Item>(line) {
            Ok(item) => items.push(item),
            Err(err) => tracing::debug!(%err, "skipping malformed benchmark line"),
        }
    }
    Ok(items)
}

fn gold_in_evidence(gold: &str, snippets: &[EvidenceSnippet]) -> bool {
    let g = normalize(gold);
    if g.is_empty() {
        return false;
    }
    snippets.iter().any(|s| s.text.to_lowercase().contains(&g))
}

async fn evaluate_item(
    item: &Item,
    collab: &Collaborators<'_>,
    config: &RunConfig,
) -> ResultRecord {
    let answer = match collab.generator.generate(&item.question).await {
        Ok(answer) => answer,
        Err(err) => {
            tracing::warn!(id = item.id, %err, "generation failed, recording empty answer");
            String::new()
        }
    };

    let snippets =
        retrieve_evidence(collab.searcher, collab.cache, &item.question, &answer, config.k).await;
    let verdict =
        best_verdict(collab.scorer, &item.question, &answer, &snippets, config.tau).await;

    let mut record = ResultRecord {
        id: item.id,
        domain: item.domain.clone(),
        question: item.question.clone(),
        gold_answer: item.gold_answer.clone(),
        model: config.model.clone(),
        answer,
        label: verdict.label,
        confidence: verdict.confidence,
        max_entail: verdict.max_entail,
        max_contradict: verdict.max_contradict,
        supported_gold_in_evidence: gold_in_evidence(&item.gold_answer, &snippets) as u8,
        retrieved_titles: snippets.iter().take(MAX_TITLES).map(|s| s.title.clone()).collect(),
        mit_answer: None,
        mit_label: None,
        mit_confidence: None,
    };

    if config.mitigate && verdict.label != VerdictLabel::Supported {
        if let Some(regenerator) = collab.regenerator {
            if let Some(pick) = select_mitigation(
                regenerator,
                collab.scorer,
                &item.question,
                &snippets,
                config.mitigation_n,
                config.tau,
            )
            .await
            {
                record.mit_answer = Some(pick.answer);
                record.mit_label = Some(pick.verdict.label);
                record.mit_confidence = Some(pick.verdict.confidence);
            }
        }
    }

    record
}

/// Evaluate every item with bounded concurrency. Records come back sorted by
/// item id so reruns produce byte-identical logs.
pub async fn evaluate_items(
    items: &[Item],
    collab: &Collaborators<'_>,
    config: &RunConfig,
) -> Vec<ResultRecord> {
    let tasks = items.iter().map(|item| evaluate_item(item, collab, config));
    let mut records = stream::iter(tasks)
        .buffer_unordered(config.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
    records.sort_by_key(|r| r.id);
    records
}

/// Append-only JSONL log, one record per line.
pub fn write_records(path: &Path, records: &[ResultRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("cannot write {}", path.display()))
}
