use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::metrics::{summarize_cohort, StatConfig};
use crate::significance::compare_cohorts;
use crate::types::{MetricPack, ResultRecord};

/// One loaded result log.
pub struct Cohort {
    pub name: String,
    pub records: Vec<ResultRecord>,
}

/// Load a JSONL result log. The file must exist and be readable; individual
/// empty or malformed lines are skipped silently (missing text fields inside
/// a parseable record fall back to their documented defaults via serde).
pub fn load_cohort(path: &Path) -> Result<Cohort> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read result log {}", path.display()))?;

    let mut records = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ResultRecord>(line) {
            Ok(rec) => records.push(rec),
            Err(err) => tracing::debug!(%err, "skipping malformed result line"),
        }
    }

    let name = records
        .iter()
        .map(|r| r.model.trim())
        .find(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

    Ok(Cohort { name, records })
}

fn metric_fields(pack: &MetricPack) -> [String; 3] {
    [
        pack.mean.to_string(),
        pack.ci_low.to_string(),
        pack.ci_high.to_string(),
    ]
}

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

/// Write `per_model_summary.csv`, `per_domain_summary.csv` and, when asked,
/// `pairwise_mcnemar.csv` for the given cohorts.
pub fn run_analysis(
    cohorts: &[Cohort],
    outdir: &Path,
    pairwise: bool,
    config: &StatConfig,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("cannot create output directory {}", outdir.display()))?;
    let mut written = Vec::new();

    let summaries: Vec<_> = cohorts
        .iter()
        .map(|c| (c, summarize_cohort(&c.records, config)))
        .collect();

    let per_model = outdir.join("per_model_summary.csv");
    {
        let mut w = csv::Writer::from_path(&per_model)
            .with_context(|| format!("cannot write {}", per_model.display()))?;
        w.write_record([
            "model",
            "n",
            "exact_mean",
            "exact_lo",
            "exact_hi",
            "loose_mean",
            "loose_lo",
            "loose_hi",
            "soft_mean",
            "soft_lo",
            "soft_hi",
            "recall_mean",
            "recall_lo",
            "recall_hi",
            "labels_supported",
            "labels_contradicted",
            "labels_unverifiable",
        ])?;
        for (cohort, summary) in &summaries {
            let ov = &summary.overall;
            let mut row = vec![cohort.name.clone(), ov.n.to_string()];
            for pack in [&ov.exact, &ov.loose, &ov.soft, &ov.recall_any] {
                row.extend(metric_fields(pack));
            }
            row.push(summary.label_counts.supported.to_string());
            row.push(summary.label_counts.contradicted.to_string());
            row.push(summary.label_counts.unverifiable.to_string());
            w.write_record(&row)?;
        }
        w.flush()?;
    }
    written.push(per_model);

    let per_domain = outdir.join("per_domain_summary.csv");
    {
        let mut w = csv::Writer::from_path(&per_domain)
            .with_context(|| format!("cannot write {}", per_domain.display()))?;
        w.write_record([
            "model",
            "domain",
            "n",
            "exact_mean",
            "exact_lo",
            "exact_hi",
            "loose_mean",
            "loose_lo",
            "loose_hi",
            "soft_mean",
            "soft_lo",
            "soft_hi",
            "recall_mean",
            "recall_lo",
            "recall_hi",
        ])?;
        for (cohort, summary) in &summaries {
            for (domain, block) in &summary.by_domain {
                let mut row = vec![cohort.name.clone(), domain.clone(), block.n.to_string()];
                for pack in [&block.exact, &block.loose, &block.soft, &block.recall_any] {
                    row.extend(metric_fields(pack));
                }
                w.write_record(&row)?;
            }
        }
        w.flush()?;
    }
    written.push(per_domain);

    if pairwise && cohorts.len() >= 2 {
        let path = outdir.join("pairwise_mcnemar.csv");
        let mut w = csv::Writer::from_path(&path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        w.write_record([
            "model_A",
            "model_B",
            "metric",
            "n_shared",
            "A_wrong_B_right",
            "A_right_B_wrong",
            "p_value",
        ])?;
        for i in 0..cohorts.len() {
            for j in (i + 1)..cohorts.len() {
                let (a, b) = (&cohorts[i], &cohorts[j]);
                let rows = compare_cohorts(&a.records, &b.records)?;
                if rows.is_empty() {
                    tracing::warn!(
                        model_a = %a.name,
                        model_b = %b.name,
                        "cohorts share no item ids, skipping comparison"
                    );
                    continue;
                }
                for row in rows {
                    w.write_record([
                        a.name.clone(),
                        b.name.clone(),
                        row.metric.as_str().to_string(),
                        row.n_shared.to_string(),
                        row.outcome.b01.to_string(),
                        row.outcome.b10.to_string(),
                        round6(row.outcome.p_value).to_string(),
                    ])?;
                }
            }
        }
        w.flush()?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerdictLabel;

    fn record_line(id: i64, model: &str, answer: &str, gold: &str, label: &str) -> String {
        serde_json::json!({
            "id": id,
            "domain": "geo",
            "question": "Q?",
            "gold_answer": gold,
            "model": model,
            "answer": answer,
            "label": label,
            "confidence": 0.5,
            "max_entail": 0.5,
            "max_contradict": 0.0,
            "supported_gold_in_evidence": 1,
            "retrieved_titles": ["T"]
        })
        .to_string()
    }

    #[test]
    fn load_skips_malformed_lines_and_names_from_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results_a.jsonl");
        let contents = [
            record_line(1, "model-a", "paris", "paris", "supported"),
            String::new(),
            "{not json".to_string(),
            record_line(2, "model-a", "rome", "madrid", "contradicted"),
        ]
        .join("\n");
        std::fs::write(&path, contents).unwrap();

        let cohort = load_cohort(&path).unwrap();
        assert_eq!(cohort.name, "model-a");
        assert_eq!(cohort.records.len(), 2);
        assert_eq!(cohort.records[0].label, VerdictLabel::Supported);
    }

    #[test]
    fn load_falls_back_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results_b.jsonl");
        std::fs::write(&path, "").unwrap();
        let cohort = load_cohort(&path).unwrap();
        assert_eq!(cohort.name, "results_b");
        assert!(cohort.records.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_cohort(Path::new("/nonexistent/results.jsonl")).is_err());
    }

    #[test]
    fn analysis_writes_summary_and_pairwise_tables() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        std::fs::write(
            &a,
            [
                record_line(1, "model-a", "paris", "paris", "supported"),
                record_line(2, "model-a", "wrong", "right", "unverifiable"),
            ]
            .join("\n"),
        )
        .unwrap();
        std::fs::write(
            &b,
            [
                record_line(1, "model-b", "paris", "paris", "supported"),
                record_line(2, "model-b", "right", "right", "supported"),
            ]
            .join("\n"),
        )
        .unwrap();

        let cohorts = vec![load_cohort(&a).unwrap(), load_cohort(&b).unwrap()];
        let outdir = dir.path().join("tables");
        let cfg = StatConfig { n_boot: 200, ..StatConfig::default() };
        let written = run_analysis(&cohorts, &outdir, true, &cfg).unwrap();
        assert_eq!(written.len(), 3);

        let per_model = std::fs::read_to_string(outdir.join("per_model_summary.csv")).unwrap();
        assert!(per_model.starts_with("model,n,exact_mean"));
        assert!(per_model.contains("model-a,2,"));

        let pairwise = std::fs::read_to_string(outdir.join("pairwise_mcnemar.csv")).unwrap();
        let mut lines = pairwise.lines();
        assert_eq!(
            lines.next().unwrap(),
            "model_A,model_B,metric,n_shared,A_wrong_B_right,A_right_B_wrong,p_value"
        );
        // exact: A wrong B right on item 2 only -> b01=1, b10=0, p=1.0
        assert!(pairwise.contains("model-a,model-b,exact,2,1,0,1"));
    }

    #[test]
    fn disjoint_pairwise_emits_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        std::fs::write(&a, record_line(1, "model-a", "x", "x", "supported")).unwrap();
        std::fs::write(&b, record_line(2, "model-b", "x", "x", "supported")).unwrap();
        let cohorts = vec![load_cohort(&a).unwrap(), load_cohort(&b).unwrap()];
        let outdir = dir.path().join("tables");
        let cfg = StatConfig { n_boot: 100, ..StatConfig::default() };
        run_analysis(&cohorts, &outdir, true, &cfg).unwrap();

        let pairwise = std::fs::read_to_string(outdir.join("pairwise_mcnemar.csv")).unwrap();
        assert_eq!(pairwise.lines().count(), 1); // header only
    }
}
