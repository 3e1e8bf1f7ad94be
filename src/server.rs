use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::cache::EvidenceCache;
use crate::entail::EntailmentScorer;
use crate::llm::{Generator, Regenerator};
use crate::mitigate::select_mitigation;
use crate::retrieve::retrieve_evidence;
use crate::search::Searcher;
use crate::types::{EvidenceSnippet, Verdict, VerdictLabel};
use crate::verdict::best_verdict;

/// Shared state for the check endpoint: the collaborator set plus the
/// retrieval/verdict knobs.
pub struct Engine {
    pub generator: Arc<dyn Generator>,
    pub searcher: Arc<dyn Searcher>,
    pub scorer: Arc<dyn EntailmentScorer>,
    pub regenerator: Option<Arc<dyn Regenerator>>,
    pub cache: Arc<EvidenceCache>,
    pub k: usize,
    pub tau: f64,
    pub mitigation_n: usize,
}

#[derive(Deserialize)]
pub struct CheckReq {
    pub question: String,
}

#[derive(Serialize)]
pub struct MitigationResp {
    pub answer: String,
    pub label: VerdictLabel,
    pub confidence: f64,
}

#[derive(Serialize)]
pub struct CheckResp {
    pub answer: String,
    pub evidence: Vec<EvidenceSnippet>,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<MitigationResp>,
}

async fn check(State(engine): State<Arc<Engine>>, Json(req): Json<CheckReq>) -> Json<CheckResp> {
    let answer = match engine.generator.generate(&req.question).await {
        Ok(answer) => answer,
        Err(err) => {
            tracing::warn!(%err, "generation failed for check request");
            String::new()
        }
    };

    let evidence = retrieve_evidence(
        engine.searcher.as_ref(),
        engine.cache.as_ref(),
        &req.question,
        &answer,
        engine.k,
    )
    .await;
    let verdict =
        best_verdict(engine.scorer.as_ref(), &req.question, &answer, &evidence, engine.tau).await;

    let mut mitigation = None;
    if verdict.label != VerdictLabel::Supported {
        if let Some(regenerator) = &engine.regenerator {
            mitigation = select_mitigation(
                regenerator.as_ref(),
                engine.scorer.as_ref(),
                &req.question,
                &evidence,
                engine.mitigation_n,
                engine.tau,
            )
            .await
            .map(|pick| MitigationResp {
                answer: pick.answer,
                label: pick.verdict.label,
                confidence: pick.verdict.confidence,
            });
        }
    }

    Json(CheckResp { answer, evidence, verdict, mitigation })
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new().route("/check", post(check)).with_state(engine)
}

pub async fn run_server(engine: Engine, addr: &str) -> anyhow::Result<()> {
    let app = router(Arc::new(engine));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "check endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}
