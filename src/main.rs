use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use groundcheck::analyze::{load_cohort, run_analysis};
use groundcheck::cache::EvidenceCache;
use groundcheck::entail::HttpEntailScorer;
use groundcheck::llm::mock::{MockGenerator, MockRegenerator};
use groundcheck::llm::openai::LlmClient;
use groundcheck::llm::{Generator, Regenerator};
use groundcheck::metrics::StatConfig;
use groundcheck::runner::{evaluate_items, load_items, write_records, Collaborators, RunConfig};
use groundcheck::search::WikiSearch;
use groundcheck::server::{run_server, Engine};

#[derive(Parser)]
#[command(name = "groundcheck", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Args)]
struct ServiceArgs {
    /// Cohort/model identifier for the generator
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,
    /// Use the offline scripted generator instead of a chat model
    #[arg(long)]
    mock: bool,
    /// Snippets to retrieve per item
    #[arg(long, default_value_t = 3)]
    k: usize,
    /// Verdict decision threshold
    #[arg(long, default_value_t = 0.6)]
    tau: f64,
    /// Evidence cache snapshot path
    #[arg(long, default_value = "runs/evidence_cache.json")]
    cache_path: PathBuf,
    /// Search API base URL
    #[arg(long, default_value = "https://en.wikipedia.org")]
    search_base: String,
    /// Search queries per second
    #[arg(long, default_value_t = 2)]
    search_qps: u32,
    /// Entailment scorer endpoint URL (env: ENTAIL_ENDPOINT)
    #[arg(long, env = "ENTAIL_ENDPOINT", default_value = "http://127.0.0.1:8501/score")]
    entail_endpoint: String,
    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

#[derive(Subcommand)]
enum Cmd {
    /// Evaluate a benchmark: generate -> retrieve -> verdict per item
    Run {
        /// Benchmark items, JSONL
        #[arg(long)]
        input_file: PathBuf,
        /// Result log to write
        #[arg(long, default_value = "runs/results.jsonl")]
        out: PathBuf,
        /// Concurrent in-flight items
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
        /// Regenerate-and-rescore unsupported answers
        #[arg(long)]
        mitigate: bool,
        /// Candidates per mitigation attempt
        #[arg(long, default_value_t = 3)]
        mitigation_n: usize,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Summarize result logs: bootstrap CIs overall and per domain
    Analyze {
        /// Result logs, one cohort each
        #[arg(long, num_args = 1.., required = true)]
        models: Vec<PathBuf>,
        /// Directory for CSV tables
        #[arg(long, default_value = "tables")]
        outdir: PathBuf,
        /// Also run pairwise McNemar across the supplied cohorts
        #[arg(long)]
        pairwise: bool,
        /// Bootstrap resamples
        #[arg(long, default_value_t = 10_000)]
        n_boot: usize,
        /// Bootstrap seed
        #[arg(long, default_value_t = 17)]
        seed: u64,
    },
    /// Serve the single-question check endpoint
    Serve {
        #[arg(long, default_value = "127.0.0.1:8088")]
        addr: String,
        #[command(flatten)]
        service: ServiceArgs,
    },
}

struct Services {
    generator: Arc<dyn Generator>,
    regenerator: Option<Arc<dyn Regenerator>>,
    searcher: Arc<WikiSearch>,
    scorer: Arc<HttpEntailScorer>,
    cache: Arc<EvidenceCache>,
}

fn build_services(args: &ServiceArgs) -> Result<Services> {
    let (generator, regenerator): (Arc<dyn Generator>, Option<Arc<dyn Regenerator>>) =
        if args.mock {
            (Arc::new(MockGenerator), Some(Arc::new(MockRegenerator)))
        } else {
            let api_key = std::env::var("OPENAI_API_KEY").ok();
            let base_url = std::env::var("OPENAI_BASE_URL").ok();
            let client =
                Arc::new(LlmClient::new(args.model.clone(), base_url, api_key, 8));
            (client.clone(), Some(client))
        };

    Ok(Services {
        generator,
        regenerator,
        searcher: Arc::new(WikiSearch::new(
            args.search_base.clone(),
            args.search_qps,
            args.timeout_ms,
        )?),
        scorer: Arc::new(HttpEntailScorer::new(
            args.entail_endpoint.clone(),
            args.timeout_ms,
        )?),
        cache: Arc::new(EvidenceCache::load(&args.cache_path)),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run { input_file, out, concurrency, mitigate, mitigation_n, service } => {
            let items = load_items(&input_file)?;
            tracing::info!(n = items.len(), "loaded benchmark items");

            let services = build_services(&service)?;
            let collab = Collaborators {
                generator: services.generator.as_ref(),
                searcher: services.searcher.as_ref(),
                scorer: services.scorer.as_ref(),
                regenerator: services.regenerator.as_deref(),
                cache: services.cache.as_ref(),
            };
            let config = RunConfig {
                model: service.model.clone(),
                k: service.k,
                tau: service.tau,
                concurrency,
                mitigate,
                mitigation_n,
            };

            let records = evaluate_items(&items, &collab, &config).await;
            write_records(&out, &records)?;
            services.cache.flush(&service.cache_path);
            tracing::info!(n = records.len(), out = %out.display(), "wrote result log");
        }
        Cmd::Analyze { models, outdir, pairwise, n_boot, seed } => {
            let mut cohorts = Vec::with_capacity(models.len());
            for path in &models {
                cohorts.push(load_cohort(path)?);
            }
            let config = StatConfig { n_boot, seed, ..StatConfig::default() };
            let written = run_analysis(&cohorts, &outdir, pairwise, &config)?;
            for path in written {
                tracing::info!(path = %path.display(), "wrote table");
            }
        }
        Cmd::Serve { addr, service } => {
            let services = build_services(&service)?;
            let engine = Engine {
                generator: services.generator,
                searcher: services.searcher,
                scorer: services.scorer,
                regenerator: services.regenerator,
                cache: services.cache,
                k: service.k,
                tau: service.tau,
                mitigation_n: 3,
            };
            run_server(engine, &addr).await?;
        }
    }
    Ok(())
}
