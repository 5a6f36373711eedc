//! Runs one pipeline pass in the foreground and prints the similarity report.
//!
//! Usage:
//!   papermill-run "The Role of AI Agents in Enhancing Academic Writing"
//!   papermill-run "Graph Neural Networks" --session-id gnn --max-results 10

use anyhow::Context;
use clap::Parser;
use papermill_core::app::build_pipeline;
use papermill_core::config::{clamp_max_results, Config};
use papermill_core::research::RunRequest;
use papermill_core::runlog::RunLog;
use papermill_core::runs::CancelToken;
use papermill_core::sessions::SessionId;

#[derive(Parser)]
#[command(name = "papermill-run")]
#[command(about = "Search arXiv, draft a paper for a title and score it against the sources")]
struct Args {
    /// Paper title, also used as the search query
    title: String,

    /// Session id (default: derived from the title)
    #[arg(short = 's', long)]
    session_id: Option<String>,

    /// Maximum number of papers to retrieve (1-50)
    #[arg(short = 'n', long)]
    max_results: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    papermill_telemetry::init();
    let args = Args::parse();

    let (cfg, _) = Config::load().context("loading papermill config")?;
    let session_id = match args.session_id.as_deref() {
        Some(raw) => SessionId::parse(raw)?,
        None => SessionId::from_title(&args.title),
    };
    let req = RunRequest {
        title: args.title.clone(),
        session_id,
        max_results: args.max_results.map(clamp_max_results).unwrap_or_else(|| cfg.default_max_results()),
    };

    let pipeline = build_pipeline(&cfg).context("building pipeline")?;
    let log_path = pipeline.store().log_path(&req.session_id);
    let log = RunLog::create(&log_path, req.session_id.clone())
        .with_context(|| format!("opening run log {}", log_path.display()))?;

    let out = pipeline.run(&req, &log, &CancelToken::never()).await?;
    println!("Session ID: {}", out.session_id);
    println!("Plagiarism report: {}", serde_json::to_string(&out.plagiarism)?);
    Ok(())
}
