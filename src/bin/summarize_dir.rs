use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pdf_summarizer::{
    config::Config,
    embedding::get_embedding_client,
    llm::get_llm_client,
    logging,
    processing::{ChainType, PipelineSettings, SummaryPipeline},
};

#[derive(Parser)]
#[command(
    name = "summarize-dir",
    about = "Summarize every PDF in a directory without starting the server"
)]
struct Cli {
    /// Directory holding the PDFs (defaults to `UPLOAD_DIR`).
    dir: Option<PathBuf>,
    /// Override the summarization chain (`stuff`, `refine`, `map_reduce`).
    #[arg(long, value_parser = parse_chain)]
    chain: Option<ChainType>,
    /// Print pipeline counters after the summary.
    #[arg(long)]
    stats: bool,
}

fn parse_chain(value: &str) -> Result<ChainType, String> {
    value
        .parse()
        .map_err(|()| format!("unknown chain type '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init_tracing();

    let dir = cli.dir.unwrap_or_else(|| config.upload_dir.clone());
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut settings = PipelineSettings::from_config(&config);
    if let Some(chain) = cli.chain {
        settings.chain_type = chain;
    }
    let pipeline = SummaryPipeline::new(
        get_embedding_client(&config),
        get_llm_client(&config),
        settings,
    )
    .context("Failed to build summarization pipeline")?;

    let outcome = pipeline
        .summarize_directory(&dir)
        .await
        .with_context(|| format!("Failed to summarize {}", dir.display()))?;

    println!("{}", outcome.summary);
    if cli.stats {
        eprintln!(
            "documents={} pages={} chunks={} selected={} chain={}",
            outcome.documents,
            outcome.pages,
            outcome.chunks,
            outcome.selected_chunks,
            outcome.chain_type
        );
    }
    Ok(())
}
