//! Medcite CLI — ingest PubMed baselines into the vector index and ask
//! citation-checked questions against it.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "medcite")]
#[command(about = "Evidence-grounded question answering over PubMed abstracts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to medcite.toml (defaults to ./medcite.toml)
    #[arg(short, long, global = true, env = "MEDCITE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, verify and index a range of baseline files
    Ingest {
        /// First baseline file number
        #[arg(long)]
        from: u32,
        /// Last baseline file number (inclusive)
        #[arg(long)]
        to: u32,
    },

    /// Answer one question from the indexed abstracts
    Ask {
        /// Retrieval query sent to the vector index
        query: String,
        /// Question put to the model; defaults to the retrieval query
        #[arg(long)]
        prompt: Option<String>,
        /// Number of abstracts to ground the answer on
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Answer a list of subjects, one full pipeline run each, saving
    /// JSON records
    Batch {
        /// Newline-separated subject names
        #[arg(long)]
        input: PathBuf,
        /// Output JSON file
        #[arg(long, default_value = "answers.json")]
        output: PathBuf,
        /// Retrieval query template; `{name}` is replaced per subject
        #[arg(long, default_value = "{name}")]
        query_template: String,
        /// Prompt template; defaults to the query template
        #[arg(long)]
        prompt_template: Option<String>,
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Validate citation grounding in a saved batch file
    Check {
        #[arg(long, default_value = "answers.json")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = medcite_common::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { from, to } => commands::ingest::run(&config, from, to).await,
        Commands::Ask { query, prompt, top_n } => {
            commands::ask::run(&config, &query, prompt.as_deref(), top_n).await
        }
        Commands::Batch { input, output, query_template, prompt_template, top_n } => {
            commands::batch::run(
                &config,
                &input,
                &output,
                &query_template,
                prompt_template.as_deref(),
                top_n,
            )
            .await
        }
        Commands::Check { input } => commands::check::run(&input),
    }
}
