use std::path::Path;

use medcite_common::Config;
use medcite_search::{answer_question, Searcher};
use tracing::{info, warn};

use super::BatchRecord;

/// Run the full retrieval pipeline once per subject name and save the
/// answers as a JSON array. A subject that fails is recorded in the log
/// and skipped; the batch keeps going.
pub async fn run(
    cfg: &Config,
    input: &Path,
    output: &Path,
    query_template: &str,
    prompt_template: Option<&str>,
    top_n: Option<usize>,
) -> anyhow::Result<()> {
    let store = super::build_store(cfg);
    let embedder = super::build_embedder(cfg);
    let completion = super::build_completion(cfg)?;
    let searcher = Searcher::new(&store, &embedder, cfg.search.max_passes);

    let top_n = top_n.unwrap_or(cfg.search.top_n);
    let prompt_template = prompt_template.unwrap_or(query_template);

    let raw = std::fs::read_to_string(input)?;
    let names: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    info!(subjects = names.len(), "Starting batch run");

    let mut records = Vec::with_capacity(names.len());
    for name in names {
        let query = query_template.replace("{name}", name);
        let question = prompt_template.replace("{name}", name);
        info!(name, "Answering");

        match answer_question(&searcher, &completion, &query, &question, top_n).await {
            Ok(answer) => records.push(BatchRecord {
                name: name.to_string(),
                abstracts: answer.abstracts,
                citations: answer.citations,
                answer: answer.answer,
            }),
            Err(e) => warn!(name, "Skipping subject: {e}"),
        }
    }

    std::fs::write(output, serde_json::to_string_pretty(&records)?)?;
    println!("Saved {} answer(s) to {}", records.len(), output.display());
    Ok(())
}
