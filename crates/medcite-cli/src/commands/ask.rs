use medcite_common::Config;
use medcite_search::{answer_question, check_citations, Searcher};
use tracing::{info, warn};

pub async fn run(
    cfg: &Config,
    query: &str,
    prompt: Option<&str>,
    top_n: Option<usize>,
) -> anyhow::Result<()> {
    let store = super::build_store(cfg);
    let embedder = super::build_embedder(cfg);
    let completion = super::build_completion(cfg)?;
    let searcher = Searcher::new(&store, &embedder, cfg.search.max_passes);

    let top_n = top_n.unwrap_or(cfg.search.top_n);
    let question = prompt.unwrap_or(query);

    let record = answer_question(&searcher, &completion, query, question, top_n).await?;

    println!("{}", record.answer);

    match check_citations(&record.answer, &record.citations) {
        None => info!("All cited PMIDs are grounded in the retrieved abstracts"),
        Some(fabricated) => {
            warn!(?fabricated, "Answer cites PMIDs outside the retrieved evidence")
        }
    }
    Ok(())
}
