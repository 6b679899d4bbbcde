use medcite_common::Config;
use medcite_ingestion::run_ingest;
use tracing::warn;

pub async fn run(cfg: &Config, from: u32, to: u32) -> anyhow::Result<()> {
    let store = super::build_store(cfg);
    let embedder = super::build_embedder(cfg);

    let report = run_ingest(cfg, &store, &embedder, from, to).await;

    for error in &report.errors {
        warn!("{error}");
    }
    println!(
        "Ingested {} file(s) ({} skipped): {} article(s) upserted, {} dropped, in {} ms",
        report.files_processed,
        report.files_skipped,
        report.articles_upserted,
        report.articles_skipped,
        report.duration_ms,
    );
    Ok(())
}
