//! End-to-end baseline ingestion pipeline.
//!
//! One job covers a numbered range of baseline files. Per file: fetch the
//! checksum sidecar and the archive on a fresh FTP session, verify, then
//! decompress and stream articles straight into embed + upsert. A file
//! that fails anywhere is skipped with a logged reason; the run never
//! aborts on a single file.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use medcite_common::config::{ArchiveConfig, Config};
use medcite_common::error::{MedciteError, Result};
use medcite_index::QdrantStore;
use medcite_llm::EmbeddingBackend;

use crate::extract::ArticleStream;
use crate::fetch::{md5_hex, parse_checksum, ArchiveSession};

// ── Run summary ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReport {
    pub job_id: Uuid,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub articles_upserted: usize,
    pub articles_skipped: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Default)]
struct FileStats {
    upserted: usize,
    skipped: usize,
    errors: Vec<String>,
}

struct FetchedFile {
    data: Vec<u8>,
    expected_md5: String,
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

/// Ingest baseline files `from..=to`. Non-destructive: on errors it logs
/// and continues with the next file or article.
#[instrument(skip(cfg, store, embedder))]
pub async fn run_ingest(
    cfg: &Config,
    store: &QdrantStore,
    embedder: &dyn EmbeddingBackend,
    from: u32,
    to: u32,
) -> IngestReport {
    let job_id = Uuid::new_v4();
    let t0 = std::time::Instant::now();
    info!(job_id = %job_id, from, to, "Starting ingestion");

    let mut report = IngestReport {
        job_id,
        files_processed: 0,
        files_skipped: 0,
        articles_upserted: 0,
        articles_skipped: 0,
        errors: Vec::new(),
        duration_ms: 0,
    };

    if let Err(e) = store.ensure_collection(cfg.qdrant.vector_dim).await {
        report.errors.push(format!("collection bootstrap failed: {e}"));
        report.duration_ms = t0.elapsed().as_millis() as u64;
        return report;
    }

    for index in from..=to {
        let file_name = format!("{}{:04}.xml.gz", cfg.archive.file_prefix, index);
        info!(file_name, "Processing file");
        match process_file(cfg, store, embedder, &file_name).await {
            Ok(stats) => {
                report.files_processed += 1;
                report.articles_upserted += stats.upserted;
                report.articles_skipped += stats.skipped;
                report.errors.extend(stats.errors);
            }
            Err(e) => {
                warn!(file_name, "Skipping file: {e}");
                report.files_skipped += 1;
                report.errors.push(format!("{file_name}: {e}"));
            }
        }
    }

    report.duration_ms = t0.elapsed().as_millis() as u64;
    info!(
        job_id = %report.job_id,
        files_processed = report.files_processed,
        files_skipped = report.files_skipped,
        articles_upserted = report.articles_upserted,
        articles_skipped = report.articles_skipped,
        "Ingestion finished"
    );
    report
}

async fn process_file(
    cfg: &Config,
    store: &QdrantStore,
    embedder: &dyn EmbeddingBackend,
    file_name: &str,
) -> Result<FileStats> {
    let archive = cfg.archive.clone();
    let file = file_name.to_string();
    let fetched = tokio::task::spawn_blocking(move || fetch_verified(&archive, &file))
        .await
        .map_err(|e| MedciteError::Transfer(format!("fetch task failed: {e}")))??;

    let calculated = md5_hex(&fetched.data);
    if calculated != fetched.expected_md5 {
        return Err(MedciteError::ChecksumMismatch {
            file: file_name.to_string(),
            expected: fetched.expected_md5,
            calculated,
        });
    }
    info!(file_name, "Checksums matched; processing file");

    let xml = gunzip(&fetched.data)?;
    ingest_articles(store, embedder, &xml).await
}

/// Blocking half: one FTP session, checksum sidecar first, then the
/// archive, with the courtesy delay between the two retrievals.
fn fetch_verified(cfg: &ArchiveConfig, file_name: &str) -> Result<FetchedFile> {
    let session =
        ArchiveSession::connect(cfg).map_err(|e| MedciteError::Transfer(e.to_string()))?;
    let result = fetch_on_session(&session, cfg, file_name);
    session.close();
    result
}

fn fetch_on_session(
    session: &ArchiveSession,
    cfg: &ArchiveConfig,
    file_name: &str,
) -> Result<FetchedFile> {
    let md5_name = format!("{file_name}.md5");
    debug!(md5_name, "Retrieving checksum file");
    let md5_bytes = session
        .fetch_with_retry(&md5_name)
        .map_err(|e| MedciteError::Transfer(e.to_string()))?;
    let expected_md5 = parse_checksum(&String::from_utf8_lossy(&md5_bytes))
        .ok_or_else(|| MedciteError::Transfer(format!("unparseable checksum file {md5_name}")))?;

    std::thread::sleep(Duration::from_secs(cfg.fetch_delay_secs));

    debug!(file_name, "Retrieving archive");
    let data = session
        .fetch_with_retry(file_name)
        .map_err(|e| MedciteError::Transfer(e.to_string()))?;
    Ok(FetchedFile { data, expected_md5 })
}

fn gunzip(data: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MedciteError::Transfer(format!("decompress failed: {e}")))?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Stream articles out of one decompressed document, embedding and
/// upserting each before the next is parsed. An embed or upsert failure
/// drops that article only.
async fn ingest_articles(
    store: &QdrantStore,
    embedder: &dyn EmbeddingBackend,
    xml: &str,
) -> Result<FileStats> {
    let mut stats = FileStats::default();
    let mut stream = ArticleStream::new(xml);

    while let Some(record) = stream.next() {
        let pmid = record.pmid;
        debug!(pmid, "Embedding abstract");
        // stored raw; the query path L2-normalises — cosine distance in
        // the index makes the two numerically equivalent
        let vector = match embedder.embed(&record.abstract_text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(pmid, "Embedding failed: {e}");
                stats.errors.push(format!("PMID {pmid}: embedding failed: {e}"));
                continue;
            }
        };

        let payload = record.into_payload();
        match store.upsert_article(pmid, &vector, &payload).await {
            Ok(()) => {
                info!(pmid, "Uploaded article");
                stats.upserted += 1;
            }
            Err(e) => {
                warn!(pmid, "Upsert failed: {e}");
                stats.errors.push(format!("PMID {pmid}: upsert failed: {e}"));
            }
        }
    }

    stats.skipped = stream.skipped();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_gunzip_round_trip() {
        let xml = "<PubmedArticleSet></PubmedArticleSet>";
        assert_eq!(gunzip(&gzip(xml.as_bytes())).unwrap(), xml);
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        assert!(gunzip(b"not gzip at all").is_err());
    }
}
