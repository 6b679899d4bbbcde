//! medcite-ingestion — PubMed baseline ingestion.
//!
//! Flow for one baseline file:
//!   1. Open an FTP session (fresh per file), keep-alive heartbeat attached
//!   2. Fetch the `.md5` sidecar, then the archive, both with bounded retry
//!   3. Verify the MD5 checksum; any mismatch skips the file
//!   4. Decompress and stream-parse `<MedlineCitation>` records
//!   5. Embed each surviving abstract and upsert it into the index
//!
//! Everything is sequential on purpose — the archive host rate-limits,
//! and re-processing overlapping ranges is safe because upserts replace.

pub mod extract;
pub mod fetch;
pub mod models;
pub mod pipeline;

pub use models::ArticleRecord;
pub use pipeline::{run_ingest, IngestReport};
