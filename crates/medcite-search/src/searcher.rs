//! Query embedding and adaptive similarity search.
//!
//! Raw nearest-neighbour results mix whole-abstract points with
//! sentence-level points that must be filtered out after the fact, so a
//! fixed-size query under-returns. The loop below oversamples, filters,
//! and widens the window from the observed survival rate until exactly
//! `top_n` abstracts survive — or the index runs out.

use tracing::{debug, info, instrument, warn};

use medcite_index::{ScoredPoint, VectorSearch};
use medcite_llm::{EmbeddingBackend, LlmError};

use crate::citations::{citation_key, CitationEntry, CitationMap};

/// First-pass oversampling ratio: rough ratio of sentence-level to
/// whole-abstract entries in the collection.
const OVERSAMPLE_RATIO: usize = 10;

/// Evidence for one query, ready for synthesis.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// `"<abstract> <citation key>"` per hit, space-joined.
    pub evidence: String,
    pub citations: CitationMap,
    /// False when the eligible population could not satisfy `top_n`;
    /// the fields above then hold the best-effort partial set.
    pub satisfied: bool,
}

pub struct Searcher<'a> {
    index: &'a dyn VectorSearch,
    embedder: &'a dyn EmbeddingBackend,
    /// Backstop on adaptive passes; exhaustion detection is the primary
    /// terminator when the index is smaller than the request.
    max_passes: usize,
}

impl<'a> Searcher<'a> {
    pub fn new(
        index: &'a dyn VectorSearch,
        embedder: &'a dyn EmbeddingBackend,
        max_passes: usize,
    ) -> Self {
        Self { index, embedder, max_passes: max_passes.max(1) }
    }

    /// Embed a free-text query into the stored abstract space. Queries
    /// are L2-normalised; stored abstract vectors are raw. Cosine
    /// distance in the index normalises internally, so the asymmetry is
    /// numerically harmless, but only this path normalises explicitly.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LlmError> {
        info!("Generating embedding for query");
        let raw = self.embedder.embed(query).await?;
        Ok(l2_normalize(raw))
    }

    /// Return exactly `top_n` whole-abstract hits whenever the index
    /// holds that many, plus their citation map and evidence text.
    #[instrument(skip(self, query_vector))]
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        top_n: usize,
    ) -> anyhow::Result<SearchOutcome> {
        info!(top_n, "Searching index for similar abstracts");

        let mut survivors: Vec<ScoredPoint> = Vec::new();
        let mut previous_limit = 0usize;
        let mut limit = top_n.max(1) * OVERSAMPLE_RATIO;
        let mut satisfied = true;
        let mut passes = 0usize;

        while survivors.len() < top_n {
            passes += 1;
            if passes > self.max_passes {
                warn!(
                    found = survivors.len(),
                    top_n, "Pass ceiling reached; returning partial result set"
                );
                satisfied = false;
                break;
            }

            let raw = self.index.search_points(query_vector, limit).await?;
            if raw.len() <= previous_limit {
                // widening the window revealed nothing new: the whole
                // collection has been scanned
                warn!(
                    found = survivors.len(),
                    top_n, "Index exhausted; returning partial result set"
                );
                satisfied = false;
                break;
            }

            // only the newly-revealed slice — earlier ranks were already
            // filtered, and the index keeps rank order stable across
            // repeated queries with growing limits
            survivors.extend(
                raw[previous_limit..]
                    .iter()
                    .filter(|point| !point.payload.is_sentence_embedding())
                    .cloned(),
            );
            previous_limit = limit;

            if survivors.len() < top_n {
                // project the raw window needed at the observed survival
                // rate; double blindly while nothing has survived
                limit = if survivors.is_empty() {
                    limit * 2
                } else {
                    (limit * top_n).div_ceil(survivors.len())
                };
                debug!(limit, survivors = survivors.len(), "Widening search window");
            }
        }

        survivors.truncate(top_n);
        Ok(build_outcome(survivors, satisfied))
    }
}

fn l2_normalize(v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-10);
    v.into_iter().map(|x| x / norm).collect()
}

/// Derive citation keys and evidence text from the surviving hits.
fn build_outcome(results: Vec<ScoredPoint>, satisfied: bool) -> SearchOutcome {
    let mut citations = CitationMap::new();
    let mut abstracts_with_citations = Vec::with_capacity(results.len());

    for point in &results {
        let payload = &point.payload;
        let abstract_text = non_empty(&payload.abstract_text, "No abstract available");
        let title = non_empty(&payload.title, "Unknown Title");
        let pmid = non_empty(&payload.pmid, "No PMID");
        let year = non_empty(&payload.journal.pub_date.year, "Unknown Year");

        let author_names: Vec<String> = payload
            .authors
            .iter()
            .map(|a| format!("{} {}", a.fore_name, a.last_name).trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let key = citation_key(pmid, author_names.first().map(String::as_str), title, year);
        citations.insert(
            key.clone(),
            CitationEntry {
                title: title.to_string(),
                authors: if author_names.is_empty() {
                    "Unknown Authors".to_string()
                } else {
                    author_names.join(", ")
                },
                year: year.to_string(),
                pmid: pmid.to_string(),
            },
        );
        abstracts_with_citations.push(format!("{abstract_text} {key}"));
    }

    SearchOutcome {
        evidence: abstracts_with_citations.join(" "),
        citations,
        satisfied,
    }
}

fn non_empty<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
