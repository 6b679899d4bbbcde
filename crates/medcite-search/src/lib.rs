//! medcite-search — Query-time retrieval and answer synthesis.
//!
//! Per query: embed (L2-normalised) → adaptive similarity search →
//! citation-aware synthesis → grounding validation. Each stage blocks on
//! its external service; there is no fan-out.

pub mod answer;
pub mod citations;
pub mod searcher;

use serde::{Deserialize, Serialize};
use tracing::instrument;

pub use answer::{synthesize, NO_EVIDENCE_ANSWER};
pub use citations::{check_citations, CitationEntry, CitationMap};
pub use searcher::{SearchOutcome, Searcher};

use medcite_llm::CompletionBackend;

/// One answered query: the raw retrieval query, the evidence handed to
/// the model, the citation map behind it, and the synthesized answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub query: String,
    pub abstracts: String,
    pub citations: CitationMap,
    pub answer: String,
}

/// Full retrieval pipeline for one question. `database_query` drives the
/// vector search; `question` is what the model is asked.
#[instrument(skip(searcher, completion))]
pub async fn answer_question(
    searcher: &Searcher<'_>,
    completion: &dyn CompletionBackend,
    database_query: &str,
    question: &str,
    top_n: usize,
) -> anyhow::Result<AnswerRecord> {
    let query_vector = searcher.embed_query(database_query).await?;
    let outcome = searcher.retrieve(&query_vector, top_n).await?;
    let answer = synthesize(completion, &outcome.evidence, &outcome.citations, question, None).await?;
    Ok(AnswerRecord {
        query: database_query.to_string(),
        abstracts: outcome.evidence,
        citations: outcome.citations,
        answer,
    })
}
