//! End-to-end retrieval flow against in-memory fakes: embed → adaptive
//! search → synthesis → citation validation.

use std::collections::BTreeSet;

use async_trait::async_trait;

use medcite_index::schema::{ArticlePayload, AuthorName, JournalInfo, PubDate};
use medcite_index::{IndexError, ScoredPoint, VectorSearch};
use medcite_llm::{
    CompletionBackend, CompletionRequest, CompletionResponse, EmbeddingBackend, LlmError,
};
use medcite_search::{answer_question, check_citations, Searcher, NO_EVIDENCE_ANSWER};

struct FakeIndex {
    points: Vec<ScoredPoint>,
}

#[async_trait]
impl VectorSearch for FakeIndex {
    async fn search_points(
        &self,
        _vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        Ok(self.points.iter().take(limit).cloned().collect())
    }
}

struct FakeEmbedder;

#[async_trait]
impl EmbeddingBackend for FakeEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(vec![1.0, 0.0])
    }
    fn model_name(&self) -> &str {
        "bge-m3"
    }
}

/// Completion that cites one retrieved PMID and fabricates another.
struct SloppyCompletion;

#[async_trait]
impl CompletionBackend for SloppyCompletion {
    async fn complete(&self, _req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: "Drug X is safe [PMID: 10][PMID: 999999].".to_string(),
            model: "fake".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }
    fn model_id(&self) -> &str {
        "fake"
    }
}

fn abstract_point(pmid: u64) -> ScoredPoint {
    ScoredPoint {
        id: pmid,
        score: 1.0,
        payload: ArticlePayload {
            pmid: pmid.to_string(),
            title: format!("Study {pmid}"),
            abstract_text: format!("Abstract {pmid}."),
            authors: vec![AuthorName {
                fore_name: "Jane".to_string(),
                last_name: "Smith".to_string(),
            }],
            journal: JournalInfo {
                pub_date: PubDate { year: "2020".to_string(), ..Default::default() },
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_fabricated_citation_is_caught_after_synthesis() {
    let index = FakeIndex { points: vec![abstract_point(10), abstract_point(20)] };
    let searcher = Searcher::new(&index, &FakeEmbedder, 12);

    let record = answer_question(&searcher, &SloppyCompletion, "drug x in children", "Is drug X safe?", 2)
        .await
        .unwrap();

    assert_eq!(record.citations.len(), 2);
    assert!(record.answer.contains("\nReferences:\n"));
    // the reference block lists exactly the retrieved evidence
    assert!(record.answer.contains("[PMID: 10, Jane Smith et al., 2020]: Study 10 (2020), PMID: 10"));

    // PMID 10 is grounded, 999999 is fabricated
    let fabricated = check_citations(&record.answer, &record.citations).expect("must flag");
    assert_eq!(fabricated, BTreeSet::from(["999999".to_string()]));
}

#[tokio::test]
async fn test_empty_index_yields_sentinel_answer() {
    let index = FakeIndex { points: vec![] };
    let searcher = Searcher::new(&index, &FakeEmbedder, 12);

    let record = answer_question(&searcher, &SloppyCompletion, "anything", "anything", 5)
        .await
        .unwrap();

    assert_eq!(record.answer, NO_EVIDENCE_ANSWER);
    assert!(record.citations.is_empty());
    assert!(check_citations(&record.answer, &record.citations).is_none());
}
