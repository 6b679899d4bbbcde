//! Citation-aware answer synthesis.
//!
//! Three-message exchange: a fixed system instruction mandating the two
//! in-text citation formats, the user's question, and the retrieved
//! evidence presented as prior assistant context. Deterministic
//! (zero-temperature) completion; the reference block is rendered from
//! the citation map, never from the model's own output, so the reference
//! list is accurate regardless of what the model wrote in-line. In-line
//! citations are only constrained by the prompt — the validator in
//! `citations` closes that gap after the fact.

use tracing::info;

use medcite_llm::{CompletionBackend, CompletionRequest, LlmError, Message};

use crate::citations::{reference_section, CitationMap};

pub const CITATION_SYSTEM_PROMPT: &str = "You are a knowledgeable assistant who provides \
information based on scientific abstracts. When referencing sources, include in-text \
citations using the format [PMID: PMID, Author et al., Year] or [PMID: PMID, Title, Year] \
if the author is unknown.";

/// Returned verbatim when retrieval produced no evidence; carries no
/// reference block.
pub const NO_EVIDENCE_ANSWER: &str =
    "I'm sorry, but I couldn't find a relevant abstract for your question.";

pub async fn synthesize(
    completion: &dyn CompletionBackend,
    evidence: &str,
    citations: &CitationMap,
    question: &str,
    model: Option<String>,
) -> Result<String, LlmError> {
    if evidence.is_empty() {
        return Ok(NO_EVIDENCE_ANSWER.to_string());
    }

    info!("Generating answer with citations");
    let request = CompletionRequest {
        messages: vec![
            Message::system(CITATION_SYSTEM_PROMPT),
            Message::user(question),
            Message::assistant(evidence),
        ],
        model,
        temperature: Some(0.0),
    };
    let response = completion.complete(request).await?;

    Ok(response.content + &reference_section(citations))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citations::CitationEntry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use medcite_llm::CompletionResponse;

    struct FakeCompletion {
        reply: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeCompletion {
        fn new(reply: &str) -> Self {
            Self { reply: reply.to_string(), requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl CompletionBackend for FakeCompletion {
        async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(req);
            Ok(CompletionResponse {
                content: self.reply.clone(),
                model: "fake".to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            })
        }

        fn model_id(&self) -> &str {
            "fake"
        }
    }

    fn one_citation() -> CitationMap {
        let mut map = CitationMap::new();
        map.insert(
            "[PMID: 12345, Jane Smith et al., 2020]".to_string(),
            CitationEntry {
                title: "Ibuprofen in infants".to_string(),
                authors: "Jane Smith".to_string(),
                year: "2020".to_string(),
                pmid: "12345".to_string(),
            },
        );
        map
    }

    #[tokio::test]
    async fn test_empty_evidence_short_circuits_without_model_call() {
        let backend = FakeCompletion::new("should not appear");
        let answer = synthesize(&backend, "", &CitationMap::new(), "Is drug X safe?", None)
            .await
            .unwrap();
        assert_eq!(answer, NO_EVIDENCE_ANSWER);
        assert!(!answer.contains("References:"));
        assert!(backend.requests.lock().unwrap().is_empty(), "backend must not be called");
    }

    #[tokio::test]
    async fn test_reference_block_appended_from_citation_map() {
        let backend = FakeCompletion::new("Drug X is safe [PMID: 12345].");
        let answer = synthesize(
            &backend,
            "Well tolerated. [PMID: 12345, Jane Smith et al., 2020]",
            &one_citation(),
            "Is drug X safe?",
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            answer,
            "Drug X is safe [PMID: 12345].\n\nReferences:\n\
             [PMID: 12345, Jane Smith et al., 2020]: Ibuprofen in infants (2020), PMID: 12345"
        );
    }

    #[tokio::test]
    async fn test_exchange_shape_and_determinism() {
        let backend = FakeCompletion::new("ok");
        synthesize(&backend, "evidence text", &one_citation(), "question?", None)
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        let req = &requests[0];
        assert_eq!(req.temperature, Some(0.0));
        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[0].content, CITATION_SYSTEM_PROMPT);
        assert_eq!(req.messages[1].role, "user");
        assert_eq!(req.messages[1].content, "question?");
        assert_eq!(req.messages[2].role, "assistant");
        assert_eq!(req.messages[2].content, "evidence text");
    }
}
