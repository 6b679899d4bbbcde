//! Data model for extracted articles.

use medcite_index::schema::{ArticlePayload, AuthorName, JournalInfo};

/// One article that passed the inclusion rules, ready for embedding and
/// upsert. Never mutated after extraction; a later upsert with the same
/// PMID replaces the stored point wholesale.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub pmid: u64,
    pub pmid_version: String,
    /// Empty when the source carried no title; the retrieval side
    /// substitutes "Unknown Title" at citation time.
    pub title: String,
    /// Space-joined concatenation of all abstract segments, never empty.
    pub abstract_text: String,
    pub authors: Vec<AuthorName>,
    pub journal: JournalInfo,
    pub keywords: Vec<String>,
}

impl ArticleRecord {
    pub fn into_payload(self) -> ArticlePayload {
        ArticlePayload {
            pmid: self.pmid.to_string(),
            pmid_version: self.pmid_version,
            title: self.title,
            abstract_text: self.abstract_text,
            authors: self.authors,
            journal: self.journal,
            keywords: self.keywords,
            kind: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_keeps_integer_pmid_as_string() {
        let record = ArticleRecord {
            pmid: 98765,
            pmid_version: "1".to_string(),
            title: "T".to_string(),
            abstract_text: "A".to_string(),
            authors: vec![],
            journal: JournalInfo::default(),
            keywords: vec![],
        };
        let payload = record.into_payload();
        assert_eq!(payload.pmid, "98765");
        assert!(payload.kind.is_none());
    }
}
