//! Payload schema for points in the abstract collection.
//!
//! Field names on the wire keep the upstream PubMed casing (`ForeName`,
//! `PubDate`, …) so the collection stays readable by anything else that
//! already speaks that schema. Every field defaults on deserialization;
//! points written by other tooling may carry only a subset.

use serde::{Deserialize, Serialize};

/// Payload `type` value marking fine-grained sentence-level entries that
/// whole-abstract retrieval must skip.
pub const SENTENCE_EMBEDDING_TYPE: &str = "sentence_embedding";

/// Vector field name for a given embedding model: the model name with all
/// non-alphanumeric characters stripped, suffixed `_embedding`
/// (e.g. "bge-m3" → "bgem3_embedding"). Upsert and search must both call
/// this — the coupling between the two paths is exactly this function.
pub fn embedding_field_name(model: &str) -> String {
    let sanitized: String = model.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("{sanitized}_embedding")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticlePayload {
    #[serde(default)]
    pub pmid: String,
    #[serde(default)]
    pub pmid_version: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<AuthorName>,
    #[serde(default)]
    pub journal: JournalInfo,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Reserved marker field; see [`SENTENCE_EMBEDDING_TYPE`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ArticlePayload {
    pub fn is_sentence_embedding(&self) -> bool {
        self.kind.as_deref() == Some(SENTENCE_EMBEDDING_TYPE)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorName {
    #[serde(rename = "ForeName", default)]
    pub fore_name: String,
    #[serde(rename = "LastName", default)]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalInfo {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Volume", default)]
    pub volume: String,
    #[serde(rename = "PubDate", default)]
    pub pub_date: PubDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PubDate {
    #[serde(rename = "Year", default)]
    pub year: String,
    #[serde(rename = "Month", default)]
    pub month: String,
    #[serde(rename = "Day", default)]
    pub day: String,
}
