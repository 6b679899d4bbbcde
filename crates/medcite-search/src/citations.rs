//! Citation keys, the ordered citation map, reference rendering, and the
//! grounding validator.
//!
//! Two key formats travel through the whole system — prompt instruction,
//! evidence text, reference list, validator:
//!   `[PMID: <id>, <First> <Last> et al., <year>]`
//!   `[PMID: <id>, <title>, <year>]`   (when no author name is known)

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separates the answer body from the appended reference block.
pub const REFERENCES_MARKER: &str = "\nReferences:";

static PMID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PMID: (\d+)").expect("static regex must compile"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub title: String,
    /// Comma-joined author names, or "Unknown Authors".
    pub authors: String,
    pub year: String,
    pub pmid: String,
}

/// Citation map keyed by formatted citation key, preserving first-insert
/// (retrieval rank) order. Keys derive from unique PMIDs, so collisions
/// should not happen within one result set; when one does occur the later
/// entry overwrites the earlier in place — last write wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationMap {
    entries: Vec<(String, CitationEntry)>,
}

impl CitationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, entry: CitationEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = entry;
        } else {
            self.entries.push((key, entry));
        }
    }

    pub fn get(&self, key: &str) -> Option<&CitationEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CitationEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Every PMID backing an entry in this map.
    pub fn pmids(&self) -> BTreeSet<String> {
        self.entries.iter().map(|(_, e)| e.pmid.clone()).collect()
    }
}

// Serialized as a JSON object so saved answer batches keep the familiar
// `{ "<key>": {title, authors, year, pmid} }` shape.
impl Serialize for CitationMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CitationMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CitationMapVisitor;

        impl<'de> Visitor<'de> for CitationMapVisitor {
            type Value = CitationMap;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of citation keys to citation entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = CitationMap::new();
                while let Some((key, entry)) = access.next_entry::<String, CitationEntry>()? {
                    map.insert(key, entry);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(CitationMapVisitor)
    }
}

/// Format a citation key; falls back to the title form when no author
/// name is available.
pub fn citation_key(pmid: &str, first_author: Option<&str>, title: &str, year: &str) -> String {
    match first_author {
        Some(author) => format!("[PMID: {pmid}, {author} et al., {year}]"),
        None => format!("[PMID: {pmid}, {title}, {year}]"),
    }
}

/// Render the deterministic reference block appended to every answer.
pub fn reference_section(citations: &CitationMap) -> String {
    let lines: Vec<String> = citations
        .iter()
        .map(|(key, entry)| {
            format!("{key}: {} ({}), PMID: {}", entry.title, entry.year, entry.pmid)
        })
        .collect();
    format!("\n{REFERENCES_MARKER}\n{}", lines.join("\n"))
}

/// Post-hoc fabrication detector: every `PMID: <digits>` in the answer
/// body (reference block excluded) must exist in the citation map.
/// Returns `None` when fully grounded, else the unsupported PMIDs.
pub fn check_citations(answer: &str, citations: &CitationMap) -> Option<BTreeSet<String>> {
    let body = answer.split(REFERENCES_MARKER).next().unwrap_or(answer);

    let referenced: BTreeSet<String> = PMID_RE
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect();
    let known = citations.pmids();

    let fabricated: BTreeSet<String> = referenced.difference(&known).cloned().collect();
    if fabricated.is_empty() {
        None
    } else {
        Some(fabricated)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pmid: &str) -> CitationEntry {
        CitationEntry {
            title: format!("Title {pmid}"),
            authors: "Jane Smith".to_string(),
            year: "2020".to_string(),
            pmid: pmid.to_string(),
        }
    }

    #[test]
    fn test_citation_key_author_form() {
        assert_eq!(
            citation_key("12345", Some("Jane Smith"), "T", "2020"),
            "[PMID: 12345, Jane Smith et al., 2020]"
        );
    }

    #[test]
    fn test_citation_key_title_fallback() {
        assert_eq!(
            citation_key("12345", None, "Ibuprofen in infants", "2020"),
            "[PMID: 12345, Ibuprofen in infants, 2020]"
        );
    }

    #[test]
    fn test_map_preserves_insertion_order() {
        let mut map = CitationMap::new();
        map.insert("b".to_string(), entry("2"));
        map.insert("a".to_string(), entry("1"));
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_map_collision_is_last_write_wins_in_place() {
        let mut map = CitationMap::new();
        map.insert("k".to_string(), entry("1"));
        map.insert("other".to_string(), entry("2"));
        map.insert("k".to_string(), entry("3"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("k").unwrap().pmid, "3");
        // the colliding key keeps its original position
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["k", "other"]);
    }

    #[test]
    fn test_map_serializes_as_ordered_object() {
        let mut map = CitationMap::new();
        map.insert("[PMID: 1, A et al., 2020]".to_string(), entry("1"));
        map.insert("[PMID: 2, B et al., 2021]".to_string(), entry("2"));
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.starts_with(r#"{"[PMID: 1, A et al., 2020]""#));
        let back: CitationMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_reference_section_format() {
        let mut map = CitationMap::new();
        map.insert("[PMID: 12345, Jane Smith et al., 2020]".to_string(), entry("12345"));
        assert_eq!(
            reference_section(&map),
            "\n\nReferences:\n[PMID: 12345, Jane Smith et al., 2020]: Title 12345 (2020), PMID: 12345"
        );
    }

    #[test]
    fn test_grounded_answer_validates_clean() {
        let mut map = CitationMap::new();
        map.insert("[PMID: 12345, Smith et al., 2020]".to_string(), entry("12345"));
        let answer = "Drug X is safe [PMID: 12345].";
        assert!(check_citations(answer, &map).is_none());
    }

    #[test]
    fn test_fabricated_pmid_is_reported() {
        let mut map = CitationMap::new();
        map.insert("[PMID: 12345, Smith et al., 2020]".to_string(), entry("12345"));
        let answer = "Drug X is safe [PMID: 12345][PMID: 67890].";
        let fabricated = check_citations(answer, &map).expect("must flag 67890");
        assert_eq!(fabricated, BTreeSet::from(["67890".to_string()]));
    }

    #[test]
    fn test_reference_block_is_excluded_from_validation() {
        let map = CitationMap::new();
        // body cites nothing; the reference block mentions a PMID the
        // empty map cannot back, but it must not be scanned
        let answer = "No citations here.\n\nReferences:\n[PMID: 999, X et al., 2020]: X (2020), PMID: 999";
        assert!(check_citations(answer, &map).is_none());
    }

    #[test]
    fn test_fabrication_in_body_and_block_reported_once() {
        let mut map = CitationMap::new();
        map.insert("[PMID: 1, A et al., 2020]".to_string(), entry("1"));
        let answer = "See [PMID: 999999] and [PMID: 1].\n\nReferences:\n[PMID: 1, A et al., 2020]: T (2020), PMID: 1";
        assert_eq!(
            check_citations(answer, &map),
            Some(BTreeSet::from(["999999".to_string()]))
        );
    }
}
