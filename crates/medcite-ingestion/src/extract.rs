//! Streaming extraction of article records from a baseline document.
//!
//! `ArticleStream` walks the XML event-by-event and yields one
//! `ArticleRecord` per acceptable `<MedlineCitation>`. Single pass, no
//! whole-corpus buffering: the pipeline embeds and upserts each record
//! before the next one is parsed.
//!
//! Inclusion rules, applied in order:
//!   1. a PMID must sit directly under MedlineCitation
//!   2. no CommentsCorrections record may mark the article retracted
//!   3. the concatenated abstract must be non-empty
//! Everything else defaults to empty rather than failing.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{info, warn};

use medcite_index::schema::{AuthorName, JournalInfo, PubDate};

use crate::models::ArticleRecord;

const RETRACTION_REF_TYPES: [&str; 2] = ["Retraction of", "Retraction in"];

pub struct ArticleStream<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
    /// Open-element stack; parent/child checks run against this.
    path: Vec<String>,
    pending: Option<PendingArticle>,
    skipped: usize,
    finished: bool,
}

#[derive(Default)]
struct PendingArticle {
    pmid_text: String,
    pmid_version: String,
    title: String,
    abstract_segments: Vec<String>,
    authors: Vec<AuthorName>,
    journal_title: String,
    journal_volume: String,
    pub_year: String,
    pub_month: String,
    pub_day: String,
    keywords: Vec<String>,
    retracted: bool,
}

impl<'a> ArticleStream<'a> {
    pub fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            path: Vec::new(),
            pending: None,
            skipped: 0,
            finished: false,
        }
    }

    /// Records dropped so far by the inclusion rules.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn current(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    fn parent(&self) -> &str {
        self.path
            .len()
            .checked_sub(2)
            .map(|i| self.path[i].as_str())
            .unwrap_or("")
    }

    fn in_scope(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    fn start_element(&mut self, name: String, version: Option<String>, ref_type: Option<String>) {
        let current = name.clone();
        self.path.push(name);
        let parent = self.parent().to_string();
        match current.as_str() {
            "MedlineCitation" => self.pending = Some(PendingArticle::default()),
            "PMID" if parent == "MedlineCitation" => {
                if let (Some(pending), Some(version)) = (self.pending.as_mut(), version) {
                    pending.pmid_version = version;
                }
            }
            "CommentsCorrections" => self.mark_if_retracted(ref_type),
            "AbstractText" if parent == "Abstract" => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.abstract_segments.push(String::new());
                }
            }
            "Author" if parent == "AuthorList" => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.authors.push(AuthorName::default());
                }
            }
            "Keyword" if parent == "KeywordList" => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.keywords.push(String::new());
                }
            }
            _ => {}
        }
    }

    fn mark_if_retracted(&mut self, ref_type: Option<String>) {
        let Some(pending) = self.pending.as_mut() else { return };
        if let Some(ref_type) = ref_type {
            if RETRACTION_REF_TYPES.contains(&ref_type.as_str()) {
                pending.retracted = true;
            }
        }
    }

    fn text(&mut self, text: &str) {
        // resolve the path context before borrowing the pending record
        let current = self.current().to_string();
        let parent = self.parent().to_string();
        let in_journal = self.in_scope("Journal");
        let Some(pending) = self.pending.as_mut() else { return };

        match (current.as_str(), parent.as_str()) {
            ("PMID", "MedlineCitation") => pending.pmid_text.push_str(text),
            ("ArticleTitle", _) => pending.title.push_str(text),
            ("AbstractText", "Abstract") => {
                if let Some(segment) = pending.abstract_segments.last_mut() {
                    segment.push_str(text);
                }
            }
            ("LastName", "Author") => {
                if let Some(author) = pending.authors.last_mut() {
                    author.last_name.push_str(text);
                }
            }
            ("ForeName", "Author") => {
                if let Some(author) = pending.authors.last_mut() {
                    author.fore_name.push_str(text);
                }
            }
            ("Title", "Journal") => pending.journal_title.push_str(text),
            ("Volume", "JournalIssue") => pending.journal_volume.push_str(text),
            ("Year", "PubDate") if in_journal => pending.pub_year.push_str(text),
            ("Month", "PubDate") if in_journal => pending.pub_month.push_str(text),
            ("Day", "PubDate") if in_journal => pending.pub_day.push_str(text),
            ("Keyword", "KeywordList") => {
                if let Some(keyword) = pending.keywords.last_mut() {
                    keyword.push_str(text);
                }
            }
            _ => {}
        }
    }

    fn end_element(&mut self) -> Option<ArticleRecord> {
        let name = self.path.pop()?;
        if name == "MedlineCitation" {
            return self.finalize();
        }
        None
    }

    /// Apply the inclusion rules and build the record.
    fn finalize(&mut self) -> Option<ArticleRecord> {
        let pending = self.pending.take()?;

        let pmid_text = pending.pmid_text.trim();
        let Ok(pmid) = pmid_text.parse::<u64>() else {
            self.skipped += 1;
            warn!(pmid = %pmid_text, "Skipped article: missing or malformed PMID");
            return None;
        };

        if pending.retracted {
            self.skipped += 1;
            info!(pmid, "Skipped article: retracted");
            return None;
        }

        let segments: Vec<&str> = pending
            .abstract_segments
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            self.skipped += 1;
            info!(pmid, "Skipped article: no abstract");
            return None;
        }

        Some(ArticleRecord {
            pmid,
            pmid_version: pending.pmid_version,
            title: pending.title,
            abstract_text: segments.join(" "),
            authors: pending.authors,
            journal: JournalInfo {
                title: pending.journal_title,
                volume: pending.journal_volume,
                pub_date: PubDate {
                    year: pending.pub_year,
                    month: pending.pub_month,
                    day: pending.pub_day,
                },
            },
            keywords: pending.keywords.into_iter().filter(|k| !k.is_empty()).collect(),
        })
    }
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attr_value(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

impl Iterator for ArticleStream<'_> {
    type Item = ArticleRecord;

    fn next(&mut self) -> Option<ArticleRecord> {
        if self.finished {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => {
                    let name = element_name(&e);
                    let version = (name == "PMID")
                        .then(|| attr_value(&e, "Version"))
                        .flatten();
                    let ref_type = (name == "CommentsCorrections")
                        .then(|| attr_value(&e, "RefType"))
                        .flatten();
                    self.start_element(name, version, ref_type);
                }
                Ok(Event::Empty(e)) => {
                    if element_name(&e) == "CommentsCorrections" {
                        let ref_type = attr_value(&e, "RefType");
                        self.mark_if_retracted(ref_type);
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    self.text(&text);
                }
                Ok(Event::End(_)) => {
                    if let Some(record) = self.end_element() {
                        return Some(record);
                    }
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    warn!("XML parse error: {e}; extraction stopped");
                    self.finished = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn article(pmid: &str, extra: &str, abstract_xml: &str) -> String {
        format!(
            r#"<MedlineCitation>
                 <PMID Version="1">{pmid}</PMID>
                 <Article>
                   <ArticleTitle>Ibuprofen in febrile infants</ArticleTitle>
                   {abstract_xml}
                   <AuthorList>
                     <Author><LastName>Smith</LastName><ForeName>Jane</ForeName></Author>
                     <Author><LastName>Doe</LastName><ForeName>John</ForeName></Author>
                   </AuthorList>
                   <Journal>
                     <Title>Pediatrics</Title>
                     <JournalIssue>
                       <Volume>12</Volume>
                       <PubDate><Year>2020</Year><Month>Jun</Month></PubDate>
                     </JournalIssue>
                   </Journal>
                 </Article>
                 {extra}
                 <KeywordList><Keyword>fever</Keyword><Keyword>infant</Keyword></KeywordList>
               </MedlineCitation>"#
        )
    }

    fn wrap(citations: &str) -> String {
        format!(r#"<?xml version="1.0"?><PubmedArticleSet>{citations}</PubmedArticleSet>"#)
    }

    const ABSTRACT: &str =
        "<Abstract><AbstractText>Well tolerated.</AbstractText><AbstractText>No adverse events.</AbstractText></Abstract>";

    #[test]
    fn test_extracts_full_record() {
        let xml = wrap(&article("12345", "", ABSTRACT));
        let mut stream = ArticleStream::new(&xml);
        let record = stream.next().expect("one record");

        assert_eq!(record.pmid, 12345);
        assert_eq!(record.pmid_version, "1");
        assert_eq!(record.title, "Ibuprofen in febrile infants");
        assert_eq!(record.abstract_text, "Well tolerated. No adverse events.");
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.authors[0].last_name, "Smith");
        assert_eq!(record.authors[0].fore_name, "Jane");
        assert_eq!(record.journal.title, "Pediatrics");
        assert_eq!(record.journal.volume, "12");
        assert_eq!(record.journal.pub_date.year, "2020");
        assert_eq!(record.journal.pub_date.month, "Jun");
        assert_eq!(record.keywords, vec!["fever", "infant"]);
        assert!(stream.next().is_none());
        assert_eq!(stream.skipped(), 0);
    }

    #[test]
    fn test_skips_article_without_pmid() {
        let xml = wrap(
            r#"<MedlineCitation>
                 <Article><Abstract><AbstractText>Text.</AbstractText></Abstract></Article>
               </MedlineCitation>"#,
        );
        let mut stream = ArticleStream::new(&xml);
        assert!(stream.next().is_none());
        assert_eq!(stream.skipped(), 1);
    }

    #[test]
    fn test_skips_retracted_article() {
        for ref_type in ["Retraction of", "Retraction in"] {
            let extra = format!(
                r#"<CommentsCorrectionsList>
                     <CommentsCorrections RefType="{ref_type}"><PMID Version="1">999</PMID></CommentsCorrections>
                   </CommentsCorrectionsList>"#
            );
            let xml = wrap(&article("12345", &extra, ABSTRACT));
            let mut stream = ArticleStream::new(&xml);
            assert!(stream.next().is_none(), "RefType {ref_type} must drop the article");
            assert_eq!(stream.skipped(), 1);
        }
    }

    #[test]
    fn test_non_retraction_comment_is_kept() {
        let extra = r#"<CommentsCorrectionsList>
                         <CommentsCorrections RefType="Comment on"><PMID Version="1">999</PMID></CommentsCorrections>
                       </CommentsCorrectionsList>"#;
        let xml = wrap(&article("12345", extra, ABSTRACT));
        let mut stream = ArticleStream::new(&xml);
        let record = stream.next().expect("kept");
        // the nested PMID inside CommentsCorrections must not leak in
        assert_eq!(record.pmid, 12345);
    }

    #[test]
    fn test_skips_article_with_empty_abstract() {
        let xml = wrap(&article("12345", "", "<Abstract></Abstract>"));
        let mut stream = ArticleStream::new(&xml);
        assert!(stream.next().is_none());
        assert_eq!(stream.skipped(), 1);
    }

    #[test]
    fn test_missing_optional_fields_default_to_empty() {
        let xml = wrap(
            r#"<MedlineCitation>
                 <PMID>777</PMID>
                 <Article><Abstract><AbstractText>Only an abstract.</AbstractText></Abstract></Article>
               </MedlineCitation>"#,
        );
        let mut stream = ArticleStream::new(&xml);
        let record = stream.next().expect("kept");
        assert_eq!(record.pmid, 777);
        assert_eq!(record.pmid_version, "");
        assert_eq!(record.title, "");
        assert!(record.authors.is_empty());
        assert_eq!(record.journal.pub_date.year, "");
        assert!(record.keywords.is_empty());
    }

    #[test]
    fn test_streams_multiple_records_in_document_order() {
        let xml = wrap(&format!(
            "{}{}{}",
            article("1", "", ABSTRACT),
            article("2", "", "<Abstract></Abstract>"),
            article("3", "", ABSTRACT),
        ));
        let mut stream = ArticleStream::new(&xml);
        let pmids: Vec<u64> = stream.by_ref().map(|r| r.pmid).collect();
        assert_eq!(pmids, vec![1, 3]);
        assert_eq!(stream.skipped(), 1);
    }

    #[test]
    fn test_other_abstract_sections_are_ignored() {
        let xml = wrap(&article(
            "12345",
            "",
            "<Abstract><AbstractText>Real.</AbstractText></Abstract>\
             <OtherAbstract><AbstractText>Translated.</AbstractText></OtherAbstract>",
        ));
        let mut stream = ArticleStream::new(&xml);
        let record = stream.next().expect("kept");
        assert_eq!(record.abstract_text, "Real.");
    }
}
