//! # Parse Skill (OutlineParser)
//!
//! Turns a plain-text or markdown pitch outline into slides.
//!
//! Slides are separated by `---` lines. Without separators, each top-level
//! `# ` heading starts a new slide. Paragraphs (blank-line separated) become
//! text blocks; blocks that mention a concept keyword are also recorded as
//! concept elements.

use anyhow::bail;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::workflow::collaborators::{Document, DocumentParser, ParsedConcept, Slide};

/// Words that mark a block as describing the concept itself
pub const CONCEPT_KEYWORDS: &[&str] = &[
    "fabric",
    "material",
    "design",
    "collection",
    "style",
    "trend",
    "season",
    "color",
    "pattern",
    "fit",
    "size",
    "target audience",
    "market",
];

fn separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*-{3,}[ \t]*$").expect("valid separator regex"))
}

fn top_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^# ").expect("valid heading regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("valid paragraph regex"))
}

/// Whether a block mentions any concept keyword
pub fn is_concept_element(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONCEPT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineParser;

impl OutlineParser {
    pub fn new() -> Self {
        Self
    }

    /// Split the raw text into slide sections
    fn sections(content: &str) -> Vec<&str> {
        if separator().is_match(content) {
            return separator().split(content).collect();
        }

        let starts: Vec<usize> = top_heading().find_iter(content).map(|m| m.start()).collect();
        if starts.is_empty() {
            return vec![content];
        }

        let mut sections = Vec::with_capacity(starts.len() + 1);
        if starts[0] > 0 {
            sections.push(&content[..starts[0]]);
        }
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            sections.push(&content[start..end]);
        }
        sections
    }

    fn blocks(section: &str) -> Vec<String> {
        blank_lines()
            .split(section)
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Parse an outline; fails on empty documents
    pub fn parse_outline(document: &Document) -> anyhow::Result<ParsedConcept> {
        let content = document.content.replace("\r\n", "\n");
        if content.trim().is_empty() {
            bail!("Document '{}' is empty", document.name);
        }

        let slides: Vec<Slide> = Self::sections(&content)
            .into_iter()
            .map(Self::blocks)
            .filter(|texts| !texts.is_empty())
            .enumerate()
            .map(|(index, texts)| {
                let concept_elements = texts
                    .iter()
                    .filter(|text| is_concept_element(text))
                    .cloned()
                    .collect();
                Slide {
                    number: index + 1,
                    texts,
                    concept_elements,
                }
            })
            .collect();

        if slides.is_empty() {
            bail!("No text content found in '{}'", document.name);
        }

        tracing::debug!(
            document = %document.name,
            slides = slides.len(),
            "Parsed pitch outline"
        );
        Ok(ParsedConcept {
            document: document.name.clone(),
            slides,
        })
    }
}

#[async_trait]
impl DocumentParser for OutlineParser {
    async fn parse(&self, document: &Document) -> anyhow::Result<ParsedConcept> {
        Self::parse_outline(document)
    }
}
