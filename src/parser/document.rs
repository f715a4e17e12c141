// Identity document: the HTML benefits statement carrying legal names + SSNs.
//
// Two statement layouts exist. Both repeat `td.NameHeader[colspan=3]` cells
// alternating name and SSN; they differ in where the company name sits.

use super::{SourceParser, SourceType};
use crate::error::{ReconcileError, Result};
use crate::matcher::RawNameEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const COMPANY_LABEL: &str = "Company:";
const EMPLOYER_LABEL: &str = "Employer's Name";

static NAME_BLOCK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"td.NameHeader[colspan="3"]"#).expect("name block selector is valid")
});

static COMPANY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Company:\s*([\w ]+)").expect("company pattern is valid"));

static SSN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SSN\s*:\s*").expect("ssn label pattern is valid"));

/// IdentityDocument - company name plus every name/SSN pair, in page order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocument {
    /// Company name with spaces replaced by '-', ready for file names
    pub company: String,
    pub entries: Vec<RawNameEntry>,
}

pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        DocumentParser
    }

    pub fn parse_html(&self, html: &str) -> Result<IdentityDocument> {
        let document = Html::parse_document(html);
        let company = extract_company(&document)?;
        let entries = extract_entries(&document);

        info!("Identity document for {}: {} name entries", company, entries.len());
        Ok(IdentityDocument { company, entries })
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for DocumentParser {
    type Output = IdentityDocument;

    fn parse(&self, file_path: &Path) -> Result<IdentityDocument> {
        let html = fs::read_to_string(file_path).map_err(|e| {
            ReconcileError::Document(format!("Failed to read {}: {}", file_path.display(), e))
        })?;
        self.parse_html(&html)
    }

    fn source_type(&self) -> SourceType {
        SourceType::IdentityDocument
    }
}

// ============================================================================
// COMPANY NAME
// ============================================================================

fn slug(company: &str) -> String {
    company.trim().replace(' ', "-")
}

/// Layout 1: a "Company: Acme Corp" text node.
/// Layout 2: an "Employer's Name" label followed by a `td` holding the name.
fn extract_company(document: &Html) -> Result<String> {
    let root = document.root_element();

    if let Some(text) = root.text().find(|t| t.contains(COMPANY_LABEL)) {
        let caps = COMPANY_PATTERN.captures(text).ok_or_else(|| {
            ReconcileError::Document(format!("unreadable company line '{}'", text.trim()))
        })?;
        return Ok(slug(&caps[1]));
    }

    let mut label_seen = false;
    for node in root.descendants() {
        if let Some(text) = node.value().as_text() {
            if text.contains(EMPLOYER_LABEL) {
                label_seen = true;
            }
            continue;
        }
        if !label_seen {
            continue;
        }
        if let Some(td) = ElementRef::wrap(node).filter(|e| e.value().name() == "td") {
            let name = td.text().map(str::trim).find(|t| !t.is_empty()).unwrap_or("");
            if !name.is_empty() {
                return Ok(slug(name));
            }
        }
    }

    Err(ReconcileError::Document(
        "no company name found in either statement layout".to_string(),
    ))
}

// ============================================================================
// NAME / SSN BLOCKS
// ============================================================================

/// Block text with each text piece trimmed, then tabs, newlines, NBSPs and the
/// "SSN :" label cleaned away.
pub fn clean_block_text(raw: &str) -> String {
    let cleaned = raw
        .replace(['\t', '\n'], "")
        .replace('\u{a0}', " ");
    SSN_LABEL.replace_all(&cleaned, "").trim().to_string()
}

fn block_text(element: ElementRef) -> String {
    let joined: String = element.text().map(str::trim).collect();
    clean_block_text(&joined)
}

/// Blocks alternate name, SSN, name, SSN...
fn extract_entries(document: &Html) -> Vec<RawNameEntry> {
    let blocks: Vec<String> = document.select(&NAME_BLOCK).map(block_text).collect();

    if blocks.len() % 2 != 0 {
        warn!(
            "Identity document has an odd number of name/SSN blocks ({}); last name has no SSN",
            blocks.len()
        );
    }

    blocks
        .chunks(2)
        .map(|pair| {
            let ssn = pair.get(1).cloned().unwrap_or_default();
            RawNameEntry::new(pair[0].clone(), ssn)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
