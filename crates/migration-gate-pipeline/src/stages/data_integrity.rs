// crates/migration-gate-pipeline/src/stages/data_integrity.rs
// ============================================================================
// Module: Data Integrity Stage
// Description: Structured and textual content extraction and comparison:
// visible text, headings, paragraphs, anchors, tables, pricing, JSON-LD.
// Purpose: Catch content regressions a visual or functional diff would miss.
// Dependencies: migration-gate-core, scraper, regex
// ============================================================================

//! ## Overview
//! Every extractor works from a parsed DOM, not a live page, so this stage
//! is pure with respect to its inputs and fully unit-testable. The pricing
//! selector set is a small, hard-coded list (`.price`, `[class*=price]`,
//! `[data-price]`), per the decided open question; it is not a configurable
//! surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use migration_gate_core::DataIntegritySummary;
use regex::Regex;
use scraper::ElementRef;
use scraper::Html;
use scraper::Selector;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Extracted Page Content
// ============================================================================

/// A heading with its level and trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    /// Heading level, 1 through 6.
    pub level: u8,
    /// Trimmed heading text.
    pub text: String,
}

/// An anchor's visible text and href.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorContent {
    /// Trimmed visible text.
    pub text: String,
    /// Raw href attribute value.
    pub href: String,
}

/// A table's header row and body rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableContent {
    /// Header cell text, from the first `thead tr` or the first row.
    pub headers: Vec<String>,
    /// Body rows as 2-D arrays of trimmed cell text.
    pub rows: Vec<Vec<String>>,
}

/// A pricing element's parsed amount and currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingContent {
    /// Raw matched text.
    pub raw_text: String,
    /// Parsed numeric amount, when the regex matched one.
    pub amount: Option<f64>,
    /// Parsed currency symbol or code, when present.
    pub currency: Option<String>,
}

/// Page-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// `<title>` text.
    pub title: String,
    /// `<meta name="description">` content.
    pub description: Option<String>,
    /// `<meta name="keywords">` content.
    pub keywords: Option<String>,
}

/// Everything extracted from one page's DOM for comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    /// Visible text, scripts and hidden nodes excluded.
    pub visible_text: String,
    /// Headings in document order.
    pub headings: Vec<Heading>,
    /// Paragraph text in document order.
    pub paragraphs: Vec<String>,
    /// Anchors in document order.
    pub anchors: Vec<AnchorContent>,
    /// Tables in document order.
    pub tables: Vec<TableContent>,
    /// Pricing elements in document order.
    pub pricing: Vec<PricingContent>,
    /// Parsed `application/ld+json` payloads.
    pub structured_json: Vec<serde_json::Value>,
    /// Page-level metadata.
    pub metadata: PageMetadata,
}

const PRICING_SELECTORS: &str = ".price, [class*=price], [data-price]";

fn cell_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn parse_price(text: &str) -> (Option<f64>, Option<String>) {
    let Ok(re) = Regex::new(r"([€$£¥]|USD|EUR|GBP)?\s*([0-9][0-9,]*\.?[0-9]*)") else {
        return (None, None);
    };
    let Some(caps) = re.captures(text) else {
        return (None, None);
    };
    let currency = caps.get(1).map(|m| m.as_str().to_string());
    let amount = caps
        .get(2)
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok());
    (amount, currency)
}

/// Extracts everything the data integrity stage compares from a parsed
/// document.
#[must_use]
pub fn extract_content(html: &str, visible_text: &str) -> ExtractedContent {
    let document = Html::parse_document(html);

    let mut headings = Vec::new();
    for level in 1..=6u8 {
        let Ok(selector) = Selector::parse(&format!("h{level}")) else {
            continue;
        };
        for el in document.select(&selector) {
            headings.push(Heading {
                level,
                text: cell_text(el),
            });
        }
    }

    let paragraphs = Selector::parse("p")
        .map(|selector| document.select(&selector).map(cell_text).collect())
        .unwrap_or_default();

    let anchors = Selector::parse("a[href]")
        .map(|selector| {
            document
                .select(&selector)
                .map(|el| AnchorContent {
                    text: cell_text(el),
                    href: el.value().attr("href").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let tables = Selector::parse("table")
        .map(|table_selector| document.select(&table_selector).map(extract_table).collect())
        .unwrap_or_default();

    let pricing = Selector::parse(PRICING_SELECTORS)
        .map(|selector| {
            document
                .select(&selector)
                .map(|el| {
                    let raw_text = cell_text(el);
                    let (amount, currency) = parse_price(&raw_text);
                    PricingContent {
                        raw_text,
                        amount,
                        currency,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let structured_json = Selector::parse(r#"script[type="application/ld+json"]"#)
        .map(|selector| {
            document
                .select(&selector)
                .filter_map(|el| serde_json::from_str(&el.text().collect::<String>()).ok())
                .collect()
        })
        .unwrap_or_default();

    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(cell_text)
        .unwrap_or_default();
    let description = meta_content(&document, "description");
    let keywords = meta_content(&document, "keywords");

    ExtractedContent {
        visible_text: visible_text.to_string(),
        headings,
        paragraphs,
        anchors,
        tables,
        pricing,
        structured_json,
        metadata: PageMetadata {
            title,
            description,
            keywords,
        },
    }
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

fn extract_table(table: ElementRef) -> TableContent {
    let header_row_selector = Selector::parse("thead tr").ok();
    let row_selector = Selector::parse("tr").ok();
    let cell_selector = Selector::parse("th, td").ok();

    let headers = header_row_selector
        .as_ref()
        .and_then(|selector| table.select(selector).next())
        .or_else(|| row_selector.as_ref().and_then(|selector| table.select(selector).next()))
        .map(|row| {
            cell_selector
                .as_ref()
                .map(|selector| row.select(selector).map(cell_text).collect())
                .unwrap_or_default()
        })
        .unwrap_or_default();

    let mut rows = Vec::new();
    if let Some(row_selector) = &row_selector {
        for (index, row) in table.select(row_selector).enumerate() {
            if index == 0 && header_row_selector.is_none() {
                continue;
            }
            let has_header_parent = row.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| el.name() == "thead")
            });
            if has_header_parent {
                continue;
            }
            if let Some(cell_selector) = &cell_selector {
                rows.push(row.select(cell_selector).map(cell_text).collect());
            }
        }
    }

    TableContent { headers, rows }
}

// ============================================================================
// SECTION: Text Comparison
// ============================================================================

fn tokenize(text: &str) -> HashSet<String> {
    text.to_ascii_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over tokenized lowercase word sets, plus the raw
/// added/removed token sets.
#[must_use]
pub fn text_similarity(baseline: &str, candidate: &str) -> (f64, Vec<String>, Vec<String>) {
    let baseline_tokens = tokenize(baseline);
    let candidate_tokens = tokenize(candidate);
    let intersection = baseline_tokens.intersection(&candidate_tokens).count();
    let union = baseline_tokens.union(&candidate_tokens).count();
    let similarity = if union == 0 { 1.0 } else { intersection as f64 / union as f64 };

    let added: Vec<String> = candidate_tokens.difference(&baseline_tokens).cloned().collect();
    let removed: Vec<String> = baseline_tokens.difference(&candidate_tokens).cloned().collect();
    (similarity, added, removed)
}

// ============================================================================
// SECTION: Table Comparison
// ============================================================================

/// Per-cell comparison status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    /// Both sides agree.
    Match,
    /// Both sides present but differ.
    Mismatch,
    /// Cell missing on the baseline side.
    MissingBaseline,
    /// Cell missing on the candidate side.
    MissingCandidate,
    /// Cell present on both sides with a changed value (alias of mismatch,
    /// kept distinct for table-specific reporting).
    Changed,
}

/// Compares two tables positionally; size mismatches are flagged at the
/// header level by returning a non-empty `header_mismatch` rather than a
/// per-cell status.
#[must_use]
pub fn compare_tables(baseline: &TableContent, candidate: &TableContent) -> (bool, Vec<CellStatus>) {
    let header_mismatch = baseline.headers != candidate.headers;

    let rows = baseline.rows.len().max(candidate.rows.len());
    let mut statuses = Vec::new();
    for row_index in 0..rows {
        let baseline_row = baseline.rows.get(row_index);
        let candidate_row = candidate.rows.get(row_index);
        let cols = baseline_row
            .map(Vec::len)
            .unwrap_or(0)
            .max(candidate_row.map(Vec::len).unwrap_or(0));
        for col_index in 0..cols {
            let baseline_cell = baseline_row.and_then(|row| row.get(col_index));
            let candidate_cell = candidate_row.and_then(|row| row.get(col_index));
            let status = match (baseline_cell, candidate_cell) {
                (Some(b), Some(c)) if b == c => CellStatus::Match,
                (Some(_), Some(_)) => CellStatus::Mismatch,
                (None, Some(_)) => CellStatus::MissingBaseline,
                (Some(_), None) => CellStatus::MissingCandidate,
                (None, None) => CellStatus::Match,
            };
            statuses.push(status);
        }
    }
    (header_mismatch, statuses)
}

// ============================================================================
// SECTION: JSON Comparison
// ============================================================================

/// One JSON-path-level diff entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonDiffEntry {
    /// Dot-separated path to the differing value.
    pub path: String,
    /// Classification of the difference.
    pub status: CellStatus,
}

/// Recursively diffs two JSON values, reporting keys present on only one
/// side as missing, type mismatches as `Mismatch`, and differing primitive
/// values as `Changed`.
#[must_use]
pub fn diff_json(baseline: &serde_json::Value, candidate: &serde_json::Value, path: &str) -> Vec<JsonDiffEntry> {
    use serde_json::Value;
    let mut entries = Vec::new();

    match (baseline, candidate) {
        (Value::Object(b), Value::Object(c)) => {
            for key in b.keys() {
                let child_path = format!("{path}.{key}");
                match c.get(key) {
                    Some(candidate_value) => {
                        entries.extend(diff_json(&b[key], candidate_value, &child_path));
                    }
                    None => entries.push(JsonDiffEntry {
                        path: child_path,
                        status: CellStatus::MissingCandidate,
                    }),
                }
            }
            for key in c.keys() {
                if !b.contains_key(key) {
                    entries.push(JsonDiffEntry {
                        path: format!("{path}.{key}"),
                        status: CellStatus::MissingBaseline,
                    });
                }
            }
        }
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            if std::mem::discriminant(baseline) != std::mem::discriminant(candidate) {
                entries.push(JsonDiffEntry {
                    path: path.to_string(),
                    status: CellStatus::Mismatch,
                });
            } else if baseline != candidate {
                entries.push(JsonDiffEntry {
                    path: path.to_string(),
                    status: CellStatus::Changed,
                });
            }
        }
        _ => {
            if std::mem::discriminant(baseline) != std::mem::discriminant(candidate) {
                entries.push(JsonDiffEntry {
                    path: path.to_string(),
                    status: CellStatus::Mismatch,
                });
            } else if baseline != candidate {
                entries.push(JsonDiffEntry {
                    path: path.to_string(),
                    status: CellStatus::Changed,
                });
            }
        }
    }
    entries
}

// ============================================================================
// SECTION: Page-Level Status
// ============================================================================

/// Overall comparison status for one matched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDataStatus {
    /// Text similarity over 0.9 and no structured diffs.
    Match,
    /// Text similarity over 0.5 and no table/pricing diffs.
    Partial,
    /// Neither condition holds.
    Mismatch,
}

/// Classifies a page's overall data-integrity status per the documented
/// thresholds.
#[must_use]
pub fn classify_page_status(text_similarity: f64, has_structured_diffs: bool) -> PageDataStatus {
    if text_similarity > 0.9 && !has_structured_diffs {
        PageDataStatus::Match
    } else if text_similarity > 0.5 && !has_structured_diffs {
        PageDataStatus::Partial
    } else {
        PageDataStatus::Mismatch
    }
}

/// Builds the per-run summary from per-page classifications and diff
/// counts.
#[must_use]
pub fn summarize(
    statuses: &[PageDataStatus],
    missing_data_pages: u32,
    total_field_diffs: u32,
    critical_mismatches: u32,
) -> DataIntegritySummary {
    let pages_with_mismatches = statuses
        .iter()
        .filter(|status| matches!(status, PageDataStatus::Mismatch))
        .count() as u32;
    DataIntegritySummary {
        pages_with_mismatches,
        missing_data_pages,
        total_field_diffs,
        critical_mismatches,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one_and_no_token_diffs() {
        let (similarity, added, removed) = text_similarity("Hello world", "hello   World");
        assert_eq!(similarity, 1.0);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn disjoint_text_has_zero_similarity() {
        let (similarity, added, removed) = text_similarity("alpha beta", "gamma delta");
        assert_eq!(similarity, 0.0);
        assert_eq!(added.len(), 2);
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn table_comparison_flags_header_mismatch_and_cell_statuses() {
        let baseline = TableContent {
            headers: vec!["Name".into(), "Price".into()],
            rows: vec![vec!["Widget".into(), "9.99".into()]],
        };
        let candidate = TableContent {
            headers: vec!["Name".into()],
            rows: vec![vec!["Widget".into()]],
        };
        let (header_mismatch, statuses) = compare_tables(&baseline, &candidate);
        assert!(header_mismatch);
        assert_eq!(statuses[0], CellStatus::Match);
        assert_eq!(statuses[1], CellStatus::MissingCandidate);
    }

    #[test]
    fn json_diff_reports_missing_and_changed_keys() {
        let baseline = serde_json::json!({"a": 1, "b": 2});
        let candidate = serde_json::json!({"a": 1, "b": 3, "c": 4});
        let entries = diff_json(&baseline, &candidate, "$");
        assert!(entries.iter().any(|e| e.path == "$.b" && e.status == CellStatus::Changed));
        assert!(entries.iter().any(|e| e.path == "$.c" && e.status == CellStatus::MissingBaseline));
    }

    #[test]
    fn page_status_thresholds_match_the_documented_rule() {
        assert_eq!(classify_page_status(0.95, false), PageDataStatus::Match);
        assert_eq!(classify_page_status(0.6, false), PageDataStatus::Partial);
        assert_eq!(classify_page_status(0.95, true), PageDataStatus::Mismatch);
        assert_eq!(classify_page_status(0.2, false), PageDataStatus::Mismatch);
    }

    #[test]
    fn pricing_regex_extracts_amount_and_currency() {
        let (amount, currency) = parse_price("$1,299.99");
        assert_eq!(amount, Some(1299.99));
        assert_eq!(currency.as_deref(), Some("$"));
    }

    #[test]
    fn extract_content_pulls_headings_and_metadata() {
        let html = r#"<html><head><title>Home</title>
            <meta name="description" content="A page"></head>
            <body><h1>Welcome</h1><p>Hi</p></body></html>"#;
        let content = extract_content(html, "Welcome Hi");
        assert_eq!(content.metadata.title, "Home");
        assert_eq!(content.metadata.description.as_deref(), Some("A page"));
        assert_eq!(content.headings.len(), 1);
        assert_eq!(content.headings[0].level, 1);
    }
}
