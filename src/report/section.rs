use anyhow::Result;
use regex::RegexBuilder;

use super::analysis::analyze_section_content;
use super::extract::extract_numeric_facts;
use super::types::SectionMatch;

pub const MAX_SECTION_FACTS: usize = 30;

// Extraction window from a heading match, and the smaller symmetric
// window around a fallback keyword.
const SECTION_WINDOW_CHARS: usize = 5000;
const KEYWORD_WINDOW_CHARS: usize = 1000;

// The returned `content` is truncated to this for display; fact
// extraction always sees the full window.
const DISPLAY_CONTENT_CHARS: usize = 1500;

const MAX_FALLBACK_KEYWORDS: usize = 5;

/// Heading patterns per canonical section key, tried in order; the first
/// pattern with a match wins. Unknown keys fall back to a free-form
/// search for the raw name.
pub static SECTION_PATTERNS: &[(&str, &[&str])] = &[
    (
        "assets",
        &[
            r"(?:total|current)\s+assets",
            r"assets\s+section",
            r"consolidated\s+balance\s+sheets?.*?assets",
            r"statement\s+of\s+financial\s+position.*?assets",
            r"balance\s+sheets?.*?assets",
        ],
    ),
    (
        "liabilities",
        &[
            r"(?:total|current)\s+liabilities",
            r"liabilities\s+section",
            r"consolidated\s+balance\s+sheets?.*?liabilities",
            r"statement\s+of\s+financial\s+position.*?liabilities",
            r"balance\s+sheets?.*?liabilities",
        ],
    ),
    (
        "equity",
        &[
            r"(?:stockholders'?|shareholders'?)\s+equity",
            r"equity\s+section",
            r"total\s+equity",
            r"(?:stockholders'?|shareholders'?)\s+(?:equity|investment)",
        ],
    ),
    (
        "revenue",
        &[
            r"(?:total\s+)?revenue[s]?",
            r"net\s+revenue[s]?",
            r"sales\s+revenue",
            r"consolidated\s+statements?\s+of\s+(?:income|operations|earnings).*?revenue",
        ],
    ),
    (
        "income",
        &[
            r"net\s+income",
            r"operating\s+income",
            r"income\s+(?:before|after)\s+tax(?:es)?",
            r"consolidated\s+statements?\s+of\s+(?:income|operations|earnings)",
            r"statements?\s+of\s+comprehensive\s+income",
        ],
    ),
    (
        "cash_flow",
        &[
            r"cash\s+flow[s]?",
            r"cash\s+and\s+cash\s+equivalents",
            r"operating\s+activities",
            r"consolidated\s+statements?\s+of\s+cash\s+flows?",
            r"statements?\s+of\s+cash\s+flows?",
        ],
    ),
    (
        "balance_sheet",
        &[
            r"consolidated\s+balance\s+sheets?",
            r"balance\s+sheets?",
            r"statement\s+of\s+financial\s+position",
        ],
    ),
    (
        "income_statement",
        &[
            r"consolidated\s+statements?\s+of\s+(?:income|operations|earnings)",
            r"statements?\s+of\s+(?:income|operations|earnings)",
            r"statements?\s+of\s+comprehensive\s+income",
        ],
    ),
];

/// Synonyms used by the proximity fallback when no heading pattern hits.
static RELATED_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "assets",
        &[
            "assets",
            "total assets",
            "current assets",
            "non-current assets",
            "cash",
            "cash equivalents",
            "accounts receivable",
            "inventory",
            "property",
            "equipment",
            "investments",
            "goodwill",
            "intangible",
        ],
    ),
    (
        "liabilities",
        &[
            "liabilities",
            "total liabilities",
            "current liabilities",
            "long-term liabilities",
            "accounts payable",
            "debt",
            "loans",
            "borrowings",
            "obligations",
            "accrued",
        ],
    ),
    (
        "equity",
        &[
            "equity",
            "stockholders' equity",
            "shareholders' equity",
            "common stock",
            "retained earnings",
            "treasury stock",
            "additional paid-in capital",
        ],
    ),
    (
        "revenue",
        &[
            "revenue",
            "net revenue",
            "gross revenue",
            "sales",
            "total revenue",
            "service revenue",
            "product revenue",
        ],
    ),
    (
        "income",
        &[
            "income",
            "net income",
            "profit",
            "earnings",
            "ebitda",
            "operating income",
            "income before tax",
            "comprehensive income",
        ],
    ),
    (
        "cash_flow",
        &[
            "cash flow",
            "operating activities",
            "investing activities",
            "financing activities",
            "cash provided by",
            "cash used in",
            "net cash",
            "cash and cash equivalents",
        ],
    ),
    (
        "balance_sheet",
        &[
            "balance sheet",
            "consolidated balance sheets",
            "statement of financial position",
            "assets",
            "liabilities",
            "equity",
            "current",
            "non-current",
        ],
    ),
    (
        "income_statement",
        &[
            "income statement",
            "statement of operations",
            "statement of earnings",
            "revenue",
            "expenses",
            "costs",
            "income",
            "earnings per share",
            "eps",
        ],
    ),
];

const DEFAULT_KEYWORDS: &[&str] = &[
    "financial",
    "balance",
    "income",
    "cash",
    "statement",
    "total",
    "net",
];

/// Related search terms for a section, or a generic list for unknown names.
pub fn related_keywords(section_name: &str) -> &'static [&'static str] {
    let key = section_name.to_lowercase();
    RELATED_KEYWORDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(DEFAULT_KEYWORDS)
}

/// Finds a named section and returns its bounded content, extracted
/// facts (capped at [`MAX_SECTION_FACTS`]), and generated narrative.
/// `Ok(None)` means the section is absent — an expected outcome, not an
/// error.
pub fn locate_section(text: &str, section_name: &str) -> Result<Option<SectionMatch>> {
    let key = section_name.to_lowercase();
    let window = match section_window(text, &key)? {
        Some(window) => window,
        None => return Ok(None),
    };

    let mut facts = extract_numeric_facts(&window);
    facts.truncate(MAX_SECTION_FACTS);
    let analysis = analyze_section_content(&key, &window, &facts);

    let content = if window.chars().count() > DISPLAY_CONTENT_CHARS {
        let truncated: String = window.chars().take(DISPLAY_CONTENT_CHARS).collect();
        format!("{}...", truncated)
    } else {
        window
    };

    Ok(Some(SectionMatch {
        name: key,
        content,
        facts,
        analysis,
    }))
}

/// True when either locator tier finds the section.
pub(crate) fn section_present(text: &str, section_name: &str) -> Result<bool> {
    Ok(section_window(text, &section_name.to_lowercase())?.is_some())
}

fn section_window(text: &str, key: &str) -> Result<Option<String>> {
    // Explicit heading patterns first.
    for pattern in patterns_for(key) {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        if let Some(m) = re.find(text) {
            let end = clamp_forward(text, m.start(), SECTION_WINDOW_CHARS);
            return Ok(Some(format!("{}\n\n", &text[m.start()..end])));
        }
    }

    // No heading matched; fall back to whole-word synonym proximity.
    for keyword in related_keywords(key).iter().take(MAX_FALLBACK_KEYWORDS) {
        let pattern = format!(r"\b{}\b", regex::escape(keyword));
        let re = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
        if let Some(m) = re.find(text) {
            let start = clamp_backward(text, m.start(), KEYWORD_WINDOW_CHARS);
            let end = clamp_forward(text, m.end(), KEYWORD_WINDOW_CHARS);
            return Ok(Some(format!("{}\n\n", &text[start..end])));
        }
    }

    Ok(None)
}

fn patterns_for<'a>(key: &'a str) -> Vec<&'a str> {
    SECTION_PATTERNS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, patterns)| patterns.to_vec())
        .unwrap_or_else(|| vec![key])
}

fn clamp_forward(text: &str, from: usize, chars: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(i, _)| from + i)
}

fn clamp_backward(text: &str, to: usize, chars: usize) -> usize {
    text[..to]
        .char_indices()
        .rev()
        .take(chars)
        .last()
        .map_or(to, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::types::Confidence;

    const BALANCE_SHEET_DOC: &str = "ACME CORP ANNUAL REPORT\n\n\
        CONSOLIDATED BALANCE SHEETS\n\
        Total assets ... $10,000 million\n\
        Total liabilities ... $6,000 million\n";

    #[test]
    fn finds_balance_sheet_by_heading() {
        let section = locate_section(BALANCE_SHEET_DOC, "balance_sheet")
            .unwrap()
            .expect("section should be located");
        assert_eq!(section.name, "balance_sheet");
        assert!(section.content.starts_with("CONSOLIDATED BALANCE SHEETS"));

        let assets = section
            .facts
            .iter()
            .find(|f| f.description == "Total assets")
            .expect("total assets fact");
        assert_eq!(assets.value, 10_000_000_000.0);
        assert_eq!(assets.confidence, Confidence::High);

        let liabilities = section
            .facts
            .iter()
            .find(|f| f.description == "Total liabilities")
            .expect("total liabilities fact");
        assert_eq!(liabilities.value, 6_000_000_000.0);

        assert!(section.analysis.contains("Total assets"));
        assert!(section.analysis.contains("Total liabilities"));
    }

    #[test]
    fn missing_section_is_none_not_empty_match() {
        let text = "The company designs consumer hardware and reports revenue growth.";
        assert!(locate_section(text, "balance_sheet").unwrap().is_none());
    }

    #[test]
    fn falls_back_to_keyword_proximity() {
        // No balance-sheet heading anywhere; the synonym "assets" carries it.
        let text = "Quarterly commentary.\nTotal assets grew to $5 million during the period.";
        let section = locate_section(text, "balance_sheet").unwrap().unwrap();
        assert!(section.content.contains("Total assets"));
    }

    #[test]
    fn unknown_name_is_searched_free_form() {
        let text = "Operational update.\nSubscriber metrics improved with paid users 1,200";
        let section = locate_section(text, "Subscriber metrics").unwrap().unwrap();
        assert_eq!(section.name, "subscriber metrics");
        assert!(!section.facts.is_empty());
    }

    #[test]
    fn facts_are_capped() {
        let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
        let mut text = String::from("CONSOLIDATED BALANCE SHEETS\n");
        for (i, a) in words.iter().enumerate() {
            for (j, b) in words.iter().enumerate() {
                text.push_str(&format!("Position {} {} reserve: ${}\n", a, b, 100 + i * 10 + j));
            }
        }
        let section = locate_section(&text, "balance_sheet").unwrap().unwrap();
        assert_eq!(section.facts.len(), MAX_SECTION_FACTS);
    }

    #[test]
    fn long_content_is_truncated_for_display() {
        let mut text = String::from("CONSOLIDATED BALANCE SHEETS\n");
        text.push_str(&"Cash and cash equivalents grew steadily over the year. ".repeat(60));
        let section = locate_section(&text, "balance_sheet").unwrap().unwrap();
        assert!(section.content.ends_with("..."));
        assert!(section.content.chars().count() <= DISPLAY_CONTENT_CHARS + 3);
    }

    #[test]
    fn keyword_tables_cover_every_pattern_key() {
        for (name, _) in SECTION_PATTERNS {
            assert!(
                RELATED_KEYWORDS.iter().any(|(k, _)| k == name),
                "no synonym list for {}",
                name
            );
        }
    }
}
