use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{Confidence, NumericFact};

// A label of 5-100 word/space/punctuation chars (never crossing a line
// break), a separator run, an optional currency symbol, a decimal
// number, an optional scale word.
static CURRENCY_FACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"([A-Za-z \-,\(\)]{5,100})[:\.\s]+[\$€£]?\s*([\d,\.]+)\s*(?:million|billion|thousand|M|B|K)?",
    )
    .unwrap()
});

// Same shape without the currency class, for tabular values that omit "$".
static TABULAR_FACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z \-,\(\)]{5,100})[:\.\s]+([\d,\.]+)\s*(?:million|billion|thousand|M|B|K)?")
        .unwrap()
});

// Labels carrying one of these sort ahead of their confidence peers.
const PRIORITY_KEYWORDS: [&str; 6] = [
    "total",
    "net",
    "revenue",
    "income",
    "assets",
    "liabilities",
];

// How far past the number to look for a scale word.
const SCALE_WINDOW_CHARS: usize = 30;
const SCALE_LETTER_WINDOW_CHARS: usize = 5;

/// Scans a text span for "description -> numeric value" pairs.
///
/// Candidates whose numeric token fails to parse are dropped, never
/// returned with a null value. The result order is a stable two-key
/// sort: confidence tier first, then priority-keyword membership.
pub fn extract_numeric_facts(text: &str) -> Vec<NumericFact> {
    let mut facts: Vec<NumericFact> = Vec::new();

    for caps in CURRENCY_FACT_RE.captures_iter(text) {
        let Some(candidate) = build_fact(text, &caps) else {
            continue;
        };
        match facts
            .iter()
            .position(|f| f.description == candidate.description)
        {
            Some(i) => {
                // Keep the currency-marked reading when the same label shows
                // up again without one.
                if facts[i].confidence == Confidence::Medium
                    && candidate.confidence == Confidence::High
                {
                    facts[i] = candidate;
                }
            }
            None => facts.push(candidate),
        }
    }

    for caps in TABULAR_FACT_RE.captures_iter(text) {
        let description = caps[1].trim();
        if facts.iter().any(|f| f.description == description) {
            continue;
        }
        if let Some(mut candidate) = build_fact(text, &caps) {
            candidate.confidence = Confidence::Medium;
            facts.push(candidate);
        }
    }

    facts.sort_by_key(|f| (f.confidence.rank(), priority_rank(&f.description)));
    facts
}

fn build_fact(text: &str, caps: &regex::Captures) -> Option<NumericFact> {
    let label = caps.get(1)?;
    let number = caps.get(2)?;

    let description = label.as_str().trim().to_string();
    let raw_value = number.as_str().to_string();
    let parsed: f64 = raw_value.replace(',', "").parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }

    let value = parsed * scale_multiplier(text, number.end());

    let between = &text[label.end()..number.start()];
    let confidence = if between.contains(['$', '€', '£']) {
        Confidence::High
    } else {
        Confidence::Medium
    };

    Some(NumericFact {
        description,
        value,
        raw_value,
        confidence,
    })
}

fn scale_multiplier(text: &str, number_end: usize) -> f64 {
    let tail: String = text[number_end..].chars().take(SCALE_WINDOW_CHARS).collect();
    let tail_lower = tail.to_lowercase();
    // Single-letter suffixes only count right next to the number.
    let short: String = tail.chars().take(SCALE_LETTER_WINDOW_CHARS).collect();

    if tail_lower.contains("million") {
        1_000_000.0
    } else if tail_lower.contains("billion") {
        1_000_000_000.0
    } else if tail_lower.contains("thousand") || short.contains('K') {
        1_000.0
    } else if short.contains('M') {
        1_000_000.0
    } else if short.contains('B') {
        1_000_000_000.0
    } else {
        1.0
    }
}

fn priority_rank(description: &str) -> u8 {
    let lower = description.to_lowercase();
    if PRIORITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_currency_marked_value() {
        let facts = extract_numeric_facts("Total revenue: $1,234.5 million");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].description, "Total revenue");
        assert_eq!(facts[0].value, 1_234_500_000.0);
        assert_eq!(facts[0].raw_value, "1,234.5");
        assert_eq!(facts[0].confidence, Confidence::High);
    }

    #[test]
    fn tabular_value_without_currency_symbol_is_medium() {
        let facts = extract_numeric_facts("Total revenue 1,234.50");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, 1_234.5);
        assert_eq!(facts[0].confidence, Confidence::Medium);
    }

    #[test]
    fn billion_and_thousand_suffixes() {
        let facts = extract_numeric_facts("Net sales: $2.5 billion. Deferred fees 45 thousand");
        let net_sales = facts.iter().find(|f| f.description == "Net sales").unwrap();
        assert_eq!(net_sales.value, 2_500_000_000.0);
        let fees = facts
            .iter()
            .find(|f| f.description == "Deferred fees")
            .unwrap();
        assert_eq!(fees.value, 45_000.0);
    }

    #[test]
    fn duplicate_description_keeps_currency_marked_fact() {
        let text = "Net income: $500 million\nOther items 40\nNet income 500";
        let facts = extract_numeric_facts(text);
        let matching: Vec<_> = facts
            .iter()
            .filter(|f| f.description == "Net income")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].confidence, Confidence::High);
        assert_eq!(matching[0].value, 500_000_000.0);
    }

    #[test]
    fn duplicate_description_prefers_high_regardless_of_order() {
        let text = "Net income 500\nOther items 40\nNet income: $500 million";
        let facts = extract_numeric_facts(text);
        let matching: Vec<_> = facts
            .iter()
            .filter(|f| f.description == "Net income")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].confidence, Confidence::High);
        assert_eq!(matching[0].value, 500_000_000.0);
    }

    #[test]
    fn sorts_by_confidence_then_priority_keyword() {
        let text = "Deferred charges 100\nGross bookings: $200\nTotal Assets 300";
        let facts = extract_numeric_facts(text);
        let order: Vec<&str> = facts.iter().map(|f| f.description.as_str()).collect();
        assert_eq!(order, vec!["Gross bookings", "Total Assets", "Deferred charges"]);
    }

    #[test]
    fn unparsable_numeric_token_is_discarded() {
        let facts = extract_numeric_facts("Selected ratios: 1.2.3");
        assert!(facts.is_empty());
    }

    #[test]
    fn empty_text_yields_empty_sequence() {
        assert!(extract_numeric_facts("").is_empty());
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let text = "Revenue: $10 million\nOperating costs 4,000\nNet income: $2 million";
        let first = extract_numeric_facts(text);
        let second = extract_numeric_facts(text);
        assert_eq!(first, second);
    }
}
