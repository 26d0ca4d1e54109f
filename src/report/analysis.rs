use super::types::NumericFact;

const OTHER_CATEGORY: &str = "Другое";

// Facts from the "other" bucket still get surfaced when their label
// carries one of these.
const IMPORTANT_KEYWORDS: [&str; 5] = ["total", "net", "ebitda", "margin", "ratio"];

const MAX_FACTS_PER_CATEGORY: usize = 3;
const MAX_IMPORTANT_FACTS: usize = 5;

/// Renders a narrative summary of a section's extracted facts: a heading,
/// per-category groupings, notable leftovers, and a count footer.
pub fn analyze_section_content(section_name: &str, _content: &str, facts: &[NumericFact]) -> String {
    let key = section_name.to_lowercase();
    let mut lines = vec![section_heading(section_name)];

    if facts.is_empty() {
        lines.push("Не удалось извлечь структурированные числовые данные из этого раздела.".to_string());
        return lines.join("\n");
    }

    // Group facts by category, keeping first-seen category order.
    let mut categories: Vec<(&'static str, Vec<&NumericFact>)> = Vec::new();
    for fact in facts {
        let category = categorize(&key, &fact.description);
        match categories.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(fact),
            None => categories.push((category, vec![fact])),
        }
    }

    for (category, members) in &categories {
        if *category == OTHER_CATEGORY {
            continue;
        }
        lines.push(format!("\n{}:", category));
        for fact in members.iter().take(MAX_FACTS_PER_CATEGORY) {
            lines.push(format!(
                "- {}: {}",
                fact.description,
                format_currency(fact.value)
            ));
        }
    }

    if let Some((_, leftovers)) = categories.iter().find(|(name, _)| *name == OTHER_CATEGORY) {
        let important: Vec<_> = leftovers
            .iter()
            .filter(|f| {
                let desc = f.description.to_lowercase();
                IMPORTANT_KEYWORDS.iter().any(|k| desc.contains(k))
            })
            .collect();
        if !important.is_empty() {
            lines.push("\nДругие важные показатели:".to_string());
            for fact in important.iter().take(MAX_IMPORTANT_FACTS) {
                lines.push(format!(
                    "- {}: {}",
                    fact.description,
                    format_currency(fact.value)
                ));
            }
        }
    }

    lines.push(format!(
        "\nВсего найдено {} числовых показателей в разделе.",
        facts.len()
    ));
    lines.join("\n")
}

fn section_heading(section_name: &str) -> String {
    match section_name.to_lowercase().as_str() {
        "assets" => "Анализ активов компании:".to_string(),
        "liabilities" => "Анализ обязательств компании:".to_string(),
        "equity" => "Анализ собственного капитала компании:".to_string(),
        "revenue" => "Анализ выручки компании:".to_string(),
        "income" => "Анализ прибыли компании:".to_string(),
        "cash_flow" => "Анализ денежных потоков компании:".to_string(),
        "balance_sheet" => "Анализ баланса компании:".to_string(),
        "income_statement" => "Анализ отчета о прибылях и убытках:".to_string(),
        _ => format!("Анализ раздела '{}':", section_name),
    }
}

// Keyword membership tests per section, applied top to bottom. The branch
// order is the tie-break: the first matching rule wins.
fn categorize(section: &str, description: &str) -> &'static str {
    let desc = description.to_lowercase();

    if section == "assets" || section == "balance_sheet" {
        if desc.contains("total assets") {
            "Всего активов"
        } else if desc.contains("current assets") {
            "Текущие активы"
        } else if desc.contains("cash") || desc.contains("equivalent") {
            "Денежные средства"
        } else if desc.contains("receivable") {
            "Дебиторская задолженность"
        } else if desc.contains("inventory") {
            "Запасы"
        } else if desc.contains("property") || desc.contains("equipment") || desc.contains("ppe") {
            "Основные средства"
        } else if desc.contains("goodwill") || desc.contains("intangible") {
            "Нематериальные активы"
        } else {
            OTHER_CATEGORY
        }
    } else if section == "liabilities" {
        if desc.contains("total liabilities") {
            "Всего обязательств"
        } else if desc.contains("current liabilities") {
            "Текущие обязательства"
        } else if desc.contains("long-term") || desc.contains("longterm") {
            "Долгосрочные обязательства"
        } else if desc.contains("debt") || desc.contains("borrowing") || desc.contains("loan") {
            "Долг"
        } else if desc.contains("payable") {
            "Кредиторская задолженность"
        } else {
            OTHER_CATEGORY
        }
    } else if section == "income" || section == "income_statement" {
        if desc.contains("revenue") || desc.contains("sales") {
            "Выручка"
        } else if desc.contains("gross") && (desc.contains("profit") || desc.contains("margin")) {
            "Валовая прибыль"
        } else if desc.contains("operating") && (desc.contains("income") || desc.contains("profit"))
        {
            "Операционная прибыль"
        } else if desc.contains("net")
            && (desc.contains("income") || desc.contains("profit") || desc.contains("earnings"))
        {
            "Чистая прибыль"
        } else if desc.contains("eps") || desc.contains("earnings per share") {
            "Прибыль на акцию"
        } else {
            OTHER_CATEGORY
        }
    } else if section == "cash_flow" {
        if desc.contains("operating") {
            "Операционный денежный поток"
        } else if desc.contains("investing") {
            "Инвестиционный денежный поток"
        } else if desc.contains("financing") {
            "Финансовый денежный поток"
        } else if desc.contains("free cash flow") {
            "Свободный денежный поток"
        } else if desc.contains("cash and cash equivalent") {
            "Денежные средства и эквиваленты"
        } else {
            OTHER_CATEGORY
        }
    } else {
        OTHER_CATEGORY
    }
}

/// Currency formatting: no decimals at or above 1000, two below, with
/// thousands separators.
pub(crate) fn format_currency(value: f64) -> String {
    if value >= 1000.0 {
        let digits = format!("{:.0}", value);
        let mut grouped = String::new();
        for (i, c) in digits.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                grouped.insert(0, ',');
            }
            grouped.insert(0, c);
        }
        format!("${}", grouped)
    } else {
        format!("${:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::types::Confidence;

    fn fact(description: &str, value: f64) -> NumericFact {
        NumericFact {
            description: description.to_string(),
            value,
            raw_value: value.to_string(),
            confidence: Confidence::Medium,
        }
    }

    #[test]
    fn formats_currency_with_separators() {
        assert_eq!(format_currency(1_234_500_000.0), "$1,234,500,000");
        assert_eq!(format_currency(1_000.0), "$1,000");
        assert_eq!(format_currency(12.5), "$12.50");
    }

    #[test]
    fn empty_facts_produce_single_notice() {
        let narrative = analyze_section_content("balance_sheet", "irrelevant", &[]);
        assert!(narrative.starts_with("Анализ баланса компании:"));
        assert!(narrative.contains("Не удалось извлечь структурированные числовые данные"));
        assert!(!narrative.contains("Всего найдено"));
    }

    #[test]
    fn balance_sheet_categorizes_assets_and_surfaces_liabilities() {
        let facts = vec![
            fact("Total assets", 10_000_000_000.0),
            fact("Total liabilities", 6_000_000_000.0),
        ];
        let narrative = analyze_section_content("balance_sheet", "", &facts);
        assert!(narrative.contains("Всего активов:"));
        assert!(narrative.contains("- Total assets: $10,000,000,000"));
        // Liability labels are not an asset category; they surface through
        // the notable-leftovers pass instead.
        assert!(narrative.contains("Другие важные показатели:"));
        assert!(narrative.contains("- Total liabilities: $6,000,000,000"));
        assert!(narrative.contains("Всего найдено 2 числовых показателей в разделе."));
    }

    #[test]
    fn income_statement_prefers_revenue_over_net_income_rule() {
        // "Net revenue" hits the revenue rule before the net-income rule.
        let facts = vec![fact("Net revenue", 100.0)];
        let narrative = analyze_section_content("income_statement", "", &facts);
        assert!(narrative.contains("Выручка:"));
        assert!(!narrative.contains("Чистая прибыль:"));
    }

    #[test]
    fn caps_facts_per_category() {
        let facts: Vec<NumericFact> = (0..5)
            .map(|i| fact(&format!("Cash position {}", i), 10.0 + i as f64))
            .collect();
        let narrative = analyze_section_content("assets", "", &facts);
        let rendered = narrative.matches("- Cash position").count();
        assert_eq!(rendered, 3);
    }

    #[test]
    fn unknown_section_gets_generic_heading() {
        let narrative = analyze_section_content("Subscriber Metrics", "", &[]);
        assert!(narrative.starts_with("Анализ раздела 'Subscriber Metrics':"));
    }
}
