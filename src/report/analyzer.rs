use anyhow::Result;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::section;
use super::text::extract_text;
use super::types::{Recommendation, RecommendationConfidence, ReportAnalysis, ReportType};

/// Statement sections probed for `sections_found`, in fixed order.
pub const STATEMENT_SECTIONS: [&str; 4] =
    ["income_statement", "balance_sheet", "cash_flow", "equity"];

static FORM_PROBES: Lazy<Vec<(Regex, ReportType)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)form\s+10-k").unwrap(), ReportType::Form10K),
        (Regex::new(r"(?i)form\s+10-q").unwrap(), ReportType::Form10Q),
        (Regex::new(r"(?i)form\s+8-k").unwrap(), ReportType::Form8K),
    ]
});

static PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:quarter|period|year)[\s\w]+end(?:ed|ing)\s+(\w+\s+\d{1,2},?\s+\d{4})")
        .unwrap()
});

// A label-like phrase preceding an opening parenthesis or "is a",
// matched against the head of the document only.
static COMPANY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\w\s,\.]+)(?:\(|is\s+a)").unwrap());
const COMPANY_SEARCH_CHARS: usize = 1000;

static REVENUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:total\s+)?revenue[s]?[\s:]+[\$\s]*([\d,\.]+)(?:\s*million|\s*billion)?")
            .unwrap(),
        Regex::new(r"(?i)net\s+revenue[s]?[\s:]+[\$\s]*([\d,\.]+)(?:\s*million|\s*billion)?")
            .unwrap(),
    ]
});

static NET_INCOME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)net\s+income[\s:]+[\$\s]*([\d,\.]+)(?:\s*million|\s*billion)?").unwrap(),
        Regex::new(
            r"(?i)income\s+(?:before|after)\s+(?:income\s+)?tax(?:es)?[\s:]+[\$\s]*([\d,\.]+)(?:\s*million|\s*billion)?",
        )
        .unwrap(),
    ]
});

static EPS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:diluted\s+)?earnings\s+per\s+(?:common\s+)?share[\s:]+[\$\s]*([\d,\.]+)")
            .unwrap(),
        Regex::new(r"(?i)(?:basic\s+)?earnings\s+per\s+(?:common\s+)?share[\s:]+[\$\s]*([\d,\.]+)")
            .unwrap(),
    ]
});

static MDA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)(?:item\s+[27][\.\):]|management's\s+discussion\s+and\s+analysis).{0,200}(.*?)(?:item\s+[38][\.\)]|subsequent\s+events)",
    )
    .unwrap()
});

static RISK_FACTORS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)(?:item\s+1a[\.\):]|risk\s+factors).{0,200}(.*?)(?:item\s+[12][\.\)]|unresolved\s+staff\s+comments)",
    )
    .unwrap()
});

static SENTENCE_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+").unwrap());

pub(crate) const POSITIVE_INDICATORS: [&str; 6] =
    ["growth", "increase", "higher", "improve", "expanded", "success"];
pub(crate) const NEGATIVE_INDICATORS: [&str; 6] =
    ["decline", "decrease", "lower", "challenges", "difficult", "loss"];

const RISK_SENTENCE_THRESHOLD: usize = 20;

/// Analyzes a report document end to end: text extraction, header
/// detection, section probes, metric probes, sentiment, and
/// recommendations. Any failure surfaces as an error; partial results
/// are never dressed up as complete.
pub fn analyze_report(file_path: &str) -> Result<ReportAnalysis> {
    let extracted = extract_text(file_path)?;
    analyze_report_text(&extracted.text)
}

/// The same analysis over already-extracted text.
pub fn analyze_report_text(text: &str) -> Result<ReportAnalysis> {
    let report_type = detect_report_type(text);
    let period = detect_period(text);
    let company_name = detect_company_name(text);

    let mut sections_found = Vec::new();
    for name in STATEMENT_SECTIONS {
        if section::section_present(text, name)? {
            sections_found.push(name.to_string());
        }
    }

    let metrics = extract_key_metrics(text);

    let management_discussion = MDA_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let risk_factors = RISK_FACTORS_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let recommendations = build_recommendations(&metrics, &management_discussion, &risk_factors);

    Ok(ReportAnalysis {
        company_name,
        report_type,
        period,
        metrics,
        sections_found,
        recommendations,
        analysis_timestamp: Utc::now().to_rfc3339(),
    })
}

pub(crate) fn detect_report_type(text: &str) -> ReportType {
    for (re, report_type) in FORM_PROBES.iter() {
        if re.is_match(text) {
            return report_type.clone();
        }
    }
    ReportType::Unknown
}

pub(crate) fn detect_period(text: &str) -> String {
    PERIOD_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn detect_company_name(text: &str) -> String {
    let head: String = text.chars().take(COMPANY_SEARCH_CHARS).collect();
    COMPANY_RE
        .captures(&head)
        .map(|c| c[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Probes the whole text for the closed metric vocabulary. A metric whose
/// patterns all miss (or whose token fails to parse) is omitted.
pub(crate) fn extract_key_metrics(text: &str) -> BTreeMap<String, f64> {
    let probes: [(&str, &Lazy<Vec<Regex>>); 3] = [
        ("revenue", &REVENUE_PATTERNS),
        ("net_income", &NET_INCOME_PATTERNS),
        ("eps", &EPS_PATTERNS),
    ];

    let mut metrics = BTreeMap::new();
    for (name, patterns) in probes {
        for re in patterns.iter() {
            if let Some(caps) = re.captures(text) {
                if let Ok(value) = caps[1].replace(',', "").parse::<f64>() {
                    metrics.insert(name.to_string(), value);
                    break;
                }
            }
        }
    }
    metrics
}

/// Counts how many of the vocabulary words occur in the text at least
/// once (whole-word, case-insensitive). Each word contributes at most 1.
pub(crate) fn count_indicator_words(text: &str, words: &[&str]) -> usize {
    words
        .iter()
        .filter(|word| {
            Regex::new(&format!(r"(?i)\b{}\b", word))
                .map(|re| re.is_match(text))
                .unwrap_or(false)
        })
        .count()
}

pub(crate) fn classify_sentiment(positive: usize, negative: usize) -> &'static str {
    if positive > negative * 2 {
        "very positive"
    } else if positive > negative {
        "positive"
    } else if negative > positive * 2 {
        "very negative"
    } else if negative > positive {
        "negative"
    } else {
        "neutral"
    }
}

fn build_recommendations(
    metrics: &BTreeMap<String, f64>,
    management_discussion: &str,
    risk_factors: &str,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if metrics.is_empty() {
        recommendations.push(Recommendation {
            recommendation: "Недостаточно данных для формирования рекомендаций".to_string(),
            confidence: RecommendationConfidence::Low,
            reasoning: "Не удалось извлечь ключевые финансовые метрики из отчета.".to_string(),
        });
        return recommendations;
    }

    let positive = count_indicator_words(management_discussion, &POSITIVE_INDICATORS);
    let negative = count_indicator_words(management_discussion, &NEGATIVE_INDICATORS);
    let sentiment = classify_sentiment(positive, negative);

    if let Some(revenue) = metrics.get("revenue") {
        recommendations.push(Recommendation {
            recommendation: "Обнаружены данные о выручке".to_string(),
            confidence: RecommendationConfidence::Medium,
            reasoning: format!(
                "Выручка составляет {}. Для полного анализа требуется сравнение с предыдущими периодами.",
                revenue
            ),
        });
    }

    if let Some(eps) = metrics.get("eps") {
        recommendations.push(Recommendation {
            recommendation: "Обнаружены данные о прибыли на акцию (EPS)".to_string(),
            confidence: RecommendationConfidence::Medium,
            reasoning: format!(
                "EPS составляет {}. Для полного анализа требуется сравнение с предыдущими периодами и ожиданиями аналитиков.",
                eps
            ),
        });
    }

    recommendations.push(Recommendation {
        recommendation: format!("Тон руководства в описании результатов: {}", sentiment),
        confidence: RecommendationConfidence::Medium,
        reasoning: format!(
            "В разделе MD&A обнаружено {} позитивных и {} негативных индикаторов. Это может указывать на {} оценку руководством текущего положения компании.",
            positive, negative, sentiment
        ),
    });

    if !risk_factors.is_empty() {
        let sentence_count = SENTENCE_BREAK_RE.find_iter(risk_factors).count();
        if sentence_count > RISK_SENTENCE_THRESHOLD {
            recommendations.push(Recommendation {
                recommendation: "Компания сообщает о значительном количестве факторов риска"
                    .to_string(),
                confidence: RecommendationConfidence::Medium,
                reasoning: format!(
                    "Раздел Risk Factors содержит примерно {} пунктов, что может указывать на сложную операционную среду.",
                    sentence_count
                ),
            });
        }
    }

    recommendations
}

const DISCLAIMER: &str = "Данный анализ основан на автоматическом извлечении данных из отчета и является предварительным. Для принятия инвестиционных решений рекомендуется провести более глубокий анализ и проконсультироваться с финансовым консультантом.";

/// Renders the human-readable digest of an analysis: header, metric
/// bullets, recommendation bullets with reasoning, and a disclaimer.
pub fn summarize_report(analysis: &ReportAnalysis) -> String {
    let mut summary = Vec::new();

    summary.push(format!(
        "# Анализ финансового отчета {}",
        analysis.company_name
    ));
    summary.push(format!("## Тип отчета: {}", analysis.report_type));
    summary.push(format!("## Период: {}", analysis.period));
    summary.push(String::new());

    summary.push("## Ключевые метрики:".to_string());
    if analysis.metrics.is_empty() {
        summary.push("- Не удалось извлечь ключевые метрики".to_string());
    } else {
        for (metric, value) in &analysis.metrics {
            summary.push(format!("- {}: {}", capitalize(metric), value));
        }
    }
    summary.push(String::new());

    summary.push("## Рекомендации и выводы:".to_string());
    if analysis.recommendations.is_empty() {
        summary.push("- Не удалось сформировать рекомендации".to_string());
    } else {
        for rec in &analysis.recommendations {
            summary.push(format!("- {}", rec.recommendation));
            summary.push(format!("  Обоснование: {}", rec.reasoning));
            summary.push(String::new());
        }
    }

    summary.push("## Примечание:".to_string());
    summary.push(DISCLAIMER.to_string());

    summary.join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
