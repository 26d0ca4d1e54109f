use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// Reliability tag for an extracted figure. `High` means a currency
/// symbol sat next to the matched number in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

impl Confidence {
    pub fn rank(self) -> u8 {
        match self {
            Confidence::High => 0,
            Confidence::Medium => 1,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
        }
    }
}

/// One "description -> value" pair pulled out of report text.
/// `value` is already scaled by the detected multiplier; `raw_value`
/// keeps the original token for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFact {
    pub description: String,
    pub value: f64,
    pub raw_value: String,
    pub confidence: Confidence,
}

/// A located section of a report: a bounded content excerpt, the facts
/// extracted from it, and a generated narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMatch {
    pub name: String,
    pub content: String,
    pub facts: Vec<NumericFact>,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ReportType {
    Form10K,
    Form10Q,
    Form8K,
    Unknown,
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Form10K => write!(f, "10-K"),
            ReportType::Form10Q => write!(f, "10-Q"),
            ReportType::Form8K => write!(f, "8-K"),
            ReportType::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "10-K" => Ok(ReportType::Form10K),
            "10-Q" => Ok(ReportType::Form10Q),
            "8-K" => Ok(ReportType::Form8K),
            _ => Ok(ReportType::Unknown),
        }
    }
}

impl From<ReportType> for String {
    fn from(t: ReportType) -> String {
        t.to_string()
    }
}

impl TryFrom<String> for ReportType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ReportType::from_str(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation: String,
    pub confidence: RecommendationConfidence,
    pub reasoning: String,
}

/// Top-level result of analyzing one report document.
///
/// `metrics` keys come from a closed vocabulary (revenue, net_income,
/// eps); `sections_found` holds canonical section names in probe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportAnalysis {
    pub company_name: String,
    pub report_type: ReportType,
    pub period: String,
    pub metrics: BTreeMap<String, f64>,
    pub sections_found: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub analysis_timestamp: String,
}
