pub mod analysis;
pub mod analyzer;
pub mod extract;
pub mod section;
pub mod text;
pub mod types;

pub use analysis::analyze_section_content;
pub use analyzer::{analyze_report, analyze_report_text, summarize_report};
pub use extract::extract_numeric_facts;
pub use section::{locate_section, related_keywords};
pub use text::{extract_text, ExtractedText};
pub use types::{
    Confidence, NumericFact, Recommendation, RecommendationConfidence, ReportAnalysis, ReportType,
    SectionMatch,
};
