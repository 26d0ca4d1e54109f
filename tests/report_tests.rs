use analyst::report::{self, Confidence, ReportType};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn synthetic_10k() -> String {
    let mda_body = "Revenue grew in every segment and the expansion of the platform \
        was a success. We saw an increase in demand, higher margins, and continued \
        growth across regions as operations improve. "
        .repeat(3);

    format!(
        "Acme Corporation (NASDAQ: ACME) is a diversified manufacturer.\n\
         Annual Report on Form 10-K for the fiscal year ended December 31, 2024.\n\
         \n\
         Total revenues: $4,500 million\n\
         Net income: $320 million\n\
         Diluted earnings per share: 2.15\n\
         \n\
         CONSOLIDATED BALANCE SHEETS\n\
         Total assets ... $10,000 million\n\
         Total liabilities ... $6,000 million\n\
         \n\
         Item 7. Management's Discussion and Analysis\n\
         {}\n\
         Item 8. Financial Statements\n",
        mda_body
    )
}

fn write_report(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.txt");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn analyzes_synthetic_filing_end_to_end() {
    let (_dir, path) = write_report(&synthetic_10k());

    let analysis = report::analyze_report(path.to_str().unwrap()).unwrap();

    assert_eq!(analysis.report_type, ReportType::Form10K);
    assert_eq!(analysis.company_name, "Acme Corporation");
    assert_eq!(analysis.period, "December 31, 2024");

    assert_eq!(analysis.metrics["revenue"], 4500.0);
    assert_eq!(analysis.metrics["net_income"], 320.0);
    assert_eq!(analysis.metrics["eps"], 2.15);

    assert!(analysis
        .sections_found
        .contains(&"balance_sheet".to_string()));
    assert!(!analysis.recommendations.is_empty());
    assert!(!analysis.analysis_timestamp.is_empty());
}

#[test]
fn balance_sheet_section_extraction_matches_document() {
    let (_dir, path) = write_report(&synthetic_10k());
    let extracted = report::extract_text(path.to_str().unwrap()).unwrap();

    let section = report::locate_section(&extracted.text, "balance_sheet")
        .unwrap()
        .expect("balance sheet should be located");

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

    assert!(!section.analysis.is_empty());
    assert!(section.analysis.contains("Total assets"));
    assert!(section.analysis.contains("Total liabilities"));
}

#[test]
fn reanalysis_is_idempotent_except_timestamp() {
    let (_dir, path) = write_report(&synthetic_10k());

    let first = report::analyze_report(path.to_str().unwrap()).unwrap();
    let second = report::analyze_report(path.to_str().unwrap()).unwrap();

    assert_eq!(first.report_type, second.report_type);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.sections_found, second.sections_found);
    assert_eq!(first.company_name, second.company_name);
    assert_eq!(first.period, second.period);
}

#[test]
fn management_tone_recommendation_reflects_positive_mda() {
    let (_dir, path) = write_report(&synthetic_10k());
    let analysis = report::analyze_report(path.to_str().unwrap()).unwrap();

    let tone = analysis
        .recommendations
        .iter()
        .find(|r| r.recommendation.contains("Тон руководства"))
        .expect("tone recommendation");
    assert!(tone.recommendation.contains("positive"));
}

#[test]
fn missing_file_propagates_an_error() {
    let err = report::analyze_report("/nonexistent/filing.pdf").unwrap_err();
    assert!(err.to_string().contains("File not found"));
}

#[test]
fn sparse_document_gets_unknown_placeholders_not_errors() {
    let (_dir, path) = write_report("Short memo without financial content.");
    let analysis = report::analyze_report(path.to_str().unwrap()).unwrap();

    assert_eq!(analysis.report_type, ReportType::Unknown);
    assert_eq!(analysis.period, "unknown");
    assert!(analysis.metrics.is_empty());

    // Still a complete result: the fallback recommendation is present.
    assert_eq!(analysis.recommendations.len(), 1);
    assert!(analysis.recommendations[0]
        .recommendation
        .contains("Недостаточно данных"));
}

#[test]
fn digest_renders_for_a_full_analysis() {
    let (_dir, path) = write_report(&synthetic_10k());
    let analysis = report::analyze_report(path.to_str().unwrap()).unwrap();

    let digest = report::summarize_report(&analysis);
    assert!(digest.contains("Acme Corporation"));
    assert!(digest.contains("10-K"));
    assert!(digest.contains("Revenue"));
    assert!(digest.contains("## Примечание:"));
}
