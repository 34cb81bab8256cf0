//! Coverage checks for LLM-produced verification results
//!
//! Nothing here rejects a response: every finding is a warning the caller
//! logs and surfaces next to the results.

use std::collections::HashSet;

use crate::model::ComplianceResult;

/// Result of coverage validation
#[derive(Debug, Default)]
pub struct CoverageReport {
    /// Data-quality findings, one line each
    pub warnings: Vec<String>,
}

impl CoverageReport {
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

/// Check that results reference the uploaded supplier documents consistently.
///
/// Checks:
/// 1. Every supplier document appears in each row's `comparisons`
/// 2. A non-empty `bestDocument` names an uploaded document
/// 3. Comparisons do not name documents that were never uploaded
pub fn validate_coverage(results: &[ComplianceResult], document_names: &[String]) -> CoverageReport {
    let mut report = CoverageReport::default();
    let known: HashSet<&str> = document_names.iter().map(String::as_str).collect();

    for row in results {
        let id = row.detail.id;

        if let Some(best) = row.best_document.as_deref()
            && !best.trim().is_empty()
            && !known.contains(best)
        {
            report.add_warning(format!(
                "Row {id}: best document '{best}' is not one of the uploaded documents"
            ));
        }

        let Some(comparisons) = row.comparisons.as_deref() else {
            report.add_warning(format!("Row {id}: no per-document comparisons were returned"));
            continue;
        };

        let compared: HashSet<&str> = comparisons
            .iter()
            .map(|c| c.document_name.as_str())
            .collect();

        let missing: Vec<&str> = document_names
            .iter()
            .map(String::as_str)
            .filter(|name| !compared.contains(name))
            .collect();
        if !missing.is_empty() {
            report.add_warning(format!(
                "Row {id}: comparisons do not cover {}",
                missing.join(", ")
            ));
        }

        for name in compared.iter().filter(|name| !known.contains(*name)) {
            report.add_warning(format!(
                "Row {id}: comparison names unknown document '{name}'"
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OfferComparison, RequirementDetail, Status};

    fn comparison(name: &str) -> OfferComparison {
        OfferComparison {
            document_name: name.to_string(),
            actual_value: "100 ₽".to_string(),
            status: Status::Conforms,
            page_number: 1,
            notes: None,
        }
    }

    fn row(best: Option<&str>, comparisons: Option<Vec<OfferComparison>>) -> ComplianceResult {
        ComplianceResult {
            detail: RequirementDetail::blank(1),
            actual_value: "100 ₽".to_string(),
            status: Status::Conforms,
            explanation: String::new(),
            page_number: 1,
            best_document: best.map(str::to_string),
            comparisons,
        }
    }

    fn names() -> Vec<String> {
        vec!["a.pdf".to_string(), "b.pdf".to_string()]
    }

    #[test]
    fn test_full_coverage_is_clean() {
        let rows = vec![row(Some("a.pdf"), Some(vec![comparison("a.pdf"), comparison("b.pdf")]))];
        assert!(validate_coverage(&rows, &names()).warnings.is_empty());
    }

    #[test]
    fn test_missing_document_is_reported() {
        let rows = vec![row(Some("a.pdf"), Some(vec![comparison("a.pdf")]))];
        let report = validate_coverage(&rows, &names());
        assert_eq!(report.warnings, vec!["Row 1: comparisons do not cover b.pdf"]);
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let rows = vec![row(
            Some("c.pdf"),
            Some(vec![comparison("a.pdf"), comparison("b.pdf"), comparison("c.pdf")]),
        )];
        let report = validate_coverage(&rows, &names());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("best document 'c.pdf'"));
        assert!(report.warnings[1].contains("unknown document 'c.pdf'"));
    }

    #[test]
    fn test_absent_comparisons_and_blank_best_document() {
        let rows = vec![row(Some(""), None)];
        let report = validate_coverage(&rows, &names());
        assert_eq!(report.warnings, vec!["Row 1: no per-document comparisons were returned"]);
    }
}
