//! Converters from LLM-extracted verification results to domain models

use crate::model::extracted::{ExtractedComparison, ExtractedResult};
use crate::model::{ComplianceResult, OfferComparison, RequirementDetail};

pub fn convert_result(extracted: ExtractedResult) -> ComplianceResult {
    ComplianceResult {
        detail: RequirementDetail {
            id: extracted.id,
            parameter: extracted.parameter,
            requirement: extracted.requirement,
            source: extracted.source,
            notes: extracted.notes,
        },
        actual_value: extracted.actual_value,
        status: extracted.status,
        explanation: extracted.explanation,
        page_number: extracted.page_number,
        best_document: extracted.best_document,
        comparisons: extracted
            .comparisons
            .map(|list| list.into_iter().map(convert_comparison).collect()),
    }
}

fn convert_comparison(extracted: ExtractedComparison) -> OfferComparison {
    OfferComparison {
        document_name: extracted.document_name,
        actual_value: extracted.actual_value,
        status: extracted.status,
        page_number: extracted.page_number,
        notes: extracted.notes,
    }
}
