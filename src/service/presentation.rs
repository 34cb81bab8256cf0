//! Figures derived from verified results for display
//!
//! Everything here is a pure function of the current rows; nothing is stored.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::conditions::{contains_any, is_system_source};
use crate::model::{ComplianceResult, ConditionTopic, NOT_STATED, Status};

/// Rate at or above which compliance is high
const HIGH_RATE: u32 = 80;
/// Rate at or above which compliance is medium
const MEDIUM_RATE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceBand {
    High,
    Medium,
    Low,
}

impl ComplianceBand {
    pub fn for_rate(rate: u32) -> Self {
        if rate >= HIGH_RATE {
            ComplianceBand::High
        } else if rate >= MEDIUM_RATE {
            ComplianceBand::Medium
        } else {
            ComplianceBand::Low
        }
    }
}

/// Dashboard totals over the primary result rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStats {
    pub total: usize,
    pub conforms: usize,
    pub does_not_conform: usize,
    pub partial: usize,
    pub not_found: usize,
    /// Share of conforming rows in percent, rounded half up
    pub compliance_rate: u32,
    pub band: ComplianceBand,
}

pub fn compliance_stats(rows: &[ComplianceResult]) -> ComplianceStats {
    let count = |status: Status| rows.iter().filter(|r| r.status == status).count();
    let total = rows.len();
    let conforms = count(Status::Conforms);

    let compliance_rate = if total == 0 {
        0
    } else {
        ((200 * conforms + total) / (2 * total)) as u32
    };

    ComplianceStats {
        total,
        conforms,
        does_not_conform: count(Status::DoesNotConform),
        partial: count(Status::PartialConformance),
        not_found: count(Status::NotFound),
        compliance_rate,
        band: ComplianceBand::for_rate(compliance_rate),
    }
}

/// Summary of the row answering one condition topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionHighlight {
    pub topic: ConditionTopic,
    pub title: String,
    pub requirement: String,
    pub actual_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_document: Option<String>,
    pub status: Status,
    pub explanation: String,
}

/// First row per topic, condition rows searched before primary rows
pub fn condition_highlights(
    conditions: &[ComplianceResult],
    primary: &[ComplianceResult],
) -> Vec<ConditionHighlight> {
    ConditionTopic::ALL
        .into_iter()
        .filter_map(|topic| {
            let row = conditions.iter().chain(primary).find(|row| {
                contains_any(
                    &[
                        row.detail.parameter.as_str(),
                        row.detail.requirement.as_str(),
                        row.actual_value.as_str(),
                    ],
                    topic.highlight_keywords(),
                )
            })?;

            let requirement = if is_system_source(&row.detail.source) || row.detail.requirement.is_empty() {
                topic.title().to_string()
            } else {
                row.detail.requirement.clone()
            };

            Some(ConditionHighlight {
                topic,
                title: topic.title().to_string(),
                requirement,
                actual_value: row.actual_value.clone(),
                best_document: row.best_document.clone(),
                status: row.status,
                explanation: row.explanation.clone(),
            })
        })
        .collect()
}

/// One supplier's value for a condition topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCondition {
    pub topic: ConditionTopic,
    pub title: String,
    pub value: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DocumentCondition {
    fn not_stated(topic: ConditionTopic) -> Self {
        Self {
            topic,
            title: topic.title().to_string(),
            value: NOT_STATED.to_string(),
            status: Status::NotFound,
            notes: None,
        }
    }
}

/// Condition table of one supplier document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentConditions {
    pub document_name: String,
    /// Exactly one entry per topic, in topic order
    pub conditions: Vec<DocumentCondition>,
}

/// Condition tables for every uploaded supplier document, in upload order.
///
/// Rows are classified by the broad topic stems; when several rows of the
/// same topic compare a document, the last one wins.
pub fn per_document_conditions(
    conditions: &[ComplianceResult],
    primary: &[ComplianceResult],
    document_names: &[String],
) -> Vec<DocumentConditions> {
    document_names
        .iter()
        .map(|name| {
            let entries = ConditionTopic::ALL
                .into_iter()
                .map(|topic| {
                    conditions
                        .iter()
                        .chain(primary)
                        .filter(|row| {
                            ConditionTopic::classify(&[
                                row.detail.parameter.as_str(),
                                row.detail.requirement.as_str(),
                            ])
                                == Some(topic)
                        })
                        .filter_map(|row| row.comparison_for(name))
                        .last()
                        .map(|offer| DocumentCondition {
                            topic,
                            title: topic.title().to_string(),
                            value: if offer.actual_value.is_empty() {
                                NOT_STATED.to_string()
                            } else {
                                offer.actual_value.clone()
                            },
                            status: offer.status,
                            notes: offer.notes.clone(),
                        })
                        .unwrap_or_else(|| DocumentCondition::not_stated(topic))
                })
                .collect();

            DocumentConditions {
                document_name: name.clone(),
                conditions: entries,
            }
        })
        .collect()
}

/// Supplier document and page shown in the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    pub active_document: usize,
    /// `None` while no supplier document is loaded
    pub page: Option<u32>,
}

impl ViewerState {
    /// State after a new set of supplier documents was loaded
    pub fn for_documents(count: usize) -> Self {
        Self {
            active_document: 0,
            page: (count > 0).then_some(1),
        }
    }

    /// Show the document at `index` from its first page
    pub fn select(&mut self, index: usize) {
        self.active_document = index;
        self.page = Some(1);
    }

    /// Jump to `page`, switching to `document_name` when it is one of `document_names`
    pub fn page_jump(&mut self, page: u32, document_name: Option<&str>, document_names: &[String]) {
        if let Some(name) = document_name
            && let Some(index) = document_names.iter().position(|n| n == name)
        {
            self.active_document = index;
        }
        self.page = Some(page);
    }
}
