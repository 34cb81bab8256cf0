use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Compliance status of a supplier value against a requirement.
///
/// The serialized tokens are the wire contract shared with the model and with
/// persisted state; no other value is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Status {
    #[serde(rename = "Соответствует")]
    Conforms,
    #[serde(rename = "Не соответствует")]
    DoesNotConform,
    #[serde(rename = "Частичное соответствие")]
    PartialConformance,
    #[serde(rename = "Не найдено")]
    NotFound,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Conforms,
        Status::DoesNotConform,
        Status::PartialConformance,
        Status::NotFound,
    ];

    /// Canonical wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Conforms => "Соответствует",
            Status::DoesNotConform => "Не соответствует",
            Status::PartialConformance => "Частичное соответствие",
            Status::NotFound => "Не найдено",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == token)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// One requirement line extracted from the requirements document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequirementDetail {
    pub id: i64,
    pub parameter: String,
    pub requirement: String,
    pub source: String,
    pub notes: String,
}

/// One supplier document's value for a requirement, best match or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfferComparison {
    pub document_name: String,
    pub actual_value: String,
    pub status: Status,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A requirement augmented with the best supplier value and its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    #[serde(flatten)]
    pub detail: RequirementDetail,
    pub actual_value: String,
    pub status: Status,
    pub explanation: String,
    /// Page where the best offer was found, 0 when unknown
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparisons: Option<Vec<OfferComparison>>,
}

impl ComplianceResult {
    /// Empty row added by the user after verification
    pub fn blank(id: i64) -> Self {
        Self {
            detail: RequirementDetail::blank(id),
            actual_value: String::new(),
            status: Status::NotFound,
            explanation: String::new(),
            page_number: 0,
            best_document: Some(String::new()),
            comparisons: None,
        }
    }

    /// Comparison entry reported for a given supplier document
    pub fn comparison_for(&self, document_name: &str) -> Option<&OfferComparison> {
        self.comparisons
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|c| c.document_name == document_name)
    }
}

impl RequirementDetail {
    pub fn blank(id: i64) -> Self {
        Self {
            id,
            parameter: String::new(),
            requirement: String::new(),
            source: String::new(),
            notes: String::new(),
        }
    }
}

/// Working result set of the workflow.
///
/// Requirement rows live here until verification completes, after which the
/// whole set is replaced by compliance rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum ResultSet {
    Requirements(Vec<RequirementDetail>),
    Compliance(Vec<ComplianceResult>),
}

impl ResultSet {
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Requirements(rows) => rows.len(),
            ResultSet::Compliance(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<i64> {
        match self {
            ResultSet::Requirements(rows) => rows.iter().map(|r| r.id).collect(),
            ResultSet::Compliance(rows) => rows.iter().map(|r| r.detail.id).collect(),
        }
    }

    /// Next id for a user-added row, see [`next_row_id`]
    pub fn next_id(&self) -> i64 {
        next_row_id(&self.ids())
    }

    /// Append an empty row shaped like the rest of the set
    pub fn push_blank(&mut self) -> i64 {
        let id = self.next_id();
        match self {
            ResultSet::Requirements(rows) => rows.push(RequirementDetail::blank(id)),
            ResultSet::Compliance(rows) => rows.push(ComplianceResult::blank(id)),
        }
        id
    }

    /// Remove the row with the given id, returning whether one was removed
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.len();
        match self {
            ResultSet::Requirements(rows) => rows.retain(|r| r.id != id),
            ResultSet::Compliance(rows) => rows.retain(|r| r.detail.id != id),
        }
        self.len() != before
    }

    /// Set one field of the row at `index`
    pub fn update(&mut self, index: usize, field: RowField, value: &str) -> Result<(), RowEditError> {
        match self {
            ResultSet::Requirements(rows) => {
                let row = rows.get_mut(index).ok_or(RowEditError::NoSuchRow(index))?;
                apply_detail_edit(row, field, value)
            }
            ResultSet::Compliance(rows) => {
                let row = rows.get_mut(index).ok_or(RowEditError::NoSuchRow(index))?;
                match field {
                    RowField::ActualValue => row.actual_value = value.to_string(),
                    RowField::Explanation => row.explanation = value.to_string(),
                    RowField::BestDocument => row.best_document = Some(value.to_string()),
                    RowField::Status => {
                        row.status = value
                            .parse()
                            .map_err(|e: UnknownStatus| RowEditError::InvalidValue(e.to_string()))?;
                    }
                    RowField::PageNumber => {
                        row.page_number = value.trim().parse().map_err(|_| {
                            RowEditError::InvalidValue(format!("page number '{value}' is not a number"))
                        })?;
                    }
                    _ => return apply_detail_edit(&mut row.detail, field, value),
                }
                Ok(())
            }
        }
    }
}

/// One past the largest id, or 1 for no ids.
///
/// Once the largest id is `i64::MAX` the smallest unused positive id is
/// returned instead.
pub fn next_row_id(ids: &[i64]) -> i64 {
    let Some(max) = ids.iter().copied().max() else {
        return 1;
    };
    max.checked_add(1).unwrap_or_else(|| {
        let used: HashSet<i64> = ids.iter().copied().collect();
        (1..i64::MAX).find(|id| !used.contains(id)).unwrap_or(1)
    })
}

fn apply_detail_edit(
    row: &mut RequirementDetail,
    field: RowField,
    value: &str,
) -> Result<(), RowEditError> {
    match field {
        RowField::Parameter => row.parameter = value.to_string(),
        RowField::Requirement => row.requirement = value.to_string(),
        RowField::Source => row.source = value.to_string(),
        RowField::Notes => row.notes = value.to_string(),
        RowField::Id => return Err(RowEditError::Immutable),
        other => return Err(RowEditError::NotVerified(other)),
    }
    Ok(())
}

/// Columns of the result table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RowField {
    Id,
    Parameter,
    Requirement,
    Source,
    Notes,
    BestDocument,
    ActualValue,
    Status,
    Explanation,
    PageNumber,
}

impl RowField {
    /// Table order of all columns
    pub const ALL: [RowField; 10] = [
        RowField::Id,
        RowField::Parameter,
        RowField::Requirement,
        RowField::Source,
        RowField::Notes,
        RowField::BestDocument,
        RowField::ActualValue,
        RowField::Status,
        RowField::Explanation,
        RowField::PageNumber,
    ];

}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RowField::Id => "id",
            RowField::Parameter => "parameter",
            RowField::Requirement => "requirement",
            RowField::Source => "source",
            RowField::Notes => "notes",
            RowField::BestDocument => "bestDocument",
            RowField::ActualValue => "actualValue",
            RowField::Status => "status",
            RowField::Explanation => "explanation",
            RowField::PageNumber => "pageNumber",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowEditError {
    #[error("no row at index {0}")]
    NoSuchRow(usize),

    #[error("row id cannot be changed")]
    Immutable,

    #[error("field '{0}' is only available after verification")]
    NotVerified(RowField),

    #[error("{0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(id: i64, parameter: &str) -> RequirementDetail {
        RequirementDetail {
            id,
            parameter: parameter.to_string(),
            requirement: "100 шт".to_string(),
            source: "Row 1".to_string(),
            notes: "Значение присутствует".to_string(),
        }
    }

    #[test]
    fn test_status_parses_only_canonical_tokens() {
        assert_eq!("Соответствует".parse::<Status>(), Ok(Status::Conforms));
        assert_eq!(" Не найдено ".parse::<Status>(), Ok(Status::NotFound));
        assert!("Conforms".parse::<Status>().is_err());
        assert!("соответствует".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serializes_as_wire_token() {
        let json = serde_json::to_string(&Status::PartialConformance).unwrap();
        assert_eq!(json, "\"Частичное соответствие\"");
        assert!(serde_json::from_str::<Status>("\"OK\"").is_err());
    }

    #[test]
    fn test_compliance_result_flattens_detail() {
        let result = ComplianceResult {
            detail: requirement(3, "Цена"),
            actual_value: "95 руб".to_string(),
            status: Status::Conforms,
            explanation: "Дешевле".to_string(),
            page_number: 2,
            best_document: Some("a.pdf".to_string()),
            comparisons: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["parameter"], "Цена");
        assert_eq!(value["actualValue"], "95 руб");
        assert_eq!(value["pageNumber"], 2);
        assert!(value.get("comparisons").is_none());

        let back: ComplianceResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_result_set_is_tagged() {
        let set = ResultSet::Requirements(vec![requirement(1, "Цена")]);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["kind"], "requirements");
        assert_eq!(value["rows"][0]["id"], 1);
    }

    #[test]
    fn test_push_blank_continues_ids() {
        let mut set = ResultSet::Requirements(vec![requirement(4, "A"), requirement(9, "B")]);
        assert_eq!(set.push_blank(), 10);

        let mut empty = ResultSet::Compliance(vec![]);
        assert_eq!(empty.push_blank(), 1);
        match empty {
            ResultSet::Compliance(rows) => assert_eq!(rows[0].status, Status::NotFound),
            ResultSet::Requirements(_) => panic!("shape changed"),
        }
    }

    #[test]
    fn test_next_id_at_the_top_of_the_range() {
        assert_eq!(next_row_id(&[]), 1);
        assert_eq!(next_row_id(&[-3]), -2);
        assert_eq!(next_row_id(&[i64::MAX, 1, 3]), 2);

        let mut set = ResultSet::Requirements(vec![requirement(i64::MAX, "A")]);
        assert_eq!(set.push_blank(), 1);
        assert_eq!(set.push_blank(), 2);
    }

    #[test]
    fn test_update_rejects_invalid_edits() {
        let mut set = ResultSet::Requirements(vec![requirement(1, "A")]);
        assert_eq!(
            set.update(0, RowField::Status, "Соответствует"),
            Err(RowEditError::NotVerified(RowField::Status))
        );
        assert_eq!(set.update(0, RowField::Id, "7"), Err(RowEditError::Immutable));
        assert_eq!(set.update(3, RowField::Notes, "x"), Err(RowEditError::NoSuchRow(3)));

        set.update(0, RowField::Notes, "edited").unwrap();
        match &set {
            ResultSet::Requirements(rows) => assert_eq!(rows[0].notes, "edited"),
            ResultSet::Compliance(_) => unreachable!(),
        }
    }

    #[test]
    fn test_update_compliance_status_is_validated() {
        let mut set = ResultSet::Compliance(vec![ComplianceResult::blank(1)]);
        assert!(matches!(
            set.update(0, RowField::Status, "maybe"),
            Err(RowEditError::InvalidValue(_))
        ));
        set.update(0, RowField::Status, "Не соответствует").unwrap();
        set.update(0, RowField::PageNumber, "12").unwrap();
        set.update(0, RowField::Parameter, "Срок").unwrap();

        let ResultSet::Compliance(rows) = set else { unreachable!() };
        assert_eq!(rows[0].status, Status::DoesNotConform);
        assert_eq!(rows[0].page_number, 12);
        assert_eq!(rows[0].detail.parameter, "Срок");
    }

    #[test]
    fn test_remove_by_id() {
        let mut set = ResultSet::Requirements(vec![requirement(1, "A"), requirement(2, "B")]);
        assert!(set.remove(1));
        assert!(!set.remove(1));
        assert_eq!(set.ids(), vec![2]);
    }
}
