//! CSV export of the result table and its editable column labels

use std::collections::BTreeMap;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{ResultSet, RowField};

const UTF8_BOM: &str = "\u{feff}";

/// Download name of the exported table
pub const EXPORT_FILE_NAME: &str = "verification_results.csv";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to finish CSV output: {0}")]
    Flush(String),
}

/// Display labels of the result table columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ColumnLabels(BTreeMap<RowField, String>);

impl Default for ColumnLabels {
    fn default() -> Self {
        let labels = RowField::ALL
            .into_iter()
            .map(|field| (field, default_label(field).to_string()))
            .collect();
        Self(labels)
    }
}

fn default_label(field: RowField) -> &'static str {
    match field {
        RowField::Id => "ID",
        RowField::Parameter => "Параметр",
        RowField::Requirement => "Требование",
        RowField::Source => "Источник",
        RowField::Notes => "Примечания",
        RowField::BestDocument => "Лучший документ",
        RowField::ActualValue => "Факт. значение",
        RowField::Status => "Статус",
        RowField::Explanation => "Пояснение ИИ",
        RowField::PageNumber => "Стр.",
    }
}

impl ColumnLabels {
    pub fn get(&self, field: RowField) -> &str {
        self.0
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| default_label(field))
    }

    pub fn set(&mut self, field: RowField, label: impl Into<String>) {
        self.0.insert(field, label.into());
    }
}

/// Columns written to the export, in table order
pub fn export_columns() -> Vec<RowField> {
    RowField::ALL
        .into_iter()
        .filter(|field| *field != RowField::PageNumber)
        .collect()
}

/// Render the result set as BOM-prefixed CSV.
///
/// Requirement rows leave the verification columns empty.
pub fn to_csv(results: &ResultSet, labels: &ColumnLabels) -> Result<String, ExportError> {
    let columns = export_columns();
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns.iter().map(|field| labels.get(*field)))?;

    match results {
        ResultSet::Requirements(rows) => {
            for row in rows {
                writer.write_record(columns.iter().map(|field| match field {
                    RowField::Id => row.id.to_string(),
                    RowField::Parameter => row.parameter.clone(),
                    RowField::Requirement => row.requirement.clone(),
                    RowField::Source => row.source.clone(),
                    RowField::Notes => row.notes.clone(),
                    _ => String::new(),
                }))?;
            }
        }
        ResultSet::Compliance(rows) => {
            for row in rows {
                writer.write_record(columns.iter().map(|field| match field {
                    RowField::Id => row.detail.id.to_string(),
                    RowField::Parameter => row.detail.parameter.clone(),
                    RowField::Requirement => row.detail.requirement.clone(),
                    RowField::Source => row.detail.source.clone(),
                    RowField::Notes => row.detail.notes.clone(),
                    RowField::BestDocument => row.best_document.clone().unwrap_or_default(),
                    RowField::ActualValue => row.actual_value.clone(),
                    RowField::Status => row.status.to_string(),
                    RowField::Explanation => row.explanation.clone(),
                    RowField::PageNumber => row.page_number.to_string(),
                }))?;
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| ExportError::Flush(e.to_string()))?;

    Ok(format!("{UTF8_BOM}{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComplianceResult, RequirementDetail, Status};

    fn detail(id: i64, requirement: &str) -> RequirementDetail {
        RequirementDetail {
            id,
            parameter: "Кабель".to_string(),
            requirement: requirement.to_string(),
            source: "Строка 1".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_header_uses_labels_without_page_column() {
        let csv = to_csv(&ResultSet::Requirements(vec![]), &ColumnLabels::default()).unwrap();
        assert_eq!(
            csv,
            "\u{feff}ID,Параметр,Требование,Источник,Примечания,Лучший документ,Факт. значение,Статус,Пояснение ИИ\n"
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let rows = ResultSet::Requirements(vec![detail(1, r#"He said, "ok""#)]);
        let csv = to_csv(&rows, &ColumnLabels::default()).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert_eq!(line, r#"1,Кабель,"He said, ""ok""",Строка 1,,,,,"#);
    }

    #[test]
    fn test_compliance_rows_and_renamed_label() {
        let mut labels = ColumnLabels::default();
        labels.set(RowField::Status, "Итог");

        let rows = ResultSet::Compliance(vec![ComplianceResult {
            detail: detail(4, "100 м"),
            actual_value: "95 ₽\nза метр".to_string(),
            status: Status::PartialConformance,
            explanation: "Дешевле".to_string(),
            page_number: 3,
            best_document: Some("a.pdf".to_string()),
            comparisons: None,
        }]);

        let csv = to_csv(&rows, &labels).unwrap();
        assert!(csv.starts_with("\u{feff}ID,Параметр,Требование,Источник,Примечания,Лучший документ,Факт. значение,Итог,"));
        assert!(csv.ends_with(
            "4,Кабель,100 м,Строка 1,,a.pdf,\"95 ₽\nза метр\",Частичное соответствие,Дешевле\n"
        ));
    }

    #[test]
    fn test_export_reads_back_as_the_same_rows() {
        let source = vec![
            ComplianceResult {
                detail: RequirementDetail {
                    id: 7,
                    parameter: "Кабель, медный".to_string(),
                    requirement: "Сечение \"не менее\" 4 мм²".to_string(),
                    source: "Строка 7,\nлист 2".to_string(),
                    notes: "\"\"".to_string(),
                },
                actual_value: "6 мм², \"ВВГнг\"".to_string(),
                status: Status::Conforms,
                explanation: "Первая строка\r\nвторая, с запятой".to_string(),
                page_number: 12,
                best_document: Some("КП \"Альфа\", ред. 2.pdf".to_string()),
                comparisons: None,
            },
            ComplianceResult {
                detail: detail(8, ""),
                actual_value: String::new(),
                status: Status::NotFound,
                explanation: ",".to_string(),
                page_number: 0,
                best_document: None,
                comparisons: None,
            },
        ];

        let csv = to_csv(&ResultSet::Compliance(source.clone()), &ColumnLabels::default()).unwrap();
        let body = csv.strip_prefix(UTF8_BOM).unwrap();
        let mut reader = csv::ReaderBuilder::new().from_reader(body.as_bytes());

        let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        let labels = ColumnLabels::default();
        let expected_header: Vec<&str> = export_columns().into_iter().map(|f| labels.get(f)).collect();
        assert_eq!(header, expected_header);

        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), source.len());
        for (record, row) in records.iter().zip(&source) {
            let expected = [
                row.detail.id.to_string(),
                row.detail.parameter.clone(),
                row.detail.requirement.clone(),
                row.detail.source.clone(),
                row.detail.notes.clone(),
                row.best_document.clone().unwrap_or_default(),
                row.actual_value.clone(),
                row.status.as_str().to_string(),
                row.explanation.clone(),
            ];
            assert_eq!(record.iter().collect::<Vec<_>>(), expected.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_labels_serialize_by_field_name() {
        let value = serde_json::to_value(ColumnLabels::default()).unwrap();
        assert_eq!(value["bestDocument"], "Лучший документ");
        assert_eq!(value["pageNumber"], "Стр.");
    }
}
