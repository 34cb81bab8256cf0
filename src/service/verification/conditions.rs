//! Commercial condition rows: injection before verification and separation after it

use crate::model::conditions::is_system_source;
use crate::model::requirements::next_row_id;
use crate::model::{ComplianceResult, ConditionTopic, RequirementDetail, SYSTEM_NOTES, SYSTEM_SOURCE};

/// Extend the requirements with one row per condition topic nobody asked about.
///
/// A topic counts as covered when any requirement mentions one of its stems in
/// `parameter` or `requirement`. New rows take ids after the current maximum,
/// in topic order. Applying this to its own output adds nothing.
pub fn inject_condition_targets(requirements: &[RequirementDetail]) -> Vec<RequirementDetail> {
    let mut ids: Vec<i64> = requirements.iter().map(|r| r.id).collect();
    let mut extended = requirements.to_vec();

    for topic in ConditionTopic::ALL {
        let covered = requirements
            .iter()
            .any(|r| topic.matches(&[r.parameter.as_str(), r.requirement.as_str()]));
        if covered {
            continue;
        }

        let id = next_row_id(&ids).max(1);
        ids.push(id);
        extended.push(RequirementDetail {
            id,
            parameter: topic.title().to_string(),
            requirement: topic.instruction().to_string(),
            source: SYSTEM_SOURCE.to_string(),
            notes: SYSTEM_NOTES.to_string(),
        });
    }

    extended
}

/// Verification rows separated into condition rows and requirement rows
#[derive(Debug, Default)]
pub struct ConditionSplit {
    pub conditions: Vec<ComplianceResult>,
    pub primary: Vec<ComplianceResult>,
    pub warnings: Vec<String>,
}

/// Separate the rows produced for injected condition targets.
///
/// The model is asked to echo `source` unchanged, but that is not guaranteed:
/// a row whose id and parameter both match an injected target is treated as a
/// condition row even when its `source` came back altered.
pub fn split_condition_rows(
    rows: Vec<ComplianceResult>,
    injected: &[RequirementDetail],
) -> ConditionSplit {
    let mut split = ConditionSplit::default();

    for row in rows {
        if is_system_source(&row.detail.source) {
            split.conditions.push(row);
            continue;
        }

        let echoes_injected = injected.iter().any(|target| {
            target.id == row.detail.id && target.parameter.trim() == row.detail.parameter.trim()
        });
        if echoes_injected {
            tracing::warn!(
                id = row.detail.id,
                parameter = %row.detail.parameter,
                source = %row.detail.source,
                "Injected condition row came back with an altered source"
            );
            split.warnings.push(format!(
                "Row {} ('{}') was added for condition analysis but its source was changed to '{}'",
                row.detail.id, row.detail.parameter, row.detail.source
            ));
            split.conditions.push(row);
            continue;
        }

        split.primary.push(row);
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    fn requirement(id: i64, parameter: &str, requirement: &str) -> RequirementDetail {
        RequirementDetail {
            id,
            parameter: parameter.to_string(),
            requirement: requirement.to_string(),
            source: format!("Строка {id}"),
            notes: String::new(),
        }
    }

    fn result(id: i64, parameter: &str, source: &str) -> ComplianceResult {
        ComplianceResult {
            detail: RequirementDetail {
                id,
                parameter: parameter.to_string(),
                requirement: String::new(),
                source: source.to_string(),
                notes: String::new(),
            },
            actual_value: String::new(),
            status: Status::Conforms,
            explanation: String::new(),
            page_number: 1,
            best_document: None,
            comparisons: None,
        }
    }

    #[test]
    fn test_unrelated_requirements_get_all_three_topics() {
        let requirements = vec![requirement(1, "Кабель", "100 м"), requirement(4, "Муфта", "2 шт")];
        let extended = inject_condition_targets(&requirements);

        assert_eq!(extended.len(), 5);
        let added: Vec<(i64, &str)> = extended[2..]
            .iter()
            .map(|r| (r.id, r.parameter.as_str()))
            .collect();
        assert_eq!(
            added,
            vec![(5, "Условия поставки"), (6, "Срок поставки"), (7, "Условия оплаты")]
        );
        assert!(extended[2..].iter().all(|r| r.source == SYSTEM_SOURCE && r.notes == SYSTEM_NOTES));
    }

    #[test]
    fn test_injected_ids_stay_unique_at_the_top_of_the_range() {
        let requirements = vec![requirement(i64::MAX, "Кабель", "100 м"), requirement(2, "Муфта", "2 шт")];
        let extended = inject_condition_targets(&requirements);

        let ids: Vec<i64> = extended[2..].iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_negative_ids_start_injection_at_one() {
        let requirements = vec![requirement(-3, "Кабель", "100 м")];
        let extended = inject_condition_targets(&requirements);
        assert_eq!(extended[1].id, 1);
        assert_eq!(extended[2].id, 2);
    }

    #[test]
    fn test_existing_topic_suppresses_its_injection() {
        let requirements = vec![requirement(1, "Прочее", "Условия поставки: DDP Москва")];
        let extended = inject_condition_targets(&requirements);

        let titles: Vec<&str> = extended[1..].iter().map(|r| r.parameter.as_str()).collect();
        assert_eq!(titles, vec!["Срок поставки", "Условия оплаты"]);
        assert_eq!(extended[1].id, 2);
    }

    #[test]
    fn test_payment_stem_covers_payment_topic() {
        let requirements = vec![requirement(1, "Предоплата", "Оплата 30% авансом")];
        let extended = inject_condition_targets(&requirements);
        assert!(!extended.iter().any(|r| r.parameter == "Условия оплаты"));
    }

    #[test]
    fn test_injection_is_idempotent() {
        let requirements = vec![requirement(1, "Кабель", "100 м")];
        let once = inject_condition_targets(&requirements);
        let twice = inject_condition_targets(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_requirements_start_at_one() {
        let extended = inject_condition_targets(&[]);
        assert_eq!(extended.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_split_by_sentinel_source() {
        let rows = vec![
            result(1, "Кабель", "Строка 1"),
            result(2, "Условия поставки", SYSTEM_SOURCE),
            result(3, "Муфта", "Строка 3"),
        ];
        let split = split_condition_rows(rows, &[]);

        assert_eq!(split.conditions.len(), 1);
        assert_eq!(split.conditions[0].detail.id, 2);
        assert_eq!(
            split.primary.iter().map(|r| r.detail.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(split.warnings.is_empty());
    }

    #[test]
    fn test_altered_sentinel_still_classified_as_condition() {
        let extended = inject_condition_targets(&[requirement(1, "Кабель", "100 м")]);
        let injected = &extended[1..];
        assert_eq!(injected.len(), 3);

        let rows = vec![
            result(1, "Кабель", "Строка 1"),
            result(2, "Условия поставки", "Коммерческое предложение, стр. 2"),
            result(3, "Срок поставки", SYSTEM_SOURCE),
        ];
        let split = split_condition_rows(rows, injected);

        assert_eq!(split.conditions.len(), 2);
        assert_eq!(split.primary.len(), 1);
        assert_eq!(split.warnings.len(), 1);
        assert!(split.warnings[0].contains("Условия поставки"));
    }

    #[test]
    fn test_same_id_different_parameter_stays_primary() {
        let extended = inject_condition_targets(&[requirement(1, "Кабель", "")]);
        let split = split_condition_rows(vec![result(2, "Кабель", "Строка 2")], &extended[1..]);
        assert_eq!(split.primary.len(), 1);
        assert!(split.conditions.is_empty());
    }
}
