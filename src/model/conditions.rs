//! Commercial condition topics checked for every supplier offer

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `source` value marking requirement rows injected by the service
pub const SYSTEM_SOURCE: &str = "Системная проверка";

/// `notes` value of injected requirement rows
pub const SYSTEM_NOTES: &str = "Добавлено автоматически для анализа условий";

/// Placeholder shown when a document does not state a value
pub const NOT_STATED: &str = "Не указано в документе";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConditionTopic {
    DeliveryTerms,
    DeliveryDeadline,
    PaymentTerms,
}

impl ConditionTopic {
    pub const ALL: [ConditionTopic; 3] = [
        ConditionTopic::DeliveryTerms,
        ConditionTopic::DeliveryDeadline,
        ConditionTopic::PaymentTerms,
    ];

    /// Parameter name of the injected row, also the display title
    pub fn title(&self) -> &'static str {
        match self {
            ConditionTopic::DeliveryTerms => "Условия поставки",
            ConditionTopic::DeliveryDeadline => "Срок поставки",
            ConditionTopic::PaymentTerms => "Условия оплаты",
        }
    }

    /// Instruction placed in the `requirement` field of the injected row
    pub fn instruction(&self) -> &'static str {
        match self {
            ConditionTopic::DeliveryTerms => {
                "Определите условия поставки из каждого коммерческого предложения. Сохраните формулировку дословно."
            }
            ConditionTopic::DeliveryDeadline => {
                "Определите сроки поставки (конкретные даты, диапазоны или SLA) из каждого коммерческого предложения. Сохраните формулировку дословно."
            }
            ConditionTopic::PaymentTerms => {
                "Определите условия оплаты (предоплата, отсрочка, проценты) из каждого коммерческого предложения. Сохраните формулировку дословно."
            }
        }
    }

    /// Lowercase stems that mark a requirement as covering this topic
    pub fn match_tokens(&self) -> &'static [&'static str] {
        match self {
            ConditionTopic::DeliveryTerms => &["условия поставк"],
            ConditionTopic::DeliveryDeadline => &["срок поставк", "срок достав"],
            ConditionTopic::PaymentTerms => &["условия оплат", "оплат"],
        }
    }

    /// Narrower phrases used to pick the highlighted result for the topic
    pub fn highlight_keywords(&self) -> &'static [&'static str] {
        match self {
            ConditionTopic::DeliveryTerms => &["условия поставки"],
            ConditionTopic::DeliveryDeadline => &["срок поставки"],
            ConditionTopic::PaymentTerms => &["условия оплаты"],
        }
    }

    /// Whether any of the texts contains one of the topic's match tokens
    pub fn matches(&self, texts: &[&str]) -> bool {
        contains_any(texts, self.match_tokens())
    }

    /// First topic whose match tokens appear in the texts
    pub fn classify(texts: &[&str]) -> Option<ConditionTopic> {
        Self::ALL.into_iter().find(|topic| topic.matches(texts))
    }
}

/// Case-insensitive substring test of any keyword against any text
pub fn contains_any(texts: &[&str], keywords: &[&str]) -> bool {
    texts.iter().any(|text| {
        let lowered = text.to_lowercase();
        keywords.iter().any(|keyword| lowered.contains(keyword))
    })
}

/// Whether a `source` value carries the injected-row sentinel
pub fn is_system_source(source: &str) -> bool {
    source.trim() == SYSTEM_SOURCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(ConditionTopic::DeliveryTerms.matches(&["УСЛОВИЯ ПОСТАВКИ: DDP"]));
        assert!(ConditionTopic::DeliveryDeadline.matches(&["", "Срок доставки 10 дней"]));
        assert!(!ConditionTopic::DeliveryDeadline.matches(&["Цена", "100 руб"]));
    }

    #[test]
    fn test_injected_titles_match_their_own_topic() {
        for topic in ConditionTopic::ALL {
            assert_eq!(ConditionTopic::classify(&[topic.title()]), Some(topic));
        }
    }

    #[test]
    fn test_payment_stem_is_broad() {
        assert_eq!(
            ConditionTopic::classify(&["Оплата по факту"]),
            Some(ConditionTopic::PaymentTerms)
        );
    }

    #[test]
    fn test_system_source_is_trimmed() {
        assert!(is_system_source(" Системная проверка "));
        assert!(!is_system_source("Строка 4"));
    }
}
