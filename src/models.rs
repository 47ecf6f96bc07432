use std::collections::BTreeMap;
use std::fmt;

/// One student as a bag of named numeric fields. Category codes are stored
/// as plain numbers; nothing here checks value ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, f64>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.fields.insert(name.into(), value);
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Outcome classes the model is expected to predict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Dropout,
    Graduate,
    Enrolled,
    Unknown(String),
}

impl Status {
    /// Position order used when the model does not publish its classes.
    pub const FALLBACK_ORDER: [&'static str; 3] = ["Dropout", "Graduate", "Enrolled"];

    pub fn from_label(label: &str) -> Self {
        match label {
            "Dropout" => Status::Dropout,
            "Graduate" => Status::Graduate,
            "Enrolled" => Status::Enrolled,
            other => Status::Unknown(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Status::Unknown(_))
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Status::Dropout => "[!]",
            Status::Graduate => "[+]",
            Status::Enrolled => "[~]",
            Status::Unknown(_) => "[?]",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Dropout => write!(f, "Dropout"),
            Status::Graduate => write!(f, "Graduate"),
            Status::Enrolled => write!(f, "Enrolled"),
            Status::Unknown(_) => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Label exactly as the model produced it.
    pub label: String,
    pub status: Status,
    /// `(class label, probability)` in the model's class order.
    pub probabilities: Vec<(String, f64)>,
    pub confidence: f64,
}

impl Prediction {
    pub fn probability_of(&self, class: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(label, _)| label == class)
            .map(|(_, p)| *p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub label: String,
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub classes: Vec<ClassSummary>,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_closed_label_set() {
        assert_eq!(Status::from_label("Dropout"), Status::Dropout);
        assert_eq!(Status::from_label("Graduate"), Status::Graduate);
        assert_eq!(Status::from_label("Enrolled"), Status::Enrolled);
        let other = Status::from_label("Transferred");
        assert!(!other.is_known());
        assert_eq!(other.to_string(), "unknown");
    }

    #[test]
    fn record_collects_from_pairs() {
        let record: RawRecord = [("GDP", 1.5), ("Debtor", 0.0)].into_iter().collect();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("GDP"), Some(1.5));
        assert!(!record.contains("Course"));
    }
}
