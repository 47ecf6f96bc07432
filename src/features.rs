use crate::models::RawRecord;

pub const PARENTS_EDUCATION_DIFF: &str = "Parents_education_diff";
pub const FINANCIAL_BURDEN: &str = "Financial_burden";
pub const ACADEMIC_BACKGROUND: &str = "Academic_background";

/// A field computed from other raw fields.
pub struct DerivedField {
    pub name: &'static str,
    pub inputs: &'static [&'static str],
    compute: fn(&[f64]) -> f64,
}

static DERIVED_FIELDS: [DerivedField; 3] = [
    DerivedField {
        name: PARENTS_EDUCATION_DIFF,
        inputs: &["Mothers_qualification", "Fathers_qualification"],
        compute: absolute_difference,
    },
    DerivedField {
        name: FINANCIAL_BURDEN,
        inputs: &["Debtor", "Tuition_fees_up_to_date"],
        compute: sum,
    },
    DerivedField {
        name: ACADEMIC_BACKGROUND,
        inputs: &["Previous_qualification_grade", "Admission_grade"],
        compute: mean,
    },
];

fn absolute_difference(v: &[f64]) -> f64 {
    (v[0] - v[1]).abs()
}

fn sum(v: &[f64]) -> f64 {
    v.iter().sum()
}

fn mean(v: &[f64]) -> f64 {
    sum(v) / v.len() as f64
}

pub fn derived_fields() -> &'static [DerivedField] {
    &DERIVED_FIELDS
}

impl DerivedField {
    /// Value for `record`, or `None` when one of the inputs is absent.
    pub fn evaluate(&self, record: &RawRecord) -> Option<f64> {
        let values: Option<Vec<f64>> = self.inputs.iter().map(|name| record.get(name)).collect();
        values.map(|v| (self.compute)(&v))
    }

    pub fn derivable_from(&self, mut has: impl FnMut(&str) -> bool) -> bool {
        self.inputs.iter().all(|name| has(name))
    }
}

/// Adds the derived fields to `record`, replacing any existing values of the
/// same name. A derived field whose inputs are not all present is left as is.
pub fn engineer(record: &mut RawRecord) {
    for field in derived_fields() {
        if let Some(value) = field.evaluate(record) {
            record.insert(field.name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, f64)]) -> RawRecord {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn parents_education_diff_is_absolute() {
        let mut r = record(&[("Mothers_qualification", 10.0), ("Fathers_qualification", 4.0)]);
        engineer(&mut r);
        assert_eq!(r.get(PARENTS_EDUCATION_DIFF), Some(6.0));

        let mut r = record(&[("Mothers_qualification", 4.0), ("Fathers_qualification", 10.0)]);
        engineer(&mut r);
        assert_eq!(r.get(PARENTS_EDUCATION_DIFF), Some(6.0));
    }

    #[test]
    fn financial_burden_sums_flags() {
        let mut r = record(&[("Debtor", 1.0), ("Tuition_fees_up_to_date", 0.0)]);
        engineer(&mut r);
        assert_eq!(r.get(FINANCIAL_BURDEN), Some(1.0));

        let mut r = record(&[("Debtor", 1.0), ("Tuition_fees_up_to_date", 1.0)]);
        engineer(&mut r);
        assert_eq!(r.get(FINANCIAL_BURDEN), Some(2.0));
    }

    #[test]
    fn academic_background_averages_grades() {
        let mut r = record(&[
            ("Previous_qualification_grade", 120.0),
            ("Admission_grade", 130.0),
        ]);
        engineer(&mut r);
        assert_eq!(r.get(ACADEMIC_BACKGROUND), Some(125.0));
    }

    #[test]
    fn derived_values_overwrite_supplied_ones() {
        let mut r = record(&[
            ("Debtor", 0.0),
            ("Tuition_fees_up_to_date", 1.0),
            (FINANCIAL_BURDEN, 9.0),
        ]);
        engineer(&mut r);
        assert_eq!(r.get(FINANCIAL_BURDEN), Some(1.0));
    }

    #[test]
    fn missing_inputs_leave_field_untouched() {
        let mut r = record(&[("Debtor", 1.0)]);
        engineer(&mut r);
        assert!(!r.contains(FINANCIAL_BURDEN));
        assert!(!r.contains(PARENTS_EDUCATION_DIFF));
    }

    #[test]
    fn engineering_is_deterministic() {
        let base = record(&[
            ("Mothers_qualification", 19.0),
            ("Fathers_qualification", 37.0),
            ("Debtor", 0.0),
            ("Tuition_fees_up_to_date", 1.0),
            ("Previous_qualification_grade", 133.1),
            ("Admission_grade", 127.3),
        ]);
        let mut first = base.clone();
        let mut second = base.clone();
        engineer(&mut first);
        engineer(&mut second);
        engineer(&mut second);
        assert_eq!(first, second);
    }
}
