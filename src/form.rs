use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::models::RawRecord;

/// One input of the single-student form with its default and accepted range.
#[derive(Debug, Clone, Copy)]
pub struct FormField {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub integer: bool,
}

const fn int(name: &'static str, default: f64, min: f64, max: f64) -> FormField {
    FormField {
        name,
        default,
        min,
        max,
        integer: true,
    }
}

const fn real(name: &'static str, default: f64, min: f64, max: f64) -> FormField {
    FormField {
        name,
        default,
        min,
        max,
        integer: false,
    }
}

pub const FORM_FIELDS: [FormField; 34] = [
    // demographic
    int("Marital_status", 1.0, 1.0, 6.0),
    int("Gender", 0.0, 0.0, 1.0),
    int("Age_at_enrollment", 20.0, 16.0, 70.0),
    int("Nationality", 1.0, 1.0, 100.0),
    int("International", 0.0, 0.0, 1.0),
    int("Displaced", 0.0, 0.0, 1.0),
    // academic and admission
    int("Course", 33.0, 1.0, 10000.0),
    int("Application_mode", 1.0, 1.0, 50.0),
    int("Application_order", 0.0, 0.0, 9.0),
    int("Daytime_evening_attendance", 0.0, 0.0, 1.0),
    int("Previous_qualification", 1.0, 1.0, 50.0),
    real("Previous_qualification_grade", 120.0, 0.0, 200.0),
    real("Admission_grade", 120.0, 0.0, 200.0),
    // family and economic
    int("Mothers_qualification", 1.0, 1.0, 50.0),
    int("Fathers_qualification", 1.0, 1.0, 50.0),
    int("Mothers_occupation", 1.0, 0.0, 200.0),
    int("Fathers_occupation", 1.0, 0.0, 200.0),
    int("Educational_special_needs", 0.0, 0.0, 1.0),
    int("Debtor", 0.0, 0.0, 1.0),
    int("Tuition_fees_up_to_date", 0.0, 0.0, 1.0),
    int("Scholarship_holder", 0.0, 0.0, 1.0),
    real("Unemployment_rate", 10.0, 0.0, 50.0),
    real("Inflation_rate", 2.0, -10.0, 20.0),
    real("GDP", 25000.0, 0.0, 100000.0),
    // curricular units
    int("Curricular_units_1st_sem_credited", 0.0, 0.0, 30.0),
    int("Curricular_units_1st_sem_enrolled", 6.0, 0.0, 30.0),
    int("Curricular_units_1st_sem_evaluations", 6.0, 0.0, 30.0),
    int("Curricular_units_1st_sem_approved", 6.0, 0.0, 30.0),
    real("Curricular_units_1st_sem_grade", 13.0, 0.0, 20.0),
    int("Curricular_units_2nd_sem_credited", 0.0, 0.0, 30.0),
    int("Curricular_units_2nd_sem_enrolled", 0.0, 0.0, 30.0),
    int("Curricular_units_2nd_sem_evaluations", 0.0, 0.0, 30.0),
    int("Curricular_units_2nd_sem_approved", 0.0, 0.0, 30.0),
    real("Curricular_units_2nd_sem_grade", 0.0, 0.0, 20.0),
];

fn field_index(name: &str) -> Option<usize> {
    FORM_FIELDS.iter().position(|f| f.name == name)
}

/// Single-student input. Starts from the form defaults; callers override
/// individual fields before validating.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentForm {
    values: Vec<f64>,
}

impl Default for StudentForm {
    fn default() -> Self {
        Self {
            values: FORM_FIELDS.iter().map(|f| f.default).collect(),
        }
    }
}

impl StudentForm {
    /// Defaults overlaid with a JSON object of `field: number` pairs.
    pub fn from_json(raw: &str) -> Result<Self> {
        let overrides: BTreeMap<String, f64> = serde_json::from_str(raw)?;
        let mut form = Self::default();
        for (name, value) in overrides {
            form.set(&name, value)?;
        }
        Ok(form)
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<f64> {
        field_index(name).map(|idx| self.values[idx])
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let idx = field_index(name)
            .ok_or_else(|| PipelineError::InvalidForm(vec![format!("unknown field {name}")]))?;
        self.values[idx] = value;
        Ok(())
    }

    /// Applies a `Name=value` assignment.
    pub fn apply(&mut self, assignment: &str) -> Result<()> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            PipelineError::InvalidForm(vec![format!("expected Name=value, got {assignment:?}")])
        })?;
        let value: f64 = value.trim().parse().map_err(|_| {
            PipelineError::InvalidForm(vec![format!("{} is not a number: {value:?}", name.trim())])
        })?;
        self.set(name.trim(), value)
    }

    /// Checks every field against its range, reporting all violations.
    pub fn validate(&self) -> Result<()> {
        let problems: Vec<String> = FORM_FIELDS
            .iter()
            .zip(&self.values)
            .filter_map(|(field, &value)| {
                if !value.is_finite() || value < field.min || value > field.max {
                    Some(format!(
                        "{} must be between {} and {}, got {value}",
                        field.name, field.min, field.max
                    ))
                } else if field.integer && value.fract() != 0.0 {
                    Some(format!("{} must be a whole number, got {value}", field.name))
                } else {
                    None
                }
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidForm(problems))
        }
    }

    pub fn to_record(&self) -> RawRecord {
        FORM_FIELDS
            .iter()
            .zip(&self.values)
            .map(|(field, value)| (field.name, *value))
            .collect()
    }
}
