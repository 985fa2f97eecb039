//! Declarative request validation.
//!
//! Payload types implement [`Validate`] by chaining rules on a [`Validator`].
//! Rules that need the database (uniqueness, referenced rows) are checked by the
//! caller and pushed into the same [`ValidationErrors`] so the client always
//! receives one `field -> [messages]` map.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// First message overall, used as the envelope's `message`
    pub fn summary(&self) -> String {
        self.0
            .values()
            .flat_map(|messages| messages.first())
            .next()
            .cloned()
            .unwrap_or_else(|| "The given data was invalid.".to_string())
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.add(field, message);
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, format!("The {field} field is required."));
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.add(field, format!("The {field} may not be greater than {max} characters."));
        }
        self
    }

    pub fn max_len_opt(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(value) = value {
            self.max_len(field, value, max);
        }
        self
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.chars().count() < min {
            self.add(field, format!("The {field} must be at least {min} characters."));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !EMAIL_RE.is_match(value.trim()) {
            self.add(field, format!("The {field} must be a valid email address."));
        }
        self
    }

    /// Exactly `len` ASCII digits (DNI, RUC).
    pub fn digits(&mut self, field: &str, value: &str, len: usize) -> &mut Self {
        if value.len() != len || !value.bytes().all(|b| b.is_ascii_digit()) {
            self.add(field, format!("The {field} must be {len} digits."));
        }
        self
    }

    pub fn positive(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value <= 0.0 {
            self.add(field, format!("The {field} must be greater than 0."));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value < 0.0 {
            self.add(field, format!("The {field} must be at least 0."));
        }
        self
    }

    pub fn between(&mut self, field: &str, value: f64, min: f64, max: f64) -> &mut Self {
        if !value.is_finite() || value < min || value > max {
            self.add(field, format!("The {field} must be between {min} and {max}."));
        }
        self
    }

    /// `end` must not be before `start` when both are present.
    pub fn date_order(
        &mut self,
        start: Option<NaiveDate>,
        end_field: &str,
        end: Option<NaiveDate>,
    ) -> &mut Self {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                self.add(end_field, format!("The {end_field} must be a date after or equal to the start date."));
            }
        }
        self
    }

    pub fn not_empty<T>(&mut self, field: &str, items: &[T]) -> &mut Self {
        if items.is_empty() {
            self.add(field, format!("The {field} must have at least 1 item."));
        }
        self
    }

    /// Validate one element of a list payload, prefixing its field names (`items.0.quantity`).
    pub fn nested(&mut self, prefix: &str, index: usize, result: Result<(), ValidationErrors>) -> &mut Self {
        if let Err(errors) = result {
            for (field, messages) in errors.0 {
                for message in messages {
                    self.errors.add(&format!("{prefix}.{index}.{field}"), message);
                }
            }
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), ValidationErrors> {
        std::mem::take(&mut self.errors).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failing_rule() {
        let mut v = Validator::new();
        v.required("name", "  ")
            .max_len("code", "ABCDEFG", 3)
            .email("email", "not-an-email")
            .digits("ruc", "2055", 11);
        let errors = v.finish().unwrap_err();
        let fields: Vec<_> = errors.fields().keys().cloned().collect();
        assert_eq!(fields, vec!["code", "email", "name", "ruc"]);
        assert_eq!(errors.fields()["name"], vec!["The name field is required."]);
    }

    #[test]
    fn passing_rules_finish_ok() {
        let mut v = Validator::new();
        v.required("name", "Cemento")
            .email("email", "jefe@obra.pe")
            .digits("dni", "45781236", 8)
            .positive("quantity", 2.5)
            .non_negative("unit_price", 0.0);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn date_order_flags_end_before_start() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 10);
        let end = NaiveDate::from_ymd_opt(2025, 3, 1);
        let mut v = Validator::new();
        v.date_order(start, "end_date", end);
        assert!(v.finish().unwrap_err().fields().contains_key("end_date"));
    }

    #[test]
    fn nested_errors_are_prefixed() {
        let mut v = Validator::new();
        v.nested("items", 2, Err(ValidationErrors::single("quantity", "bad")));
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.fields()["items.2.quantity"], vec!["bad"]);
    }

    #[test]
    fn summary_is_first_message() {
        let mut errors = ValidationErrors::single("name", "The name has already been taken.");
        errors.add("name", "second");
        assert_eq!(errors.to_string(), "The name has already been taken.");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({"name": ["The name has already been taken.", "second"]})
        );
    }
}
