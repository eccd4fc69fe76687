// validation/mod.rs - Request payload validation
//
// Each request DTO implements `Validate` and reports every failing field at
// once.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::config;

/// Field name -> first failure message
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; the first message for a field wins
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }

    /// Ok(()) when nothing failed
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    // === Rules ===

    pub fn required_text(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.add(field, "This field is required");
        } else if len < min {
            self.add(field, format!("Must be at least {} characters", min));
        } else if len > max {
            self.add(field, format!("Must be at most {} characters", max));
        }
    }

    pub fn optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            if v.trim().chars().count() > max {
                self.add(field, format!("Must be at most {} characters", max));
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if let Err(msg) = validate_email_format(value) {
            self.add(field, msg);
        }
    }

    pub fn phone(&mut self, field: &str, value: &str) {
        if let Err(msg) = validate_phone_format(value) {
            self.add(field, msg);
        }
    }

    pub fn positive_decimal(&mut self, field: &str, value: Decimal) {
        if value <= Decimal::ZERO {
            self.add(field, "Must be greater than zero");
        } else if value.normalize().scale() > 2 {
            self.add(field, "At most two decimal places are allowed");
        }
    }

    pub fn int_range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.add(field, format!("Must be between {} and {}", min, max));
        }
    }

    /// Every entry must be a URL returned by the upload endpoint
    pub fn upload_paths(&mut self, field: &str, values: &[String], max_items: usize) {
        if values.len() > max_items {
            self.add(field, format!("At most {} files are allowed", max_items));
            return;
        }
        let prefix = &config::config().uploads.public_prefix;
        if values.iter().any(|v| !is_upload_path(v, prefix)) {
            self.add(field, format!("Files must be uploaded first and referenced by their {} path", prefix));
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Implemented by request payloads
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Basic email validation for registration and seller profiles
pub fn validate_email_format(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err("Invalid email format".to_string()),
    };

    if local.is_empty() || domain.len() < 3 || !domain.contains('.') {
        return Err("Invalid email format".to_string());
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Phone numbers: optional leading '+', then 10-15 digits (spaces and dashes ignored)
pub fn validate_phone_format(phone: &str) -> Result<(), String> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' => {}
            _ => return Err("Phone number may only contain digits, spaces and dashes".to_string()),
        }
    }
    if !(10..=15).contains(&digits) {
        return Err("Phone number must have 10 to 15 digits".to_string());
    }
    Ok(())
}

/// Digits only, as used by wa.me links
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn is_upload_path(value: &str, prefix: &str) -> bool {
    match value.strip_prefix(prefix) {
        Some(name) => {
            !name.is_empty()
                && !name.contains("..")
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_rules() {
        assert!(validate_email_format("major.singh@example.in").is_ok());
        assert!(validate_email_format("").is_err());
        assert!(validate_email_format("no-at-sign.com").is_err());
        assert!(validate_email_format("two@@example.com").is_err());
        assert!(validate_email_format("a@b").is_err());
        assert!(validate_email_format("a@.example.com").is_err());
        assert!(validate_email_format("with space@example.com").is_err());
    }

    #[test]
    fn phone_rules() {
        assert!(validate_phone_format("+91 98765 43210").is_ok());
        assert!(validate_phone_format("9876543210").is_ok());
        assert!(validate_phone_format("12345").is_err());
        assert!(validate_phone_format("98765abc10").is_err());
        assert_eq!(phone_digits("+91 98765-43210"), "919876543210");
    }

    #[test]
    fn collects_every_failure() {
        let mut errors = ValidationErrors::new();
        errors.required_text("name", "  ", 2, 50);
        errors.email("email", "nope");
        errors.positive_decimal("price", Decimal::ZERO);
        errors.int_range("stock", -1, 0, 100_000);

        assert!(errors.contains("name"));
        assert!(errors.contains("email"));
        assert!(errors.contains("price"));
        assert!(errors.contains("stock"));
        assert!(errors.finish().is_err());
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "first");
        errors.add("name", "second");
        assert_eq!(errors.get("name"), Some("first"));
    }

    #[test]
    fn decimal_scale_is_limited() {
        let mut errors = ValidationErrors::new();
        errors.positive_decimal("price", Decimal::new(19999, 3));
        assert!(errors.contains("price"));

        let mut ok = ValidationErrors::new();
        ok.positive_decimal("price", Decimal::new(19999, 2));
        assert!(ok.is_empty());
    }

    #[test]
    fn upload_paths_must_come_from_uploads() {
        let mut errors = ValidationErrors::new();
        errors.upload_paths("images", &["/uploads/abc-123.png".to_string()], 5);
        assert!(errors.is_empty());

        errors.upload_paths("images", &["https://evil.example/x.png".to_string()], 5);
        assert!(errors.contains("images"));

        let mut traversal = ValidationErrors::new();
        traversal.upload_paths("docs", &["/uploads/../secret".to_string()], 5);
        assert!(traversal.contains("docs"));
    }
}
