/// Applicant validation and phone normalization
///
/// Rules are checked in a fixed order (name, phone, id, loan type) and the
/// first failure is reported on its own. Nothing here touches storage.
use crate::models::{ApplicantProfile, LoanType, RawProfile};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s.'-]+$").expect("name pattern compiles"));

// Kenyan mobile: +254 / 254 / 0, then network digit 7 or 1, then 8 digits.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+?254|0)[17][0-9]{8}$").expect("phone pattern compiles")
});

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{7,10}$").expect("id pattern compiles"));

/// Profile field a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    PhoneNumber,
    IdNumber,
    LoanType,
}

/// First rule an applicant profile violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Field the failing rule checks.
    pub field: ProfileField,
    /// User-facing message, surfaced verbatim.
    pub message: &'static str,
}

impl ValidationError {
    fn new(field: ProfileField, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a candidate profile.
///
/// Missing fields are treated as empty strings. Name, phone and id are
/// trimmed before checking and the trimmed values are what the returned
/// profile carries.
pub fn validate(candidate: &RawProfile) -> Result<ApplicantProfile, ValidationError> {
    let name = validate_name(candidate.name.as_deref().unwrap_or_default())?;
    let phone_number = validate_phone(candidate.phone_number.as_deref().unwrap_or_default())?;
    let id_number = validate_id_number(candidate.id_number.as_deref().unwrap_or_default())?;
    let loan_type = validate_loan_type(candidate.loan_type.as_deref().unwrap_or_default())?;

    Ok(ApplicantProfile {
        name,
        phone_number,
        id_number,
        loan_type,
    })
}

fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    let len = name.chars().count();

    if len < NAME_MIN_CHARS {
        return Err(ValidationError::new(
            ProfileField::Name,
            "Name must be at least 2 characters",
        ));
    }
    if len > NAME_MAX_CHARS {
        return Err(ValidationError::new(
            ProfileField::Name,
            "Name must be less than 100 characters",
        ));
    }
    if !NAME_RE.is_match(name) {
        return Err(ValidationError::new(
            ProfileField::Name,
            "Name can only contain letters, spaces, dots, apostrophes and hyphens",
        ));
    }

    Ok(name.to_string())
}

fn validate_phone(raw: &str) -> Result<String, ValidationError> {
    let phone = raw.trim();
    if !PHONE_RE.is_match(phone) {
        return Err(ValidationError::new(
            ProfileField::PhoneNumber,
            "Please enter a valid Safaricom number (07XXXXXXXX or +254...)",
        ));
    }
    Ok(phone.to_string())
}

fn validate_id_number(raw: &str) -> Result<String, ValidationError> {
    let id = raw.trim();
    if !ID_RE.is_match(id) {
        return Err(ValidationError::new(
            ProfileField::IdNumber,
            "Please enter a valid Kenyan ID (7-10 digits)",
        ));
    }
    Ok(id.to_string())
}

fn validate_loan_type(raw: &str) -> Result<LoanType, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::new(
            ProfileField::LoanType,
            "Please select a loan type",
        ));
    }
    LoanType::parse(value).ok_or_else(|| {
        ValidationError::new(ProfileField::LoanType, "Please select a valid loan type")
    })
}

/// Normalize a phone number for payment requests.
///
/// Strips every non-digit, then:
/// - a leading `0` becomes `254`
/// - a bare subscriber number starting with `7` or `1` gets `254` prepended
/// - anything else is returned as-is
///
/// Idempotent: a rewritten number starts with `254`, which passes through
/// unchanged on a second call.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(rest) = digits.strip_prefix('0') {
        format!("254{}", rest)
    } else if digits.starts_with('7') || digits.starts_with('1') {
        format!("254{}", digits)
    } else {
        digits
    }
}

/// Mask a phone number for logs, keeping the last three digits.
pub fn mask_phone(phone: &str) -> String {
    let count = phone.chars().count();
    if count <= 3 {
        return "*".repeat(count);
    }
    let visible: String = phone.chars().skip(count - 3).collect();
    format!("{}{}", "*".repeat(count - 3), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, phone: &str, id: &str, loan_type: &str) -> RawProfile {
        RawProfile {
            name: Some(name.to_string()),
            phone_number: Some(phone.to_string()),
            id_number: Some(id.to_string()),
            loan_type: Some(loan_type.to_string()),
        }
    }

    #[test]
    fn test_valid_profile_is_trimmed() {
        let profile = validate(&candidate("  Jane Doe ", " 0712345678 ", " 12345678", "personal"))
            .unwrap();
        assert_eq!(profile.name, "Jane Doe");
        assert_eq!(profile.phone_number, "0712345678");
        assert_eq!(profile.id_number, "12345678");
        assert_eq!(profile.loan_type, LoanType::Personal);
    }

    #[test]
    fn test_name_length_checked_before_charset() {
        let err = validate(&candidate("1", "0712345678", "12345678", "personal")).unwrap_err();
        assert_eq!(err.message, "Name must be at least 2 characters");
    }

    #[test]
    fn test_name_boundaries() {
        let exactly_max = "a".repeat(100);
        assert!(validate(&candidate(&exactly_max, "0712345678", "1234567", "medical")).is_ok());

        let too_long = "a".repeat(101);
        let err = validate(&candidate(&too_long, "0712345678", "1234567", "medical")).unwrap_err();
        assert_eq!(err.message, "Name must be less than 100 characters");
    }

    #[test]
    fn test_name_allows_punctuation() {
        assert!(validate(&candidate("Mary-Jane O'Neil Jr.", "0112345678", "1234567", "business"))
            .is_ok());
    }

    #[test]
    fn test_loan_type_unknown() {
        let err = validate(&candidate("Jane Doe", "0712345678", "12345678", "holiday")).unwrap_err();
        assert_eq!(err.field, ProfileField::LoanType);
        assert_eq!(err.message, "Please select a valid loan type");
    }

    #[test]
    fn test_missing_fields_report_name_first() {
        let err = validate(&RawProfile::default()).unwrap_err();
        assert_eq!(err.field, ProfileField::Name);
    }

    #[test]
    fn test_id_rejects_non_ascii_digits() {
        let err = validate(&candidate("Jane Doe", "0712345678", "١٢٣٤٥٦٧٨", "personal")).unwrap_err();
        assert_eq!(err.field, ProfileField::IdNumber);
    }

    #[test]
    fn test_normalize_strips_formatting() {
        assert_eq!(normalize_phone("+254 712-345-678"), "254712345678");
        assert_eq!(normalize_phone("0112 345 678"), "254112345678");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("254712345678"), "*********678");
        assert_eq!(mask_phone("12"), "**");
    }
}
