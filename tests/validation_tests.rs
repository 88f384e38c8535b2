use rust_loan_funnel::catalog::{format_ksh, total_repayment, LoanCatalog};
use rust_loan_funnel::models::{LoanType, RawProfile};
use rust_loan_funnel::validation::{mask_phone, normalize_phone, validate, ProfileField};

fn raw(name: &str, phone: &str, id: &str, loan_type: &str) -> RawProfile {
    RawProfile {
        name: Some(name.to_string()),
        phone_number: Some(phone.to_string()),
        id_number: Some(id.to_string()),
        loan_type: Some(loan_type.to_string()),
    }
}

#[test]
fn test_valid_profile_is_accepted() {
    let profile = validate(&raw("Jane Doe", "0712345678", "12345678", "personal")).unwrap();
    assert_eq!(profile.name, "Jane Doe");
    assert_eq!(profile.loan_type, LoanType::Personal);
}

#[test]
fn test_short_phone_is_rejected() {
    let err = validate(&raw("Jane Doe", "123", "12345678", "personal")).unwrap_err();
    assert_eq!(err.field, ProfileField::PhoneNumber);
    assert_eq!(
        err.to_string(),
        "Please enter a valid Safaricom number (07XXXXXXXX or +254...)"
    );
}

#[test]
fn test_only_first_violation_is_reported() {
    // Every field is wrong; only the name is reported.
    let err = validate(&raw("J", "1", "1", "mortgage")).unwrap_err();
    assert_eq!(err.field, ProfileField::Name);
    assert_eq!(err.message, "Name must be at least 2 characters");

    let err = validate(&raw("Jane", "0712345678", "12", "mortgage")).unwrap_err();
    assert_eq!(err.field, ProfileField::IdNumber);
}

#[test]
fn test_missing_fields_count_as_empty() {
    let err = validate(&RawProfile::default()).unwrap_err();
    assert_eq!(err.message, "Name must be at least 2 characters");

    let partial = RawProfile {
        name: Some("Jane Doe".to_string()),
        phone_number: Some("+254112345678".to_string()),
        id_number: Some("1234567".to_string()),
        loan_type: None,
    };
    assert_eq!(validate(&partial).unwrap_err().message, "Please select a loan type");
}

#[test]
fn test_names_with_punctuation() {
    assert!(validate(&raw("Mary-Jane O'Neil Jr.", "0712345678", "12345678", "business")).is_ok());
    let err = validate(&raw("Jane2", "0712345678", "12345678", "business")).unwrap_err();
    assert_eq!(
        err.message,
        "Name can only contain letters, spaces, dots, apostrophes and hyphens"
    );
}

#[test]
fn test_phone_normalization_examples() {
    assert_eq!(normalize_phone("0712345678"), "254712345678");
    assert_eq!(normalize_phone("712345678"), "254712345678");
    assert_eq!(normalize_phone("254712345678"), "254712345678");
    assert_eq!(normalize_phone("+254 712-345-678"), "254712345678");
}

#[test]
fn test_masked_phone_keeps_last_digits() {
    assert_eq!(mask_phone("254712345678"), "*********678");
}

#[test]
fn test_catalog_confirmation_figures() {
    let option = LoanCatalog.find_by_amount(21_200).unwrap();
    assert_eq!(option.fee, 270);
    assert_eq!(total_repayment(option.amount), 23_320);
    assert_eq!(format_ksh(total_repayment(option.amount)), "Ksh 23,320");
    assert_eq!(LoanCatalog.list().len(), 14);
}
