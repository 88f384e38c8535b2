/// Property-based tests using proptest
/// Tests invariants of validation, phone normalization and the loan catalog
use proptest::prelude::*;
use rust_loan_funnel::catalog::{total_repayment, LoanCatalog};
use rust_loan_funnel::models::RawProfile;
use rust_loan_funnel::validation::{normalize_phone, validate, ProfileField};

fn raw(name: &str, phone: &str, id: &str, loan_type: &str) -> RawProfile {
    RawProfile {
        name: Some(name.to_string()),
        phone_number: Some(phone.to_string()),
        id_number: Some(id.to_string()),
        loan_type: Some(loan_type.to_string()),
    }
}

// Property: Validation never panics and reports the earliest failing field
proptest! {
    #[test]
    fn validation_never_panics(
        name in "\\PC*",
        phone in "\\PC*",
        id in "\\PC*",
        loan_type in "\\PC*"
    ) {
        let _ = validate(&raw(&name, &phone, &id, &loan_type));
    }

    #[test]
    fn invalid_name_is_reported_before_anything_else(
        name in "[0-9!@#$%]{2,20}",
        phone in "\\PC*",
        id in "\\PC*"
    ) {
        let err = validate(&raw(&name, &phone, &id, "")).unwrap_err();
        prop_assert_eq!(err.field, ProfileField::Name);
    }

    #[test]
    fn invalid_phone_is_reported_before_id_and_loan_type(
        phone in "[0-9]{1,6}",
        id in "\\PC*"
    ) {
        let err = validate(&raw("Jane Doe", &phone, &id, "")).unwrap_err();
        prop_assert_eq!(err.field, ProfileField::PhoneNumber);
    }

    #[test]
    fn valid_local_numbers_pass(network in prop::sample::select(vec!['7', '1']), rest in "[0-9]{8}") {
        let phone = format!("0{}{}", network, rest);
        let profile = validate(&raw("Jane Doe", &phone, "12345678", "medical")).unwrap();
        prop_assert_eq!(profile.phone_number, phone);
    }
}

// Property: Phone normalization is idempotent and always yields digits
proptest! {
    #[test]
    fn normalize_is_idempotent(phone in "\\PC*") {
        let once = normalize_phone(&phone);
        prop_assert_eq!(normalize_phone(&once), once.clone());
        prop_assert!(once.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn accepted_formats_normalize_to_same_number(rest in "7[0-9]{8}") {
        let expected = format!("254{}", rest);
        prop_assert_eq!(normalize_phone(&format!("0{}", rest)), expected.clone());
        prop_assert_eq!(normalize_phone(&format!("+254{}", rest)), expected.clone());
        prop_assert_eq!(normalize_phone(&format!("254{}", rest)), expected.clone());
        prop_assert_eq!(normalize_phone(&rest), expected);
    }
}

// Property: Repayment totals round half-up at 10%
proptest! {
    #[test]
    fn total_repayment_is_rounded_ten_percent(amount in 0u64..10_000_000) {
        let total = total_repayment(amount);
        // Within half a unit of amount * 1.1, ties rounded up
        let diff = (total * 10) as i128 - (amount * 11) as i128;
        prop_assert!((-4..=5).contains(&diff));
    }

    #[test]
    fn catalog_lookup_only_finds_listed_amounts(amount in 0u64..100_000) {
        let catalog = LoanCatalog;
        match catalog.find_by_amount(amount) {
            Some(option) => prop_assert_eq!(option.amount, amount),
            None => prop_assert!(catalog.list().iter().all(|o| o.amount != amount)),
        }
    }
}
