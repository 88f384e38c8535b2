use crate::models::LoanOption;

/// Loan principals on offer and their processing fees, in display order.
///
/// Fees are not a fixed percentage of the principal; this table is the only
/// source of truth for them.
const LOAN_OPTIONS: [LoanOption; 14] = [
    LoanOption { amount: 5_500, fee: 100 },
    LoanOption { amount: 6_800, fee: 130 },
    LoanOption { amount: 7_800, fee: 170 },
    LoanOption { amount: 9_800, fee: 190 },
    LoanOption { amount: 11_200, fee: 230 },
    LoanOption { amount: 16_800, fee: 250 },
    LoanOption { amount: 21_200, fee: 270 },
    LoanOption { amount: 25_600, fee: 400 },
    LoanOption { amount: 30_000, fee: 470 },
    LoanOption { amount: 35_400, fee: 590 },
    LoanOption { amount: 39_800, fee: 730 },
    LoanOption { amount: 44_200, fee: 1_010 },
    LoanOption { amount: 48_600, fee: 1_600 },
    LoanOption { amount: 60_600, fee: 2_050 },
];

/// Read-only view over the fixed loan catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoanCatalog;

impl LoanCatalog {
    /// All options in display order. Calling this again yields the same slice.
    pub fn list(&self) -> &'static [LoanOption] {
        &LOAN_OPTIONS
    }

    /// Looks up the option with the given principal.
    pub fn find_by_amount(&self, amount: u64) -> Option<LoanOption> {
        LOAN_OPTIONS.iter().copied().find(|o| o.amount == amount)
    }

    /// Smallest principal on offer.
    pub fn min_amount(&self) -> u64 {
        LOAN_OPTIONS.iter().map(|o| o.amount).min().unwrap_or_default()
    }

    /// Largest principal on offer.
    pub fn max_amount(&self) -> u64 {
        LOAN_OPTIONS.iter().map(|o| o.amount).max().unwrap_or_default()
    }

    /// "Ksh 5,500 – 60,600"
    pub fn amount_range_display(&self) -> String {
        format!(
            "{} – {}",
            format_ksh(self.min_amount()),
            group_thousands(self.max_amount())
        )
    }
}

/// Total repayment shown on the confirmation screen: principal plus 10%,
/// rounded half-up. Display only; fees always come from the catalog.
pub fn total_repayment(amount: u64) -> u64 {
    (amount * 110 + 50) / 100
}

/// Formats an amount as `Ksh 21,200`.
pub fn format_ksh(amount: u64) -> String {
    format!("Ksh {}", group_thousands(amount))
}

fn group_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_amounts_are_unique() {
        let catalog = LoanCatalog;
        let amounts: HashSet<u64> = catalog.list().iter().map(|o| o.amount).collect();
        assert_eq!(amounts.len(), catalog.list().len());
    }

    #[test]
    fn test_list_is_restartable() {
        let catalog = LoanCatalog;
        let first: Vec<_> = catalog.list().iter().collect();
        let second: Vec<_> = catalog.list().iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_by_amount() {
        let catalog = LoanCatalog;
        assert_eq!(
            catalog.find_by_amount(21_200),
            Some(LoanOption { amount: 21_200, fee: 270 })
        );
        assert_eq!(catalog.find_by_amount(21_000), None);
    }

    #[test]
    fn test_bounds() {
        let catalog = LoanCatalog;
        assert_eq!(catalog.min_amount(), 5_500);
        assert_eq!(catalog.max_amount(), 60_600);
        assert_eq!(catalog.amount_range_display(), "Ksh 5,500 – 60,600");
    }

    #[test]
    fn test_total_repayment_rounds_half_up() {
        assert_eq!(total_repayment(21_200), 23_320);
        assert_eq!(total_repayment(5), 6); // 5.5
        assert_eq!(total_repayment(4), 4); // 4.4
    }

    #[test]
    fn test_format_ksh() {
        assert_eq!(format_ksh(0), "Ksh 0");
        assert_eq!(format_ksh(270), "Ksh 270");
        assert_eq!(format_ksh(1_010), "Ksh 1,010");
        assert_eq!(format_ksh(60_600), "Ksh 60,600");
        assert_eq!(format_ksh(1_234_567), "Ksh 1,234,567");
    }
}
