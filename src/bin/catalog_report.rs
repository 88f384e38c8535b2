//! Prints the loan catalog with processing fees and repayment totals.

use rust_loan_funnel::catalog::{format_ksh, total_repayment, LoanCatalog};

fn main() {
    let catalog = LoanCatalog;

    println!("Loan catalog ({})", catalog.amount_range_display());
    println!("{:<14} {:<12} {:<16}", "Amount", "Fee", "Total repayment");
    for option in catalog.list() {
        println!(
            "{:<14} {:<12} {:<16}",
            format_ksh(option.amount),
            format_ksh(option.fee),
            format_ksh(total_repayment(option.amount))
        );
    }
}
