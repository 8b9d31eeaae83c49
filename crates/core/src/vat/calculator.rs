//! VAT return aggregation

use finsync_domain::{Direction, FinSyncError, Money, Result, Transaction, VatPeriod, VatReturn};

/// Aggregate `transactions` dated within `period` into a VAT return.
///
/// Income feeds `sales` and `vat_collected`; expenses feed `purchases` and
/// `vat_paid`. Zero-rated and exempt records still count towards sales and
/// purchases, but their amounts land in `zero_rated`/`exempt` and their VAT
/// is ignored. Every figure is a plain sum, so input order never matters.
///
/// Fails with [`FinSyncError::Validation`] when a total leaves the range of
/// [`Money`].
pub fn calculate_vat(transactions: &[Transaction], period: VatPeriod) -> Result<VatReturn> {
    let mut vat_return = VatReturn {
        period,
        vat_collected: Money::zero(),
        vat_paid: Money::zero(),
        vat_owing: Money::zero(),
        sales: Money::zero(),
        purchases: Money::zero(),
        zero_rated: Money::zero(),
        exempt: Money::zero(),
        transaction_count: 0,
    };

    for transaction in transactions.iter().filter(|t| period.contains(t.date)) {
        let amount = magnitude(transaction.amount, period)?;
        vat_return.transaction_count += 1;

        match transaction.direction {
            Direction::Income => accumulate(&mut vat_return.sales, amount, "sales", period)?,
            Direction::Expense => accumulate(&mut vat_return.purchases, amount, "purchases", period)?,
        }

        if transaction.vat_rate.is_exempt() {
            accumulate(&mut vat_return.exempt, amount, "exempt", period)?;
            continue;
        }
        if transaction.vat_rate.is_zero_rated() {
            accumulate(&mut vat_return.zero_rated, amount, "zero_rated", period)?;
            continue;
        }

        let vat = magnitude(transaction.vat_or_zero(), period)?;
        match transaction.direction {
            Direction::Income => accumulate(&mut vat_return.vat_collected, vat, "vat_collected", period)?,
            Direction::Expense => accumulate(&mut vat_return.vat_paid, vat, "vat_paid", period)?,
        }
    }

    vat_return.vat_owing = vat_return
        .vat_collected
        .checked_sub(vat_return.vat_paid)
        .ok_or_else(|| out_of_range("vat_owing", period))?;
    Ok(vat_return)
}

fn accumulate(total: &mut Money, amount: Money, figure: &str, period: VatPeriod) -> Result<()> {
    *total = total.checked_add(amount).ok_or_else(|| out_of_range(figure, period))?;
    Ok(())
}

fn magnitude(amount: Money, period: VatPeriod) -> Result<Money> {
    amount.checked_abs().ok_or_else(|| out_of_range("amount", period))
}

fn out_of_range(figure: &str, period: VatPeriod) -> FinSyncError {
    FinSyncError::Validation(format!("VAT return {figure} for {period} is out of range"))
}
