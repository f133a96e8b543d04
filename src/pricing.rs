//! Money helpers. Amounts are minor currency units (cents) held in `i64`.

use crate::error::{AppError, AppResult};

/// `quantity × price_per_unit`, rejecting overflow instead of wrapping.
pub fn line_subtotal(quantity: i32, price_per_unit: i64) -> AppResult<i64> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    price_per_unit
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::BadRequest("line amount is too large".to_string()))
}

pub fn sum_subtotals<I>(subtotals: I) -> AppResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    subtotals.into_iter().try_fold(0i64, |acc, value| {
        acc.checked_add(value)
            .ok_or_else(|| AppError::BadRequest("total amount is too large".to_string()))
    })
}

/// Renders minor units as a decimal string, `2500` → `"25.00"`.
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
