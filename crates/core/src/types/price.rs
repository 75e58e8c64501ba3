//! Display price parsing using decimal arithmetic.
//!
//! Package prices reach the cart as display strings (`"$9.99"`, `"9,99 €"`,
//! `"free"`). Totals are computed from those strings, so parsing is
//! deliberately forgiving: whatever cannot be read counts as zero.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Parse a display price into a decimal amount.
///
/// Everything except ASCII digits and `.` is stripped. If more than one
/// decimal point remains, the last one is dropped, and the leading
/// `digits[.digits]` run is read. Unreadable input yields zero.
///
/// ```
/// use emberstone_core::parse_display_price;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_display_price("$9.99"), Decimal::new(999, 2));
/// assert_eq!(parse_display_price("free"), Decimal::ZERO);
/// ```
#[must_use]
pub fn parse_display_price(display: &str) -> Decimal {
    let mut cleaned: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if let (Some(first), Some(last)) = (cleaned.find('.'), cleaned.rfind('.'))
        && first != last
    {
        cleaned.remove(last);
    }

    leading_number(&cleaned).unwrap_or(Decimal::ZERO)
}

/// Read the leading `digits[.digits]` run of an already-cleaned string.
fn leading_number(cleaned: &str) -> Option<Decimal> {
    let int_len = cleaned.find(|c: char| !c.is_ascii_digit()).unwrap_or(cleaned.len());
    let (int_part, rest) = cleaned.split_at(int_len);

    let frac_part = rest.strip_prefix('.').map_or("", |after| {
        let frac_len = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
        after.split_at(frac_len).0
    });

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let literal = if frac_part.is_empty() {
        int_part.to_owned()
    } else {
        format!("{int_part}.{frac_part}")
    };

    Decimal::from_str(&literal).ok()
}

/// Format an amount with exactly two decimal places, rounding half away
/// from zero (`12.345` becomes `"12.35"`).
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}
