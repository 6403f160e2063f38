//! Money arithmetic for the affiliate engine.
//!
//! All monetary amounts are integer minor units (cents). Percentage rates
//! are basis points (1/100 of a percent; 2000 = 20%). Floating point is
//! never used for money.

/// Commission owed on a payment at `rate_bps` basis points, rounded
/// half-up to the nearest cent.
///
/// The rounding rule is round-half-up (0.5 cents rounds away from zero).
/// Computed in 128-bit to rule out overflow for any realistic payment.
#[allow(clippy::cast_possible_truncation)]
pub fn commission_amount(payment_cents: i64, rate_bps: i64) -> i64 {
    let product = i128::from(payment_cents) * i128::from(rate_bps);
    let half = if product >= 0 { 5_000 } else { -5_000 };
    ((product + half) / 10_000) as i64
}

/// Format a cent amount as a dollar string, e.g. `5000` -> `"$50.00"`.
///
/// Used in user-facing conflict messages ("minimum payout is $50.00,
/// you have $32.10").
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_percent_of_hundred_dollars() {
        // 10000 cents at 2000 bps = 2000 cents
        assert_eq!(commission_amount(10_000, 2_000), 2_000);
    }

    #[test]
    fn rounds_half_up() {
        // 12345 * 2000 / 10000 = 2469.0 exactly
        assert_eq!(commission_amount(12_345, 2_000), 2_469);
        // 1 cent at 2500 bps = 0.25 cents -> 0
        assert_eq!(commission_amount(1, 2_500), 0);
        // 2 cents at 2500 bps = 0.5 cents -> 1 (half rounds up)
        assert_eq!(commission_amount(2, 2_500), 1);
        // 3 cents at 2500 bps = 0.75 cents -> 1
        assert_eq!(commission_amount(3, 2_500), 1);
    }

    #[test]
    fn zero_rate_yields_zero() {
        assert_eq!(commission_amount(99_999, 0), 0);
    }

    #[test]
    fn formats_dollars() {
        assert_eq!(format_usd(5_000), "$50.00");
        assert_eq!(format_usd(3_210), "$32.10");
        assert_eq!(format_usd(5), "$0.05");
        assert_eq!(format_usd(0), "$0.00");
        assert_eq!(format_usd(-150), "-$1.50");
    }
}
