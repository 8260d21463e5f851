//! Money helpers using decimal arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency assumed when an order carries none.
pub const DEFAULT_CURRENCY: &str = "INR";

/// Round a monetary amount to two decimal places (half away from zero).
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum a sequence of amounts and round the result.
#[must_use]
pub fn total<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_money(amounts.into_iter().sum())
}

/// Average order value, or zero when there are no orders.
#[must_use]
pub fn average(total: Decimal, count: i64) -> Decimal {
    if count <= 0 {
        return Decimal::ZERO;
    }
    round_money(total / Decimal::from(count))
}

/// Pick the order currency, falling back to [`DEFAULT_CURRENCY`].
#[must_use]
pub fn currency_or_default(currency: Option<&str>) -> String {
    currency
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_money(Decimal::new(-10_005, 3)), Decimal::new(-1001, 2));
    }

    #[test]
    fn test_total_rounds() {
        let sum = total([Decimal::new(1999, 2), Decimal::new(1, 3)]);
        assert_eq!(sum, Decimal::new(1999, 2));
    }

    #[test]
    fn test_average_handles_zero_count() {
        assert_eq!(average(Decimal::new(100, 0), 0), Decimal::ZERO);
        assert_eq!(average(Decimal::new(100, 0), 3), Decimal::new(3333, 2));
    }

    #[test]
    fn test_currency_default() {
        assert_eq!(currency_or_default(None), "INR");
        assert_eq!(currency_or_default(Some("  ")), "INR");
        assert_eq!(currency_or_default(Some("usd")), "USD");
    }
}
