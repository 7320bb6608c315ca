//! Decimal helpers for venue quantization and book-walk pricing.

use rust_decimal::Decimal;

/// Snap a limit price to the venue's price increment. A zero tick leaves
/// the price untouched.
pub fn round_to_tick(value: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size == Decimal::ZERO {
        return value;
    }
    (value / tick_size).round() * tick_size
}

/// Truncate an order amount to whole lots, never rounding up past what the
/// budget allows. A zero lot leaves the amount untouched.
pub fn round_down_to_lot(value: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size == Decimal::ZERO {
        return value;
    }
    (value / lot_size).floor() * lot_size
}

/// Quotient, or zero when the divisor is zero (an unpriced market affords
/// nothing).
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Weighted average of `(value, weight)` pairs, used for book-walk VWAP and
/// position entry prices. Zero when the weights sum to zero.
pub fn weighted_average(values: &[(Decimal, Decimal)]) -> Decimal {
    let (sum, weight_sum) = values.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(sum, weight_sum), (val, weight)| (sum + val * weight, weight_sum + weight),
    );

    safe_div(sum, weight_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_to_tick() {
        assert_eq!(round_to_tick(dec!(1834.567), dec!(0.01)), dec!(1834.57));
        assert_eq!(round_to_tick(dec!(1834.567), dec!(0.5)), dec!(1834.5));
        assert_eq!(round_to_tick(dec!(1834.567), Decimal::ZERO), dec!(1834.567));
    }

    #[test]
    fn test_round_down_to_lot() {
        assert_eq!(round_down_to_lot(dec!(0.3339), dec!(0.001)), dec!(0.333));
        assert_eq!(round_down_to_lot(dec!(0.3339), dec!(0.1)), dec!(0.3));
        assert_eq!(round_down_to_lot(dec!(0.0999), dec!(0.1)), Decimal::ZERO);
    }

    #[test]
    fn test_safe_div_by_zero() {
        assert_eq!(safe_div(dec!(600), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_div(dec!(600), dec!(200)), dec!(3));
    }

    #[test]
    fn test_weighted_average() {
        let levels = vec![
            (dec!(100), dec!(1)), // 1 unit at 100
            (dec!(101), dec!(3)), // 3 units at 101
        ];
        assert_eq!(weighted_average(&levels), dec!(100.75));
        assert_eq!(weighted_average(&[]), Decimal::ZERO);
    }
}
