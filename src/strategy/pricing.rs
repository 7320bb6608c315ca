//! Slippage-adjusted hedge pricing.

use rust_decimal::Decimal;

/// Applies a slippage fraction in the direction of the trade.
#[derive(Debug, Clone, Copy)]
pub struct PricingAdjuster {
    slippage: Decimal,
}

impl PricingAdjuster {
    pub fn new(slippage: Decimal) -> Self {
        Self { slippage }
    }

    /// Ratio to multiply the reference price by: above one for buys, below
    /// one for sells.
    pub fn slippage_ratio(&self, is_buy: bool) -> Decimal {
        if is_buy {
            Decimal::ONE + self.slippage
        } else {
            Decimal::ONE - self.slippage
        }
    }

    pub fn adjusted_price(&self, reference_price: Decimal, is_buy: bool) -> Decimal {
        reference_price * self.slippage_ratio(is_buy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_pays_up_sell_gives_down() {
        let pricing = PricingAdjuster::new(dec!(0.02));

        assert_eq!(pricing.adjusted_price(dec!(2000), true), dec!(2040));
        assert_eq!(pricing.adjusted_price(dec!(2000), false), dec!(1960));
    }

    #[test]
    fn test_zero_slippage_keeps_price() {
        let pricing = PricingAdjuster::new(Decimal::ZERO);
        assert_eq!(pricing.adjusted_price(dec!(123.45), true), dec!(123.45));
        assert_eq!(pricing.slippage_ratio(false), Decimal::ONE);
    }
}
