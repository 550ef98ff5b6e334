//! Simple Moving Average: arithmetic mean of the last n prices.

use rust_decimal::Decimal;

use crate::domain::decimal::mean;

pub fn sma(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }
    mean(&prices[prices.len() - period..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_last_five_of_linear_series() {
        let prices: Vec<Decimal> = (100..120).map(Decimal::from).collect();
        assert_eq!(prices.len(), 20);
        let expected = (dec!(115) + dec!(116) + dec!(117) + dec!(118) + dec!(119)) / dec!(5);
        assert_eq!(sma(&prices, 5), Some(expected));
        assert_eq!(sma(&prices, 5), Some(dec!(117)));
    }

    #[test]
    fn sma_insufficient_data() {
        let prices = [dec!(1), dec!(2)];
        assert_eq!(sma(&prices, 3), None);
    }

    #[test]
    fn sma_period_0() {
        assert_eq!(sma(&[dec!(1)], 0), None);
    }

    #[test]
    fn sma_exact_period() {
        let prices = [dec!(10), dec!(20), dec!(30)];
        assert_eq!(sma(&prices, 3), Some(dec!(20)));
    }
}
