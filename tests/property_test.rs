//! Property tests for the numeric core.
//!
//! 1. Price windows stay bounded and keep insertion order
//! 2. RSI stays within [0, 100]
//! 3. Trailing stops never move down
//! 4. Averages of a constant series equal the constant

use autotrader::domain::indicator::{ema, rsi, sma};
use autotrader::domain::instrument::InstrumentId;
use autotrader::domain::position::{Position, PositionId, PositionStatus};
use autotrader::domain::price_window::PriceWindow;
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn arb_price() -> impl Strategy<Value = Decimal> {
    (100i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_series(max_len: usize) -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(arb_price(), 1..max_len)
}

fn open_position(entry: Decimal) -> Position {
    let stop = entry * Decimal::new(99, 2);
    Position {
        id: PositionId(1),
        instrument: InstrumentId(0),
        symbol: "SOL".into(),
        entry_price: entry,
        quantity: Decimal::ONE,
        capital: entry,
        target: entry * Decimal::new(102, 2),
        stop,
        initial_stop: stop,
        opened_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        status: PositionStatus::Open,
        settlement_ref: "paper-1".into(),
        exit: None,
    }
}

proptest! {
    #[test]
    fn window_is_bounded_and_ordered(capacity in 1usize..50, prices in arb_series(200)) {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut window = PriceWindow::new(capacity);
        for (i, price) in prices.iter().enumerate() {
            window.push(*price, start + Duration::seconds(i as i64));
            prop_assert!(window.len() <= capacity);
        }

        let kept = prices.len().min(capacity);
        prop_assert_eq!(window.len(), kept);
        prop_assert_eq!(window.prices(), prices[prices.len() - kept..].to_vec());
        let stamps: Vec<_> = window.points().map(|p| p.timestamp).collect();
        prop_assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rsi_is_bounded(prices in arb_series(120), period in 2usize..30) {
        if let Some(value) = rsi(&prices, period) {
            prop_assert!(value >= Decimal::ZERO);
            prop_assert!(value <= Decimal::ONE_HUNDRED);
        }
    }

    #[test]
    fn trailing_stop_never_moves_down(
        entry in arb_price(),
        moves in prop::collection::vec(-300i64..300, 1..60),
    ) {
        let mut position = open_position(entry);
        let mut price = entry;
        for bps in moves {
            price = (price * (Decimal::ONE + Decimal::new(bps, 4))).max(Decimal::new(1, 2));
            let before = position.stop;
            let moved = position.ratchet_stop(price, Decimal::ONE, Decimal::new(5, 1));
            prop_assert!(position.stop >= before);
            prop_assert_eq!(moved, position.stop > before);
        }
        prop_assert!(position.stop >= position.initial_stop);
    }

    #[test]
    fn constant_series_averages_to_itself(price in arb_price(), len in 1usize..80, period in 1usize..40) {
        let prices = vec![price; len];
        match sma(&prices, period) {
            Some(avg) => prop_assert_eq!(avg, price),
            None => prop_assert!(len < period),
        }
        if let Some(avg) = ema(&prices, period) {
            prop_assert!((avg - price).abs() < Decimal::new(1, 12));
        }
    }
}
