//! Performance metrics for backtest runs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::decimal::{mean, ratio_pct, sample_stddev};
use crate::domain::statistics::TradeStatistics;

/// Reported profit factor when there are wins but no losses.
pub const PROFIT_FACTOR_CAP: Decimal = dec!(999);

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Gross profit over gross loss; capped when there are no losses, 0 with no trades.
pub fn profit_factor(stats: &TradeStatistics) -> Decimal {
    if stats.total_loss > Decimal::ZERO {
        (stats.total_profit / stats.total_loss).min(PROFIT_FACTOR_CAP)
    } else if stats.total_profit > Decimal::ZERO {
        PROFIT_FACTOR_CAP
    } else {
        Decimal::ZERO
    }
}

/// Mean per-trade return over its sample standard deviation. The deviation
/// is taken as 1 with fewer than two trades or when every return is equal.
pub fn sharpe_ratio(returns_pct: &[Decimal]) -> Decimal {
    let Some(avg) = mean(returns_pct) else {
        return Decimal::ZERO;
    };
    let stddev = sample_stddev(returns_pct)
        .filter(|s| !s.is_zero())
        .unwrap_or(Decimal::ONE);
    avg / stddev
}

/// Returns (peak equity, largest percentage fall from a running peak).
pub fn peak_and_max_drawdown(equity_curve: &[EquityPoint]) -> (Decimal, Decimal) {
    let Some(first) = equity_curve.first() else {
        return (Decimal::ZERO, Decimal::ZERO);
    };

    let mut peak = first.equity;
    let mut max_dd = Decimal::ZERO;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if let Some(dd) = ratio_pct(peak - point.equity, peak) {
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    (peak, max_dd)
}
