//! Aggregate trade statistics, updated on every close and never reset.

use rust_decimal::Decimal;

use crate::domain::decimal::ratio_pct;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Sum of positive PnL.
    pub total_profit: Decimal,
    /// Sum of absolute negative PnL.
    pub total_loss: Decimal,
    pub net_pnl: Decimal,
    /// Most negative `net_pnl` ever observed, zero or below.
    pub max_drawdown: Decimal,
    /// Quote currency traded, entry plus exit legs.
    pub volume: Decimal,
}

impl TradeStatistics {
    /// Fold one closed trade in. Break-even trades count as losses.
    pub fn record(&mut self, pnl: Decimal, volume: Decimal) {
        self.total_trades += 1;
        if pnl > Decimal::ZERO {
            self.winning_trades += 1;
            self.total_profit += pnl;
        } else {
            self.losing_trades += 1;
            self.total_loss += pnl.abs();
        }
        self.net_pnl += pnl;
        if self.net_pnl < self.max_drawdown {
            self.max_drawdown = self.net_pnl;
        }
        self.volume += volume;
    }

    /// Percentage of winning trades, 0 with no trades.
    pub fn win_rate(&self) -> Decimal {
        ratio_pct(
            Decimal::from(self.winning_trades),
            Decimal::from(self.total_trades),
        )
        .unwrap_or(Decimal::ZERO)
    }

    pub fn average_win(&self) -> Decimal {
        self.total_profit
            .checked_div(Decimal::from(self.winning_trades))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn average_loss(&self) -> Decimal {
        self.total_loss
            .checked_div(Decimal::from(self.losing_trades))
            .unwrap_or(Decimal::ZERO)
    }
}
