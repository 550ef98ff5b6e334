//! End-to-end tests for the trading engine, ledger and scheduler against the
//! in-memory paper venue.

mod common;

use autotrader::domain::backtest::{BacktestConfig, run_backtest};
use autotrader::domain::candle::flat_candles;
use autotrader::domain::engine::TradingEngine;
use autotrader::domain::error::EngineError;
use autotrader::domain::ledger::{OpenOutcome, OpenRejection, PositionLedger};
use autotrader::domain::position::CloseReason;
use autotrader::domain::risk::{DenyReason, RiskLimits};
use autotrader::domain::scheduler::Scheduler;
use autotrader::domain::signal::Verdict;
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::Mutex;

mod engine_cycle {
    use super::*;

    #[tokio::test]
    async fn dip_buy_then_take_profit() {
        let mut h = harness(&["SOL"], tight_strategy(), RiskLimits::default(), dec!(1000));
        let sol = instrument("SOL");
        h.feed
            .script(sol.id, dip_path(&[dec!(95), dec!(95.57), dec!(100)]))
            .await;

        for i in 0..50 {
            let report = h.engine.run_cycle(ts(i * 30)).await;
            assert!(report.opened.is_empty());
            assert!(report.failures.is_empty());
        }

        let entry = h.engine.run_cycle(ts(50 * 30)).await;
        assert_eq!(entry.signals[0].verdict, Verdict::Buy);
        assert_eq!(entry.signals[0].confidence, dec!(0.6));
        assert_eq!(entry.opened.len(), 1);
        let opened = &entry.opened[0];
        assert_eq!(opened.entry_price, dec!(95));
        assert_eq!(opened.quantity, dec!(3));
        assert_eq!(opened.capital, dec!(285));
        assert_eq!(opened.target, dec!(95.475));
        assert_eq!(opened.stop, dec!(94.715));

        let exit = h.engine.run_cycle(ts(51 * 30)).await;
        assert_eq!(exit.closed.len(), 1);
        assert_eq!(exit.closed[0].close_reason(), Some(CloseReason::TakeProfit));
        assert!(exit.opened.is_empty());

        let after = h.engine.run_cycle(ts(52 * 30)).await;
        assert!(after.opened.is_empty());
        assert_eq!(after.signals[0].verdict, Verdict::Hold);

        let stats = h.engine.statistics();
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.net_pnl, dec!(1.71));
        assert!(stats.net_pnl > Decimal::ZERO);
        assert_eq!(h.engine.ledger().open_count(), 0);
        assert_eq!(h.venue.balance(instrument("USDC").id).await, dec!(1001.71));
    }

    #[tokio::test]
    async fn drawdown_blocks_entries() {
        let limits = RiskLimits {
            initial_capital: dec!(100),
            min_reserve: dec!(5),
            ..Default::default()
        };
        let mut h = harness(&["SOL"], tight_strategy(), limits, dec!(89));
        h.feed.script(instrument("SOL").id, vec![dec!(100)]).await;

        let report = h.engine.run_cycle(ts(0)).await;
        let decision = report.risk.unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            Some(DenyReason::MaxDrawdown {
                drawdown_pct: dec!(11),
                max_pct: dec!(10)
            })
        );
        assert_eq!(decision.reason.unwrap().code(), "DRAWDOWN");
    }

    #[tokio::test]
    async fn trade_rate_limit_holds_within_one_cycle() {
        let limits = RiskLimits {
            max_trades_per_hour: 1,
            ..Default::default()
        };
        let mut h = harness(&["SOL", "JUP"], tight_strategy(), limits, dec!(1000));
        for symbol in ["SOL", "JUP"] {
            h.feed
                .script(instrument(symbol).id, dip_path(&[dec!(95)]))
                .await;
        }

        let mut opened = 0;
        let mut last = None;
        for i in 0..51 {
            let report = h.engine.run_cycle(ts(i * 30)).await;
            opened += report.opened.len();
            last = Some(report);
        }

        let last = last.unwrap();
        assert!(last.signals.iter().all(|s| s.verdict == Verdict::Buy));
        assert_eq!(opened, 1);
        assert_eq!(last.opened[0].symbol, "SOL");
        assert_eq!(
            last.risk.unwrap().reason,
            Some(DenyReason::TradeRateLimit { trades: 1, max: 1 })
        );
        assert_eq!(h.engine.ledger().open_count(), 1);
        let snapshot = h.engine.risk_snapshot(ts(50 * 30)).await.unwrap();
        assert_eq!(snapshot.trades_last_hour, 1);
    }

    #[tokio::test]
    async fn paused_engine_never_opens() {
        let mut h = harness(&["SOL"], tight_strategy(), RiskLimits::default(), dec!(1000));
        h.feed
            .script(instrument("SOL").id, dip_path(&[dec!(95)]))
            .await;
        h.engine.pause();

        for i in 0..51 {
            let report = h.engine.run_cycle(ts(i)).await;
            assert!(report.opened.is_empty());
            assert_eq!(report.risk.unwrap().reason, Some(DenyReason::Paused));
        }
    }

    #[tokio::test]
    async fn price_outage_skips_cycle() {
        let venue = frictionless_venue(dec!(1000));
        let mut engine = TradingEngine::new(
            engine_config(&["SOL"]),
            tight_strategy(),
            RiskLimits::default(),
            registry(),
            Arc::new(FailingPriceFeed),
            venue,
        )
        .unwrap();

        let report = engine.run_cycle(ts(0)).await;
        assert!(matches!(report.failures[0], EngineError::PriceData { .. }));
        assert!(report.risk.is_none());
        assert_eq!(engine.cycles(), 1);
    }

    #[tokio::test]
    async fn balance_failure_prevents_entries() {
        let venue = frictionless_venue(dec!(1000));
        let feed = Arc::new(ScriptedPriceFeed::new(venue.clone()));
        feed.script(instrument("SOL").id, dip_path(&[dec!(95)])).await;
        let swap = Arc::new(MockSwapPort::new(venue));
        swap.fail_balance.store(true, Ordering::Relaxed);

        let mut engine = TradingEngine::new(
            engine_config(&["SOL"]),
            tight_strategy(),
            RiskLimits::default(),
            registry(),
            feed,
            swap,
        )
        .unwrap();

        for i in 0..51 {
            let report = engine.run_cycle(ts(i)).await;
            assert!(report.opened.is_empty());
            assert!(matches!(report.failures[0], EngineError::Balance { .. }));
        }
    }

    #[tokio::test]
    async fn missing_route_leaves_ledger_untouched() {
        let mut h = harness(&["SOL"], tight_strategy(), RiskLimits::default(), dec!(1000));
        h.feed
            .script(instrument("SOL").id, dip_path(&[dec!(95)]))
            .await;
        h.venue.set_routes_closed(true).await;

        let mut last = None;
        for i in 0..51 {
            last = Some(h.engine.run_cycle(ts(i)).await);
        }
        let report = last.unwrap();
        assert!(report.opened.is_empty());
        assert!(matches!(report.failures[0], EngineError::QuoteUnavailable { .. }));
        assert_eq!(h.engine.ledger().open_count(), 0);
        assert_eq!(h.venue.balance(instrument("USDC").id).await, dec!(1000));
    }
}

mod ledger {
    use super::*;

    #[tokio::test]
    async fn rise_past_target_closes_with_profit() {
        let venue = frictionless_venue(dec!(1000));
        let sol = instrument("SOL");
        venue.set_price(sol.id, dec!(100)).await;
        let mut ledger = PositionLedger::new(tight_strategy()).unwrap();

        let outcome = ledger
            .open_position(&*venue, &registry(), &sol, dec!(1000), dec!(300), ts(0))
            .await
            .unwrap();
        let OpenOutcome::Opened(position) = outcome else {
            panic!("expected an open position");
        };
        assert_eq!(position.quantity, dec!(3));
        assert_eq!(position.settlement_ref, "paper-1");

        venue.set_price(sol.id, dec!(100.6)).await;
        let report = ledger
            .manage_positions(&*venue, &registry(), |_| Some(dec!(100.6)), ts(30))
            .await;

        assert_eq!(report.closed.len(), 1);
        let closed = &report.closed[0];
        assert_eq!(closed.close_reason(), Some(CloseReason::TakeProfit));
        assert_eq!(closed.realized_pnl(), Some(dec!(1.8)));
        assert_eq!(ledger.statistics().winning_trades, 1);
        assert_eq!(ledger.closed_positions().len(), 1);
        assert_eq!(ledger.open_count(), 0);
    }

    #[tokio::test]
    async fn failed_close_keeps_position_open() {
        let venue = frictionless_venue(dec!(1000));
        let sol = instrument("SOL");
        venue.set_price(sol.id, dec!(100)).await;
        let mut ledger = PositionLedger::new(tight_strategy()).unwrap();
        ledger
            .open_position(&*venue, &registry(), &sol, dec!(1000), dec!(300), ts(0))
            .await
            .unwrap();

        venue.set_price(sol.id, dec!(99.5)).await;
        venue.fail_next_executions(1).await;
        let report = ledger
            .manage_positions(&*venue, &registry(), |_| Some(dec!(99.5)), ts(30))
            .await;

        assert!(report.closed.is_empty());
        assert!(matches!(
            report.failures[0],
            EngineError::UnresolvedExposure { position_id: 1, .. }
        ));
        assert!(ledger.position(sol.id).unwrap().is_open());
        assert_eq!(ledger.statistics().total_trades, 0);

        let retry = ledger
            .manage_positions(&*venue, &registry(), |_| Some(dec!(99.5)), ts(60))
            .await;
        assert_eq!(retry.closed[0].close_reason(), Some(CloseReason::StopLoss));
        assert_eq!(ledger.statistics().losing_trades, 1);
    }

    #[tokio::test]
    async fn rejection_paths() {
        let venue = frictionless_venue(dec!(1000));
        let sol = instrument("SOL");
        let jup = instrument("JUP");
        venue.set_price(sol.id, dec!(100)).await;
        venue.set_price(jup.id, dec!(1)).await;
        let strategy = autotrader::domain::strategy::StrategyConfig {
            max_open_positions: 1,
            ..tight_strategy()
        };
        let mut ledger = PositionLedger::new(strategy).unwrap();

        let starved = ledger
            .open_position(&*venue, &registry(), &sol, dec!(9.99), dec!(300), ts(0))
            .await
            .unwrap();
        assert_eq!(
            starved,
            OpenOutcome::Rejected(OpenRejection::InsufficientCapital {
                available: dec!(9.99),
                minimum: dec!(10)
            })
        );

        ledger
            .open_position(&*venue, &registry(), &sol, dec!(1000), dec!(300), ts(0))
            .await
            .unwrap();

        let full = ledger
            .open_position(&*venue, &registry(), &jup, dec!(700), dec!(300), ts(1))
            .await
            .unwrap();
        assert_eq!(
            full,
            OpenOutcome::Rejected(OpenRejection::MaxPositions { open: 1, max: 1 })
        );

        ledger.update_strategy(tight_strategy()).unwrap();
        let duplicate = ledger
            .open_position(&*venue, &registry(), &sol, dec!(700), dec!(300), ts(2))
            .await
            .unwrap();
        assert_eq!(
            duplicate,
            OpenOutcome::Rejected(OpenRejection::AlreadyOpen { instrument: sol.id })
        );
    }

    #[tokio::test]
    async fn dust_fill_is_reported_with_its_settlement() {
        let swap = DustFillSwapPort {
            settlement_ref: "dust-1".into(),
        };
        let sol = instrument("SOL");
        let mut ledger = PositionLedger::new(tight_strategy()).unwrap();

        let err = ledger
            .open_position(&swap, &registry(), &sol, dec!(1000), dec!(300), ts(0))
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        match &err {
            EngineError::UnbookedFill {
                instrument,
                settlement_ref,
                ..
            } => {
                assert_eq!(instrument, "SOL");
                assert_eq!(settlement_ref, "dust-1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("dust-1"));
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.statistics().total_trades, 0);
    }

    #[tokio::test]
    async fn emergency_close_all_liquidates() {
        let venue = frictionless_venue(dec!(1000));
        let sol = instrument("SOL");
        let jup = instrument("JUP");
        venue.set_price(sol.id, dec!(100)).await;
        venue.set_price(jup.id, dec!(1)).await;
        let mut ledger = PositionLedger::new(tight_strategy()).unwrap();
        for i in [&sol, &jup] {
            ledger
                .open_position(&*venue, &registry(), i, dec!(500), dec!(300), ts(0))
                .await
                .unwrap();
        }

        let report = ledger.emergency_close_all(&*venue, &registry(), ts(10)).await;
        assert_eq!(report.closed.len(), 2);
        assert!(
            report
                .closed
                .iter()
                .all(|p| p.close_reason() == Some(CloseReason::Emergency))
        );
        assert_eq!(ledger.open_count(), 0);
    }
}

mod scheduling {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_until_cycle_limit() {
        let h = harness(&["SOL"], tight_strategy(), RiskLimits::default(), dec!(1000));
        h.feed.script(instrument("SOL").id, vec![dec!(100)]).await;
        let scheduler =
            Scheduler::new(Arc::new(Mutex::new(h.engine)), Duration::from_secs(30)).with_max_cycles(3);

        let completed = scheduler.run().await;
        assert_eq!(completed, 3);
        assert!(scheduler.is_stopped());
        assert_eq!(scheduler.engine().lock().await.cycles(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_run_exits_immediately() {
        let h = harness(&["SOL"], tight_strategy(), RiskLimits::default(), dec!(1000));
        let scheduler = Scheduler::new(Arc::new(Mutex::new(h.engine)), Duration::from_secs(30));
        scheduler.stop();
        assert_eq!(scheduler.run().await, 0);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let venue = frictionless_venue(dec!(1000));
        let sol = instrument("SOL");
        venue.set_price(sol.id, dec!(100)).await;
        let feed = Arc::new(GatedPriceFeed::new(venue.clone()));
        let engine = TradingEngine::new(
            engine_config(&["SOL"]),
            tight_strategy(),
            RiskLimits::default(),
            registry(),
            feed.clone(),
            venue,
        )
        .unwrap();
        let scheduler = Scheduler::new(Arc::new(Mutex::new(engine)), Duration::from_secs(30));

        let (first, second) = tokio::join!(scheduler.try_cycle(), async {
            feed.entered.notified().await;
            let second = scheduler.try_cycle().await;
            feed.release.notify_one();
            second
        });

        assert_eq!(first.unwrap().cycle, 1);
        assert!(second.is_none());
        assert_eq!(scheduler.skipped_ticks(), 1);
        assert_eq!(scheduler.completed_cycles(), 1);
        assert_eq!(scheduler.engine().lock().await.cycles(), 1);
    }

    #[tokio::test]
    async fn emergency_stop_closes_open_positions() {
        let mut h = harness(&["SOL"], tight_strategy(), RiskLimits::default(), dec!(1000));
        let sol = instrument("SOL");
        h.feed.script(sol.id, dip_path(&[dec!(95), dec!(95.2)])).await;
        for i in 0..51 {
            h.engine.run_cycle(ts(i)).await;
        }
        assert_eq!(h.engine.ledger().open_count(), 1);

        let scheduler = Scheduler::new(Arc::new(Mutex::new(h.engine)), Duration::from_secs(30));
        let report = scheduler.emergency_stop().await;
        assert!(scheduler.is_stopped());
        assert_eq!(report.closed.len(), 1);
        assert_eq!(report.closed[0].close_reason(), Some(CloseReason::Emergency));
        assert_eq!(scheduler.engine().lock().await.ledger().open_count(), 0);
    }
}

mod backtesting {
    use super::*;

    #[test]
    fn flat_series_makes_no_trades() {
        let candles = flat_candles(200, dec!(100));
        let report = run_backtest(&candles, &BacktestConfig::default(), &tight_strategy()).unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.final_capital, report.initial_capital);
        assert_eq!(report.statistics.total_trades, 0);
    }
}
