// End-to-end scenarios through the public engine API.

use microflow::consensus::{compose, Alignment, ConsensusWeighting};
use microflow::engine::{AnalyticsEngine, EngineConfig, SignalQuality};
use microflow::mode::Mode;
use microflow::regime::{Classification, RegimeType};
use microflow::types::{Direction, Level, Snapshot};

fn engine(mode: Mode) -> AnalyticsEngine {
    AnalyticsEngine::new(mode, ConsensusWeighting::Balanced, EngineConfig::default())
}

fn book(bid: f64, ask: f64, symbol: &str, ts: i64) -> Snapshot {
    Snapshot::new(
        vec![
            Level::support(99.0, bid),
            Level::support(98.0, bid / 2.0),
            Level::resistance(101.0, ask),
            Level::resistance(102.0, ask / 2.0),
        ],
        100.0,
        symbol,
        "1m",
    )
    .with_timestamp(ts)
}

#[test]
fn bpr_and_ld_reference_values() {
    let mut e = engine(Mode::SwingTrader);

    let r = e.update_levels(
        vec![
            Level::support(99.0, 200.0),
            Level::support(98.0, 100.0),
            Level::resistance(101.0, 100.0),
        ],
        100.0,
        "BTCUSDT",
        "1m",
    );
    assert!((r.pressure.ratio - 3.0).abs() < 1e-12);

    let r = e.update_levels(
        vec![Level::support(99.0, 50.0), Level::resistance(101.0, 10.0)],
        100.0,
        "BTCUSDT",
        "1m",
    );
    assert!((r.liquidity.delta - 20.0).abs() < 1e-9);
    assert_eq!(e.ticks(), 2);
}

#[test]
fn symbol_switch_restarts_calibration() {
    let mut e = engine(Mode::SwingTrader);
    for i in 0..30 {
        let bid = 100.0 + (i % 7) as f64 * 15.0;
        e.update(book(bid, 120.0, "BTCUSDT", i * 100));
    }
    let before = e.last_report().cloned().unwrap();
    assert_eq!(before.quality, SignalQuality::Calibrated);
    assert!(before.ld_norm.unwrap().calibrated);

    e.on_symbol_changed("ETHUSDT");
    assert_eq!(e.ticks(), 0);
    assert!(e.last_report().is_none());

    let after = e.update(book(150.0, 120.0, "ETHUSDT", 10_000));
    let ld = after.ld_norm.unwrap();
    assert_eq!(ld.samples, 1);
    assert!(!ld.calibrated);
    assert_eq!(after.quality, SignalQuality::Calibrating);
    assert_eq!(after.momentum.ld_roc, 0.0);
    assert!(after.regime.analyzing);
    assert_eq!(e.ticks(), 1);
}

#[test]
fn repeated_snapshot_is_idempotent() {
    let mut e = engine(Mode::MarketMaker);
    let first = e.update(book(300.0, 100.0, "BTCUSDT", 0));
    let first_ld = first.ld_norm.unwrap().value;
    let first_bpr = first.bpr_norm.unwrap().value;

    for i in 1..10 {
        let r = e.update(book(300.0, 100.0, "BTCUSDT", i * 100));
        assert_eq!(r.momentum.ld_roc, 0.0);
        assert_eq!(r.momentum.bpr_roc, 0.0);
        assert!((r.ld_norm.unwrap().value - first_ld).abs() < 1e-12);
        assert!((r.bpr_norm.unwrap().value - first_bpr).abs() < 1e-12);
        assert_eq!(r.alpha.score, first.alpha.score);
    }
}

/// Thin far bids under a heavy close offer: classified VACUUM_DOWN.
fn bid_vacuum(ts: i64) -> Snapshot {
    Snapshot::new(
        vec![
            Level::support(90.0, 10.0),
            Level::support(89.0, 10.0),
            Level::support(88.0, 10.0),
            Level::resistance(100.5, 100.0),
            Level::resistance(101.0, 100.0),
        ],
        100.0,
        "BTCUSDT",
        "1m",
    )
    .with_timestamp(ts)
}

/// Mirror of [`bid_vacuum`]: classified VACUUM_UP.
fn ask_vacuum(ts: i64) -> Snapshot {
    Snapshot::new(
        vec![
            Level::support(99.5, 100.0),
            Level::support(99.0, 100.0),
            Level::resistance(110.0, 10.0),
            Level::resistance(111.0, 10.0),
            Level::resistance(112.0, 10.0),
        ],
        100.0,
        "BTCUSDT",
        "1m",
    )
    .with_timestamp(ts)
}

#[test]
fn flipping_book_commits_only_after_agreeing_runs() {
    let down = Classification {
        regime: RegimeType::VacuumDown,
        direction: Direction::Down,
    };
    let up = Classification {
        regime: RegimeType::VacuumUp,
        direction: Direction::Up,
    };
    // Run lengths of each side before the book flips.
    let runs = [1usize, 2, 1, 3, 1, 5, 2, 1, 4, 1, 1, 6, 2, 3];
    let total: usize = runs.iter().sum();

    for mode in [Mode::MarketMaker, Mode::SwingTrader, Mode::Investor] {
        let mut e = engine(mode);
        let min_ticks = mode.profile().regime_min_ticks as usize;

        let mut tick = 0i64;
        let mut flips = 0;
        let mut run = 0;
        let mut last_detected: Option<Classification> = None;
        let mut last_committed: Option<Classification> = None;
        let mut commits = 0;
        for (n, len) in runs.iter().enumerate() {
            for _ in 0..*len {
                let snap = if n % 2 == 0 { bid_vacuum(tick * 100) } else { ask_vacuum(tick * 100) };
                tick += 1;
                let r = e.update(snap);

                let detected = r.regime.detected;
                assert_eq!(detected, if n % 2 == 0 { down } else { up }, "{mode}");
                if last_detected == Some(detected) {
                    run += 1;
                } else {
                    if last_detected.is_some() {
                        flips += 1;
                    }
                    run = 1;
                }
                last_detected = Some(detected);

                if r.regime.analyzing {
                    continue;
                }
                let committed = r.regime.committed();
                if last_committed != Some(committed) {
                    assert_eq!(committed, detected, "{mode}: committed an unseen regime");
                    assert!(run >= min_ticks, "{mode}: committed after a run of {run}");
                    commits += 1;
                }
                last_committed = Some(committed);
            }
        }

        assert_eq!(flips, runs.len() - 1);
        assert!(
            commits <= total / min_ticks,
            "{mode}: {commits} commits over {total} ticks"
        );
        let qualifying = runs.iter().filter(|len| **len >= min_ticks).count();
        assert!(commits <= qualifying, "{mode}: {commits} > {qualifying}");
        if min_ticks == 1 {
            assert_eq!(commits, runs.len(), "{mode}");
        }
    }
}

#[test]
fn strict_alternation_never_commits_with_multi_tick_hysteresis() {
    for mode in [Mode::SwingTrader, Mode::Investor] {
        assert!(mode.profile().regime_min_ticks > 1);
        let mut e = engine(mode);
        for i in 0..40 {
            let snap = if i % 2 == 0 { bid_vacuum(i * 100) } else { ask_vacuum(i * 100) };
            let r = e.update(snap);
            assert!(r.regime.analyzing, "{mode}: committed at tick {i}");
            assert_eq!(r.regime.pending_ticks, 1);
        }
    }
}

#[test]
fn steady_book_commits_after_min_ticks() {
    for mode in [Mode::MarketMaker, Mode::SwingTrader, Mode::Investor] {
        let mut e = engine(mode);
        let min_ticks = mode.profile().regime_min_ticks as i64;
        let mut committed_at = None;
        for i in 0..20 {
            let r = e.update(book(200.0, 100.0, "BTCUSDT", i * 100));
            if !r.regime.analyzing && committed_at.is_none() {
                committed_at = Some(i + 1);
            }
        }
        assert_eq!(committed_at, Some(min_ticks), "{mode}");
    }
}

#[test]
fn empty_book_reports_analyzing() {
    let mut e = engine(Mode::SwingTrader);
    let r = e.update_levels(Vec::new(), 100.0, "BTCUSDT", "1m");
    assert_eq!(r.quality, SignalQuality::Analyzing);
    assert!(r.alpha.score.is_none());

    let r = e.update_levels(vec![Level::support(99.0, 10.0)], 0.0, "BTCUSDT", "1m");
    assert_eq!(r.quality, SignalQuality::Analyzing);
}

#[test]
fn close_bullish_biases_are_aligned() {
    let r = compose(80.0, 75.0, 70.0, ConsensusWeighting::Balanced);
    assert_eq!(r.alignment, Alignment::Aligned);
    assert!(r.confidence >= 90.0);
    assert!(r.consensus > 0.0);
}
