//! Paper-Trading Engine Simulation.
//!
//! Demonstrates the full account lifecycle: placement, limit triggers,
//! protective exits, and end-of-day settlement with portfolio migration.

use equity_core::*;
use rust_decimal_macros::dec;

// 2024-01-15 09:30 IST, a Monday inside the trading window
const SESSION_OPEN: i64 = 1_705_291_200_000;
// milliseconds from 09:30 to the 15:45 cutoff
const TO_CUTOFF: i64 = (6 * 60 + 15) * 60 * 1000;

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Equity Paper-Trading Engine Simulation");
    println!("Single Account, Full Order Lifecycle\n");

    scenario_1_market_orders();
    scenario_2_limit_triggers();
    scenario_3_short_first();
    scenario_4_protective_exits();
    scenario_5_end_of_day();

    println!("\nAll simulations completed successfully.");
}

fn session_engine() -> (Engine, UserId) {
    let mut engine = Engine::new(EngineConfig::nse());
    engine.set_time(Timestamp::from_millis(SESSION_OPEN));
    let user = engine.register_user("asha");
    engine.add_funds(user, dec!(100000)).unwrap();
    (engine, user)
}

/// Market buys and sells settle instantly against the quote board.
fn scenario_1_market_orders() {
    println!("Scenario 1: Market Orders\n");

    let (mut engine, user) = session_engine();
    engine.update_quote("TCS", dec!(500)).unwrap();

    println!("  Asha deposits 100,000, TCS quoted at 500");

    let result = engine
        .place_order(PlaceRequest::market(user, "TCS", Side::Buy, 10, Segment::Intraday))
        .unwrap();
    if let PlacementResult::Executed { fill_price, qty, .. } = &result {
        println!("  BUY {} TCS filled at {}", qty, fill_price);
    }

    engine.update_quote("TCS", dec!(520)).unwrap();
    engine
        .place_order(PlaceRequest::market(user, "TCS", Side::Sell, 10, Segment::Intraday))
        .unwrap();

    let funds = engine.funds(user).unwrap();
    println!("  SELL 10 TCS at 520, available funds: {}\n", funds.available_funds);
}

/// Resting limit orders execute when the sweep sees the trigger met.
fn scenario_2_limit_triggers() {
    println!("Scenario 2: Limit Triggers\n");

    let (mut engine, user) = session_engine();
    engine.update_quote("INFY", dec!(1500)).unwrap();

    let result = engine
        .place_order(PlaceRequest::limit(user, "INFY", Side::Buy, 5, dec!(1450), Segment::Intraday))
        .unwrap();
    if let PlacementResult::Placed { blocked, .. } = &result {
        println!("  BUY 5 INFY @ limit 1450 resting, blocked {}", blocked);
    }

    let report = engine.run_trigger_sweep();
    println!("  Sweep at 1500: {} executed, {} pending", report.executed.len(), report.still_pending);

    engine.advance_time(60_000);
    engine.update_quote("INFY", dec!(1448)).unwrap();
    let report = engine.run_trigger_sweep();
    println!("  Price drops to 1448, sweep executes {} order(s)", report.executed.len());

    let funds = engine.funds(user).unwrap();
    println!("  Available funds after fill: {}\n", funds.available_funds);
}

/// Selling more than owned needs explicit confirmation, then carries short.
fn scenario_3_short_first() {
    println!("Scenario 3: Short-First Selling\n");

    let (mut engine, user) = session_engine();
    engine.update_quote("SBIN", dec!(600)).unwrap();

    let result = engine
        .place_order(PlaceRequest::market(user, "SBIN", Side::Sell, 5, Segment::Intraday))
        .unwrap();
    if let PlacementResult::NeedsShortConfirmation { requested_qty, owned_qty } = result {
        println!("  SELL {} rejected pending confirmation (owned {})", requested_qty, owned_qty);
    }

    let result = engine
        .place_order(
            PlaceRequest::market(user, "SBIN", Side::Sell, 5, Segment::Intraday).allow_short(),
        )
        .unwrap();
    if let PlacementResult::Executed { short_first, fill_price, .. } = result {
        println!("  Re-submitted with allow-short: filled at {}, short_first={}", fill_price, short_first);
    }

    let positions = engine.positions(user).unwrap();
    for p in &positions {
        println!("  Position: {} {} x{}, pnl {:?}", p.side, p.symbol, p.qty, p.unrealized_pnl);
    }
    println!();
}

/// Stop-loss and target levels force exits when breached.
fn scenario_4_protective_exits() {
    println!("Scenario 4: Stop-Loss / Target Watcher\n");

    let (mut engine, user) = session_engine();
    engine.update_quote("HDFC", dec!(2000)).unwrap();

    engine
        .place_order(
            PlaceRequest::market(user, "HDFC", Side::Buy, 10, Segment::Intraday)
                .with_levels(Some(dec!(1950)), Some(dec!(2100))),
        )
        .unwrap();
    println!("  Long 10 HDFC @ 2000, stoploss 1950, target 2100");

    engine.advance_time(60_000);
    engine.update_quote("HDFC", dec!(2010)).unwrap();
    let exits = engine.run_protection_sweep();
    println!("  At 2010: {} exits", exits.len());

    engine.advance_time(60_000);
    engine.update_quote("HDFC", dec!(1945)).unwrap();
    let exits = engine.run_protection_sweep();
    for exit in &exits {
        println!("  At 1945: {} {} x{} ({:?})", exit.exit_side, exit.symbol, exit.qty, exit.reason);
    }

    let funds = engine.funds(user).unwrap();
    println!("  Available funds after stop: {}\n", funds.available_funds);
}

/// Past the cutoff, open orders cancel, intraday flattens, delivery migrates.
fn scenario_5_end_of_day() {
    println!("Scenario 5: End of Day\n");

    let (mut engine, user) = session_engine();
    engine.update_quote("TCS", dec!(500)).unwrap();
    engine.update_quote("INFY", dec!(1500)).unwrap();

    engine
        .place_order(PlaceRequest::market(user, "TCS", Side::Buy, 20, Segment::Intraday))
        .unwrap();
    engine
        .place_order(PlaceRequest::market(user, "INFY", Side::Buy, 4, Segment::Delivery))
        .unwrap();
    engine
        .place_order(PlaceRequest::limit(user, "TCS", Side::Buy, 5, dec!(480), Segment::Intraday))
        .unwrap();

    println!("  Intraday long 20 TCS, delivery 4 INFY, one resting limit");

    engine.advance_time(TO_CUTOFF);
    engine.update_quote("TCS", dec!(510)).unwrap();
    engine.update_quote("INFY", dec!(1520)).unwrap();

    let report = engine.run_end_of_day(user).unwrap();
    println!(
        "  EOD: {} cancelled (refund {}), {} squared off, {} migrated",
        report.cancelled_orders,
        report.refunded,
        report.square_offs.len(),
        report.migrated.len()
    );

    let second = engine.run_end_of_day(user).unwrap();
    println!("  Second run is a no-op: {}", second.is_noop());

    let portfolio = engine.portfolio(user).unwrap();
    for h in &portfolio.holdings {
        println!("  Holding: {} x{} @ {}", h.symbol, h.qty, h.avg_price);
    }
    let funds = engine.funds(user).unwrap();
    println!("  Available funds: {}", funds.available_funds);
}
