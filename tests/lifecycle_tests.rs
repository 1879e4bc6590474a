//! Order lifecycle tests.
//!
//! Placement, funds symmetry, short-sell gating, and the trigger sweep,
//! driven end to end through the public engine surface.

use equity_core::*;
use rust_decimal_macros::dec;

// 2024-01-15 10:00 IST, a Monday inside the trading window
const SESSION: i64 = 1_705_293_000_000;

fn session_engine() -> (Engine, UserId) {
    let mut engine = Engine::new(EngineConfig::nse());
    engine.set_time(Timestamp::from_millis(SESSION));
    let user = engine.register_user("asha");
    engine.add_funds(user, dec!(10000)).unwrap();
    (engine, user)
}

#[test]
fn market_buy_debits_exact_cost() {
    let (mut engine, user) = session_engine();
    engine.update_quote("TCS", dec!(500)).unwrap();

    let result = engine
        .place_order(PlaceRequest::market(user, "TCS", Side::Buy, 10, Segment::Intraday))
        .unwrap();

    let PlacementResult::Executed { fill_price, qty, short_first, .. } = result else {
        panic!("market buy should execute immediately");
    };
    assert_eq!(fill_price.value(), dec!(500));
    assert_eq!(qty, 10);
    assert!(!short_first);

    let funds = engine.funds(user).unwrap();
    assert_eq!(funds.available_funds, dec!(5000.00));

    let history = engine.history(user).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].open_side, Side::Buy);
    assert_eq!(history[0].open_price, dec!(500.00));
}

#[test]
fn market_buy_insufficient_funds_rejects_without_mutation() {
    let (mut engine, user) = session_engine();
    engine.update_quote("TCS", dec!(500)).unwrap();

    let result =
        engine.place_order(PlaceRequest::market(user, "TCS", Side::Buy, 100, Segment::Intraday));
    assert!(matches!(result, Err(EngineError::Funds(_))));

    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10000.00));
    assert!(engine.history(user).unwrap().is_empty());
}

#[test]
fn market_order_without_quote_fails() {
    let (mut engine, user) = session_engine();

    let result =
        engine.place_order(PlaceRequest::market(user, "TCS", Side::Buy, 10, Segment::Intraday));
    assert!(matches!(result, Err(EngineError::Quote(_))));
}

#[test]
fn invalid_quantity_rejected_before_any_mutation() {
    let (mut engine, user) = session_engine();
    engine.update_quote("TCS", dec!(500)).unwrap();

    let result =
        engine.place_order(PlaceRequest::market(user, "TCS", Side::Buy, 0, Segment::Intraday));
    assert!(matches!(result, Err(EngineError::InvalidQuantity(0))));
}

#[test]
fn placement_outside_window_rejected() {
    let (mut engine, user) = session_engine();
    engine.update_quote("TCS", dec!(500)).unwrap();
    // 08:00 IST, before the open
    engine.set_time(Timestamp::from_millis(SESSION - 2 * 3600 * 1000));

    let result =
        engine.place_order(PlaceRequest::market(user, "TCS", Side::Buy, 10, Segment::Intraday));
    assert!(matches!(result, Err(EngineError::MarketClosed)));
}

#[test]
fn sell_without_ownership_needs_confirmation() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    let result = engine
        .place_order(PlaceRequest::market(user, "X", Side::Sell, 5, Segment::Intraday))
        .unwrap();

    let PlacementResult::NeedsShortConfirmation { requested_qty, owned_qty } = result else {
        panic!("expected short confirmation request");
    };
    assert_eq!(requested_qty, 5);
    assert_eq!(owned_qty, 0);

    // no order row, no funds movement
    assert!(engine.history(user).unwrap().is_empty());
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10000.00));
}

#[test]
fn allow_short_opens_short_first_leg() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    let result = engine
        .place_order(PlaceRequest::market(user, "X", Side::Sell, 5, Segment::Intraday).allow_short())
        .unwrap();

    let PlacementResult::Executed { short_first, fill_price, .. } = result else {
        panic!("short sell should execute");
    };
    assert!(short_first);
    assert_eq!(fill_price.value(), dec!(100));

    // proceeds credited
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10500.00));

    let positions = engine.positions(user).unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].side, Side::Sell);
    assert_eq!(positions[0].qty, 5);
}

#[test]
fn partial_ownership_sell_is_capped() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    engine
        .place_order(PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday))
        .unwrap();

    let result = engine
        .place_order(PlaceRequest::market(user, "X", Side::Sell, 15, Segment::Intraday))
        .unwrap();

    let PlacementResult::Executed { qty, capped_from, short_first, .. } = result else {
        panic!("capped sell should execute");
    };
    assert_eq!(qty, 10);
    assert_eq!(capped_from, Some(15));
    assert!(!short_first);
}

#[test]
fn preview_sell_reports_owned_quantity() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    let preview = engine.preview_sell(user, "X", 5).unwrap();
    assert_eq!(preview.owned_qty, 0);
    assert!(preview.needs_confirmation);
    assert!(!preview.can_sell);

    engine
        .place_order(PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday))
        .unwrap();

    let preview = engine.preview_sell(user, "X", 5).unwrap();
    assert_eq!(preview.owned_qty, 10);
    assert!(preview.can_sell);
    assert!(!preview.needs_confirmation);
}

#[test]
fn limit_buy_auto_corrects_to_live_price() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(95)).unwrap();

    // trigger already satisfied: live 95 <= trigger 100, so fill at 95 not 100
    let result = engine
        .place_order(PlaceRequest::limit(user, "X", Side::Buy, 10, dec!(100), Segment::Intraday))
        .unwrap();

    let PlacementResult::Executed { fill_price, .. } = result else {
        panic!("satisfied limit buy should execute immediately");
    };
    assert_eq!(fill_price.value(), dec!(95));
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(9050.00));
}

#[test]
fn resting_limit_buy_blocks_notional() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(120)).unwrap();

    let result = engine
        .place_order(PlaceRequest::limit(user, "X", Side::Buy, 10, dec!(100), Segment::Intraday))
        .unwrap();

    let PlacementResult::Placed { blocked, .. } = result else {
        panic!("unsatisfied limit should rest");
    };
    assert_eq!(blocked.value(), dec!(1000));
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(9000.00));
}

#[test]
fn cancel_refunds_exactly_the_block() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(120)).unwrap();

    let result = engine
        .place_order(PlaceRequest::limit(user, "X", Side::Buy, 10, dec!(100), Segment::Intraday))
        .unwrap();
    let PlacementResult::Placed { order_id, .. } = result else {
        panic!("expected resting order");
    };

    let refund = engine.cancel_order(order_id).unwrap();
    assert_eq!(refund.value(), dec!(1000));
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10000.00));

    // terminal: a second cancel is rejected
    assert!(matches!(
        engine.cancel_order(order_id),
        Err(EngineError::OrderNotOpen(_))
    ));
}

#[test]
fn cancel_sell_refunds_nothing() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    engine
        .place_order(PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday))
        .unwrap();
    let before = engine.funds(user).unwrap().available_funds;

    let result = engine
        .place_order(PlaceRequest::limit(user, "X", Side::Sell, 5, dec!(120), Segment::Intraday))
        .unwrap();
    let PlacementResult::Placed { order_id, .. } = result else {
        panic!("expected resting sell");
    };

    let refund = engine.cancel_order(order_id).unwrap();
    assert_eq!(refund.value(), dec!(0));
    assert_eq!(engine.funds(user).unwrap().available_funds, before);
}

#[test]
fn modify_rebalances_the_buy_block() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(120)).unwrap();

    let result = engine
        .place_order(PlaceRequest::limit(user, "X", Side::Buy, 10, dec!(100), Segment::Intraday))
        .unwrap();
    let PlacementResult::Placed { order_id, .. } = result else {
        panic!("expected resting order");
    };
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(9000.00));

    engine.modify_order(order_id, 5, dec!(110)).unwrap();
    // new block 550, old block 1000: the difference came back
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(9450.00));

    // cancel refunds the block as it stands after the modification
    let refund = engine.cancel_order(order_id).unwrap();
    assert_eq!(refund.value(), dec!(550));
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10000.00));
}

#[test]
fn trigger_sweep_fills_buy_when_price_reaches_trigger() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(120)).unwrap();

    let result = engine
        .place_order(PlaceRequest::limit(user, "X", Side::Buy, 10, dec!(100), Segment::Intraday))
        .unwrap();
    let PlacementResult::Placed { order_id, .. } = result else {
        panic!("expected resting order");
    };

    // above trigger: nothing fires
    let report = engine.run_trigger_sweep();
    assert!(report.executed.is_empty());
    assert_eq!(report.still_pending, 1);

    engine.advance_time(5_000);
    engine.update_quote("X", dec!(99)).unwrap();
    let report = engine.run_trigger_sweep();
    assert_eq!(report.executed, vec![order_id]);

    // filled at the trigger price; the block was the payment
    let funds = engine.funds(user).unwrap();
    assert_eq!(funds.available_funds, dec!(9000.00));

    let positions = engine.positions(user).unwrap();
    assert_eq!(positions[0].qty, 10);
    assert_eq!(positions[0].avg_price, dec!(100.00));
}

#[test]
fn trigger_sweep_without_quote_leaves_order_pending() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(120)).unwrap();

    engine
        .place_order(PlaceRequest::limit(user, "X", Side::Buy, 10, dec!(100), Segment::Intraday))
        .unwrap();

    // stale the quote out, then sweep
    engine.advance_time(10 * 60_000);
    let report = engine.run_trigger_sweep();
    assert_eq!(report.no_quote, 1);
    assert!(report.executed.is_empty());

    // fresh quote on the next sweep executes it
    engine.update_quote("X", dec!(98)).unwrap();
    let report = engine.run_trigger_sweep();
    assert_eq!(report.executed.len(), 1);
}

#[test]
fn normal_sell_limit_fires_on_rise() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    engine
        .place_order(PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday))
        .unwrap();
    engine
        .place_order(PlaceRequest::limit(user, "X", Side::Sell, 10, dec!(110), Segment::Intraday))
        .unwrap();

    engine.advance_time(5_000);
    engine.update_quote("X", dec!(111)).unwrap();
    let report = engine.run_trigger_sweep();
    assert_eq!(report.executed.len(), 1);

    // bought 1000, sold at trigger 110 x 10
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10100.00));
}

#[test]
fn short_first_sell_limit_fires_on_decline() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    // short-first entry: wants to sell when the price falls to 90
    let result = engine
        .place_order(
            PlaceRequest::limit(user, "X", Side::Sell, 5, dec!(90), Segment::Intraday).allow_short(),
        )
        .unwrap();
    assert!(matches!(result, PlacementResult::Placed { short_first: true, .. }));

    // rising price must not fire the mirrored rule
    engine.advance_time(5_000);
    engine.update_quote("X", dec!(105)).unwrap();
    assert!(engine.run_trigger_sweep().executed.is_empty());

    engine.advance_time(5_000);
    engine.update_quote("X", dec!(89)).unwrap();
    let report = engine.run_trigger_sweep();
    assert_eq!(report.executed.len(), 1);

    // proceeds at the trigger price
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(10450.00));
}

#[test]
fn stoploss_forces_long_exit() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    engine
        .place_order(
            PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday)
                .with_levels(Some(dec!(95)), Some(dec!(120))),
        )
        .unwrap();

    engine.advance_time(5_000);
    engine.update_quote("X", dec!(94)).unwrap();
    let exits = engine.run_protection_sweep();

    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].exit_side, Side::Sell);
    assert_eq!(exits[0].qty, 10);
    assert!(matches!(exits[0].reason, ExitReason::StoplossHit));

    // flat now; the sweep is idempotent
    assert!(engine.positions(user).unwrap().is_empty());
    assert!(engine.run_protection_sweep().is_empty());

    // 10000 - 1000 + 940
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(9940.00));
    assert_eq!(engine.exit_records(user).len(), 1);
}

#[test]
fn target_forces_short_cover() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    // short-first with mirrored levels: stoploss below, target above
    engine
        .place_order(
            PlaceRequest::market(user, "X", Side::Sell, 5, Segment::Intraday)
                .allow_short()
                .with_levels(Some(dec!(80)), Some(dec!(110))),
        )
        .unwrap();

    engine.advance_time(5_000);
    engine.update_quote("X", dec!(112)).unwrap();
    let exits = engine.run_protection_sweep();

    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].exit_side, Side::Buy);
    assert!(matches!(exits[0].reason, ExitReason::TargetHit));

    // 10000 + 500 - 560
    assert_eq!(engine.funds(user).unwrap().available_funds, dec!(9940.00));
}

#[test]
fn unset_levels_never_trigger_watcher() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    // zero and negative levels are treated as not set
    engine
        .place_order(
            PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday)
                .with_levels(Some(dec!(0)), Some(dec!(-5))),
        )
        .unwrap();

    engine.advance_time(5_000);
    engine.update_quote("X", dec!(1)).unwrap();
    assert!(engine.run_protection_sweep().is_empty());
}

#[test]
fn close_position_exits_at_live() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();

    engine
        .place_order(PlaceRequest::market(user, "X", Side::Buy, 10, Segment::Intraday))
        .unwrap();

    engine.update_quote("X", dec!(107)).unwrap();
    let exit = engine.close_position(user, "X").unwrap();
    assert_eq!(exit.qty, 10);
    assert_eq!(exit.price.value(), dec!(107));

    assert!(engine.positions(user).unwrap().is_empty());
    assert!(matches!(
        engine.close_position(user, "X"),
        Err(EngineError::NoPosition(_))
    ));
}

#[test]
fn owned_quantity_includes_standing_holdings() {
    let (mut engine, user) = session_engine();
    engine.update_quote("X", dec!(100)).unwrap();
    engine.add_holding(user, "X", 8, dec!(90)).unwrap();

    // selling against the holding is not short-first
    let result = engine
        .place_order(PlaceRequest::market(user, "X", Side::Sell, 8, Segment::Delivery))
        .unwrap();
    let PlacementResult::Executed { short_first, capped_from, .. } = result else {
        panic!("sell against holding should execute");
    };
    assert!(!short_first);
    assert_eq!(capped_from, None);
}
