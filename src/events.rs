// 7.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists
// all event types.

use crate::types::{Money, OrderId, Price, Segment, Side, Symbol, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // account events
    UserRegistered(UserRegisteredEvent),
    FundsDeposited(FundsDepositedEvent),

    // order lifecycle events
    OrderPlaced(OrderPlacedEvent),
    OrderExecuted(OrderExecutedEvent),
    OrderModified(OrderModifiedEvent),
    OrderCancelled(OrderCancelledEvent),

    // forced exits
    ProtectiveExit(ProtectiveExitEvent),

    // end of day
    EodSquareOff(EodSquareOffEvent),
    HoldingMigrated(HoldingMigratedEvent),
    ShortCarryCovered(ShortCarryCoveredEvent),

    // portfolio maintenance
    HoldingClosed(HoldingClosedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisteredEvent {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsDepositedEvent {
    pub user_id: UserId,
    pub amount: Money,
    pub new_available: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    pub trigger_price: Option<Price>,
    pub segment: Segment,
    pub short_first: bool,
    pub blocked: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExecutedEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    pub fill_price: Price,
    pub segment: Segment,
    pub short_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderModifiedEvent {
    pub order_id: OrderId,
    pub old_qty: i64,
    pub new_qty: i64,
    pub old_trigger: Option<Price>,
    pub new_trigger: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: CancelReason,
    pub refund: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CancelReason {
    UserRequested,
    EndOfDay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectiveExitEvent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub exit_side: Side,
    pub price: Price,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExitReason {
    StoplossHit,
    TargetHit,
    ManualClose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EodSquareOffEvent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub exit_side: Side,
    pub price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingMigratedEvent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortCarryCoveredEvent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub cover_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingClosedEvent {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub refund: Money,
}
