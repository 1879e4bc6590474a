// equity-core: retail equity paper-trading engine.
// order lifecycle and position accounting take priority: every path that
// moves money is validate-then-mutate or runs under snapshot rollback.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: UserId, OrderId, Symbol, Side, Segment, Price, Money, Timestamp
//   2.x  order.rs: order rows and the Open/Processing/Closed/Cancelled state machine
//   3.x  store.rs: order store with the conditional Open->Processing claim
//   4.x  lots.rs: symmetric FIFO lot matching, realized pnl
//   5.x  quotes.rs: pushed quote board with staleness filtering
//   6.x  config.rs: trading window, epsilon, TTLs
//   7.x  events.rs: state transition events for audit
//   8.x  engine/: placement, trigger sweep, SL/target watcher, EOD settlement, views
//        funds.rs: per-user cash ledger
//        portfolio.rs: standing long and short-carry holding books
//        records.rs: append-only exit records

// core trading modules
pub mod config;
pub mod engine;
pub mod events;
pub mod funds;
pub mod lots;
pub mod order;
pub mod portfolio;
pub mod quotes;
pub mod records;
pub mod store;
pub mod types;

// re exports for convenience
pub use config::EngineConfig;
pub use engine::{
    Engine, EngineError, EodReport, FundsView, HistoryEntry, HoldingView, OpenOrderView,
    PlaceRequest, PlacementResult, PortfolioView, PositionView, ProtectiveExit, SellPreview,
    SquareOff, SweepReport,
};
pub use events::{Event, EventId, EventPayload, ExitReason};
pub use funds::{FundsAccount, FundsError};
pub use lots::{Execution, Lot, LotBook};
pub use order::{Order, OrderStatus};
pub use portfolio::{Holding, HoldingBook};
pub use quotes::{QuoteBoard, QuoteError, QuoteUpdate};
pub use records::{ExitLog, ExitRecord};
pub use store::{ClaimError, OrderStore};
pub use types::{Money, OrderId, Price, Segment, Side, Symbol, Timestamp, UserId};
