//! Append-only exit records.
//!
//! Every forced exit writes one row: protective stops, EOD square-offs, and
//! delivery sell legs migrating to history. Rows are never mutated.

use crate::types::{Price, Segment, Side, Symbol, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub price: Price,
    pub timestamp: Timestamp,
    // SELL closes a long, BUY covers a short
    pub exit_side: Side,
    pub segment: Segment,
}

#[derive(Debug, Clone, Default)]
pub struct ExitLog {
    records: Vec<ExitRecord>,
}

impl ExitLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn append(&mut self, record: ExitRecord) {
        self.records.push(record);
    }

    pub fn all(&self) -> &[ExitRecord] {
        &self.records
    }

    pub fn for_user(&self, user_id: UserId) -> impl Iterator<Item = &ExitRecord> {
        self.records.iter().filter(move |r| r.user_id == user_id)
    }

    // a forced exit may already have been recorded by the watcher; settlement
    // checks before appending the same execution again
    pub fn contains(&self, record: &ExitRecord) -> bool {
        self.records.iter().any(|r| r == record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // EOD rollback support: the log is append-only, so restoring a prior
    // length is equivalent to undoing this invocation's appends.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}
