//! Set of retrieval addresses that have already been attempted.
//!
//! An address enters the set the moment a fetch is attempted and is never
//! removed here, whatever the outcome of the fetch. A failed fetch is
//! therefore never retried.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::trace;

use crate::config::now_unix;
use crate::error::InboxResult;

#[derive(Clone)]
pub struct OfflineMessages {
    conn: Arc<Mutex<Connection>>,
}

impl OfflineMessages {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn has(&self, address: &str) -> InboxResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .prepare_cached("SELECT 1 FROM offline_messages WHERE address = ?1")?
            .exists(params![address])?;
        Ok(found)
    }

    pub fn put(&self, address: &str) -> InboxResult<()> {
        self.claim(address).map(|_| ())
    }

    /// Mark `address` processed. Returns `true` if it was not already.
    ///
    /// Check and insert are one statement, so two overlapping scan cycles
    /// can never both win the same address.
    pub fn claim(&self, address: &str) -> InboxResult<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO offline_messages (address, processed_at) VALUES (?1, ?2)",
            params![address, now_unix() as i64],
        )?;
        trace!("Claim {}: {}", address, inserted == 1);
        Ok(inserted == 1)
    }

    pub fn count(&self) -> InboxResult<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM offline_messages", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
