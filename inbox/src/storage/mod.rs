//! SQLite-backed persistence for the offline messaging core.
//!
//! Two tables: `offline_messages` (addresses already attempted) and
//! `pointers` (pointers this node published, for supersede and republish).

pub mod offline;
pub mod pointers;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

use crate::error::InboxResult;

pub use offline::OfflineMessages;
pub use pointers::PointerStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS offline_messages (
    address      TEXT PRIMARY KEY NOT NULL,
    processed_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS pointers (
    id           BLOB NOT NULL,
    purpose      INTEGER NOT NULL,
    locator      BLOB NOT NULL,
    addresses    BLOB NOT NULL,
    ttl_secs     INTEGER NOT NULL,
    published_at INTEGER NOT NULL,
    PRIMARY KEY (id, purpose)
);
";

/// Shared handle to the node database.
///
/// Cheap to clone; all clones use one connection behind a mutex. Queries
/// are short and never held across an `.await`.
#[derive(Clone)]
pub struct Datastore {
    conn: Arc<Mutex<Connection>>,
}

impl Datastore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> InboxResult<Self> {
        let path = path.as_ref();
        debug!("Opening offline message datastore at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database, used by tests and ephemeral nodes.
    pub fn open_in_memory() -> InboxResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> InboxResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Processed-address set.
    pub fn offline_messages(&self) -> OfflineMessages {
        OfflineMessages::new(self.conn.clone())
    }

    /// Bookkeeping for pointers we published.
    pub fn pointers(&self) -> PointerStore {
        PointerStore::new(self.conn.clone())
    }
}
