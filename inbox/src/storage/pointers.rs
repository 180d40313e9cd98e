//! Local bookkeeping for pointers this node has published.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};

use crate::config::MAX_POINTER_RECORD_SIZE;
use crate::crypto::PeerId;
use crate::error::{InboxError, InboxResult};
use crate::pointer::{Locator, Pointer, Purpose};
use crate::util::{cbor_from_limited_reader, cbor_to_vec};

#[derive(Clone)]
pub struct PointerStore {
    conn: Arc<Mutex<Connection>>,
}

fn blob32(row: &Row<'_>, idx: usize) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Blob,
            format!("expected 32 bytes, got {}", v.len()).into(),
        )
    })
}

struct PointerRow {
    id: [u8; 32],
    purpose: u8,
    locator: [u8; 32],
    addresses: Vec<u8>,
    ttl_secs: i64,
    published_at: i64,
}

impl PointerRow {
    fn into_pointer(self) -> InboxResult<Pointer> {
        Ok(Pointer {
            id: PeerId::from_bytes(self.id),
            locator: Locator::from_bytes(self.locator),
            purpose: Purpose::from_tag(self.purpose)?,
            addresses: cbor_from_limited_reader(&self.addresses, MAX_POINTER_RECORD_SIZE)?,
            ttl_secs: u64::try_from(self.ttl_secs).unwrap_or(0),
            published_at: u64::try_from(self.published_at).unwrap_or(0),
        })
    }
}

impl PointerStore {
    pub(super) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Insert or replace the row for `(pointer.id, pointer.purpose)`.
    pub fn put(&self, pointer: &Pointer) -> InboxResult<()> {
        let addresses = cbor_to_vec(&pointer.addresses)?;
        let ttl = i64::try_from(pointer.ttl_secs)
            .map_err(|_| InboxError::Storage(format!("TTL too large: {}", pointer.ttl_secs)))?;
        let published_at = i64::try_from(pointer.published_at).map_err(|_| {
            InboxError::Storage(format!("Timestamp too large: {}", pointer.published_at))
        })?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO pointers
                (id, purpose, locator, addresses, ttl_secs, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pointer.id.as_bytes().as_slice(),
                pointer.purpose.tag(),
                pointer.locator.as_bytes().as_slice(),
                addresses,
                ttl,
                published_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: &PeerId, purpose: Purpose) -> InboxResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM pointers WHERE id = ?1 AND purpose = ?2",
            params![id.as_bytes().as_slice(), purpose.tag()],
        )?;
        Ok(())
    }

    /// Remove every pointer with `purpose`. Returns the number removed.
    pub fn delete_all(&self, purpose: Purpose) -> InboxResult<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM pointers WHERE purpose = ?1",
            params![purpose.tag()],
        )?;
        Ok(removed)
    }

    pub fn get_all(&self) -> InboxResult<Vec<Pointer>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT id, purpose, locator, addresses, ttl_secs, published_at
                 FROM pointers ORDER BY published_at",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok(PointerRow {
                    id: blob32(row, 0)?,
                    purpose: row.get(1)?,
                    locator: blob32(row, 2)?,
                    addresses: row.get(3)?,
                    ttl_secs: row.get(4)?,
                    published_at: row.get(5)?,
                })
            })?;
            let collected = mapped.collect::<rusqlite::Result<Vec<_>>>()?;
            collected
        };
        rows.into_iter().map(PointerRow::into_pointer).collect()
    }

    pub fn get_by_purpose(&self, purpose: Purpose) -> InboxResult<Vec<Pointer>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|p| p.purpose == purpose)
            .collect())
    }
}
