// Scoped transaction guard (spec §4.1 "a scoped `Transaction` acquires on
// construction and releases with rollback unless explicitly committed";
// Design Notes §9 "RAII for transactions").

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::CoreResult;

/// Wraps a `BEGIN`/`COMMIT`/`ROLLBACK` around a connection borrow. Dropping
/// the guard without calling `commit()` rolls back — every exit path
/// (early return, `?`, panic unwind) releases the transaction.
pub struct TxGuard<'conn> {
    conn: &'conn Connection,
    committed: bool,
    active: bool,
}

impl<'conn> TxGuard<'conn> {
    pub fn begin(conn: &'conn Connection) -> CoreResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            conn,
            committed: false,
            active: true,
        })
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }

    pub fn commit(mut self) -> CoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.committed = true;
        self.active = false;
        debug!("transaction committed");
        Ok(())
    }
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        if self.active && !self.committed {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback failed during transaction guard drop");
            } else {
                debug!("transaction rolled back");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::initialize_schema;

    #[test]
    fn drop_without_commit_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, false, 384).unwrap();
        {
            let tx = TxGuard::begin(&conn).unwrap();
            tx.connection()
                .execute(
                    "INSERT INTO packages (name, version) VALUES (?1, ?2)",
                    rusqlite::params!["rolled-back-pkg", "0.1.0"],
                )
                .unwrap();
            // no commit — guard drops here
        }
        let count: i64 = conn
            .query_row("SELECT count(*) FROM packages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn commit_persists_changes() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, false, 384).unwrap();
        {
            let tx = TxGuard::begin(&conn).unwrap();
            tx.connection()
                .execute(
                    "INSERT INTO packages (name, version) VALUES (?1, ?2)",
                    rusqlite::params!["committed-pkg", "0.1.0"],
                )
                .unwrap();
            tx.commit().unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT count(*) FROM packages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
