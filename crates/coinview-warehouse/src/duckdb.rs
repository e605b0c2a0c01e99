//! `DuckDB` connection pooling.
//!
//! Every pooled connection is cloned from one root connection, so all of them
//! share a single database instance (file-backed or in-memory).

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

struct PoolInner {
    location: Option<PathBuf>,
    max_idle: usize,
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
}

/// Shared pool of connections to one `DuckDB` database.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened as a `DuckDB` database.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let path = path.into();
        let root = Connection::open(&path)?;
        Ok(Self::from_root(root, Some(path), max_idle))
    }

    /// Open a private in-memory database. Data lives as long as the pool.
    ///
    /// # Errors
    /// Returns an error if `DuckDB` fails to allocate the database.
    pub fn open_in_memory(max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let root = Connection::open_in_memory()?;
        Ok(Self::from_root(root, None, max_idle))
    }

    fn from_root(root: Connection, location: Option<PathBuf>, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                location,
                max_idle: max_idle.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Check a connection out of the pool, cloning a fresh one from the root
    /// when no idle connection is available.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be created or configured.
    ///
    /// # Panics
    /// Panics if a pool mutex is poisoned.
    pub fn checkout(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .inner
            .idle
            .lock()
            .expect("duckdb idle pool mutex poisoned")
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => {
                let root = self
                    .inner
                    .root
                    .lock()
                    .expect("duckdb root connection mutex poisoned");
                let connection = root.try_clone()?;
                drop(root);
                connection.execute_batch("PRAGMA disable_progress_bar;")?;
                connection
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Path of the backing file, `None` for in-memory databases.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.inner.location.as_deref()
    }
}

/// A checked-out connection; returned to the idle list on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .expect("duckdb idle pool mutex poisoned");
        if idle.len() < self.pool.max_idle {
            idle.push(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_connections_share_one_in_memory_database() {
        let pool = ConnectionPool::open_in_memory(2).expect("pool");

        {
            let writer = pool.checkout().expect("writer");
            writer
                .execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);")
                .expect("seed");
        }

        let reader = pool.checkout().expect("reader");
        let value: i32 = reader
            .query_row("SELECT v FROM t", [], |row| row.get(0))
            .expect("select");
        assert_eq!(value, 7);
        assert!(pool.location().is_none());
    }

    #[test]
    fn idle_list_is_capped() {
        let pool = ConnectionPool::open_in_memory(1).expect("pool");
        let first = pool.checkout().expect("first");
        let second = pool.checkout().expect("second");
        drop(first);
        drop(second);

        let idle = pool.inner.idle.lock().expect("idle lock").len();
        assert_eq!(idle, 1);
    }
}
