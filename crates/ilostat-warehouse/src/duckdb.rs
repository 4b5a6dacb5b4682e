//! Pooled `DuckDB` connections.
//!
//! The database file is opened once; every further connection is a clone of
//! that handle, so all connections share one database instance and its lock.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

#[derive(Default)]
struct PoolState {
    database: Option<Connection>,
    idle: Vec<Connection>,
}

struct Shared {
    db_path: PathBuf,
    max_idle: usize,
    state: Mutex<PoolState>,
}

/// Hands out connections to one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

impl ConnectionPool {
    /// At most `max_idle` connections are kept after use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                db_path: path.into(),
                max_idle: max_idle.max(1),
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Reuses an idle connection or clones a new one from the database handle.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let mut state = self
            .shared
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned");

        let connection = match state.idle.pop() {
            Some(connection) => connection,
            None => {
                let database = match state.database.take() {
                    Some(database) => database,
                    None => open_database(&self.shared.db_path)?,
                };
                let cloned = database.try_clone();
                state.database = Some(database);
                cloned?
            }
        };
        drop(state);

        Ok(PooledConnection {
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.shared.db_path
    }

    /// Connections currently parked in the pool.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .idle
            .len()
    }
}

/// A connection that goes back to its pool on drop.
pub struct PooledConnection {
    shared: Arc<Shared>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection already returned")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        if state.idle.len() < self.shared.max_idle {
            state.idle.push(connection);
        }
    }
}

fn open_database(path: &Path) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(connection)
}
