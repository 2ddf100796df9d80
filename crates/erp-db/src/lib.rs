//! # erp-db
//!
//! libSQL storage for the college ERP.
//!
//! Holds the append-only audit log, the per-`(prefix, year)` number
//! sequences, the system settings table and attachment metadata. Plain writes
//! are single SQL statements, so a statement that fails leaves no partial
//! state and can be retried as a fresh attempt (see [`retry`]). Writes that
//! must read the old row first run in a [`WriteTxn`].

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod retry;
pub mod service;

use std::time::Duration;

use error::DatabaseError;
use libsql::params::IntoParams;
use libsql::{Builder, TransactionBehavior};
use retry::{RetryConfig, is_transient_lock_error};
use tokio::sync::{Mutex, MutexGuard};

/// Default wait on a locked database file before a statement fails.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Central database handle.
///
/// Wraps a libSQL database and one connection, plus the retry policy used by
/// [`ErpDb::execute_with`] and [`ErpDb::query_row_with`].
///
/// Tasks share the connection. Each statement holds `gate` while it runs, and
/// a [`WriteTxn`] holds it until it ends, so no statement from another task
/// lands inside someone else's transaction.
pub struct ErpDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    retry: RetryConfig,
    gate: Mutex<()>,
}

/// An open `BEGIN IMMEDIATE` transaction on the shared connection.
///
/// Other statements issued through the same [`ErpDb`] wait until it is
/// committed or dropped. Dropping it without [`WriteTxn::commit`] rolls back.
pub struct WriteTxn<'a> {
    tx: libsql::Transaction,
    _gate: MutexGuard<'a, ()>,
}

impl WriteTxn<'_> {
    /// Run a statement that yields at most one row.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the statement fails.
    pub async fn query_row(
        &self,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let mut rows = self.tx.query(sql, params).await?;
        Ok(rows.next().await?)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the commit fails.
    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl ErpDb {
    /// Open a local database at the given path (`":memory:"` for tests).
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open_local_with(path, DEFAULT_BUSY_TIMEOUT, RetryConfig::default()).await
    }

    /// Open a local database with explicit busy timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened, the pragmas
    /// cannot be applied, or migrations fail.
    pub async fn open_local_with(
        path: &str,
        busy_timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // PRAGMA busy_timeout returns a row, so it goes through query().
        let millis = busy_timeout.as_millis();
        let mut rows = conn
            .query(&format!("PRAGMA busy_timeout = {millis}"), ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA busy_timeout: {e}")))?;
        while rows.next().await?.is_some() {}
        drop(rows);

        let erp_db = Self {
            db,
            conn,
            retry,
            gate: Mutex::new(()),
        };
        erp_db.run_migrations().await?;
        tracing::debug!(path, "database opened");
        Ok(erp_db)
    }

    /// Start a `BEGIN IMMEDIATE` transaction, retrying while another
    /// connection holds the write lock.
    ///
    /// Do not call the other `ErpDb` methods while holding the returned
    /// handle; they wait for it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the transaction cannot be started.
    pub async fn begin_write(&self) -> Result<WriteTxn<'_>, DatabaseError> {
        let gate = self.gate.lock().await;
        let mut attempt = 1;
        loop {
            match self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await
            {
                Ok(tx) => return Ok(WriteTxn { tx, _gate: gate }),
                Err(e) => self.backoff_or_fail(e, &mut attempt).await?,
            }
        }
    }

    /// Execute a statement, retrying on lock contention.
    ///
    /// `params` is a factory because libSQL consumes the parameters on every
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` for non-transient failures or once the
    /// attempts are exhausted.
    pub async fn execute_with<P, F>(&self, sql: &str, params: F) -> Result<u64, DatabaseError>
    where
        P: IntoParams,
        F: Fn() -> P,
    {
        let _gate = self.gate.lock().await;
        let mut attempt = 1;
        loop {
            match self.conn.execute(sql, params()).await {
                Ok(changed) => return Ok(changed),
                Err(e) => self.backoff_or_fail(e, &mut attempt).await?,
            }
        }
    }

    /// Run a statement that yields at most one row (a `SELECT` or an
    /// `INSERT ... RETURNING`), retrying on lock contention.
    ///
    /// The first row is fetched inside the retry loop because SQLite reports
    /// lock errors on the first step, not on prepare.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` for non-transient failures or once the
    /// attempts are exhausted.
    pub async fn query_row_with<P, F>(
        &self,
        sql: &str,
        params: F,
    ) -> Result<Option<libsql::Row>, DatabaseError>
    where
        P: IntoParams,
        F: Fn() -> P,
    {
        let _gate = self.gate.lock().await;
        let mut attempt = 1;
        loop {
            let stepped = match self.conn.query(sql, params()).await {
                Ok(mut rows) => rows.next().await,
                Err(e) => Err(e),
            };
            match stepped {
                Ok(row) => return Ok(row),
                Err(e) => self.backoff_or_fail(e, &mut attempt).await?,
            }
        }
    }

    /// Run a multi-row query, retrying on lock contention at prepare time.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the query cannot be started.
    pub async fn query_with<P, F>(&self, sql: &str, params: F) -> Result<libsql::Rows, DatabaseError>
    where
        P: IntoParams,
        F: Fn() -> P,
    {
        let _gate = self.gate.lock().await;
        let mut attempt = 1;
        loop {
            match self.conn.query(sql, params()).await {
                Ok(rows) => return Ok(rows),
                Err(e) => self.backoff_or_fail(e, &mut attempt).await?,
            }
        }
    }

    async fn backoff_or_fail(
        &self,
        error: libsql::Error,
        attempt: &mut u32,
    ) -> Result<(), DatabaseError> {
        if !is_transient_lock_error(&error) || *attempt >= self.retry.max_attempts {
            return Err(error.into());
        }
        let delay = self.retry.delay_for(*attempt);
        tracing::debug!(
            attempt = *attempt,
            max_attempts = self.retry.max_attempts,
            ?delay,
            %error,
            "database locked, retrying"
        );
        tokio::time::sleep(delay).await;
        *attempt += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test_support;
