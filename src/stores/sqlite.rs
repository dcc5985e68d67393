//! Implements a SQLite backed transaction store.
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, TransactionBehavior};

use crate::{
    Error, SPENDING_LIMIT, Transaction, UserId, stores::TransactionStore,
    transaction::check_spending_limit,
};

/// Stores transactions in a SQLite database.
///
/// SQLite does not support `SELECT ... FOR UPDATE`, so the limit check runs in
/// an `IMMEDIATE` transaction instead. This takes the database write lock when
/// the transaction begins, which serializes every check-then-insert, not just
/// the ones for the same user.
///
/// The database must have been set up with [initialize](crate::initialize_db).
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn create_blocking(&self, transaction: Transaction) -> Result<Transaction, Error> {
        let mut connection = self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        // Dropping `sql_transaction` without committing rolls it back, so every
        // early return below leaves the database untouched.
        let sql_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let total: i64 = sql_transaction.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ?1",
            (transaction.user_id,),
            |row| row.get(0),
        )?;

        if let Err(error) = check_spending_limit(&transaction, total, SPENDING_LIMIT) {
            sql_transaction.rollback()?;
            return Err(error);
        }

        sql_transaction
            .execute(
                "INSERT INTO transactions (id, user_id, amount, description) VALUES (?1, ?2, ?3, ?4)",
                (
                    transaction.id,
                    transaction.user_id,
                    transaction.amount,
                    &transaction.description,
                ),
            )
            .map_err(|error| match error {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
                    },
                    _,
                ) => Error::DuplicateTransactionId(transaction.id),
                error => error.into(),
            })?;

        sql_transaction.commit()?;

        Ok(transaction)
    }

    fn total_for_user_blocking(&self, user_id: UserId) -> Result<i64, Error> {
        let connection = self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        connection
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ?1",
                (user_id,),
                |row| row.get(0),
            )
            .map_err(|error| error.into())
    }
}

// The connection mutex and SQLite's file I/O both block, so the work runs on
// tokio's blocking thread pool instead of an async worker thread.
impl TransactionStore for SQLiteTransactionStore {
    async fn create(&self, transaction: Transaction) -> Result<Transaction, Error> {
        let store = self.clone();

        tokio::task::spawn_blocking(move || store.create_blocking(transaction))
            .await
            .map_err(|error| {
                tracing::error!("transaction task failed: {error}");
                Error::BlockingTaskError(error)
            })?
    }

    async fn total_for_user(&self, user_id: UserId) -> Result<i64, Error> {
        let store = self.clone();

        tokio::task::spawn_blocking(move || store.total_for_user_blocking(user_id))
            .await
            .map_err(|error| {
                tracing::error!("total task failed: {error}");
                Error::BlockingTaskError(error)
            })?
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use rusqlite::Connection;

    use crate::{Error, Transaction, db::initialize, stores::TransactionStore};

    use super::SQLiteTransactionStore;

    fn get_test_store() -> SQLiteTransactionStore {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        SQLiteTransactionStore::new(Arc::new(Mutex::new(conn)))
    }

    fn new_transaction(id: i64, user_id: i64, amount: i64) -> Transaction {
        Transaction {
            id,
            user_id,
            amount,
            description: format!("transaction #{id}"),
        }
    }

    fn count_rows(store: &SQLiteTransactionStore) -> i64 {
        store
            .connection
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(id) FROM transactions", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn can_create_transaction() {
        let store = get_test_store();
        let want = new_transaction(1, 1, 250);

        let got = store.create(want.clone()).await.unwrap();

        assert_eq!(want, got);
        assert_eq!(store.total_for_user(1).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn total_is_zero_for_user_without_transactions() {
        let store = get_test_store();

        assert_eq!(store.total_for_user(123).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn accumulates_until_just_below_limit() {
        let store = get_test_store();

        store.create(new_transaction(1, 1, 500)).await.unwrap();
        store.create(new_transaction(2, 1, 499)).await.unwrap();

        assert_eq!(store.total_for_user(1).await.unwrap(), 999);
    }

    #[tokio::test]
    async fn rejects_transaction_that_reaches_limit() {
        let store = get_test_store();
        store.create(new_transaction(1, 1, 400)).await.unwrap();

        let result = store.create(new_transaction(2, 1, 600)).await;

        assert!(
            matches!(result, Err(Error::LimitExceeded { total: 400, .. })),
            "got {result:?}"
        );
        assert_eq!(store.total_for_user(1).await.unwrap(), 400);
        assert_eq!(count_rows(&store), 1);
    }

    #[tokio::test]
    async fn limit_is_per_user() {
        let store = get_test_store();
        store.create(new_transaction(1, 1, 999)).await.unwrap();

        store.create(new_transaction(2, 2, 999)).await.unwrap();

        assert_eq!(store.total_for_user(1).await.unwrap(), 999);
        assert_eq!(store.total_for_user(2).await.unwrap(), 999);
    }

    #[tokio::test]
    async fn duplicate_id_leaves_total_unchanged() {
        let store = get_test_store();
        store.create(new_transaction(1, 1, 100)).await.unwrap();

        let result = store.create(new_transaction(1, 2, 50)).await;

        assert!(
            matches!(result, Err(Error::DuplicateTransactionId(1))),
            "got {result:?}"
        );
        assert_eq!(store.total_for_user(2).await.unwrap(), 0);
        assert_eq!(store.total_for_user(1).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn store_is_usable_after_rejection() {
        let store = get_test_store();
        store.create(new_transaction(1, 1, 900)).await.unwrap();
        store.create(new_transaction(2, 1, 100)).await.unwrap_err();

        store.create(new_transaction(3, 1, 99)).await.unwrap();

        assert_eq!(store.total_for_user(1).await.unwrap(), 999);
    }

    #[tokio::test]
    async fn waiting_for_connection_does_not_block_runtime() {
        let store = get_test_store();
        let connection = store.connection.lock().unwrap();

        let handle = tokio::spawn({
            let store = store.clone();
            async move { store.create(new_transaction(1, 1, 100)).await }
        });

        // On a single threaded runtime this sleep only finishes if the
        // waiting `create` is off the async worker thread.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        drop(connection);
        handle.await.unwrap().unwrap();
        assert_eq!(store.total_for_user(1).await.unwrap(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_for_same_user_are_serialized() {
        let store = get_test_store();

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.create(new_transaction(1, 1, 600)).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.create(new_transaction(2, 1, 600)).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];

        let admitted = results.iter().filter(|result| result.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|result| matches!(result, Err(Error::LimitExceeded { .. })))
            .count();
        assert_eq!(admitted, 1, "got {results:?}");
        assert_eq!(rejected, 1, "got {results:?}");
        assert_eq!(store.total_for_user(1).await.unwrap(), 600);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_for_different_users_are_all_admitted() {
        let store = get_test_store();

        let handles: Vec<_> = (1..=8)
            .map(|user_id| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_transaction(user_id, user_id, 600)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for user_id in 1..=8 {
            assert_eq!(store.total_for_user(user_id).await.unwrap(), 600);
        }
    }
}
