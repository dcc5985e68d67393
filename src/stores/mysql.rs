//! Implements a MySQL backed transaction store.

use sqlx::{
    MySqlPool,
    mysql::{MySqlDatabaseError, MySqlPoolOptions},
};

use crate::{
    DatabaseConfig, Error, SPENDING_LIMIT, Transaction, TransactionId, UserId,
    stores::TransactionStore, transaction::check_spending_limit,
};

/// MySQL error number for a duplicate key, e.g. a primary key violation.
const ER_DUP_ENTRY: u16 = 1062;
/// MySQL error number for a lock wait that timed out.
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// MySQL error number for a deadlock, the transaction has been rolled back.
const ER_LOCK_DEADLOCK: u16 = 1213;

/// Stores transactions in a MySQL database.
///
/// The limit check reads the user's total with `SELECT ... FOR UPDATE`, which
/// locks that user's rows (and the index gap where new rows for the user would
/// go) until the transaction ends. Requests for other users are not blocked.
///
/// The `transactions` table must already exist and should have an index on
/// `user_id`, otherwise InnoDB locks the whole table for the check.
#[derive(Debug, Clone)]
pub struct MySqlTransactionStore {
    pool: MySqlPool,
}

impl MySqlTransactionStore {
    /// Create a new store that uses the connections in `pool`.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connect to the MySQL server described by `config`.
    ///
    /// # Errors
    /// Returns an [Error::MySqlError] if the server cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await?;

        tracing::info!(
            "Connected to MySQL database {} at {}:{}",
            config.database,
            config.host,
            config.port
        );

        Ok(Self::new(pool))
    }
}

impl TransactionStore for MySqlTransactionStore {
    async fn create(&self, transaction: Transaction) -> Result<Transaction, Error> {
        // The connection goes back to the pool when `sql_transaction` is
        // dropped, which also rolls back anything not committed.
        let mut sql_transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| map_mysql_error(error, transaction.id))?;

        let total: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS SIGNED) FROM transactions WHERE user_id = ? FOR UPDATE",
        )
        .bind(transaction.user_id)
        .fetch_one(&mut *sql_transaction)
        .await
        .map_err(|error| map_mysql_error(error, transaction.id))?;

        if let Err(error) = check_spending_limit(&transaction, total, SPENDING_LIMIT) {
            sql_transaction
                .rollback()
                .await
                .map_err(|error| map_mysql_error(error, transaction.id))?;
            return Err(error);
        }

        sqlx::query("INSERT INTO transactions (id, user_id, amount, description) VALUES (?, ?, ?, ?)")
            .bind(transaction.id)
            .bind(transaction.user_id)
            .bind(transaction.amount)
            .bind(&transaction.description)
            .execute(&mut *sql_transaction)
            .await
            .map_err(|error| map_mysql_error(error, transaction.id))?;

        // InnoDB can report a deadlock or lock wait timeout at commit too.
        sql_transaction
            .commit()
            .await
            .map_err(|error| map_mysql_error(error, transaction.id))?;

        Ok(transaction)
    }

    async fn total_for_user(&self, user_id: UserId) -> Result<i64, Error> {
        sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS SIGNED) FROM transactions WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| error.into())
    }
}

/// Convert MySQL errors the client can do something about into their own
/// [Error] variants, everything else becomes an [Error::MySqlError].
///
/// Used for every statement of a transaction, including `BEGIN` and `COMMIT`.
fn map_mysql_error(error: sqlx::Error, transaction_id: TransactionId) -> Error {
    let number = match &error {
        sqlx::Error::Database(database_error) => database_error
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|mysql_error| mysql_error.number()),
        _ => None,
    };

    match number.and_then(|number| error_for_number(number, transaction_id)) {
        Some(Error::TransactionConflict) => {
            tracing::warn!("transaction {transaction_id} lost a lock conflict: {error}");
            Error::TransactionConflict
        }
        Some(mapped) => mapped,
        None => error.into(),
    }
}

fn error_for_number(number: u16, transaction_id: TransactionId) -> Option<Error> {
    match number {
        ER_DUP_ENTRY => Some(Error::DuplicateTransactionId(transaction_id)),
        ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT => Some(Error::TransactionConflict),
        _ => None,
    }
}
