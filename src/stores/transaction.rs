//! Defines the transaction store trait.

use std::future::Future;

use crate::{Error, Transaction, UserId};

/// Handles the admission and storage of transactions.
///
/// Implementers must run the limit check and the insert in one database
/// transaction, holding a lock that stops a concurrent [TransactionStore::create]
/// for the same user from reading the total until the first one has committed
/// or rolled back.
pub trait TransactionStore: Clone + Send + Sync + 'static {
    /// Add `transaction` to the store if the user's running total stays below
    /// [SPENDING_LIMIT](crate::SPENDING_LIMIT).
    ///
    /// Returns the stored transaction.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::LimitExceeded] if the transaction would take the user to or over the limit,
    /// - [Error::DuplicateTransactionId] if the transaction ID is already taken,
    /// - [Error::TransactionConflict] if the database aborted the transaction because of a
    ///   competing lock,
    /// - or an infrastructure error (see [Error::is_infrastructure_failure]).
    ///
    /// Nothing is written when an error is returned.
    fn create(
        &self,
        transaction: Transaction,
    ) -> impl Future<Output = Result<Transaction, Error>> + Send;

    /// Get the sum of the amounts of all the transactions for `user_id`.
    ///
    /// Users without any transactions have a total of zero.
    fn total_for_user(&self, user_id: UserId) -> impl Future<Output = Result<i64, Error>> + Send;
}
