//! Implements a struct that holds the state of the REST server.

use crate::stores::TransactionStore;

/// The state of the REST server.
///
/// Built once at start up and shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState<S>
where
    S: TransactionStore,
{
    /// The store that admits and saves transactions.
    pub transaction_store: S,
}

impl<S> AppState<S>
where
    S: TransactionStore,
{
    /// Create a new [AppState] that stores transactions in `transaction_store`.
    pub fn new(transaction_store: S) -> Self {
        Self { transaction_store }
    }
}
