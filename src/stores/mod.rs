//! Contains the trait and implementations for objects that store [transactions](crate::Transaction).

mod mysql;
mod sqlite;
mod transaction;

pub use mysql::MySqlTransactionStore;
pub use sqlite::SQLiteTransactionStore;
pub use transaction::TransactionStore;
