//! Transaction management.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the spending limit rule
//! - The route handler for creating transactions

mod core;
mod create_endpoint;

pub use core::{SPENDING_LIMIT, Transaction, TransactionId, UserId, check_spending_limit};
pub use create_endpoint::create_transaction_endpoint;
