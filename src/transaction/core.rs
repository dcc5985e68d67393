//! Defines the transaction model and the spending limit rule.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = i64;
/// Alias for the integer type used for user IDs.
pub type UserId = i64;

/// The amount that a user's running total must stay strictly below.
///
/// A transaction that would take the total to exactly this amount is rejected.
pub const SPENDING_LIMIT: i64 = 1000;

// ============================================================================
// MODELS
// ============================================================================

/// Money spent by a user.
///
/// The same struct is used for the request body, the database row and the
/// response body, so every field is required when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction, chosen by the client.
    pub id: TransactionId,
    /// The user that spent the money.
    pub user_id: UserId,
    /// The amount spent in minor units, e.g. cents.
    pub amount: i64,
    /// A text description of what the transaction was for.
    pub description: String,
}

// ============================================================================
// ADMISSION
// ============================================================================

/// Check whether `transaction` may be added on top of the user's current `total`.
///
/// The transaction is admitted only if `total + transaction.amount` is strictly
/// less than `limit`. A sum that overflows is treated as over the limit.
///
/// # Errors
/// Returns [Error::LimitExceeded] if the transaction must be rejected.
pub fn check_spending_limit(transaction: &Transaction, total: i64, limit: i64) -> Result<(), Error> {
    match total.checked_add(transaction.amount) {
        Some(new_total) if new_total < limit => Ok(()),
        _ => Err(Error::LimitExceeded {
            user_id: transaction.user_id,
            total,
            amount: transaction.amount,
            limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, transaction::Transaction};

    use super::{SPENDING_LIMIT, check_spending_limit};

    fn transaction_with_amount(amount: i64) -> Transaction {
        Transaction {
            id: 1,
            user_id: 7,
            amount,
            description: "test transaction".to_owned(),
        }
    }

    #[test]
    fn admits_total_below_limit() {
        let transaction = transaction_with_amount(599);

        assert!(check_spending_limit(&transaction, 400, SPENDING_LIMIT).is_ok());
    }

    #[test]
    fn rejects_total_equal_to_limit() {
        let transaction = transaction_with_amount(600);

        let result = check_spending_limit(&transaction, 400, SPENDING_LIMIT);

        assert!(
            matches!(
                result,
                Err(Error::LimitExceeded {
                    user_id: 7,
                    total: 400,
                    amount: 600,
                    limit: SPENDING_LIMIT,
                })
            ),
            "got {result:?}"
        );
    }

    #[test]
    fn rejects_total_over_limit() {
        let transaction = transaction_with_amount(1001);

        let result = check_spending_limit(&transaction, 0, SPENDING_LIMIT);

        assert!(matches!(result, Err(Error::LimitExceeded { .. })), "got {result:?}");
    }

    #[test]
    fn rejects_overflowing_total() {
        let transaction = transaction_with_amount(i64::MAX);

        let result = check_spending_limit(&transaction, 1, SPENDING_LIMIT);

        assert!(matches!(result, Err(Error::LimitExceeded { .. })), "got {result:?}");
    }

    #[test]
    fn deserializing_requires_every_field() {
        let result = serde_json::from_str::<Transaction>(r#"{"id": 1, "user_id": 2, "amount": 3}"#);

        assert!(result.is_err());
    }

    #[test]
    fn deserializing_rejects_string_amount() {
        let result = serde_json::from_str::<Transaction>(
            r#"{"id": 1, "user_id": 2, "amount": "3", "description": "coffee"}"#,
        );

        assert!(result.is_err());
    }
}
