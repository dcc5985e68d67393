//! Defines the endpoint for creating a new transaction.

use axum::{
    Json,
    extract::{FromRequest, State},
    http::StatusCode,
};

use crate::{AppState, Error, stores::TransactionStore, transaction::Transaction};

/// A JSON request body.
///
/// Works like [axum::Json] except that a body that does not match the schema
/// is turned into an [Error::InvalidRequestBody], so the client gets the same
/// JSON error body as for every other error.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(Error))]
pub struct JsonBody<T>(pub T);

/// A route handler for creating a new transaction.
///
/// Responds with 201 and the transaction on success. If the transaction would
/// take the user to or over their spending limit the response is 402 and
/// nothing is stored.
pub async fn create_transaction_endpoint<S: TransactionStore>(
    State(state): State<AppState<S>>,
    JsonBody(transaction): JsonBody<Transaction>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let transaction_id = transaction.id;
    let user_id = transaction.user_id;

    match state.transaction_store.create(transaction).await {
        Ok(transaction) => {
            tracing::info!(
                "created transaction {transaction_id} of {} for user {user_id}",
                transaction.amount
            );

            Ok((StatusCode::CREATED, Json(transaction)))
        }
        Err(error) if error.is_infrastructure_failure() => {
            tracing::error!("could not create transaction {transaction_id}: {error}");
            Err(error)
        }
        Err(error) => {
            tracing::info!("rejected transaction {transaction_id}: {error}");
            Err(error)
        }
    }
}
