//! spend_limit is a small web service for recording spending per user.
//!
//! This library provides a JSON API for creating transactions. Each user has a
//! spending limit and a transaction is only admitted if the user's running
//! total stays below that limit.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::{Deserialize, Serialize};
use tokio::signal;

mod app_state;
mod config;
mod db;
mod endpoints;
mod logging;
mod routing;
pub mod stores;
mod transaction;

pub use app_state::AppState;
pub use config::DatabaseConfig;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use transaction::{SPENDING_LIMIT, Transaction, TransactionId, UserId};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The JSON body used for simple API responses, e.g. errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// A human readable message.
    pub message: String,
}

impl MessageBody {
    /// Create a message body from anything that can be turned into a string.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body could not be parsed as the expected JSON schema.
    ///
    /// The rejection carries the status code the client should receive, e.g.
    /// 422 for a missing field or a field with the wrong type.
    #[error("invalid request body: {0}")]
    InvalidRequestBody(#[from] JsonRejection),

    /// Admitting the transaction would take the user's running total to or
    /// past the spending limit.
    ///
    /// The database transaction is rolled back before this error is returned,
    /// so nothing is written.
    #[error("user {user_id} has a total of {total}, adding {amount} would reach the limit of {limit}")]
    LimitExceeded {
        /// The user the transaction was for.
        user_id: UserId,
        /// The user's total before the rejected transaction.
        total: i64,
        /// The amount of the rejected transaction.
        amount: i64,
        /// The spending limit that was checked against.
        limit: i64,
    },

    /// A transaction with the same ID already exists.
    ///
    /// Transaction IDs are chosen by the client, so the client should retry
    /// with a different ID.
    #[error("a transaction with the ID {0} already exists")]
    DuplicateTransactionId(TransactionId),

    /// The database gave up on the transaction because of a competing lock,
    /// e.g. a deadlock between two requests for the same user.
    ///
    /// The competing request decides the outcome, the client may retry.
    #[error("the transaction conflicted with a concurrent request")]
    TransactionConflict,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A blocking database task panicked or was cancelled before it finished.
    #[error("a blocking database task failed: {0}")]
    BlockingTaskError(tokio::task::JoinError),

    /// An unhandled/unexpected SQLite error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An unhandled/unexpected error from the MySQL client, including
    /// connection failures.
    #[error("an unexpected MySQL error occurred: {0}")]
    MySqlError(sqlx::Error),
}

impl Error {
    /// Whether the error is caused by the server or its database rather than
    /// the client's request.
    pub fn is_infrastructure_failure(&self) -> bool {
        matches!(
            self,
            Error::DatabaseLockError
                | Error::BlockingTaskError(_)
                | Error::SqlError(_)
                | Error::MySqlError(_)
        )
    }

    /// The HTTP status code that the client should receive for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequestBody(rejection) => rejection.status(),
            Error::LimitExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            Error::DuplicateTransactionId(_) | Error::TransactionConflict => StatusCode::CONFLICT,
            Error::DatabaseLockError
            | Error::BlockingTaskError(_)
            | Error::SqlError(_)
            | Error::MySqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        tracing::error!("an unhandled MySQL error occurred: {}", value);
        Error::MySqlError(value)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            Error::InvalidRequestBody(rejection) => rejection.body_text(),
            Error::LimitExceeded { limit, .. } => {
                format!("Payment required: this transaction would take you to or over your spending limit of {limit}.")
            }
            Error::DuplicateTransactionId(id) => {
                format!("A transaction with the ID {id} already exists.")
            }
            Error::TransactionConflict => {
                "The transaction conflicted with another request for the same user, try again."
                    .to_owned()
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
        };

        (status, Json(MessageBody::new(message))).into_response()
    }
}
