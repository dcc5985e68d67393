//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    AppState, MessageBody, endpoints, stores::TransactionStore,
    transaction::create_transaction_endpoint,
};

/// The message returned by the root route.
const ROOT_MESSAGE: &str = "code test";

/// Return a router with all the app's routes.
pub fn build_router<S>(state: AppState<S>) -> Router
where
    S: TransactionStore,
{
    Router::new()
        .route(endpoints::ROOT, get(get_root))
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint::<S>))
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' lets clients check that the server is up.
async fn get_root() -> Json<MessageBody> {
    Json(MessageBody::new(ROOT_MESSAGE))
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(MessageBody::new("The requested resource could not be found.")),
    )
        .into_response()
}
