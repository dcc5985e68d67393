use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spend_limit::{
    AppState, DatabaseConfig, build_router, graceful_shutdown, initialize_db, logging_middleware,
    stores::{MySqlTransactionStore, SQLiteTransactionStore, TransactionStore},
};

/// The REST API server for spend_limit.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 8888)]
    port: u16,

    /// Use the SQLite database at this path instead of MySQL.
    ///
    /// The file is created if it does not exist. Intended for local testing.
    #[arg(long, env = "SQLITE_PATH")]
    sqlite_path: Option<PathBuf>,

    #[command(flatten)]
    database: DatabaseConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine, the settings may come from the environment instead.
    let _ = dotenvy::dotenv();

    setup_logging();

    let args = Args::parse();
    tracing::debug!("Starting with {args:?}");

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let result = match args.sqlite_path {
        Some(path) => match open_sqlite_store(&path) {
            Ok(store) => {
                tracing::info!("Using SQLite database at {}", path.display());
                serve(addr, store).await
            }
            Err(error) => {
                tracing::error!("Could not open SQLite database at {}: {error}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => match MySqlTransactionStore::connect(&args.database).await {
            Ok(store) => serve(addr, store).await,
            Err(error) => {
                tracing::error!("Could not connect to the database {:?}: {error}", args.database);
                return ExitCode::FAILURE;
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("Server error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn open_sqlite_store(path: &Path) -> Result<SQLiteTransactionStore, spend_limit::Error> {
    let conn = Connection::open(path)?;
    initialize_db(&conn)?;

    Ok(SQLiteTransactionStore::new(Arc::new(Mutex::new(conn))))
}

async fn serve<S>(addr: SocketAddr, store: S) -> std::io::Result<()>
where
    S: TransactionStore,
{
    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(AppState::new(store)).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
