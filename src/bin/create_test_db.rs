use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;

use spend_limit::{SPENDING_LIMIT, initialize_db};

/// A utility for creating a test database for the REST API server of spend_limit.
///
/// Run the server against it with `server --sqlite-path <OUTPUT_PATH>`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// Add a transaction of this amount for user 1, so the user starts close to their limit.
    ///
    /// Must be below the spending limit, like any transaction the server admits.
    #[arg(long, value_parser = clap::value_parser!(i64).range(..SPENDING_LIMIT))]
    seed_amount: Option<i64>,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    if let Some(amount) = args.seed_amount {
        println!("Adding a transaction of {amount} for user 1...");

        conn.execute(
            "INSERT INTO transactions (id, user_id, amount, description) VALUES (1, 1, ?1, 'seed')",
            (amount,),
        )?;
    }

    println!("Success!");

    Ok(())
}
