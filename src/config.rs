//! Configuration for the connection to the MySQL database.

use std::fmt;

use sqlx::mysql::MySqlConnectOptions;

/// Where to find the MySQL database and how to log in to it.
///
/// Each field can be set with a command line flag or an environment variable,
/// e.g. `--db-host` or `DB_HOST`. This struct is built once when the server
/// starts and is only used to open the connection pool.
#[derive(Clone, clap::Args)]
pub struct DatabaseConfig {
    /// The host name or IP address of the MySQL server.
    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    /// The port the MySQL server is listening on.
    #[arg(long = "db-port", env = "DB_PORT", default_value_t = 3306)]
    pub port: u16,

    /// The user to log in as.
    #[arg(long = "db-user", env = "DB_USER", default_value = "root")]
    pub user: String,

    /// The password for `user`, may be empty.
    #[arg(
        long = "db-password",
        env = "DB_PASSWORD",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// The name of the database that holds the `transactions` table.
    #[arg(long = "db-name", env = "DB_NAME", default_value = "codetest")]
    pub database: String,

    /// The maximum number of connections to keep open to the database.
    #[arg(long = "db-max-connections", env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// The options for connecting to the database described by this config.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

// Written by hand so that the password never ends up in the logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}
