pub mod ledger;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub use ledger::LedgerStore;

/// Database handle. Opened once at process start and passed down explicitly;
/// dropping the pool at shutdown closes all connections.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}
