//! Connection pool, schema migrations and lookup-table seeding.

use std::path::Path;
use std::time::Duration;

use exn::ResultExt;
use inkvault_source::GENRES;
use sqlx::{Executor, SqliteConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// One orchestrator writes; the read paths and migration exports share the rest.
const POOL_SIZE: u32 = 4;
/// Episode saves hold the write lock for a whole page list.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_PRAGMAS: &str = "
    PRAGMA cache_size = -16384;
    PRAGMA temp_store = MEMORY;
    PRAGMA wal_autocheckpoint = 1000;
";

/// SQLite pool holding the catalog. Queries live on [`Repository`](crate::Repository).
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the catalog at `path` and brings its
    /// schema and genre table up to date.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, POOL_SIZE).await
    }

    /// A private catalog that disappears with the pool.
    ///
    /// Not test-gated: other crates build their test catalogs on it.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to `:memory:` is its own database.
        Self::open(options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .after_connect(|conn, _meta| Box::pin(async move { session_pragmas(conn).await }))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        MIGRATOR.run(&db.pool).await.or_raise(|| ErrorKind::Migration)?;
        db.seed_genres().await?;
        Ok(db)
    }

    /// Adds any known genre slug the table lacks. Existing rows keep their ids.
    async fn seed_genres(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut added = 0;
        for genre in GENRES {
            added += sqlx::query(include_str!("../queries/seed_genre.sql"))
                .bind(genre)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?
                .rows_affected();
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        if added > 0 {
            debug!(added, "Seeded genres");
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

fn options() -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        // Episode deletes cascade to their page links.
        .foreign_keys(true)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
}

async fn session_pragmas(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    conn.execute(sqlx::raw_sql(SESSION_PRAGMAS)).await?;
    Ok(())
}
