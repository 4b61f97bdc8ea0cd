use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates a PostgreSQL connection pool. Only exports touch the database, so the
/// pool stays small.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the `resume_exports` table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS resume_exports (
            id UUID PRIMARY KEY,
            run_id UUID NOT NULL,
            candidate_name TEXT NOT NULL,
            company_name TEXT,
            draft_version INTEGER NOT NULL,
            refinements INTEGER NOT NULL,
            markdown TEXT NOT NULL,
            s3_key TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS resume_exports_run_id_idx ON resume_exports (run_id)")
        .execute(pool)
        .await?;

    info!("Schema ready: resume_exports");
    Ok(())
}
