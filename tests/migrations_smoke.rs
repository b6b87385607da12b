use sqlx::Row;
use uuid::Uuid;

fn database_url() -> Option<String> {
    dotenvy::dotenv().ok();

    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

#[tokio::test]
async fn migrations_apply_and_tables_exist() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        eprintln!("DATABASE_URL is not set; skipping migrations smoke test");
        return Ok(());
    };

    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url).await?;

    let migrations_dir =
        std::env::var("PLAYPACK_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir)).await?;
    migrator.run(&pool).await?;

    let tables = ["batches", "students", "curriculum_activities", "reports", "learning_summary_queue"];

    for table in tables {
        let row = sqlx::query("SELECT to_regclass($1)::text").bind(table).fetch_one(&pool).await?;
        let regclass: Option<String> = row.try_get(0)?;
        assert!(regclass.is_some(), "expected table {table} to exist after migrations");
    }

    Ok(())
}

#[tokio::test]
async fn saving_reports_enqueues_one_pending_item() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };

    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url).await?;
    let migrations_dir =
        std::env::var("PLAYPACK_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir)).await?.run(&pool).await?;

    let mut tx = pool.begin().await?;
    let student_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO students (id, name) VALUES ($1, 'Smoke Student')")
        .bind(&student_id)
        .execute(&mut *tx)
        .await?;
    for text in ["First report", "Second report"] {
        sqlx::query("INSERT INTO reports (student_id, report_text) VALUES ($1, $2)")
            .bind(&student_id)
            .bind(text)
            .execute(&mut *tx)
            .await?;
    }

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM learning_summary_queue WHERE student_id = $1 AND status = 'pending'",
    )
    .bind(&student_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.rollback().await?;

    assert_eq!(pending, 1);
    Ok(())
}
