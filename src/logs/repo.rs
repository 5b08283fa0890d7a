use sqlx::{FromRow, SqlitePool};

use crate::chat::dto::LogDetails;

use super::dto::LogEntry;

pub async fn list_for_date(db: &SqlitePool, meal_date: &str) -> anyhow::Result<Vec<LogEntry>> {
    let rows = sqlx::query_as::<_, LogEntry>(
        r#"
        SELECT
            ml.id,
            f.id AS food_id,
            ml.meal,
            ml.quantity,
            ml.total_calories,
            f.name AS food,
            f.calories AS per_item_calories
        FROM meal_logs ml
        JOIN foods f ON ml.food_id = f.id
        WHERE ml.meal_date = ?
        ORDER BY ml.log_timestamp
        "#,
    )
    .bind(meal_date)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Inserts a finalized entry; log_timestamp comes from the schema default.
pub async fn insert_entry(db: &SqlitePool, details: &LogDetails) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO meal_logs (meal_date, food_id, meal, quantity, total_calories)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&details.meal_date)
    .bind(details.food_id)
    .bind(details.meal.as_deref())
    .bind(details.quantity)
    .bind(details.total_calories)
    .execute(db)
    .await?;
    Ok(())
}

/// Just enough of an entry to check ownership of a date and reach its food.
#[derive(Debug, FromRow)]
pub struct EntryRef {
    pub food_id: i64,
    pub meal_date: String,
}

pub async fn find_entry(db: &SqlitePool, log_id: i64) -> anyhow::Result<Option<EntryRef>> {
    let entry = sqlx::query_as::<_, EntryRef>(
        r#"
        SELECT food_id, meal_date
        FROM meal_logs
        WHERE id = ?
        "#,
    )
    .bind(log_id)
    .fetch_optional(db)
    .await?;
    Ok(entry)
}

pub async fn update_entry_quantity(
    db: &SqlitePool,
    log_id: i64,
    quantity: i64,
    total_calories: i64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE meal_logs
        SET quantity = ?, total_calories = ?
        WHERE id = ?
        "#,
    )
    .bind(quantity)
    .bind(total_calories)
    .bind(log_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete_entry(db: &SqlitePool, log_id: i64) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        DELETE FROM meal_logs
        WHERE id = ?
        "#,
    )
    .bind(log_id)
    .execute(db)
    .await?;
    Ok(())
}
