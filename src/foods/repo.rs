use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use tracing::info;

#[derive(Debug, Clone, FromRow)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub calories: i64,
}

pub async fn find_by_name(db: &SqlitePool, name: &str) -> anyhow::Result<Option<Food>> {
    let food = sqlx::query_as::<_, Food>(
        r#"
        SELECT id, name, calories
        FROM foods
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(db)
    .await?;
    Ok(food)
}

pub async fn find_by_id(db: &SqlitePool, food_id: i64) -> anyhow::Result<Option<Food>> {
    let food = sqlx::query_as::<_, Food>(
        r#"
        SELECT id, name, calories
        FROM foods
        WHERE id = ?
        "#,
    )
    .bind(food_id)
    .fetch_optional(db)
    .await?;
    Ok(food)
}

/// Looks a food up by exact name, creating it on first encounter. An existing
/// row wins unconditionally: its stored calories are returned and the new
/// estimate is discarded, so historical log totals stay consistent with the
/// dictionary.
pub async fn get_or_create(
    db: &SqlitePool,
    name: &str,
    estimate: Option<&Value>,
) -> anyhow::Result<(i64, i64)> {
    if let Some(food) = find_by_name(db, name).await? {
        info!(%name, food_id = food.id, calories = food.calories, "found existing food");
        return Ok((food.id, food.calories));
    }

    let calories = coerce_estimate(estimate);
    let result = sqlx::query(
        r#"
        INSERT INTO foods (name, calories)
        VALUES (?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(calories)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        // Lost a concurrent first-creation race; the earlier row's calories win.
        let food = find_by_name(db, name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("food '{name}' missing after insert conflict"))?;
        return Ok((food.id, food.calories));
    }

    let food_id = result.last_insert_rowid();
    info!(%name, food_id, calories, "created new food");
    Ok((food_id, calories))
}

pub async fn update_calories(db: &SqlitePool, food_id: i64, calories: i64) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE foods
        SET calories = ?
        WHERE id = ?
        "#,
    )
    .bind(calories)
    .bind(food_id)
    .execute(db)
    .await?;
    Ok(())
}

/// The model's calorie estimate for one unit; only coerced on first creation.
/// Invalid or missing values fall back to 0 rather than blocking the log.
fn coerce_estimate(value: Option<&Value>) -> i64 {
    let numeric = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    numeric.filter(|c| *c >= 0).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_db() -> SqlitePool {
        // A single connection keeps every query on the same :memory: database.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory database");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("migrations");
        db
    }

    #[tokio::test]
    async fn first_estimate_wins_for_repeated_names() {
        let db = test_db().await;

        let (first_id, first_calories) = get_or_create(&db, "egg", Some(&json!(70)))
            .await
            .expect("first resolve");
        let (second_id, second_calories) = get_or_create(&db, "egg", Some(&json!(9999)))
            .await
            .expect("second resolve");

        assert_eq!(first_id, second_id);
        assert_eq!(first_calories, 70);
        assert_eq!(second_calories, 70);

        let stored = find_by_name(&db, "egg")
            .await
            .expect("lookup")
            .expect("row exists");
        assert_eq!(stored.calories, 70);
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_rows() {
        let db = test_db().await;

        let (egg_id, _) = get_or_create(&db, "egg", Some(&json!(70))).await.unwrap();
        let (toast_id, toast_calories) =
            get_or_create(&db, "toast", Some(&json!("not a number")))
                .await
                .unwrap();

        assert_ne!(egg_id, toast_id);
        assert_eq!(toast_calories, 0);
    }

    #[test]
    fn estimate_coercion_accepts_numbers_and_numeric_strings() {
        assert_eq!(coerce_estimate(Some(&json!(70))), 70);
        assert_eq!(coerce_estimate(Some(&json!(70.9))), 70);
        assert_eq!(coerce_estimate(Some(&json!("155"))), 155);
    }

    #[test]
    fn estimate_coercion_defaults_to_zero() {
        assert_eq!(coerce_estimate(None), 0);
        assert_eq!(coerce_estimate(Some(&json!(null))), 0);
        assert_eq!(coerce_estimate(Some(&json!("lots"))), 0);
        assert_eq!(coerce_estimate(Some(&json!(-50))), 0);
        assert_eq!(coerce_estimate(Some(&json!([1, 2]))), 0);
    }
}
