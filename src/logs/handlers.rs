use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::dates::parse_iso_date;
use crate::foods;
use crate::state::AppState;

use super::dto::{DailyLogs, LogEntry, MealGroup};
use super::repo;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/logs/:meal_date", get(get_logs_for_date))
        .route(
            "/logs/:meal_date/entry/:log_id",
            patch(update_log_entry).delete(delete_log_entry),
        )
}

const MIN_QUANTITY: i64 = 1;
const MAX_QUANTITY: i64 = 100;

type ApiError = (StatusCode, Json<Value>);

fn bad_request(msg: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}

fn not_found(msg: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": msg })))
}

fn internal(msg: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": msg })),
    )
}

fn group_by_meal(rows: Vec<LogEntry>) -> DailyLogs {
    let mut meals: HashMap<String, MealGroup> = HashMap::new();
    let mut total_daily_calories = 0;

    for row in rows {
        let calories = row.total_calories.unwrap_or(0);
        let group = meals.entry(row.meal.clone()).or_default();
        group.total_meal_calories += calories;
        total_daily_calories += calories;
        group.entries.push(row);
    }

    DailyLogs {
        total_daily_calories,
        meals,
    }
}

#[instrument(skip(state))]
pub async fn get_logs_for_date(
    State(state): State<AppState>,
    Path(meal_date): Path<String>,
) -> Result<Json<DailyLogs>, ApiError> {
    if parse_iso_date(&meal_date).is_none() {
        return Err(bad_request("Invalid date format. Use YYYY-MM-DD."));
    }

    let rows = repo::list_for_date(&state.db, &meal_date)
        .await
        .map_err(|e| {
            error!(error = %e, %meal_date, "database error on select");
            internal("Could not retrieve meal logs.")
        })?;

    Ok(Json(group_by_meal(rows)))
}

fn validate_update(meal_date: &str, body: &Value) -> Result<i64, &'static str> {
    if parse_iso_date(meal_date).is_none() {
        return Err("Invalid date format in URL. Use YYYY-MM-DD.");
    }
    let Some(raw) = body.get("quantity") else {
        return Err("Missing quantity in request body.");
    };
    let quantity = match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or("Invalid quantity format.")?;

    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err("Quantity must be between 1 and 100.");
    }
    Ok(quantity)
}

/// Changes an entry's quantity and recomputes its total from the food's
/// current canonical calories.
#[instrument(skip(state, body))]
pub async fn update_log_entry(
    State(state): State<AppState>,
    Path((meal_date, log_id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let new_quantity =
        validate_update(&meal_date, &body).map_err(|msg| bad_request(msg))?;

    let entry = repo::find_entry(&state.db, log_id).await.map_err(|e| {
        error!(error = %e, log_id, "database error on update");
        internal("Could not update log entry.")
    })?;
    let Some(entry) = entry.filter(|e| e.meal_date == meal_date) else {
        return Err(not_found(
            "Log entry not found or does not belong to the specified date.",
        ));
    };

    let food = foods::repo::find_by_id(&state.db, entry.food_id)
        .await
        .map_err(|e| {
            error!(error = %e, log_id, "database error on update");
            internal("Could not update log entry.")
        })?
        .ok_or_else(|| {
            error!(log_id, food_id = entry.food_id, "associated food missing");
            internal("Associated food item not found, cannot update calories.")
        })?;

    let new_total_calories = food.calories * new_quantity;
    repo::update_entry_quantity(&state.db, log_id, new_quantity, new_total_calories)
        .await
        .map_err(|e| {
            error!(error = %e, log_id, "database error on update");
            internal("Could not update log entry.")
        })?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Log entry {log_id} updated.")
    })))
}

#[instrument(skip(state))]
pub async fn delete_log_entry(
    State(state): State<AppState>,
    Path((meal_date, log_id)): Path<(String, i64)>,
) -> Result<Json<Value>, ApiError> {
    if parse_iso_date(&meal_date).is_none() {
        return Err(bad_request("Invalid date format in URL. Use YYYY-MM-DD."));
    }

    let entry = repo::find_entry(&state.db, log_id).await.map_err(|e| {
        error!(error = %e, log_id, "database error on delete");
        internal("Could not delete log entry.")
    })?;
    if entry.map(|e| e.meal_date != meal_date).unwrap_or(true) {
        return Err(not_found(
            "Log entry not found or does not belong to the specified date.",
        ));
    }

    repo::delete_entry(&state.db, log_id).await.map_err(|e| {
        error!(error = %e, log_id, "database error on delete");
        internal("Could not delete log entry.")
    })?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Log entry {log_id} deleted.")
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(meal: &str, total: Option<i64>) -> LogEntry {
        LogEntry {
            id: 1,
            food_id: 1,
            meal: meal.into(),
            quantity: 1,
            total_calories: total,
            food: "egg".into(),
            per_item_calories: 70,
        }
    }

    #[test]
    fn grouping_sums_per_meal_and_daily_totals() {
        let daily = group_by_meal(vec![
            entry("breakfast", Some(140)),
            entry("breakfast", Some(70)),
            entry("dinner", Some(300)),
            entry("lunch", None),
        ]);
        assert_eq!(daily.total_daily_calories, 510);
        assert_eq!(daily.meals["breakfast"].total_meal_calories, 210);
        assert_eq!(daily.meals["breakfast"].entries.len(), 2);
        assert_eq!(daily.meals["dinner"].total_meal_calories, 300);
        assert_eq!(daily.meals["lunch"].total_meal_calories, 0);
    }

    #[test]
    fn grouping_empty_day() {
        let daily = group_by_meal(vec![]);
        assert_eq!(daily.total_daily_calories, 0);
        assert!(daily.meals.is_empty());
    }

    #[test]
    fn update_validation_accepts_quantity_in_range() {
        assert_eq!(validate_update("2024-06-01", &json!({ "quantity": 1 })), Ok(1));
        assert_eq!(
            validate_update("2024-06-01", &json!({ "quantity": 100 })),
            Ok(100)
        );
        assert_eq!(
            validate_update("2024-06-01", &json!({ "quantity": "5" })),
            Ok(5)
        );
    }

    #[test]
    fn update_validation_rejects_bad_dates_and_quantities() {
        assert_eq!(
            validate_update("2024-13-40", &json!({ "quantity": 1 })),
            Err("Invalid date format in URL. Use YYYY-MM-DD.")
        );
        assert_eq!(
            validate_update("2024-06-01", &json!({})),
            Err("Missing quantity in request body.")
        );
        assert_eq!(
            validate_update("2024-06-01", &json!({ "quantity": 0 })),
            Err("Quantity must be between 1 and 100.")
        );
        assert_eq!(
            validate_update("2024-06-01", &json!({ "quantity": 101 })),
            Err("Quantity must be between 1 and 100.")
        );
        assert_eq!(
            validate_update("2024-06-01", &json!({ "quantity": "a lot" })),
            Err("Invalid quantity format.")
        );
    }
}
