use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::patch,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::state::AppState;

use super::repo;

pub fn routes() -> Router<AppState> {
    Router::new().route("/foods/:food_id", patch(update_food))
}

const MAX_PER_ITEM_CALORIES: i64 = 5000;

fn validate_calories(body: &Value) -> Result<i64, &'static str> {
    let Some(raw) = body.get("calories") else {
        return Err("Missing calories in request body.");
    };
    let calories = match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or("Invalid calories format.")?;

    if !(0..=MAX_PER_ITEM_CALORIES).contains(&calories) {
        return Err("Calories must be between 0 and 5000.");
    }
    Ok(calories)
}

/// Out-of-band correction of a canonical food's per-item calories. This is
/// the only writer of that value after first creation; the chat flow never
/// touches it.
#[instrument(skip(state, body))]
pub async fn update_food(
    State(state): State<AppState>,
    Path(food_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let calories = validate_calories(&body)
        .map_err(|msg| (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))))?;

    repo::update_calories(&state.db, food_id, calories)
        .await
        .map_err(|e| {
            error!(error = %e, food_id, "database error on food update");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not update food entry." })),
            )
        })?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Food entry {food_id} updated.")
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_calories_in_range() {
        assert_eq!(validate_calories(&json!({ "calories": 0 })), Ok(0));
        assert_eq!(validate_calories(&json!({ "calories": 5000 })), Ok(5000));
        assert_eq!(validate_calories(&json!({ "calories": "250" })), Ok(250));
    }

    #[test]
    fn rejects_out_of_range_calories() {
        assert_eq!(
            validate_calories(&json!({ "calories": 5001 })),
            Err("Calories must be between 0 and 5000.")
        );
        assert_eq!(
            validate_calories(&json!({ "calories": -1 })),
            Err("Calories must be between 0 and 5000.")
        );
    }

    #[test]
    fn rejects_missing_or_non_numeric_calories() {
        assert_eq!(
            validate_calories(&json!({})),
            Err("Missing calories in request body.")
        );
        assert_eq!(
            validate_calories(&json!({ "calories": "plenty" })),
            Err("Invalid calories format.")
        );
        assert_eq!(
            validate_calories(&json!({ "calories": null })),
            Err("Invalid calories format.")
        );
    }
}
