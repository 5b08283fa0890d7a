use std::collections::HashMap;

use serde::Serialize;
use sqlx::FromRow;

/// One joined row of a log entry with its canonical food.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub food_id: i64,
    pub meal: String,
    pub quantity: i64,
    /// The historically stored total, not a recomputation, so past entries
    /// stay accurate even after the food's canonical calories change.
    pub total_calories: Option<i64>,
    pub food: String,
    pub per_item_calories: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct MealGroup {
    pub entries: Vec<LogEntry>,
    pub total_meal_calories: i64,
}

#[derive(Debug, Serialize)]
pub struct DailyLogs {
    pub total_daily_calories: i64,
    pub meals: HashMap<String, MealGroup>,
}
