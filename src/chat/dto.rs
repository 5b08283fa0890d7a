use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four meal slots a log entry can belong to. Anything else the model or
/// the user supplies is treated as "needs clarification" / "cancel".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl FromStr for MealType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            _ => Err(()),
        }
    }
}

/// In-flight protocol state. The server returns this with every
/// clarification/readback response and the client echoes it back verbatim;
/// there is no server-side session. Defaults keep a partially stripped echo
/// usable rather than rejecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDetails {
    #[serde(default = "unknown_food")]
    pub food: String,
    #[serde(default)]
    pub food_id: Option<i64>,
    #[serde(default)]
    pub meal: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Canonical per-item calories from the food dictionary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calories: Option<i64>,
    /// ISO `YYYY-MM-DD`, the day the food was eaten.
    #[serde(default)]
    pub meal_date: String,
}

fn unknown_food() -> String {
    "unknown".into()
}

const fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationAction {
    AiResponse,
    MealClarificationRequired,
    ReadbackRequired,
    ExplicitConfirmationRequired,
    LogFinalized,
    LogCancelled,
    Error,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub status: &'static str,
    pub action: ConfirmationAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<LogDetails>,
    pub response_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meal_type_parses_case_insensitively_and_trimmed() {
        assert_eq!("  DINNER ".parse::<MealType>(), Ok(MealType::Dinner));
        assert_eq!("breakfast".parse::<MealType>(), Ok(MealType::Breakfast));
        assert_eq!("brunch".parse::<MealType>(), Err(()));
        assert_eq!("".parse::<MealType>(), Err(()));
    }

    #[test]
    fn confirmation_action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ConfirmationAction::ReadbackRequired).unwrap(),
            json!("readback_required")
        );
        assert_eq!(
            serde_json::to_value(ConfirmationAction::ExplicitConfirmationRequired).unwrap(),
            json!("explicit_confirmation_required")
        );
        assert_eq!(
            serde_json::to_value(ConfirmationAction::LogCancelled).unwrap(),
            json!("log_cancelled")
        );
    }

    #[test]
    fn details_deserialize_from_minimal_confirm_payload() {
        // A confirm_log echo may omit the display-only fields.
        let details: LogDetails = serde_json::from_value(json!({
            "food_id": 3,
            "meal": "lunch",
            "quantity": 1,
            "meal_date": "2024-06-01",
            "total_calories": 300
        }))
        .unwrap();
        assert_eq!(details.food, "unknown");
        assert_eq!(details.food_id, Some(3));
        assert_eq!(details.quantity, 1);
        assert_eq!(details.total_calories, Some(300));
    }

    #[test]
    fn details_quantity_defaults_to_one() {
        let details: LogDetails =
            serde_json::from_value(json!({ "food": "egg", "meal_date": "2024-06-01" })).unwrap();
        assert_eq!(details.quantity, 1);
        assert_eq!(details.food_id, None);
        assert_eq!(details.calories, None);
    }
}
