//! The confirmation state machine.
//!
//! Every function here is pure over its inputs; the current date is always
//! passed in so the protocol logic stays deterministic under test. State
//! between turns lives entirely in the [`LogDetails`] payload the client
//! echoes back.

use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::dates::{format_iso_date, parse_iso_date};
use crate::extractor::RawLogDetails;

use super::dto::{ConfirmationAction, LogDetails, MealType, PromptResponse};

const READBACK_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[weekday repr:long], [month repr:long] [day]");

/// Quantities above this are implausible enough to demand an explicit yes
/// instead of a passive readback.
const EXPLICIT_CONFIRMATION_THRESHOLD: i64 = 6;

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Maps the model's date keyword to a concrete date. Only two keywords are
/// understood; anything else ("last Tuesday", typos, ...) deliberately falls
/// back to today rather than guessing.
pub fn resolve_meal_date(keyword: Option<&str>, today: Date) -> Date {
    let keyword = keyword.unwrap_or("").trim();
    if keyword.is_empty() || keyword.eq_ignore_ascii_case("today") {
        return today;
    }
    if keyword.eq_ignore_ascii_case("yesterday") {
        return today - Duration::days(1);
    }
    warn!(%keyword, "unrecognized date keyword, defaulting to today");
    today
}

/// The model may send a quantity as a number, a numeric string, or garbage.
/// Anything that does not come out as an integer ≥ 1 defaults to 1.
pub fn coerce_quantity(value: Option<&Value>) -> i64 {
    let numeric = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    numeric.filter(|q| *q >= 1).unwrap_or(1)
}

/// Builds the in-flight record from a raw actionable intent plus the
/// canonical food identity resolved against the dictionary. The canonical
/// calories replace whatever the model estimated this time around.
pub fn normalize_intent(
    raw: RawLogDetails,
    food_id: i64,
    canonical_calories: i64,
    today: Date,
) -> LogDetails {
    let meal_date = resolve_meal_date(raw.date_keyword.as_deref(), today);
    LogDetails {
        food: raw.food.unwrap_or_else(|| "unknown".into()),
        food_id: Some(food_id),
        meal: raw.meal,
        quantity: coerce_quantity(raw.quantity.as_ref()),
        calories: Some(canonical_calories),
        total_calories: None,
        meal_date: format_iso_date(meal_date),
    }
}

pub fn valid_meal(meal: Option<&str>) -> bool {
    meal.map(|m| m.parse::<MealType>().is_ok()).unwrap_or(false)
}

pub fn meal_clarification_prompt(details: LogDetails) -> PromptResponse {
    let response_text = format!(
        "Which meal was the {} for? (e.g., breakfast, lunch, dinner, snack)",
        details.food
    );
    PromptResponse {
        status: "success",
        action: ConfirmationAction::MealClarificationRequired,
        details: Some(details),
        response_text,
    }
}

fn date_clause(meal_date: &str, today: Date) -> String {
    let Some(date) = parse_iso_date(meal_date) else {
        // Malformed echo; leave the phrasing dateless.
        return String::new();
    };
    if date == today {
        String::new()
    } else if date == today - Duration::days(1) {
        " yesterday".to_string()
    } else {
        date.format(READBACK_DATE_FORMAT)
            .map(|formatted| format!(" on {formatted}"))
            .unwrap_or_default()
    }
}

/// The readback decision: computes the total when per-item calories are
/// known, then picks the confirmation strength from the quantity. The
/// returned details carry the computed total so the eventual confirm_log
/// echo persists it.
pub fn readback_or_confirm(mut details: LogDetails, today: Date) -> PromptResponse {
    // checked_mul: the echoed payload is client-controlled, so the factors
    // can be arbitrary. An overflowing product is treated like unknown
    // calories rather than wrapping into a garbage total.
    let calorie_clause = match details
        .calories
        .and_then(|per_item| per_item.checked_mul(details.quantity))
    {
        Some(total) => {
            details.total_calories = Some(total);
            format!(", which is about {total} calories")
        }
        None => String::new(),
    };
    let date_clause = date_clause(&details.meal_date, today);

    if details.quantity > EXPLICIT_CONFIRMATION_THRESHOLD {
        info!(
            quantity = details.quantity,
            "high quantity detected, requiring explicit confirmation"
        );
        let response_text = format!(
            "Did you really have {} {}{}{}? Please confirm to log.",
            details.quantity, details.food, date_clause, calorie_clause
        );
        return PromptResponse {
            status: "success",
            action: ConfirmationAction::ExplicitConfirmationRequired,
            details: Some(details),
            response_text,
        };
    }

    let meal = details.meal.as_deref().unwrap_or("unknown");
    let response_text = format!(
        "Got it: {} {} for {}{}{}. I'll log this in a moment unless you cancel.",
        details.quantity, details.food, meal, date_clause, calorie_clause
    );
    PromptResponse {
        status: "success",
        action: ConfirmationAction::ReadbackRequired,
        details: Some(details),
        response_text,
    }
}

/// Handles the user's reply to a meal-clarification prompt. Any reply outside
/// the four meals cancels the whole log; no synonyms, no partial matching.
pub fn apply_meal_clarification(
    mut details: LogDetails,
    meal_reply: &str,
    today: Date,
) -> PromptResponse {
    let normalized = meal_reply.trim().to_lowercase();
    match normalized.parse::<MealType>() {
        Ok(meal) => {
            info!(meal = meal.as_str(), "meal clarified");
            details.meal = Some(meal.as_str().to_string());
            readback_or_confirm(details, today)
        }
        Err(()) => {
            warn!(reply = %normalized, "invalid meal clarification, cancelling log");
            PromptResponse {
                status: "error",
                action: ConfirmationAction::LogCancelled,
                details: None,
                response_text: format!(
                    "'{normalized}' is not a valid meal. Please try logging again."
                ),
            }
        }
    }
}

/// The terminal reply for a finalized log. Persistence has already been
/// attempted by the caller; this text is sent regardless of its outcome.
pub fn finalized_response(details: &LogDetails) -> PromptResponse {
    let calorie_clause = details
        .total_calories
        .map(|total| format!(" for a total of {total} calories"))
        .unwrap_or_default();
    let meal = details.meal.as_deref().unwrap_or("unknown");
    PromptResponse {
        status: "success",
        action: ConfirmationAction::LogFinalized,
        details: None,
        response_text: format!(
            "Done. I've logged {} {} for {}{}.",
            details.quantity, details.food, meal, calorie_clause
        ),
    }
}
