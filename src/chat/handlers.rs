use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::extractor::RawIntent;
use crate::state::AppState;
use crate::{foods, logs};

use super::dto::{ConfirmationAction, LogDetails, PromptResponse};
use super::services;

pub fn routes() -> Router<AppState> {
    Router::new().route("/prompt", post(handle_prompt))
}

/// Single entry point for the whole protocol. The payload shape selects the
/// transition: `{text}` starts a flow, `{action: "confirm_log"}` finalizes,
/// `{action: "clarify_meal"}` answers a clarification prompt.
#[instrument(skip(state, body))]
pub async fn handle_prompt(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    if let Some(text) = body.get("text") {
        return handle_initial_prompt(&state, text).await;
    }

    let action = body.get("action").and_then(Value::as_str);
    if action == Some("confirm_log") && body.get("details").is_some() {
        info!("received confirmation to log");
        return handle_confirmed_log(&state, &body).await;
    }
    if action == Some("clarify_meal") && body.get("details").is_some() && body.get("meal").is_some()
    {
        info!("received meal clarification");
        return handle_meal_clarification(&body);
    }

    bad_request("Invalid request payload")
}

async fn handle_initial_prompt(state: &AppState, text: &Value) -> Response {
    let Some(prompt_text) = text.as_str().map(str::trim).filter(|t| !t.is_empty()) else {
        return bad_request("No text provided");
    };
    info!(prompt = %prompt_text, "received initial prompt");

    let intent = match state.extractor.extract(prompt_text).await {
        Ok(intent) => intent,
        Err(e) => {
            error!(error = %e, "intent extraction failed");
            let body = PromptResponse {
                status: "error",
                action: ConfirmationAction::Error,
                details: None,
                response_text: "An unexpected error occurred.".into(),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    };

    let mut raw = match intent {
        RawIntent::Conversational { text } => {
            info!(response = %text, "conversational model reply");
            let body = PromptResponse {
                status: "success",
                action: ConfirmationAction::AiResponse,
                details: None,
                response_text: text,
            };
            return Json(body).into_response();
        }
        RawIntent::ActionableLog(raw) => raw,
    };

    let Some(food) = raw
        .food
        .clone()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
    else {
        return bad_request("AI response missing food name.");
    };
    // The trimmed name is what the dictionary stores; keep the echoed
    // details consistent with it.
    raw.food = Some(food.clone());

    let (food_id, canonical_calories) =
        match foods::repo::get_or_create(&state.db, &food, raw.calories.as_ref()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(error = %e, "database error during initial prompt");
                return internal("A database error occurred.");
            }
        };

    let today = services::today();
    let details = services::normalize_intent(raw, food_id, canonical_calories, today);

    if !services::valid_meal(details.meal.as_deref()) {
        info!(meal = ?details.meal, %food, "meal missing or invalid, asking for clarification");
        return Json(services::meal_clarification_prompt(details)).into_response();
    }

    Json(services::readback_or_confirm(details, today)).into_response()
}

/// Finalize transition. The echoed details are re-trusted as issued; a failed
/// insert is logged server-side and deliberately not surfaced to the user.
async fn handle_confirmed_log(state: &AppState, body: &Value) -> Response {
    let details: LogDetails = match serde_json::from_value(body["details"].clone()) {
        Ok(details) => details,
        Err(_) => return bad_request("Invalid request payload"),
    };

    // No idempotency key exists in the protocol: a client retry of the same
    // confirm_log inserts a second row.
    if let Err(e) = logs::repo::insert_entry(&state.db, &details).await {
        error!(error = %e, "database error on insert");
    }
    info!(
        food = %details.food,
        quantity = details.quantity,
        meal = ?details.meal,
        "log finalized"
    );

    Json(services::finalized_response(&details)).into_response()
}

fn handle_meal_clarification(body: &Value) -> Response {
    let details: LogDetails = match serde_json::from_value(body["details"].clone()) {
        Ok(details) => details,
        Err(_) => return bad_request("Invalid request payload"),
    };
    let meal_reply = body.get("meal").and_then(Value::as_str).unwrap_or("");

    Json(services::apply_meal_clarification(
        details,
        meal_reply,
        services::today(),
    ))
    .into_response()
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
}

fn internal(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": msg })),
    )
        .into_response()
}
