//! Intent extraction boundary.
//!
//! Sends the user's prompt to Gemini's generateContent API with a system
//! instruction that asks for a `log_meal` JSON object, then maps the raw
//! response text to a [`RawIntent`]. The text-to-intent step is total:
//! anything that is not well-formed actionable JSON becomes a
//! conversational reply, never an error.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GeminiConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT_SECS: u64 = 60;

pub const SYSTEM_INSTRUCTION: &str = r#"
You are a meal logging assistant. Your primary function is to identify when a user wants to log a meal.

If the user's request is to log a food item, respond ONLY with a JSON object in the following format:
{"action": "log_meal", "details": {"food": "...", "meal": "...", "quantity": ..., "calories": ..., "date_keyword": "..."}}

From the user's prompt, extract a date reference keyword.
- If the user says "today" or does not mention a date, set "date_keyword" to "today".
- If the user says "yesterday", set "date_keyword" to "yesterday".
- If the user mentions any other date phrase (e.g., "last Tuesday", "October 27th"), set "date_keyword" to that exact phrase (e.g., "last Tuesday").

Do NOT calculate the final date yourself. Just return the keyword or phrase.

The "meal" field MUST be one of "breakfast", "lunch", "dinner", or "snack". If the user does not specify a valid meal, set the "meal" field to null. Do not guess a meal or use values like "other".

Also, estimate the calories for a SINGLE UNIT of the food item and include it in the "calories" field as a number. For example, for "2 eggs", provide the calories for one egg.

The "quantity" is the number describing how many of the food item were eaten. It is usually found right before the food name.
If multiple numbers are present, use context to determine the correct quantity. For example, in 'I ate 2 large pizzas on my 30th birthday', the quantity is 2, not 30.
If the quantity is ambiguous or seems like a transcription error (e.g., '5 817 eggs'), choose the most plausible number that modifies the food item.
If no quantity is mentioned, you can omit the field as the system will default to 1.

Your response for a log_meal action MUST be ONLY the raw JSON object itself, with no surrounding text, explanation, or markdown code fences (like ```json).

If the user's request is anything else (e.g., a question, a greeting, a general command), respond conversationally as a helpful assistant.
"#;

/// Structured output of the model, before any normalization. Every field is
/// untrusted and may be missing or the wrong JSON type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLogDetails {
    pub food: Option<String>,
    pub meal: Option<String>,
    pub quantity: Option<Value>,
    pub calories: Option<Value>,
    pub date_keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawIntent {
    Conversational { text: String },
    ActionableLog(RawLogDetails),
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Errors only on transport or API faults; model output that cannot be
    /// interpreted comes back as `RawIntent::Conversational`.
    async fn extract(&self, prompt: &str) -> Result<RawIntent>;
}

/// Maps raw model text to an intent. Strips a markdown ```json fence if the
/// model wrapped its output despite instructions, then requires valid JSON
/// with `action == "log_meal"`; everything else is a conversational reply.
pub fn parse_intent(raw: &str) -> RawIntent {
    let trimmed = raw.trim();
    let cleaned = match trimmed.strip_prefix("```json") {
        Some(rest) => rest.strip_suffix("```").unwrap_or(rest).trim(),
        None => trimmed,
    };

    let Ok(value) = serde_json::from_str::<Value>(cleaned) else {
        return RawIntent::Conversational {
            text: trimmed.to_string(),
        };
    };
    if value.get("action").and_then(Value::as_str) != Some("log_meal") {
        return RawIntent::Conversational {
            text: trimmed.to_string(),
        };
    }

    // Field-by-field extraction: a wrong-typed field degrades on its own
    // instead of discarding the whole intent.
    let details = value.get("details").cloned().unwrap_or(Value::Null);
    RawIntent::ActionableLog(RawLogDetails {
        food: details
            .get("food")
            .and_then(Value::as_str)
            .map(str::to_string),
        meal: details
            .get("meal")
            .and_then(Value::as_str)
            .map(str::to_string),
        quantity: details.get("quantity").cloned().filter(|v| !v.is_null()),
        calories: details.get("calories").cloned().filter(|v| !v.is_null()),
        date_keyword: details
            .get("date_keyword")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

pub struct GeminiExtractor {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiExtractor {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiSystemInstruction,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}

#[async_trait]
impl IntentExtractor for GeminiExtractor {
    async fn extract(&self, prompt: &str) -> Result<RawIntent> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".into(),
                parts: vec![GeminiTextPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiTextPart {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
        };

        let url = format!(
            "{GEMINI_API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error: {status} - {body}");
        }

        let api_response: GeminiResponse = response.json().await?;
        if let Some(error) = api_response.error {
            anyhow::bail!("Gemini error: {}", error.message);
        }

        let mut text = String::new();
        if let Some(candidates) = api_response.candidates {
            if let Some(candidate) = candidates.into_iter().next() {
                for part in candidate.content.parts {
                    if let Some(t) = part.text {
                        text.push_str(&t);
                    }
                }
            }
        }

        Ok(parse_intent(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actionable_json_parses_to_log_intent() {
        let raw = r#"{"action": "log_meal", "details": {"food": "egg", "meal": "breakfast", "quantity": 2, "calories": 70, "date_keyword": "today"}}"#;
        let RawIntent::ActionableLog(details) = parse_intent(raw) else {
            panic!("expected actionable intent");
        };
        assert_eq!(details.food.as_deref(), Some("egg"));
        assert_eq!(details.meal.as_deref(), Some("breakfast"));
        assert_eq!(details.quantity, Some(json!(2)));
        assert_eq!(details.calories, Some(json!(70)));
        assert_eq!(details.date_keyword.as_deref(), Some("today"));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"action\": \"log_meal\", \"details\": {\"food\": \"toast\"}}\n```";
        let RawIntent::ActionableLog(details) = parse_intent(raw) else {
            panic!("expected actionable intent");
        };
        assert_eq!(details.food.as_deref(), Some("toast"));
        assert_eq!(details.meal, None);
    }

    #[test]
    fn plain_text_becomes_conversational() {
        let intent = parse_intent("  Hello! How can I help with your meals today?  ");
        assert_eq!(
            intent,
            RawIntent::Conversational {
                text: "Hello! How can I help with your meals today?".into()
            }
        );
    }

    #[test]
    fn malformed_json_becomes_conversational() {
        let intent = parse_intent(r#"{"action": "log_meal", "details": {"#);
        assert!(matches!(intent, RawIntent::Conversational { .. }));
    }

    #[test]
    fn other_actions_become_conversational() {
        let intent = parse_intent(r#"{"action": "delete_everything", "details": {}}"#);
        assert!(matches!(intent, RawIntent::Conversational { .. }));
    }

    #[test]
    fn null_meal_and_missing_quantity_survive_extraction() {
        let raw = r#"{"action": "log_meal", "details": {"food": "pizza", "meal": null, "calories": 285}}"#;
        let RawIntent::ActionableLog(details) = parse_intent(raw) else {
            panic!("expected actionable intent");
        };
        assert_eq!(details.meal, None);
        assert_eq!(details.quantity, None);
        assert_eq!(details.calories, Some(json!(285)));
    }
}
