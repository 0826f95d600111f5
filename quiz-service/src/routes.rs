use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, extract::State};
use quiz_session::QuestionRecord;
use serde_json::{Value, json};
use tracing::info;

use crate::config::AppState;
use crate::error::Error;
use crate::gemini::GeminiClient;
use crate::{extract, feedback, generate};

pub async fn get_status_ping() -> impl IntoResponse {
    StatusCode::OK
}

/// POST /api/generate-quiz
///
/// Body: `{ fileDataUrl, fileType, fileName }`. Replies 200 with
/// `{ questions: [...] }` (possibly empty), 400 on input or extraction
/// problems, 500 on configuration or upstream problems.
pub async fn post_generate_quiz(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, Error> {
    let gemini = gemini_client(&state)?;

    let file_data_url = required_str(&body, "fileDataUrl")?;
    let file_type = required_str(&body, "fileType")?;
    let file_name = required_str(&body, "fileName")?;
    info!("received document '{file_name}' ({file_type})");

    let bytes = extract::decode_data_url(file_data_url)?;
    let text = extract::extract_text(&bytes, file_type, file_name)?;

    let questions = generate::generate(
        &gemini,
        &state.env_vars.generate_model,
        &text,
        state.env_vars.max_questions,
    )
    .await?;

    Ok(Json(json!({ "questions": questions })))
}

/// POST /api/analyze-results
///
/// Body: `{ incorrectAnswers: QuestionRecord[] }`. An empty list replies
/// 200 with the fixed congratulatory feedback, upstream untouched.
pub async fn post_analyze_results(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, Error> {
    let gemini = gemini_client(&state)?;

    let Some(items) = body.get("incorrectAnswers").and_then(Value::as_array) else {
        return Err(Error::Input(
            "field 'incorrectAnswers' is missing or is not an array".to_string(),
        ));
    };
    let missed: Vec<QuestionRecord> = serde_json::from_value(Value::Array(items.clone()))
        .map_err(|e| Error::Input(format!("invalid question record in 'incorrectAnswers': {e}")))?;
    info!("analyzing {} missed questions", missed.len());

    let feedback = feedback::summarize(&gemini, &state.env_vars.feedback_model, &missed).await?;

    Ok(Json(json!({ "feedback": feedback })))
}

/// A missing key short-circuits both endpoints before any other processing.
fn gemini_client(state: &AppState) -> Result<GeminiClient, Error> {
    let Some(api_key) = state.env_vars.gemini_api_key.clone() else {
        return Err(Error::Config("GEMINI_API_KEY is not set"));
    };
    Ok(GeminiClient::new(
        state.client.clone(),
        state.env_vars.gemini_api_base.clone(),
        api_key,
    ))
}

fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str, Error> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Input(format!("missing or empty field '{field}'")))
}
