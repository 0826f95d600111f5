use quiz_session::QuestionRecord;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::Error;
use crate::gemini::{GeminiClient, GenerationParams};

/// Returned without any upstream call when the user missed nothing.
pub const NO_MISSES_FEEDBACK: &str = "¡Felicidades! No tuviste errores.";
/// Returned when the upstream reply carried no usable text. Feedback is
/// best-effort and must never block the results screen.
pub const FALLBACK_FEEDBACK: &str =
    "No se pudo generar feedback específico, pero ¡sigue estudiando!";

const FEEDBACK_TEMPERATURE: f32 = 0.7;
const FEEDBACK_MAX_OUTPUT_TOKENS: u32 = 512;

/// Produces a short study-feedback paragraph for the missed questions.
pub async fn summarize(
    client: &GeminiClient,
    model: &str,
    missed: &[QuestionRecord],
) -> Result<String, Error> {
    if missed.is_empty() {
        return Ok(NO_MISSES_FEEDBACK.to_string());
    }

    let params = GenerationParams {
        model: model.to_string(),
        temperature: FEEDBACK_TEMPERATURE,
        max_output_tokens: FEEDBACK_MAX_OUTPUT_TOKENS,
    };
    match client.generate(build_prompt(missed), &params).await {
        Ok(text) => {
            info!("feedback generated for {} missed questions", missed.len());
            Ok(text.trim().to_string())
        }
        Err(Error::MalformedResponse(detail)) => {
            warn!("feedback reply had no usable text ({detail}); using fallback");
            Ok(FALLBACK_FEEDBACK.to_string())
        }
        Err(e) => Err(e),
    }
}

/// Embeds each miss as question text, topic label (verbatim, or
/// "unspecified"), and correct answer.
pub fn build_prompt(missed: &[QuestionRecord]) -> String {
    let summary: Vec<Value> = missed
        .iter()
        .map(|q| {
            json!({
                "question": q.question,
                "topic": q.topic_or_unspecified(),
                "correct_answer": q.answer,
            })
        })
        .collect();
    let summary = Value::Array(summary).to_string();

    format!(
        "A user took a quiz based on a document and answered the following questions \
         incorrectly. Each question may carry a main topic. Analyze these mistakes and write \
         a short, friendly paragraph (2 to 4 sentences) of feedback for the user, naming the \
         1 to 3 general topics or concepts they seem to need to review, based on the topics \
         attached to the missed questions. Do not be too technical; focus on being useful \
         for studying. If there is no clear topic pattern, or only one question was missed, \
         give more general encouragement instead.\
         \n\nThe user's mistakes (JSON format):\n{summary}\
         \n\nReturn only the feedback paragraph."
    )
}
