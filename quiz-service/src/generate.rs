use quiz_session::QuestionRecord;
use quiz_session::record::OPTIONS_PER_QUESTION;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Error;
use crate::gemini::{GeminiClient, GenerationParams};

const GENERATE_TEMPERATURE: f32 = 0.6;
const GENERATE_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Generates up to `max_questions` multiple-choice questions from the
/// extracted document text. An empty list is a valid outcome and means the
/// text was too short or too generic to yield questions.
pub async fn generate(
    client: &GeminiClient,
    model: &str,
    text: &str,
    max_questions: usize,
) -> Result<Vec<QuestionRecord>, Error> {
    let params = GenerationParams {
        model: model.to_string(),
        temperature: GENERATE_TEMPERATURE,
        max_output_tokens: GENERATE_MAX_OUTPUT_TOKENS,
    };
    let reply = client.generate(build_prompt(text, max_questions), &params).await?;
    let questions = parse_questions(&reply)?;
    info!("generated {} questions", questions.len());
    Ok(questions)
}

fn build_prompt(text: &str, max_questions: usize) -> String {
    format!(
        "First identify the 3 to 5 dominant topics of the following text. Then generate a \
         valid JSON array containing up to {max_questions} multiple-choice question objects \
         (4 options each) covering those topics. Each object in the array must have exactly \
         the following keys and types: \"question\" (string), \"options\" (array of 4 strings, \
         all different from each other), \"answer\" (string, identical to one of the strings \
         in \"options\") and \"topic\" (string, one of the identified topics). Do not include \
         any explanation, introductory text, code fences (```) or anything else before or \
         after the raw JSON array. The JSON must start with '[' and end with ']'. Make sure \
         every quote and comma is correct for valid JSON.\
         \n\nText:\n---\n{text}\n---\n\nReturn only the JSON array."
    )
}

/// Parses the model's reply into question records: strips one optional
/// code-fence pair, requires a JSON array, and shape-checks the first
/// element only.
pub fn parse_questions(reply: &str) -> Result<Vec<QuestionRecord>, Error> {
    let cleaned = strip_code_fences(reply);
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| Error::InvalidJson(e.to_string()))?;

    let Some(items) = value.as_array() else {
        return Err(Error::NotAnArray);
    };
    if items.is_empty() {
        warn!("upstream produced an empty question array");
        return Ok(Vec::new());
    }

    check_first_element(&items[0])?;

    serde_json::from_value(value).map_err(|e| Error::InvalidJson(e.to_string()))
}

/// The model was told to reply with a bare array, but wrapping it in
/// ```json fences anyway is common enough to tolerate.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Shallow shape check. Missing `topic` and a non-4 option count are
/// quality warnings, never failures; the structural keys must be present.
fn check_first_element(first: &Value) -> Result<(), Error> {
    if first.get("question").and_then(Value::as_str).is_none() {
        return Err(Error::MalformedResponse(
            "first question object has no 'question' string".to_string(),
        ));
    }
    let Some(options) = first.get("options").and_then(Value::as_array) else {
        return Err(Error::MalformedResponse(
            "first question object has no 'options' array".to_string(),
        ));
    };
    if first.get("answer").and_then(Value::as_str).is_none() {
        return Err(Error::MalformedResponse(
            "first question object has no 'answer' string".to_string(),
        ));
    }

    if options.len() != OPTIONS_PER_QUESTION {
        warn!(
            "first question carries {} options instead of {OPTIONS_PER_QUESTION}",
            options.len()
        );
    }
    if first.get("topic").and_then(Value::as_str).is_none() {
        warn!("generated questions carry no 'topic' label; feedback will be generic");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ARRAY: &str = r#"[
        {"question":"What is the capital of France?",
         "options":["Paris","Lyon","Marseille","Nice"],
         "answer":"Paris","topic":"geography"},
        {"question":"What is 2+2?",
         "options":["3","4","5","6"],
         "answer":"4","topic":"arithmetic"}
    ]"#;

    #[test]
    fn valid_array_parses_with_answer_in_options() {
        let questions = parse_questions(VALID_ARRAY).unwrap();
        assert_eq!(questions.len(), 2);
        for q in &questions {
            assert!(q.options.contains(&q.answer));
            assert!(q.is_well_formed());
        }
    }

    #[test]
    fn code_fences_are_stripped() {
        let fenced = format!("```json\n{VALID_ARRAY}\n```");
        assert_eq!(parse_questions(&fenced).unwrap().len(), 2);

        let bare_fence = format!("```\n{VALID_ARRAY}\n```");
        assert_eq!(parse_questions(&bare_fence).unwrap().len(), 2);
    }

    #[test]
    fn empty_array_is_a_valid_outcome() {
        assert!(parse_questions("[]").unwrap().is_empty());
    }

    #[test]
    fn prose_reply_is_invalid_json() {
        let err = parse_questions("Here are your questions!").unwrap_err();
        assert!(matches!(err, Error::InvalidJson(_)));
    }

    #[test]
    fn object_reply_is_not_an_array() {
        let err = parse_questions(r#"{"questions":[]}"#).unwrap_err();
        assert!(matches!(err, Error::NotAnArray));
    }

    #[test]
    fn missing_topic_is_tolerated() {
        let questions = parse_questions(
            r#"[{"question":"q","options":["a","b","c","d"],"answer":"a"}]"#,
        )
        .unwrap();
        assert_eq!(questions[0].topic, None);
    }

    #[test]
    fn short_option_lists_are_tolerated() {
        let questions =
            parse_questions(r#"[{"question":"q","options":["a","b"],"answer":"a"}]"#).unwrap();
        assert_eq!(questions[0].options.len(), 2);
        assert!(!questions[0].is_well_formed());
    }

    #[test]
    fn missing_answer_fails_the_shape_check() {
        let err =
            parse_questions(r#"[{"question":"q","options":["a","b","c","d"]}]"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn prompt_embeds_the_cap_and_the_source_text() {
        let prompt = build_prompt("The mitochondria is the powerhouse of the cell.", 20);
        assert!(prompt.contains("up to 20"));
        assert!(prompt.contains("mitochondria"));
        assert!(prompt.contains("start with '['"));
    }
}
