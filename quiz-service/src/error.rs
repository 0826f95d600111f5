use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Errors crossing the endpoint boundary. Every error is terminal for the
/// current request; there is no retry at any layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or missing request fields. Surfaced verbatim.
    #[error("{0}")]
    Input(String),
    /// Missing server secret. The public message never names the secret.
    #[error("server configuration error")]
    Config(&'static str),
    /// The document could not be read in its declared format.
    #[error("{0}")]
    Extraction(String),
    /// A format outside .txt, .pdf and .docx that the last-resort text
    /// decode could not rescue.
    #[error("unsupported file type '{0}': only .txt, .pdf and .docx documents are supported")]
    UnsupportedFormat(String),
    #[error("no textual content could be extracted from the document, or it was empty")]
    EmptyDocument,
    /// Non-success transport status from the generation capability, with
    /// its structured error message when one was present.
    #[error("{message}")]
    Upstream { status: u16, message: String },
    /// Upstream replied success but without the expected candidate text.
    #[error("could not generate a result from the document")]
    MalformedResponse(String),
    /// Candidate text was present but was not parseable JSON.
    #[error("could not generate a result from the document")]
    InvalidJson(String),
    /// Candidate text parsed, but not into an array of questions.
    #[error("could not generate a result from the document")]
    NotAnArray,
    /// The generation capability could not be reached at all.
    #[error("the generation service could not be reached")]
    Transport(#[from] reqwest::Error),
}

impl From<&Error> for StatusCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::Input(_)
            | Error::Extraction(_)
            | Error::UnsupportedFormat(_)
            | Error::EmptyDocument => StatusCode::BAD_REQUEST,
            Error::Config(_)
            | Error::Upstream { .. }
            | Error::MalformedResponse(_)
            | Error::InvalidJson(_)
            | Error::NotAnArray
            | Error::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);

        // Full diagnostic detail stays in the server log; the caller only
        // ever sees the Display message.
        match &self {
            Error::Config(detail) => error!("configuration error: {detail}"),
            Error::Upstream { status, message } => {
                error!("upstream returned {status}: {message}")
            }
            Error::MalformedResponse(detail) => error!("malformed upstream response: {detail}"),
            Error::InvalidJson(detail) => error!("upstream reply was not valid JSON: {detail}"),
            Error::NotAnArray => error!("upstream reply parsed, but not into an array"),
            Error::Transport(e) => error!("upstream request failed: {e}"),
            _ => {}
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_bad_requests() {
        let e = Error::Input("missing field 'fileName'".to_string());
        assert_eq!(StatusCode::from(&e), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "missing field 'fileName'");
    }

    #[test]
    fn config_error_never_names_the_secret() {
        let e = Error::Config("GEMINI_API_KEY is not set");
        assert_eq!(StatusCode::from(&e), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn upstream_message_is_forwarded() {
        let e = Error::Upstream {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(StatusCode::from(&e), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_string(), "overloaded");
    }

    #[test]
    fn parse_failures_share_a_generic_message() {
        let invalid = Error::InvalidJson("line 3 column 7".to_string());
        assert!(!invalid.to_string().contains("line 3"));
        assert_eq!(invalid.to_string(), Error::NotAnArray.to_string());
    }
}
