use tracing::warn;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GENERATE_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_FEEDBACK_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub env_vars: EnvVars,
}

#[derive(Debug, Clone)]
pub struct EnvVars {
    /// Absent at boot is tolerated; every request is then answered with a
    /// configuration error before any other processing.
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub generate_model: String,
    pub feedback_model: String,
    pub max_questions: usize,
    pub port: u16,
    pub request_body_size_limit: usize,
    pub request_timeout_in_ms: u64,
}

impl EnvVars {
    pub fn new() -> Self {
        let gemini_api_key = match std::env::var("GEMINI_API_KEY") {
            Ok(s) if !s.is_empty() => Some(s),
            _ => {
                warn!("GEMINI_API_KEY not set. All quiz endpoints will return 500.");
                None
            }
        };

        let gemini_api_base = match std::env::var("GEMINI_API_BASE") {
            Ok(s) if !s.is_empty() => s,
            _ => DEFAULT_GEMINI_API_BASE.to_string(),
        };

        let generate_model = match std::env::var("GEMINI_GENERATE_MODEL") {
            Ok(s) if !s.is_empty() => s,
            _ => DEFAULT_GENERATE_MODEL.to_string(),
        };

        let feedback_model = match std::env::var("GEMINI_FEEDBACK_MODEL") {
            Ok(s) if !s.is_empty() => s,
            _ => DEFAULT_FEEDBACK_MODEL.to_string(),
        };

        let max_questions = match std::env::var("MAX_QUESTIONS") {
            Ok(s) => s.parse().expect("MAX_QUESTIONS to be a whole number"),
            Err(_e) => {
                let default_max_questions = 20;
                warn!("MAX_QUESTIONS not set. Defaulting to {default_max_questions}");
                default_max_questions
            }
        };

        let port = match std::env::var("PORT") {
            Ok(port_string) => port_string.parse().expect("PORT to be parseable as u16"),
            Err(_e) => {
                let default_port = 3003;
                warn!("PORT not set. Defaulting to {default_port}");
                default_port
            }
        };

        let request_timeout_in_ms = match std::env::var("REQUEST_TIMEOUT_IN_MS") {
            Ok(s) => s
                .parse()
                .expect("REQUEST_TIMEOUT_IN_MS to be valid unsigned integer"),
            Err(_e) => {
                let default_request_timeout = 30_000;
                warn!("REQUEST_TIMEOUT_IN_MS not set. Defaulting to {default_request_timeout}");
                default_request_timeout
            }
        };

        // Uploads arrive as base64 data URLs, so leave headroom over the
        // raw document size.
        let request_body_size_limit = match std::env::var("REQUEST_BODY_SIZE_LIMIT") {
            Ok(s) => s
                .parse()
                .expect("REQUEST_BODY_SIZE_LIMIT to be valid unsigned integer"),
            Err(_e) => {
                let default_request_body_size_limit = 10 * 1024 * 1024;
                warn!(
                    "REQUEST_BODY_SIZE_LIMIT not set. Defaulting to {default_request_body_size_limit}"
                );
                default_request_body_size_limit
            }
        };

        EnvVars {
            gemini_api_key,
            gemini_api_base,
            generate_model,
            feedback_model,
            max_questions,
            port,
            request_body_size_limit,
            request_timeout_in_ms,
        }
    }
}
