use std::path::PathBuf;

/// Remote suggestion provider settings. Remote generation runs only when
/// `enabled` is true AND a non-empty API key is present; otherwise the
/// deterministic local table is used.
#[derive(Clone, Debug)]
pub struct SuggestionConfig {
    pub enabled: bool,
    pub api_key: String,
    pub model: String,
}

impl SuggestionConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("REMOTE_SUGGESTIONS_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            api_key: std::env::var("GEMINI_API_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
        }
    }
}

/// Signing settings for issued access tokens.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub expire_minutes: i64,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            expire_minutes: std::env::var("JWT_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}

/// Path to the ONNX classifier artifact.
pub fn model_path_from_env() -> PathBuf {
    std::env::var("MODEL_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("psyche_model.onnx"))
}
