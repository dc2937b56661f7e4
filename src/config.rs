//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup and shared read-only through `AppState`.

use std::env;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_WARMUP_ATTEMPTS: u32 = 30;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Supabase project ---
    /// Project base URL (auth, rest and storage live under it)
    pub supabase_url: String,
    /// Anonymous key, used for auth calls
    pub supabase_anon_key: String,
    /// Service role key, used for table and storage calls
    pub supabase_service_role_key: String,
    /// JWT secret for local token verification (optional)
    pub supabase_jwt_secret: Option<Vec<u8>>,

    // --- Server ---
    /// Server port
    pub port: u16,
    /// Allowed CORS origins (empty = any)
    pub cors_allowed_origins: Vec<String>,
    /// Upper bound for request bodies (image uploads)
    pub max_upload_bytes: usize,

    // --- Model server ---
    pub inference: InferenceConfig,
}

/// Where the pretrained pipelines are served from.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub vision_model: String,
    pub pneumonia_model: String,
    /// Digit classifier answering `{"logits": [...]}`; no public default
    pub digit_model: Option<String>,
    /// Joint encoder answering `{"image_embeds", "text_embeds"}`; no public default
    pub clip_model: Option<String>,
    pub caption_model: String,
    pub timeout_secs: u64,
    /// Upper bound for images downloaded by URL
    pub max_image_bytes: usize,
    /// Status polls while a model reports it is still loading
    pub warmup_attempts: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            api_token: None,
            vision_model: "Salesforce/blip-image-captioning-large".to_string(),
            pneumonia_model: "nickmuchi/vit-finetuned-chest-xray-pneumonia".to_string(),
            digit_model: None,
            clip_model: None,
            caption_model: "Salesforce/blip-image-captioning-base".to_string(),
            timeout_secs: DEFAULT_INFERENCE_TIMEOUT_SECS,
            max_image_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            warmup_attempts: DEFAULT_WARMUP_ATTEMPTS,
        }
    }
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            supabase_service_role_key: "test_service_role_key".to_string(),
            supabase_jwt_secret: None,
            port: DEFAULT_PORT,
            cors_allowed_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            inference: InferenceConfig {
                digit_model: Some("test/mnist".to_string()),
                clip_model: Some("test/clip".to_string()),
                ..InferenceConfig::default()
            },
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
        let defaults = InferenceConfig::default();
        let inference = InferenceConfig {
            base_url: env::var("INFERENCE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_token: optional_var("INFERENCE_API_TOKEN"),
            vision_model: env::var("VISION_MODEL").unwrap_or(defaults.vision_model),
            pneumonia_model: env::var("PNEUMONIA_MODEL").unwrap_or(defaults.pneumonia_model),
            digit_model: optional_var("DIGIT_MODEL"),
            clip_model: optional_var("CLIP_MODEL"),
            caption_model: env::var("CAPTION_MODEL").unwrap_or(defaults.caption_model),
            timeout_secs: parse_var("INFERENCE_TIMEOUT_SECS", DEFAULT_INFERENCE_TIMEOUT_SECS),
            warmup_attempts: parse_var("MODEL_WARMUP_ATTEMPTS", DEFAULT_WARMUP_ATTEMPTS),
            max_image_bytes: max_upload_bytes,
        };

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: env::var("SUPABASE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_KEY"))?,
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            supabase_jwt_secret: optional_var("SUPABASE_JWT_SECRET").map(String::into_bytes),
            port: parse_var("PORT", DEFAULT_PORT),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            max_upload_bytes,
            inference,
        })
    }
}

/// Read a variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
