use std::env;
use std::path::PathBuf;

const DEFAULT_MODEL_PROVIDER: &str = "deepseek";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_MODEL_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const DEFAULT_TEMPERATURE: f32 = 1.0;
const MAX_TEMPERATURE: f32 = 2.0;
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const HISTORY_DIR_NAME: &str = "deep-chat";
const HISTORY_FILE_NAME: &str = "history";

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub model_provider: String,
    pub model: String,
    pub model_base_url: String,
    pub api_key: Option<String>,
    pub system_prompt: String,
    pub generation: GenerationParams,
    pub connect_timeout_secs: u64,
    pub history_file: PathBuf,
    pub words_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let generation = GenerationParams {
            temperature: parse_temperature(get_var("MODEL_TEMPERATURE").as_deref()),
            max_tokens: parse_max_tokens(get_var("MODEL_MAX_TOKENS").as_deref()),
        };

        Self {
            model_provider: get_var("MODEL_PROVIDER")
                .unwrap_or_else(|| DEFAULT_MODEL_PROVIDER.to_string()),
            model: get_var("MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_base_url: get_var("MODEL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string()),
            api_key: parse_non_empty(get_var("DEEPSEEK_API_KEY").as_deref()),
            system_prompt: get_var("SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            generation,
            connect_timeout_secs: parse_positive_u64(
                get_var("MODEL_CONNECT_TIMEOUT_SECS").as_deref(),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
            history_file: parse_non_empty(get_var("HISTORY_FILE").as_deref())
                .map(PathBuf::from)
                .unwrap_or_else(default_history_file),
            words_file: parse_non_empty(get_var("WORDS_FILE").as_deref()).map(PathBuf::from),
        }
    }
}

fn default_history_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HISTORY_DIR_NAME)
        .join(HISTORY_FILE_NAME)
}

fn parse_non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_max_tokens(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}

fn parse_temperature(raw: Option<&str>) -> f32 {
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| (0.0..=MAX_TEMPERATURE).contains(value))
        .unwrap_or(DEFAULT_TEMPERATURE)
}
