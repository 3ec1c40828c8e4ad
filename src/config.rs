use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Environment variables checked, in order, for the Gemini credential.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub poll_interval: Duration,
    /// `None` polls a video job until it reports done, however long that takes.
    pub poll_timeout: Option<Duration>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self { base_url: DEFAULT_API_BASE.to_string(), poll_interval: DEFAULT_POLL_INTERVAL, poll_timeout: None }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub gemini: GeminiSettings,
}

impl Config {
    /// Reads settings from the process environment. Call `dotenv` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok()).map(Duration::from_secs);
        let port = lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080);
        let gemini = GeminiSettings {
            base_url: lookup("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            poll_interval: secs("GEMINI_VIDEO_POLL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL),
            poll_timeout: secs("GEMINI_VIDEO_POLL_TIMEOUT_SECS"),
        };
        Self { port, gemini }
    }
}

/// Reads the credential fresh from the environment; empty when unset.
pub fn read_api_key() -> String {
    API_KEY_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_default()
}
