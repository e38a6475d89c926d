//! Environment configuration
//!
//! Everything is read from the process environment (a `.env` file is loaded
//! by the binaries). Missing third-party keys are not an error here; the
//! tools backed by that provider report themselves as not configured.

use std::env;
use std::time::Duration;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";
const DEFAULT_YAHOO_SEARCH_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_SEC_DATA_BASE_URL: &str = "https://data.sec.gov";
const DEFAULT_SEC_WWW_BASE_URL: &str = "https://www.sec.gov";
const DEFAULT_SEC_USER_AGENT: &str = "research-agent your.name@example.com";

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,

    pub finnhub_api_key: Option<String>,
    pub finnhub_base_url: String,
    pub tavily_api_key: Option<String>,
    pub tavily_base_url: String,
    pub yahoo_search_base_url: String,
    pub sec_data_base_url: String,
    pub sec_www_base_url: String,
    pub sec_user_agent: String,

    pub database_url: Option<String>,
    pub checkpoint_dir: Option<String>,

    pub tool_timeout: Duration,
    pub model_timeout: Duration,
    pub max_model_calls: u32,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            finnhub_api_key: None,
            finnhub_base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
            tavily_api_key: None,
            tavily_base_url: DEFAULT_TAVILY_BASE_URL.to_string(),
            yahoo_search_base_url: DEFAULT_YAHOO_SEARCH_BASE_URL.to_string(),
            sec_data_base_url: DEFAULT_SEC_DATA_BASE_URL.to_string(),
            sec_www_base_url: DEFAULT_SEC_WWW_BASE_URL.to_string(),
            sec_user_agent: DEFAULT_SEC_USER_AGENT.to_string(),
            database_url: None,
            checkpoint_dir: None,
            tool_timeout: Duration::from_secs(30),
            model_timeout: Duration::from_secs(120),
            max_model_calls: 25,
            port: 8080,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: non_empty_var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty_var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            finnhub_api_key: non_empty_var("FINNHUB_API_KEY"),
            finnhub_base_url: non_empty_var("FINNHUB_BASE_URL")
                .unwrap_or(defaults.finnhub_base_url),
            tavily_api_key: non_empty_var("TAVILY_API_KEY"),
            tavily_base_url: non_empty_var("TAVILY_BASE_URL").unwrap_or(defaults.tavily_base_url),
            yahoo_search_base_url: non_empty_var("YAHOO_SEARCH_BASE_URL")
                .unwrap_or(defaults.yahoo_search_base_url),
            sec_data_base_url: non_empty_var("SEC_DATA_BASE_URL")
                .unwrap_or(defaults.sec_data_base_url),
            sec_www_base_url: non_empty_var("SEC_WWW_BASE_URL")
                .unwrap_or(defaults.sec_www_base_url),
            sec_user_agent: non_empty_var("SEC_USER_AGENT").unwrap_or(defaults.sec_user_agent),
            database_url: non_empty_var("POSTGRES_URL").or_else(|| non_empty_var("DATABASE_URL")),
            checkpoint_dir: non_empty_var("CHECKPOINT_DIR"),
            tool_timeout: secs_var("TOOL_TIMEOUT_SECS").unwrap_or(defaults.tool_timeout),
            model_timeout: secs_var("MODEL_TIMEOUT_SECS").unwrap_or(defaults.model_timeout),
            max_model_calls: non_empty_var("MAX_MODEL_CALLS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_model_calls),
            port: non_empty_var("PORT")
                .or_else(|| non_empty_var("API_PORT"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs_var(key: &str) -> Option<Duration> {
    non_empty_var(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.openai_model, "gpt-4o");
        assert_eq!(settings.max_model_calls, 25);
        assert_eq!(settings.tool_timeout, Duration::from_secs(30));
        assert!(settings.finnhub_api_key.is_none());
    }

    #[test]
    fn test_secs_var_parses() {
        env::set_var("RESEARCH_AGENT_TEST_SECS", "7");
        assert_eq!(secs_var("RESEARCH_AGENT_TEST_SECS"), Some(Duration::from_secs(7)));
        env::set_var("RESEARCH_AGENT_TEST_SECS", "soon");
        assert_eq!(secs_var("RESEARCH_AGENT_TEST_SECS"), None);
        env::remove_var("RESEARCH_AGENT_TEST_SECS");
    }
}
