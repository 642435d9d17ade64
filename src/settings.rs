use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_FILE: &str = "steam_reviews";
const ENV_PREFIX: &str = "REVIEWS";

/// Runtime knobs for the pager. Loaded from `steam_reviews.toml` (optional)
/// and `REVIEWS_*` environment variables; every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub delay_min_secs: u64,
    pub delay_max_secs: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub user_agents: Vec<String>,
    pub block_markers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            delay_min_secs: 1,
            delay_max_secs: 3,
            timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 2000,
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            block_markers: [
                "g-recaptcha",
                "Access Denied",
                "unusual traffic",
                "Please verify you are a human",
                "cf-challenge",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.delay_min_secs > self.delay_max_secs {
            anyhow::bail!(
                "delay_min_secs ({}) exceeds delay_max_secs ({})",
                self.delay_min_secs,
                self.delay_max_secs
            );
        }
        if self.user_agents.is_empty() {
            anyhow::bail!("user_agents must not be empty");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Exponential backoff for the given zero-based attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }

    /// Random pause between two page requests.
    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(fastrand::u64(self.delay_min_secs..=self.delay_max_secs))
    }

    pub fn pick_user_agent(&self) -> &str {
        &self.user_agents[fastrand::usize(..self.user_agents.len())]
    }
}
