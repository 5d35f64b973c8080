use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use yq_client::Endpoints;

/// Runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub scroll: ScrollSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub tracking: TrackingSettings,

    #[serde(default)]
    pub river: RiverSettings,

    #[serde(default)]
    pub identity: IdentitySettings,
}

impl Settings {
    /// Load settings from file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, "settings.json");
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(flatten)]
    pub endpoints: Endpoints,

    /// Clear a handler's loading flag when its request fails. Off by default,
    /// which leaves a failed handler unable to issue further requests.
    #[serde(default)]
    pub unlock_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSettings {
    /// Distance from the viewport bottom, in pixels, that triggers a load.
    #[serde(default = "default_scroll_offset")]
    pub offset: i64,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            offset: default_scroll_offset(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    /// Delay before a search deferred for the session id is retried.
    #[serde(default = "default_search_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Offset such as `-05:00` written in place of `Z` in search dates.
    #[serde(default)]
    pub utc_offset: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_search_retry_delay_ms(),
            utc_offset: None,
        }
    }
}

impl SearchSettings {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSettings {
    /// Analytics function used when a container does not name one.
    #[serde(default = "default_tracking_function")]
    pub function: String,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            function: default_tracking_function(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
        }
    }
}

impl TrackingSettings {
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverSettings {
    #[serde(default = "default_river_offset")]
    pub offset: i64,

    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,

    /// Story markup of this length or shorter is discarded.
    #[serde(default = "default_min_markup_len")]
    pub min_markup_len: usize,
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            offset: default_river_offset(),
            cooldown_ms: default_cooldown_ms(),
            min_markup_len: default_min_markup_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySettings {
    #[serde(default = "default_identity_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_identity_retries")]
    pub retries: u32,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_identity_retry_delay_ms(),
            retries: default_identity_retries(),
        }
    }
}

impl IdentitySettings {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_scroll_offset() -> i64 {
    300
}
fn default_cooldown_ms() -> i64 {
    3000
}
fn default_search_retry_delay_ms() -> u64 {
    1000
}
fn default_tracking_function() -> String {
    "ga".to_string()
}
fn default_navigation_timeout_ms() -> u64 {
    1000
}
fn default_river_offset() -> i64 {
    500
}
fn default_min_markup_len() -> usize {
    16
}
fn default_identity_retry_delay_ms() -> u64 {
    5000
}
fn default_identity_retries() -> u32 {
    1
}
