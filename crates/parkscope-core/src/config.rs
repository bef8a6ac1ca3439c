use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Snapshot API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Live feed settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Map view settings
    #[serde(default)]
    pub map: MapConfig,

    /// Location search settings
    #[serde(default)]
    pub search: SearchConfig,
}

/// Snapshot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the parking backend (spots + forecast endpoints)
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Live feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Websocket URL of the realtime spot-state feed
    pub url: String,

    /// Keyed path subscribed to on the feed
    #[serde(default = "default_feed_path")]
    pub path: String,
}

fn default_feed_path() -> String {
    "spots".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            path: default_feed_path(),
        }
    }
}

/// Map view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Default view center latitude
    pub center_lat: f64,

    /// Default view center longitude
    pub center_lon: f64,

    /// Default zoom level
    pub zoom: u8,

    /// Per-spot coordinate offset: spot `n` sits at `center + n * offset`
    /// on both axes
    pub spot_offset: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 51.505,
            center_lon: -0.09,
            zoom: 13,
            spot_offset: 0.001,
        }
    }
}

/// Location search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Debounce interval for live-typing lookups, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum query length before a preview lookup is scheduled
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,

    /// Maximum number of entries shown in the suggestion list
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Zoom level applied when a confirmed search recenters the map
    #[serde(default = "default_confirm_zoom")]
    pub confirm_zoom: u8,

    /// Forward-geocoding endpoint
    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_min_query_len() -> usize {
    3
}

fn default_suggestion_limit() -> usize {
    5
}

fn default_confirm_zoom() -> u8 {
    13
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_len: default_min_query_len(),
            suggestion_limit: default_suggestion_limit(),
            confirm_zoom: default_confirm_zoom(),
            geocoder_url: default_geocoder_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parkscope");

        Self {
            config_dir,
            api: ApiConfig::default(),
            feed: FeedConfig::default(),
            map: MapConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        if !validation.warnings.is_empty() {
            for warning in &validation.warnings {
                tracing::warn!("Config warning: {}", warning);
            }
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &["http", "https"], &mut result);
        self.validate_url(&self.feed.url, "feed.url", &["ws", "wss"], &mut result);
        self.validate_url(
            &self.search.geocoder_url,
            "search.geocoder_url",
            &["http", "https"],
            &mut result,
        );

        if self.feed.path.is_empty() {
            result.add_error("feed.path", "Feed path must not be empty");
        }

        // Validate map view
        if !(-90.0..=90.0).contains(&self.map.center_lat) {
            result.add_error("map.center_lat", "Latitude must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&self.map.center_lon) {
            result.add_error("map.center_lon", "Longitude must be between -180 and 180");
        }
        if self.map.zoom == 0 || self.map.zoom > 19 {
            result.add_warning("map.zoom", "Zoom level is outside the usual 1-19 range");
        }
        if self.map.spot_offset <= 0.0 {
            result.add_warning(
                "map.spot_offset",
                "Spot offset is not positive; all spots will render at the map center",
            );
        }

        // Validate search behavior
        if self.search.debounce_ms == 0 {
            result.add_warning(
                "search.debounce_ms",
                "Debounce disabled (0 ms); every keystroke will issue a lookup",
            );
        }
        if self.search.min_query_len == 0 {
            result.add_warning(
                "search.min_query_len",
                "Minimum query length is 0; empty input will trigger lookups",
            );
        }
        if self.search.suggestion_limit == 0 {
            result.add_error(
                "search.suggestion_limit",
                "Suggestion limit must be greater than 0",
            );
        }

        result
    }

    /// Validate a URL field against a set of allowed schemes
    fn validate_url(
        &self,
        url_str: &str,
        field_name: &str,
        schemes: &[&str],
        result: &mut ValidationResult,
    ) {
        match Url::parse(url_str) {
            Ok(url) => {
                if !schemes.contains(&url.scheme()) {
                    result.add_error(
                        field_name,
                        format!(
                            "URL must use one of [{}], got: {}",
                            schemes.join(", "),
                            url.scheme()
                        ),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("parkscope");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_api_url() {
        let mut config = Config::default();
        config.api.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn test_api_url_rejects_ws_scheme() {
        let mut config = Config::default();
        config.api.base_url = "ws://localhost:8000".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn test_feed_url_requires_websocket_scheme() {
        let mut config = Config::default();
        config.feed.url = "http://localhost:8000/ws".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "feed.url"));
    }

    #[test]
    fn test_out_of_range_center_is_error() {
        let mut config = Config::default();
        config.map.center_lat = 120.0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "map.center_lat"));
    }

    #[test]
    fn test_zero_debounce_is_warning_only() {
        let mut config = Config::default();
        config.search.debounce_ms = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "search.debounce_ms"));
    }

    #[test]
    fn test_zero_suggestion_limit_is_error() {
        let mut config = Config::default();
        config.search.suggestion_limit = 0;
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.api.base_url, config.api.base_url);
        assert_eq!(parsed.search.debounce_ms, config.search.debounce_ms);
    }
}
