//! Configuration management
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `STEWARD_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `/etc/steward/{service}/config.toml` (system config)
//! 4. Hardcoded defaults (fallback)
//!
//! Environment variable format: `STEWARD_SECTION__FIELD_NAME`
//! - Use `__` (double underscore) to separate nested sections
//! - Use `_` (single underscore) within field names
//! - Example: `STEWARD_LOCKING__LEASE_TTL_SECS=300`
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [forms]
//! selector_field = "selector"
//! token_field = "csrf_token"
//!
//! [security]
//! csrf_enabled = true
//! session_max_age_secs = 86400
//!
//! [locking]
//! enabled = true
//! mode = "exclusive"
//! lease_ttl_secs = 600
//!
//! [export]
//! filename = "export.csv"
//! line_feed_replacement = " "
//! ```

use crate::lock::LockMode;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP form field names the action handlers read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    /// Record selector field (repeat the field for batch selections)
    pub selector_field: String,
    /// Confirmation flag field
    pub confirm_field: String,
    /// Cancellation flag field
    pub cancel_field: String,
    /// CSRF token field
    pub token_field: String,
    /// Routing-context filter field (never carried into re-renders)
    pub filter_field: String,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            selector_field: "selector".to_string(),
            confirm_field: "confirm".to_string(),
            cancel_field: "cancel".to_string(),
            token_field: "csrf_token".to_string(),
            filter_field: "filter".to_string(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Enable CSRF protection on state-changing confirmations
    pub csrf_enabled: bool,

    /// Session maximum age in seconds
    pub session_max_age_secs: u64,

    /// Enable secure cookies (HTTPS only)
    pub secure_cookies: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            csrf_enabled: true,
            session_max_age_secs: 86400, // 24 hours
            secure_cookies: !cfg!(debug_assertions),
        }
    }
}

/// Record locking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Honor per-node locking settings (off disables locking globally)
    pub enabled: bool,

    /// Default mode for nodes that enable locking without naming one
    pub mode: LockMode,

    /// Lease lifetime in seconds
    pub lease_ttl_secs: i64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: LockMode::Exclusive,
            lease_ttl_secs: 600, // 10 minutes
        }
    }
}

/// CSV export configuration
///
/// Field/record delimiters and the quote character are fixed by the
/// export contract; only the filename and line-feed handling vary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Default download filename
    pub filename: String,

    /// Replacement token for line feeds inside cell values
    ///
    /// `None` leaves embedded newlines in place (most spreadsheet tools
    /// then mis-split the record).
    pub line_feed_replacement: Option<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            filename: "export.csv".to_string(),
            line_feed_replacement: Some(" ".to_string()),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardConfig {
    /// Form field names
    pub forms: FormSettings,
    /// CSRF and session security
    pub security: SecuritySettings,
    /// Record locking
    pub locking: LockSettings,
    /// CSV export
    pub export: ExportSettings,
}

impl StewardConfig {
    /// Load configuration for a named service
    ///
    /// Merge order (highest priority last): defaults, system config,
    /// `./config.toml`, `STEWARD_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail validation or type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use steward::config::StewardConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = StewardConfig::load_for_service("my-admin")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // System config: /etc/steward/{service_name}/config.toml
        let system_config = PathBuf::from("/etc/steward")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // Local config: ./config.toml
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // Environment variables (highest priority, double underscore for nesting)
        figment = figment.merge(Env::prefixed("STEWARD_").split("__").lowercase(true));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid
    /// TOML, or fails type conversion.
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("STEWARD_").split("__").lowercase(true))
            .extract()?;
        Ok(config)
    }
}
