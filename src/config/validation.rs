//! Configuration validation
//!
//! Rejects configurations that would make the crawler misbehave before any
//! network or database work starts.

use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
///
/// # Arguments
///
/// * `config` - The configuration to validate
///
/// # Returns
///
/// * `Ok(())` - Configuration is usable
/// * `Err(ConfigError)` - A value is out of range or malformed
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    // Base URL must parse and be http(s)
    let base = Url::parse(&config.site.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.site.base_url, e)))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must be http or https, got {}",
            base.scheme()
        )));
    }

    if config.crawler.concurrent_requests == 0 {
        return Err(ConfigError::Validation(
            "concurrent-requests must be at least 1".to_string(),
        ));
    }

    if config.crawler.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be at least 1".to_string(),
        ));
    }

    if config.crawler.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent must not be empty".to_string(),
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "max-attempts must be at least 1".to_string(),
        ));
    }

    if config.retry.backoff_factor < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be at least 1.0, got {}",
            config.retry.backoff_factor
        )));
    }

    if config.output.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path must not be empty".to_string(),
        ));
    }

    if config.report.limit == 0 {
        return Err(ConfigError::Validation(
            "report limit must be at least 1".to_string(),
        ));
    }

    Ok(())
}
