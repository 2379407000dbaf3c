use crate::config::types::{Config, CrawlerConfig, LocatorTable, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Longest delay, wait or timeout accepted, in seconds (one day)
const MAX_SECONDS: f64 = 86_400.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_locator_table(&config.locators)?;
    Ok(())
}

/// Validates crawler pacing and URLs
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if !(config.min_delay > 0.0 && config.min_delay <= MAX_SECONDS) {
        return Err(ConfigError::Validation(format!(
            "min_delay must be between 0 and {} seconds, got {}",
            MAX_SECONDS, config.min_delay
        )));
    }

    if !(config.operation_timeout > 0.0 && config.operation_timeout <= MAX_SECONDS) {
        return Err(ConfigError::Validation(format!(
            "operation_timeout must be between 0 and {} seconds, got {}",
            MAX_SECONDS, config.operation_timeout
        )));
    }

    if config.click_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "click_retries must be >= 1, got {}",
            config.click_retries
        )));
    }

    if !(config.retry_wait >= 0.0 && config.retry_wait <= MAX_SECONDS) {
        return Err(ConfigError::Validation(format!(
            "retry_wait must be between 0 and {} seconds, got {}",
            MAX_SECONDS, config.retry_wait
        )));
    }

    validate_http_url("login_url", &config.login_url)?;
    validate_http_url("profile_base_url", &config.profile_base_url)?;

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Validates output naming patterns
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.file_naming.trim().is_empty() {
        return Err(ConfigError::Validation(
            "file_naming cannot be empty".to_string(),
        ));
    }

    // Without %TYPE% every section of a target would write to the same file
    if !config.file_naming.contains("%TYPE%") && !config.folder_naming.contains("%TYPE%") {
        return Err(ConfigError::Validation(format!(
            "file_naming or folder_naming must contain %TYPE%, got '{}' and '{}'",
            config.file_naming, config.folder_naming
        )));
    }

    Ok(())
}

/// Validates that every locator has a value
fn validate_locator_table(table: &LocatorTable) -> Result<(), ConfigError> {
    for (key, value) in table.entries() {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingLocator(key));
        }
    }
    Ok(())
}
