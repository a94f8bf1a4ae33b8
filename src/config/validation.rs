use crate::config::types::{
    ApiConfig, Config, CrawlConfig, OutputConfig, SaturationConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Longest cooldown a single backoff sleep may take (milliseconds)
const MAX_COOLDOWN_MS: u64 = 60 * 60 * 1000;

/// Longest lookback range, about a century
pub(crate) const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Widest split floor, the same century in minutes
pub(crate) const MAX_MIN_WINDOW_MINUTES: u64 = MAX_LOOKBACK_DAYS as u64 * 24 * 60;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_crawl_config(&config.crawl)?;
    validate_saturation_config(&config.saturation)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.area < 1 {
        return Err(ConfigError::Validation("area must be >= 1".to_string()));
    }

    if config.per_page < 1 || config.per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "per_page must be between 1 and 100, got {}",
            config.per_page
        )));
    }

    if config.order_by.is_empty() {
        return Err(ConfigError::Validation(
            "order_by cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates crawl scheduling configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.target < 1 {
        return Err(ConfigError::Validation("target must be >= 1".to_string()));
    }

    if config.min_window_minutes < 1 {
        return Err(ConfigError::Validation(
            "min_window_minutes must be >= 1".to_string(),
        ));
    }

    if config.min_window_minutes > MAX_MIN_WINDOW_MINUTES {
        return Err(ConfigError::Validation(format!(
            "min_window_minutes must be <= {}, got {}",
            MAX_MIN_WINDOW_MINUTES, config.min_window_minutes
        )));
    }

    match (config.range_from, config.range_to) {
        (Some(from), Some(to)) => {
            if from >= to {
                return Err(ConfigError::Validation(format!(
                    "range_from ({}) must be earlier than range_to ({})",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }
        (None, None) => {
            if config.lookback_days < 1 {
                return Err(ConfigError::Validation(
                    "lookback_days must be >= 1".to_string(),
                ));
            }
            if config.lookback_days > MAX_LOOKBACK_DAYS {
                return Err(ConfigError::Validation(format!(
                    "lookback_days must be <= {}, got {}",
                    MAX_LOOKBACK_DAYS, config.lookback_days
                )));
            }
        }
        _ => {
            return Err(ConfigError::Validation(
                "range_from and range_to must be set together".to_string(),
            ));
        }
    }

    for (name, value) in [
        ("rate_limit_cooldown_ms", config.rate_limit_cooldown_ms),
        ("ban_cooldown_ms", config.ban_cooldown_ms),
        ("pacing_delay_ms", config.pacing_delay_ms),
    ] {
        if value > MAX_COOLDOWN_MS {
            return Err(ConfigError::Validation(format!(
                "{} must be <= {}ms, got {}ms",
                name, MAX_COOLDOWN_MS, value
            )));
        }
    }

    Ok(())
}

/// Validates saturation thresholds
fn validate_saturation_config(config: &SaturationConfig) -> Result<(), ConfigError> {
    if config.max_found < 1 {
        return Err(ConfigError::Validation(
            "max_found must be >= 1".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.export_path.is_empty() {
        return Err(ConfigError::Validation(
            "export_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) if !parts.1.contains('@') => parts,
        _ => {
            return Err(ConfigError::Validation(format!(
                "Invalid email format: '{}'",
                email
            )))
        }
    };

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn crawl_config() -> CrawlConfig {
        CrawlConfig {
            target: 50,
            lookback_days: 30,
            range_from: None,
            range_to: None,
            min_window_minutes: 360,
            pacing_delay_ms: 350,
            rate_limit_cooldown_ms: 60_000,
            ban_cooldown_ms: 120_000,
            max_page_retries: 3,
        }
    }

    fn api_config() -> ApiConfig {
        ApiConfig {
            base_url: "https://api.hh.ru/vacancies".to_string(),
            area: 40,
            per_page: 100,
            order_by: "publication_time".to_string(),
            request_timeout_secs: 25,
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn test_validate_api_config() {
        assert!(validate_api_config(&api_config()).is_ok());

        let mut bad_scheme = api_config();
        bad_scheme.base_url = "ftp://api.hh.ru/vacancies".to_string();
        assert!(matches!(
            validate_api_config(&bad_scheme),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut oversized_page = api_config();
        oversized_page.per_page = 101;
        assert!(validate_api_config(&oversized_page).is_err());

        let mut no_timeout = api_config();
        no_timeout.request_timeout_secs = 0;
        assert!(validate_api_config(&no_timeout).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_crawl_config(&crawl_config()).is_ok());

        let mut half_range = crawl_config();
        half_range.range_from = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(validate_crawl_config(&half_range).is_err());

        let mut inverted = crawl_config();
        inverted.range_from = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        inverted.range_to = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(validate_crawl_config(&inverted).is_err());
    }

    #[test]
    fn test_validate_cooldown_upper_bound() {
        let mut config = crawl_config();
        config.ban_cooldown_ms = MAX_COOLDOWN_MS + 1;
        assert!(validate_crawl_config(&config).is_err());
    }

    #[test]
    fn test_validate_lookback_upper_bound() {
        let mut config = crawl_config();
        config.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(validate_crawl_config(&config).is_ok());

        config.lookback_days = u32::MAX;
        assert!(validate_crawl_config(&config).is_err());
    }

    #[test]
    fn test_validate_granularity_upper_bound() {
        let mut config = crawl_config();
        config.min_window_minutes = MAX_MIN_WINDOW_MINUTES;
        assert!(validate_crawl_config(&config).is_ok());

        config.min_window_minutes = u64::MAX / 2;
        assert!(validate_crawl_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_granularity() {
        let mut config = crawl_config();
        config.min_window_minutes = 0;
        assert!(validate_crawl_config(&config).is_err());
    }
}
