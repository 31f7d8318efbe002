use crate::config::types::{AuditConfig, Config, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on in-flight fetches against a single audited site
const MAX_FETCH_CONCURRENCY: u32 = 16;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_audit_config(&config.audit)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates audit budgets and thresholds
fn validate_audit_config(config: &AuditConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.pages_per_batch < 1 || config.pages_per_batch > config.max_pages {
        return Err(ConfigError::Validation(format!(
            "pages_per_batch must be between 1 and max_pages ({}), got {}",
            config.max_pages, config.pages_per_batch
        )));
    }

    if config.batch_time_budget_secs < 1 {
        return Err(ConfigError::Validation(
            "batch_time_budget_secs must be >= 1".to_string(),
        ));
    }

    if config.fetch_concurrency < 1 || config.fetch_concurrency > MAX_FETCH_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "fetch_concurrency must be between 1 and {}, got {}",
            MAX_FETCH_CONCURRENCY, config.fetch_concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    // A batch may run one request timeout past its budget to make progress
    if config.request_timeout_secs >= config.batch_time_budget_secs {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs ({}) must be less than batch_time_budget_secs ({})",
            config.request_timeout_secs, config.batch_time_budget_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
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

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.report_dir.is_empty() {
        return Err(ConfigError::Validation(
            "report_dir cannot be empty".to_string(),
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

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
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

    #[test]
    fn test_default_audit_config_is_valid() {
        assert!(validate_audit_config(&AuditConfig::default()).is_ok());
    }

    #[test]
    fn test_batch_larger_than_total_budget() {
        let config = AuditConfig {
            max_pages: 10,
            pages_per_batch: 11,
            ..AuditConfig::default()
        };
        assert!(validate_audit_config(&config).is_err());
    }

    #[test]
    fn test_concurrency_bounds() {
        let too_low = AuditConfig {
            fetch_concurrency: 0,
            ..AuditConfig::default()
        };
        let too_high = AuditConfig {
            fetch_concurrency: MAX_FETCH_CONCURRENCY + 1,
            ..AuditConfig::default()
        };
        assert!(validate_audit_config(&too_low).is_err());
        assert!(validate_audit_config(&too_high).is_err());
    }

    #[test]
    fn test_zero_time_budget() {
        let config = AuditConfig {
            batch_time_budget_secs: 0,
            ..AuditConfig::default()
        };
        assert!(validate_audit_config(&config).is_err());
    }

    #[test]
    fn test_request_timeout_must_fit_batch_budget() {
        let config = AuditConfig {
            batch_time_budget_secs: 10,
            request_timeout_secs: 10,
            ..AuditConfig::default()
        };
        assert!(validate_audit_config(&config).is_err());

        let config = AuditConfig {
            batch_time_budget_secs: 10,
            request_timeout_secs: 9,
            ..AuditConfig::default()
        };
        assert!(validate_audit_config(&config).is_ok());
    }

    #[test]
    fn test_crawler_name_characters() {
        let mut config = UserAgentConfig {
            crawler_name: "Sumi-Audit".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        };
        assert!(validate_user_agent_config(&config).is_ok());

        config.crawler_name = "Sumi Audit!".to_string();
        assert!(validate_user_agent_config(&config).is_err());
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
}
