use crate::config::types::{Config, HarvestConfig, OutputConfig, SourceEntry, UserAgentConfig};
use crate::crawler::{resolve_pattern, Cadence};
use crate::ConfigError;
use chrono::NaiveDate;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;

    if config.summarizer.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "summarizer max_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the crawl window bounds
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if let Some(end) = config.end_date {
        if end < config.start_date {
            return Err(ConfigError::InvalidDate(format!(
                "end-date {} is before start-date {}",
                end, config.start_date
            )));
        }
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

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates source entries: unique ids, known cadence, resolvable sitemap patterns
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let sample = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN);

    for source in sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }

        source
            .cadence
            .parse::<Cadence>()
            .map_err(|e| ConfigError::Validation(format!("source '{}': {}", source.id, e)))?;

        if source.sitemap_patterns.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have at least one sitemap pattern",
                source.id
            )));
        }

        for pattern in &source.sitemap_patterns {
            let resolved = resolve_pattern(pattern, sample);
            Url::parse(&resolved).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid sitemap pattern '{}': {}", pattern, e))
            })?;
        }
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

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, cadence: &str, pattern: &str) -> SourceEntry {
        SourceEntry {
            id: id.to_string(),
            cadence: cadence.to_string(),
            sitemap_patterns: vec![pattern.to_string()],
            extractor: None,
        }
    }

    #[test]
    fn test_validate_sources() {
        let ok = source("a", "daily", "https://a.example.com/{year}/{month}/{day}.xml");
        assert!(validate_sources(&[ok.clone()]).is_ok());

        assert!(validate_sources(&[ok.clone(), ok.clone()]).is_err());
        assert!(validate_sources(&[source("", "daily", "https://a.example.com/x.xml")]).is_err());
        assert!(validate_sources(&[source("b", "hourly", "https://b.example.com/x.xml")]).is_err());
        assert!(validate_sources(&[source("c", "yearly", "not a url {year}")]).is_err());
    }

    #[test]
    fn test_validate_window_order() {
        let config = HarvestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            mode: Default::default(),
            item_count_cap: 0,
            skip_known_urls: true,
        };
        assert!(matches!(
            validate_harvest_config(&config),
            Err(ConfigError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
