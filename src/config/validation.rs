use crate::config::types::{BrokerConfig, Config, CrawlerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_explicit_urls(&config.crawler.urls)?;
    if let Some(broker) = &config.broker {
        validate_broker_config(broker)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.skip_tiers < 1 {
        return Err(ConfigError::Validation(
            "skip-tiers must be >= 1, got 0".to_string(),
        ));
    }

    if config.backoff_threshold < 1 {
        return Err(ConfigError::Validation(
            "backoff-threshold must be >= 1, got 0".to_string(),
        ));
    }

    for (name, value) in [
        ("idle-time", config.idle_time_secs),
        ("max-idle-time", config.max_idle_time_secs),
        ("check-interval", config.check_interval_secs),
        ("fetch-timeout", config.fetch_timeout_secs),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a positive number of seconds, got {}",
                name, value
            )));
        }
    }

    if config.idle_time_secs > config.max_idle_time_secs {
        return Err(ConfigError::Validation(format!(
            "idle-time ({}s) cannot exceed max-idle-time ({}s)",
            config.idle_time_secs, config.max_idle_time_secs
        )));
    }

    if config.direction == 0 {
        if config.urls.is_empty() {
            return Err(ConfigError::Validation(
                "direction 0 disables id stepping, so at least one url is required".to_string(),
            ));
        }
        if config.ending_id.is_some() {
            return Err(ConfigError::Validation(
                "ending-id has no meaning with direction 0".to_string(),
            ));
        }
    }

    // Numeric targets are only fetchable through a template
    if config.urls.is_empty() {
        match &config.url_template {
            Some(template) if template.contains("{id}") => {
                Url::parse(&template.replace("{id}", "0")).map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid url-template '{}': {}", template, e))
                })?;
            }
            Some(template) => {
                return Err(ConfigError::Validation(format!(
                    "url-template '{}' must contain an {{id}} placeholder",
                    template
                )));
            }
            None => {
                return Err(ConfigError::Validation(
                    "id stepping requires a url-template".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validates the explicit url list
pub(crate) fn validate_explicit_urls(urls: &[String]) -> Result<(), ConfigError> {
    for url in urls {
        let parsed = Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid url '{}': {}", url, e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Url '{}' must use http or https",
                url
            )));
        }
    }
    Ok(())
}

/// Validates broker configuration
fn validate_broker_config(config: &BrokerConfig) -> Result<(), ConfigError> {
    if config.host.is_empty() {
        return Err(ConfigError::Validation(
            "broker host cannot be empty".to_string(),
        ));
    }

    match (&config.queue, &config.exchange) {
        (Some(_), Some(_)) => Err(ConfigError::Validation(
            "broker queue and broker exchange are mutually exclusive".to_string(),
        )),
        (None, None) => Err(ConfigError::Validation(
            "broker requires either a queue or an exchange".to_string(),
        )),
        (Some(queue), None) if queue.is_empty() => Err(ConfigError::Validation(
            "broker queue name cannot be empty".to_string(),
        )),
        (None, Some(exchange)) if exchange.name.is_empty() => Err(ConfigError::Validation(
            "broker exchange name cannot be empty".to_string(),
        )),
        _ => Ok(()),
    }
}
