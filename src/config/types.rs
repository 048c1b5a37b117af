use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Stepcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}

/// Crawl engine behavior configuration
///
/// Durations are written in seconds and may be fractional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Crawler name used in logs; derived from the extractor when absent
    #[serde(default)]
    pub name: Option<String>,

    /// First ID to crawl; unused with explicit URLs
    #[serde(default)]
    pub starting_id: i64,

    /// Signed ID step; 0 disables ID stepping
    pub direction: i64,

    /// Exclusive boundary in the direction of travel
    #[serde(default)]
    pub ending_id: Option<i64>,

    /// Number of skip tiers (retries before a target is dropped)
    #[serde(default = "default_skip_tiers")]
    pub skip_tiers: usize,

    /// Consecutive empty results tolerated before idling
    #[serde(default = "default_backoff_threshold")]
    pub backoff_threshold: u32,

    /// Threshold growth per idle event
    #[serde(default = "default_backoff_step")]
    pub backoff_step: u32,

    /// Initial idle pause
    #[serde(rename = "idle-time", default = "default_idle_time")]
    pub idle_time_secs: f64,

    /// Ceiling for the doubling idle pause
    #[serde(rename = "max-idle-time", default = "default_max_idle_time")]
    pub max_idle_time_secs: f64,

    /// How often skipped targets are re-checked while running
    #[serde(rename = "check-interval", default = "default_check_interval")]
    pub check_interval_secs: f64,

    /// Per-request timeout
    #[serde(rename = "fetch-timeout", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: f64,

    /// Honor per-record sleep hints; defaults to `direction < 0`
    #[serde(default)]
    pub calm: Option<bool>,

    /// Only crawl these URLs when non-empty
    #[serde(default)]
    pub urls: Vec<String>,

    /// Template turning a numeric target into a URL, e.g. `https://example.com/item/{id}`
    #[serde(default)]
    pub url_template: Option<String>,

    /// HTTP statuses that mean the site is offline
    #[serde(default)]
    pub offline_statuses: Vec<u16>,

    /// What to do with errors no handler recognizes
    #[serde(default)]
    pub unclassified_errors: UnclassifiedPolicy,
}

/// Policy for signals that fall through the dispatch table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnclassifiedPolicy {
    /// Log at critical severity and keep crawling
    #[default]
    Continue,
    /// Stop the run loop
    Shutdown,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

/// Message broker connection and routing
///
/// Exactly one of `queue` or `exchange` must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrokerConfig {
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_broker_credential")]
    pub username: String,

    #[serde(default = "default_broker_credential")]
    pub password: String,

    #[serde(default = "default_vhost")]
    pub vhost: String,

    /// Plain queue to declare and publish to
    #[serde(default)]
    pub queue: Option<String>,

    /// Exchange to declare and publish to
    #[serde(default)]
    pub exchange: Option<ExchangeConfig>,
}

/// Exchange descriptor for broker publishing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExchangeConfig {
    pub name: String,

    /// direct, fanout, topic, headers, or a plugin type
    #[serde(default = "default_exchange_kind")]
    pub kind: String,

    #[serde(default)]
    pub routing_key: String,
}

impl CrawlerConfig {
    pub fn idle_time(&self) -> Duration {
        Duration::from_secs_f64(self.idle_time_secs)
    }

    pub fn max_idle_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_idle_time_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.fetch_timeout_secs)
    }

    /// Whether per-record sleep hints are honored
    pub fn is_calm(&self) -> bool {
        self.calm.unwrap_or(self.direction < 0)
    }

    /// Formats a crawl target into the URL that is actually fetched
    ///
    /// Numeric targets are substituted into `url_template`; anything else is
    /// assumed to be a URL already.
    pub fn format_target(&self, target: &str) -> String {
        match &self.url_template {
            Some(template) if target.parse::<i64>().is_ok() => template.replace("{id}", target),
            _ => target.to_string(),
        }
    }
}

impl BrokerConfig {
    /// AMQP connection URI built from the connection parameters
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username,
            self.password,
            self.host,
            self.port,
            self.vhost.replace('/', "%2f")
        )
    }

    /// Exchange and routing key used for every publish
    ///
    /// Queue mode publishes through the default exchange with the queue name
    /// as routing key.
    pub fn route(&self) -> (&str, &str) {
        match (&self.exchange, &self.queue) {
            (Some(exchange), _) => (exchange.name.as_str(), exchange.routing_key.as_str()),
            (None, Some(queue)) => ("", queue.as_str()),
            (None, None) => ("", ""),
        }
    }
}

fn default_skip_tiers() -> usize {
    3
}

fn default_backoff_threshold() -> u32 {
    15
}

fn default_backoff_step() -> u32 {
    5
}

fn default_idle_time() -> f64 {
    30.0
}

fn default_max_idle_time() -> f64 {
    30.0 * 60.0
}

fn default_check_interval() -> f64 {
    180.0
}

fn default_fetch_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    format!("stepcrawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_broker_port() -> u16 {
    5672
}

fn default_broker_credential() -> String {
    "guest".to_string()
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_exchange_kind() -> String {
    "direct".to_string()
}
