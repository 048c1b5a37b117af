use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepcrawl::config::{CrawlerConfig, HttpConfig};
use stepcrawl::crawler::{CrawlEngine, HttpFetcher, StopReason, TitleExtractor};
use stepcrawl::output::{BrokerTransport, PublishResult};
use stepcrawl::{Publisher, ShutdownSignal};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Broker transport that keeps every delivered payload
#[derive(Clone, Default)]
struct CapturingBroker {
    delivered: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl CapturingBroker {
    fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .delivered
            .lock()
            .unwrap()
            .iter()
            .filter_map(|payload| payload["id"].as_i64())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl BrokerTransport for CapturingBroker {
    async fn connect(&mut self) -> PublishResult<()> {
        Ok(())
    }

    async fn send(&mut self, payload: &[u8]) -> PublishResult<()> {
        let value = serde_json::from_slice(payload)?;
        self.delivered.lock().unwrap().push(value);
        Ok(())
    }

    fn describe(&self) -> String {
        "capture".to_string()
    }
}

fn html(title: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>{}</title></head><body></body></html>", title),
        "text/html",
    )
}

fn crawler_config(server: &MockServer, extra: &str) -> CrawlerConfig {
    toml::from_str(&format!(
        "url-template = \"{}/item/{{id}}\"\ncheck-interval = 0.05\n{}",
        server.uri(),
        extra
    ))
    .expect("Failed to parse crawler config")
}

async fn engine(config: CrawlerConfig, broker: &CapturingBroker) -> CrawlEngine {
    let fetcher =
        HttpFetcher::from_config(&HttpConfig::default(), Duration::from_secs(5), vec![])
            .expect("Failed to build fetcher");
    CrawlEngine::new(
        config,
        Box::new(fetcher),
        Box::new(TitleExtractor::default()),
        Publisher::connect(Box::new(broker.clone())).await,
    )
}

#[tokio::test]
async fn test_full_run_retries_skipped_ids() {
    let server = MockServer::start().await;

    // ID 2 fails once, then recovers during the graceful drain
    Mock::given(method("GET"))
        .and(path("/item/2"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // ID 4 never exists
    Mock::given(method("GET"))
        .and(path("/item/4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/item/\d+$"))
        .respond_with(html("Entry"))
        .mount(&server)
        .await;

    let broker = CapturingBroker::default();
    let config = crawler_config(&server, "starting-id = 1\ndirection = 1\nending-id = 6");
    let mut engine = engine(config, &broker).await;

    let report = engine.run().await;

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.crawler, "title_1+1");
    assert_eq!(broker.ids(), vec![1, 2, 3, 5]);
    assert_eq!(report.published, 4);
    assert_eq!(report.lost, 0);
    // ID 4 used up every tier
    assert_eq!(report.skipped_left, 0);

    let requests = server.received_requests().await.unwrap();
    let item_4 = requests.iter().filter(|r| r.url.path() == "/item/4").count();
    assert_eq!(item_4, 4);
}

#[tokio::test]
async fn test_explicit_urls_stop_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("Page"))
        .mount(&server)
        .await;

    let broker = CapturingBroker::default();
    let mut config = crawler_config(&server, "direction = 0");
    config.urls = vec![
        format!("{}/a", server.uri()),
        format!("{}/b", server.uri()),
    ];

    let shutdown = ShutdownSignal::new();
    let mut engine = engine(config, &broker).await.with_shutdown(shutdown.clone());
    shutdown.set();

    let report = engine.run().await;

    assert_eq!(report.stop_reason, StopReason::Shutdown);
    assert_eq!(report.requeued_left, 2);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_urls_are_published_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("Page"))
        .mount(&server)
        .await;

    let broker = CapturingBroker::default();
    let mut config = crawler_config(&server, "direction = 0");
    let a = format!("{}/a", server.uri());
    config.urls = vec![a.clone(), format!("{}/b", server.uri()), a];

    let mut engine = engine(config, &broker).await;
    let report = engine.run().await;

    assert_eq!(report.published, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    let titles: Vec<String> = broker
        .delivered
        .lock()
        .unwrap()
        .iter()
        .map(|payload| payload["title"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(titles, vec!["Page", "Page"]);
}
