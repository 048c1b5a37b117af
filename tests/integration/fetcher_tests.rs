use std::time::Duration;
use stepcrawl::config::HttpConfig;
use stepcrawl::crawler::{HttpFetcher, PageSource, ENCODING_MISMATCH};
use stepcrawl::ErrorSignal;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(timeout: Duration) -> HttpFetcher {
    HttpFetcher::from_config(&HttpConfig::default(), timeout, vec![])
        .expect("Failed to build fetcher")
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_html_page() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/item/1",
        ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>One</title></head></html>",
            "text/html; charset=utf-8",
        ),
    )
    .await;

    let url = format!("{}/item/1", server.uri());
    let page = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.url, url);
    assert!(page.body.contains("<title>One</title>"));
}

#[tokio::test]
async fn test_fetch_decodes_declared_charset() {
    let server = MockServer::start().await;
    // "café" in ISO-8859-1
    serve(
        &server,
        "/latin",
        ResponseTemplate::new(200)
            .set_body_raw(b"<p>caf\xe9</p>".to_vec(), "text/html; charset=iso-8859-1"),
    )
    .await;

    let page = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/latin", server.uri()))
        .await
        .unwrap();
    assert_eq!(page.body, "<p>café</p>");
}

#[tokio::test]
async fn test_not_found_is_response_not_ok() {
    let server = MockServer::start().await;
    serve(&server, "/missing", ResponseTemplate::new(404)).await;

    let result = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/missing", server.uri()))
        .await;

    assert_eq!(result, Err(ErrorSignal::not_ok(404, "Not Found")));
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let server = MockServer::start().await;
    serve(&server, "/busy", ResponseTemplate::new(503)).await;

    let result = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/busy", server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(ErrorSignal::ResponseNotOk { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_offline_status_is_site_offline() {
    let server = MockServer::start().await;
    serve(&server, "/down", ResponseTemplate::new(503)).await;

    let fetcher = fetcher(Duration::from_secs(5)).with_offline_statuses(vec![503]);
    let result = fetcher.fetch(&format!("{}/down", server.uri())).await;

    assert!(matches!(result, Err(ErrorSignal::SiteOffline(_))));
}

#[tokio::test]
async fn test_non_html_is_invalid_response_shape() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/api",
        ResponseTemplate::new(200).set_body_raw(r#"{"id": 1}"#, "application/json"),
    )
    .await;

    let result = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/api", server.uri()))
        .await;

    assert!(matches!(result, Err(ErrorSignal::InvalidResponseShape(_))));
}

#[tokio::test]
async fn test_unknown_charset_is_malformed() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/klingon",
        ResponseTemplate::new(200).set_body_raw("<p>qapla'</p>", "text/html; charset=x-klingon"),
    )
    .await;

    let result = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/klingon", server.uri()))
        .await;

    assert!(matches!(result, Err(ErrorSignal::MalformedResponse(_))));
}

#[tokio::test]
async fn test_invalid_bytes_are_encoding_mismatch() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/broken",
        ResponseTemplate::new(200)
            .set_body_raw(b"<p>\xff\xfe\xfd</p>".to_vec(), "text/html; charset=utf-8"),
    )
    .await;

    let result = fetcher(Duration::from_secs(5))
        .fetch(&format!("{}/broken", server.uri()))
        .await;

    match result {
        Err(ErrorSignal::ValueError(message)) => assert!(message.starts_with(ENCODING_MISMATCH)),
        other => panic!("expected encoding mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_negative_status() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_raw("<p>late</p>", "text/html")
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let result = fetcher(Duration::from_millis(200))
        .fetch(&format!("{}/slow", server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(ErrorSignal::ResponseNotOk { status: -1, .. })
    ));
}

#[tokio::test]
async fn test_refused_connection_is_connection_failed() {
    // Bind then release a port so nothing listens on it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = fetcher(Duration::from_secs(5))
        .fetch(&format!("http://127.0.0.1:{}/", port))
        .await;

    assert!(matches!(result, Err(ErrorSignal::ConnectionFailed(_))));
}
