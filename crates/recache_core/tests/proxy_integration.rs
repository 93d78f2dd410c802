mod support;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use anyhow::Result;
use recache_core::{CachingProxy, DiskCacheStore, ProxyError, ProxyOptions, RequestInfo};
use tempfile::TempDir;
use tokio::net::TcpListener;

use support::*;

#[tokio::test]
async fn url_reflects_lifecycle() -> Result<()> {
    let cache = TempDir::new()?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let port = proxy.port();
    assert!(port > 0);
    assert_eq!(proxy.url(), format!("http://127.0.0.1:{port}"));

    proxy.stop().await;
    assert_eq!(proxy.url(), "http://proxy-not-running");
    assert_eq!(proxy.port(), 0);
    Ok(())
}

#[tokio::test]
async fn second_request_is_served_from_cache() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let first = proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;
    let second = proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;

    assert_eq!(first.status, 201);
    assert_eq!(first.body_text(), r#"{"counter":1}"#);
    assert_eq!(second.status, 201);
    assert_eq!(second.body, first.body);
    assert_eq!(second.header("x-counter"), Some("1"));
    assert_eq!(second.header("content-type"), Some("application/json"));
    assert_eq!(backend.hits(), 1);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn expired_entry_is_refetched() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), Duration::from_millis(1)).await?;

    let first = proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;

    assert_eq!(first.body_text(), r#"{"counter":1}"#);
    assert_eq!(second.body_text(), r#"{"counter":2}"#);
    assert_eq!(backend.hits(), 2);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn recorded_responses_replay_without_backend() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let url = backend.url("/counter");

    let mut recorder = start_proxy(cache.path(), ONE_DAY).await?;
    let recorded = proxy_get(recorder.port(), &url, &[]).await?;
    recorder.stop().await;
    backend.shutdown();

    let mut replayer = start_proxy(cache.path(), ONE_DAY).await?;
    let replayed = proxy_get(replayer.port(), &url, &[]).await?;

    assert_eq!(replayed.status, recorded.status);
    assert_eq!(replayed.body, recorded.body);
    assert_eq!(backend.hits(), 1);

    replayer.stop().await;
    Ok(())
}

#[tokio::test]
async fn connect_is_rejected_and_connection_closed() -> Result<()> {
    let cache = TempDir::new()?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    // No Connection: close from the client; send_raw only returns on EOF.
    let response = send_raw(
        proxy.port(),
        "CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n",
    )
    .await?;

    assert_eq!(response.status, 501);
    assert_eq!(response.header("connection"), Some("close"));

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn request_headers_reach_backend_and_response_headers_come_back() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let response = proxy_get(
        proxy.port(),
        &backend.url("/dump?x=1"),
        &[("x-client", "test"), ("Proxy-Connection", "keep-alive")],
    )
    .await?;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("x-server"), Some("dumping-server"));

    let dump: serde_json::Value = serde_json::from_slice(&response.body)?;
    assert_eq!(dump["method"], "GET");
    assert_eq!(dump["url"], "/dump?x=1");
    assert_eq!(dump["headers"]["x-client"], "test");
    assert!(dump["headers"].get("proxy-connection").is_none());

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn request_body_is_forwarded() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let url = backend.url("/echo");
    let body = "a text body";
    let request = format!(
        "POST {url} HTTP/1.1\r\nHost: {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        url.trim_start_matches("http://").trim_end_matches("/echo"),
        body.len(),
    );
    let response = send_raw(proxy.port(), &request).await?;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), body);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn redirects_are_recorded_not_followed() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let first = proxy_get(proxy.port(), &backend.url("/redirect"), &[]).await?;
    let second = proxy_get(proxy.port(), &backend.url("/redirect"), &[]).await?;

    assert_eq!(first.status, 302);
    assert_eq!(first.header("location"), Some("/counter"));
    assert_eq!(second.status, 302);
    assert_eq!(backend.hits(), 1);

    proxy.stop().await;
    Ok(())
}

async fn unused_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

#[tokio::test]
async fn unreachable_backend_yields_bad_gateway_and_notifies_observer() -> Result<()> {
    let cache = TempDir::new()?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let options = ProxyOptions::new(cache.path());
    let mut proxy = CachingProxy::with_store(options, Arc::new(DiskCacheStore::new(cache.path())))
        .with_error_observer(move |req: &RequestInfo, err: &ProxyError| {
            sink.lock().unwrap().push((req.uri.to_string(), err.status().as_u16()));
        });
    proxy.start().await?;

    let url = format!("http://127.0.0.1:{}/down", unused_port().await?);
    let response = proxy_get(proxy.port(), &url, &[]).await?;

    assert_eq!(response.status, 502);
    assert_eq!(*seen.lock().unwrap(), vec![(url, 502)]);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn observer_can_be_replaced_while_running() -> Result<()> {
    let cache = TempDir::new()?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    proxy.set_error_observer(move |_: &RequestInfo, _: &ProxyError| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let url = format!("http://127.0.0.1:{}/", unused_port().await?);
    let response = proxy_get(proxy.port(), &url, &[]).await?;

    assert_eq!(response.status, 502);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn relative_target_is_an_internal_error() -> Result<()> {
    let cache = TempDir::new()?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let response = send_raw(
        proxy.port(),
        "GET /not-absolute HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await?;

    assert_eq!(response.status, 500);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn corrupt_entry_is_treated_as_miss() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;

    for shard in std::fs::read_dir(cache.path().join("entries"))? {
        for entry in std::fs::read_dir(shard?.path())? {
            std::fs::write(entry?.path(), b"garbage")?;
        }
    }

    let response = proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;
    assert_eq!(response.body_text(), r#"{"counter":2}"#);
    assert_eq!(backend.hits(), 2);

    // The refetch overwrote the corrupt file.
    let again = proxy_get(proxy.port(), &backend.url("/counter"), &[]).await?;
    assert_eq!(again.body_text(), r#"{"counter":2}"#);
    assert_eq!(backend.hits(), 2);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn different_urls_have_independent_entries() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let a = proxy_get(proxy.port(), &backend.url("/counter?a"), &[]).await?;
    let b = proxy_get(proxy.port(), &backend.url("/counter?b"), &[]).await?;
    let a_again = proxy_get(proxy.port(), &backend.url("/counter?a"), &[]).await?;

    assert_eq!(a.body_text(), r#"{"counter":1}"#);
    assert_eq!(b.body_text(), r#"{"counter":2}"#);
    assert_eq!(a_again.body, a.body);
    assert_eq!(backend.hits(), 2);

    proxy.stop().await;
    Ok(())
}

#[tokio::test]
async fn two_instances_run_side_by_side() -> Result<()> {
    let cache_a = TempDir::new()?;
    let cache_b = TempDir::new()?;
    let backend = StubBackend::start().await?;

    let mut a = start_proxy(cache_a.path(), ONE_DAY).await?;
    let mut b = start_proxy(cache_b.path(), ONE_DAY).await?;
    assert_ne!(a.port(), b.port());

    let via_a = proxy_get(a.port(), &backend.url("/counter"), &[]).await?;
    let via_b = proxy_get(b.port(), &backend.url("/counter"), &[]).await?;

    assert_eq!(via_a.body_text(), r#"{"counter":1}"#);
    assert_eq!(via_b.body_text(), r#"{"counter":2}"#);

    a.stop().await;
    b.stop().await;
    Ok(())
}

#[tokio::test]
async fn stopped_proxy_refuses_connections() -> Result<()> {
    let cache = TempDir::new()?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;
    let port = proxy.port();

    proxy.stop().await;
    proxy.stop().await;

    assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());
    Ok(())
}

#[tokio::test]
async fn stop_lets_in_flight_request_finish() -> Result<()> {
    let cache = TempDir::new()?;
    let backend = StubBackend::start().await?;
    let mut proxy = start_proxy(cache.path(), ONE_DAY).await?;

    let port = proxy.port();
    let url = backend.url("/slow");
    let client = tokio::spawn(async move { proxy_get(port, &url, &[]).await });

    // Let the request reach the backend before shutting down.
    tokio::time::sleep(SLOW_DELAY / 3).await;
    proxy.stop().await;

    let response = client.await??;
    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "finally done");
    assert_eq!(backend.hits(), 1);
    Ok(())
}
