//! Archive transport tests against a local axum origin on a random port.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rssplug_archive::{Archive, ArchiveConfig};
use rssplug_common::FetchError;
use tokio::net::TcpListener;

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Origin Feed</title>
    <link>http://origin</link>
    <description>test</description>
    <item>
      <title>Newest</title>
      <link>http://origin/posts/2</link>
      <description>two</description>
    </item>
    <item>
      <title>Oldest</title>
      <link>http://origin/posts/1</link>
      <description>one</description>
    </item>
  </channel>
</rss>"#;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

async fn feed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/rss+xml")], FEED)
}

async fn image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG)
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "too late"
}

/// Start the origin and return its address.
async fn start_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route("/feed.xml", get(feed))
        .route("/image.png", get(image))
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route("/slow.png", get(slow))
        .route("/broken.xml", get(|| async { "not a feed at all" }));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn archive() -> Archive {
    Archive::new(ArchiveConfig {
        feed_timeout: Duration::from_secs(5),
        media_timeout: Duration::from_millis(300),
        user_agent: "rssplug-test".into(),
    })
    .unwrap()
}

#[tokio::test]
async fn fetches_and_parses_feed() {
    let addr = start_origin().await;

    let feed = archive()
        .feed(&format!("http://{addr}/feed.xml"))
        .await
        .unwrap();

    assert_eq!(feed.title.as_deref(), Some("Origin Feed"));
    let titles: Vec<_> = feed.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Newest", "Oldest"]);
}

#[tokio::test]
async fn fetches_media_bytes() {
    let addr = start_origin().await;

    let bytes = archive()
        .fetch_bytes(&format!("http://{addr}/image.png"))
        .await
        .unwrap();

    assert_eq!(&bytes[..], PNG);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let addr = start_origin().await;
    let url = format!("http://{addr}/missing.png");

    let err = archive().fetch_bytes(&url).await.unwrap_err();

    match err {
        FetchError::Status { url: failed, status } => {
            assert_eq!(failed, url);
            assert_eq!(status, 404);
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_media_times_out() {
    let addr = start_origin().await;

    let err = archive()
        .fetch_bytes(&format!("http://{addr}/slow.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Request { .. }), "got {err:?}");
}

#[tokio::test]
async fn malformed_feed_is_a_parse_error() {
    let addr = start_origin().await;

    let err = archive()
        .feed(&format!("http://{addr}/broken.xml"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Parse { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_is_a_request_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = archive()
        .feed(&format!("http://{addr}/feed.xml"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Request { .. }), "got {err:?}");
}
