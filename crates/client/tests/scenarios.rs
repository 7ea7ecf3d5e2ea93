//! End-to-end flows against mock peers and a mock collection endpoint

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Map, Value};
use tracklet_client::{
    Action, Delivery, HttpPeerLookup, LookupError, ResolveError, Session,
};
use tracklet_client::page::Page;
use tracklet_client::test_helpers::test_settings;
use tracklet_storage::{InMemoryCookieJar, InMemoryLocalStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn peer(status: u16, body: Option<Value>, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    let mut response = ResponseTemplate::new(status).set_delay(delay);
    if let Some(body) = body {
        response = response.set_body_json(body);
    }
    Mock::given(method("GET"))
        .and(path("/v1/id/k1"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

async fn collector() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn session(peers: &[&MockServer], collector: &MockServer) -> Arc<Session> {
    let mut settings = test_settings("k1");
    settings.api_host = collector.address().to_string();
    settings.cross_domain_id_servers = peers.iter().map(|p| p.address().to_string()).collect();
    settings.lookup_timeout_ms = 5_000;

    let page = Page::parse("http://app.example/", "test-agent").unwrap();
    let session = Session::builder(
        settings,
        page,
        Arc::new(InMemoryCookieJar::new("app.example")),
        Arc::new(InMemoryLocalStore::new()),
    )
    .lookup(Arc::new(HttpPeerLookup::new(Client::new()).with_scheme("http")))
    .build()
    .unwrap();
    Arc::new(session)
}

async fn posted(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|req| req.url.path() == endpoint)
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_first_peer_with_id_becomes_identity() {
    let a = peer(200, Some(json!({"id": "X"})), Duration::ZERO).await;
    let b = peer(200, Some(json!({"id": null})), Duration::from_millis(300)).await;
    let collector = collector().await;
    let session = session(&[&a, &b], &collector);

    let handle = session.initialize().await.expect("resolution should start");
    let resolution = handle.await.unwrap().unwrap();
    assert_eq!(resolution.cross_domain_id, "X");
    assert_eq!(resolution.from_domain, a.address().to_string());

    let identity = session.identity().await;
    assert_eq!(identity.cross_domain_id.as_deref(), Some("X"));

    let identifies = posted(&collector, "/i").await;
    assert_eq!(identifies.len(), 1);
    assert_eq!(identifies[0]["traits"]["crossDomainId"], "X");
    assert_eq!(identifies[0]["writeKey"], "k1");
}

#[tokio::test]
async fn test_clean_misses_mint_one_identifier() {
    let a = peer(200, Some(json!({"id": null})), Duration::ZERO).await;
    let b = peer(200, None, Duration::from_millis(50)).await;
    let collector = collector().await;
    let session = session(&[&a, &b], &collector);

    let resolution = session.retrieve_cross_domain_id().await.unwrap();
    assert_eq!(resolution.from_domain, "app.example");
    assert!(!resolution.cross_domain_id.is_empty());

    let identifies = posted(&collector, "/i").await;
    assert_eq!(identifies.len(), 1);
    assert_eq!(
        identifies[0]["traits"]["crossDomainId"],
        resolution.cross_domain_id.as_str()
    );
}

#[tokio::test]
async fn test_peer_failure_blocks_minting() {
    let a = peer(500, None, Duration::ZERO).await;
    let b = peer(200, Some(json!({"id": null})), Duration::from_millis(50)).await;
    let collector = collector().await;
    let session = session(&[&a, &b], &collector);

    let err = session.retrieve_cross_domain_id().await.unwrap_err();
    assert_eq!(
        err,
        ResolveError::Lookup {
            domain: a.address().to_string(),
            source: LookupError::Status {
                status: 500,
                reason: "Internal Server Error".to_string()
            }
        }
    );
    assert!(session.identity().await.cross_domain_id.is_none());
    assert!(posted(&collector, "/i").await.is_empty());
}

#[tokio::test]
async fn test_track_posts_normalized_message() {
    let collector = collector().await;
    let session = session(&[], &collector);

    let mut payload = Map::new();
    payload.insert("userId".to_string(), json!("u1"));
    payload.insert("event".to_string(), json!("Login"));
    let delivery = session.handle(Action::Track(payload)).await.unwrap();

    let Delivery::Sent(resp) = delivery else {
        panic!("expected a direct request");
    };
    assert_eq!(resp.url, format!("http://{}/t", collector.address()));

    let tracks = posted(&collector, "/t").await;
    assert_eq!(tracks.len(), 1);
    let body = &tracks[0];
    assert_eq!(body["writeKey"], "k1");
    assert_eq!(body["userId"], "u1");
    assert_eq!(body["event"], "Login");
    assert!(!body["anonymousId"].as_str().unwrap().is_empty());
    assert!(body["messageId"].as_str().unwrap().starts_with("ajs-"));
    assert!(body["sentAt"].is_string());
    assert_eq!(body["context"]["userAgent"], "test-agent");
}
