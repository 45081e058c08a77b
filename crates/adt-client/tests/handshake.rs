//! Handshake and connection tests against a mock ADT server

use adt_client::{AdtClient, AdtService, ConnectionCache};
use adt_core::AdtError;
use adt_test_utils::{
    adt_path, mount_handshake, profile_with_password, test_profile, TEST_TOKEN,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn handshake_establishes_session_with_token() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let client = AdtClient::connect(test_profile(&server)).await.unwrap();

    assert!(client.is_authenticated());
    assert_eq!(client.session().csrf_token(), TEST_TOKEN);
}

#[tokio::test]
async fn wrong_password_never_authenticates() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let err = AdtClient::connect(profile_with_password(&server, "wrong-horse"))
        .await
        .unwrap_err();

    assert!(err.is_authentication());
    let message = err.to_string();
    assert!(message.contains("DEVELOPER"));
    assert!(!message.contains("wrong-horse"));
}

#[tokio::test]
async fn placeholder_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/discovery")))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "Required"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_handshake(&server).await;

    let err = AdtClient::connect(test_profile(&server)).await.unwrap_err();
    assert!(matches!(err, AdtError::Protocol { .. }));
}

#[tokio::test]
async fn missing_discovery_services_are_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = AdtClient::connect(test_profile(&server)).await.unwrap_err();
    assert!(matches!(err, AdtError::NotFound(_)));
}

#[tokio::test]
async fn unreachable_host_is_connectivity_error() {
    // Non-pooled server: a pooled one keeps listening after drop.
    let server = MockServer::builder().start().await;
    let profile = test_profile(&server);
    drop(server);

    let err = AdtClient::connect(profile).await.unwrap_err();
    assert!(matches!(err, AdtError::Connectivity { .. }));
}

#[tokio::test]
async fn test_connection_reruns_handshake() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let client = AdtClient::connect(test_profile(&server)).await.unwrap();
    AdtService::test_connection(&client).await.unwrap();
    AdtService::ping(&client).await.unwrap();
}

#[tokio::test]
async fn test_connection_installs_session() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let client = AdtClient::new(test_profile(&server)).unwrap();
    assert!(!client.is_authenticated());

    client.test_connection().await.unwrap();

    assert!(client.is_authenticated());
    assert_eq!(client.session().csrf_token(), TEST_TOKEN);
    client.ping().await.unwrap();
}

#[tokio::test]
async fn failed_test_connection_keeps_previous_session() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let client = AdtClient::new(profile_with_password(&server, "wrong-horse")).unwrap();
    assert!(client.test_connection().await.unwrap_err().is_authentication());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn cache_reuses_live_connection() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    let cache = ConnectionCache::new();
    let profile = test_profile(&server);

    let a = cache.get_or_create(&profile).await.unwrap();
    let b = cache.get_or_create(&profile).await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats().connects, 1);
}
