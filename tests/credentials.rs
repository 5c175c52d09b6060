//! Integration tests for the refreshing credentials using wiremock

use azscrape::azure::auth::{
    credential_from_lookup, ClientSecretCredential, ManagedIdentityCredential, TokenCredential,
};
use azscrape::azure::http::ArmHttpClient;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> ArmHttpClient {
    ArmHttpClient::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_client_secret_token_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/my-tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=my-app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "sp-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = ClientSecretCredential::new(http(), &server.uri(), "my-tenant", "my-app", "s3cret");

    assert_eq!(credential.get_token().await.unwrap(), "sp-token");
    assert_eq!(credential.get_token().await.unwrap(), "sp-token");
}

#[tokio::test]
async fn test_client_secret_rejection_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/my-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let credential = ClientSecretCredential::new(http(), &server.uri(), "my-tenant", "my-app", "wrong");
    let err = credential.get_token().await.unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("Failed to get access token"));
    assert!(message.contains("401"));
    // The response body never ends up in the error
    assert!(!message.contains("AADSTS7000215"));
}

#[tokio::test]
async fn test_managed_identity_sends_identity_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .and(header("X-IDENTITY-HEADER", "secret-header"))
        .and(query_param("resource", "https://management.azure.com/"))
        .and(query_param("api-version", "2019-08-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mi-token",
            "expires_on": "4102444800",
            "resource": "https://management.azure.com/",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = format!("{}/msi/token", server.uri());
    let credential = ManagedIdentityCredential::new(http(), &endpoint, "secret-header", None);

    assert_eq!(credential.get_token().await.unwrap(), "mi-token");
    assert_eq!(credential.get_token().await.unwrap(), "mi-token");
}

#[tokio::test]
async fn test_environment_selects_managed_identity() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .and(query_param("client_id", "user-assigned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-assigned-token",
            "expires_on": 4102444800u64
        })))
        .mount(&server)
        .await;

    let endpoint = format!("{}/msi/token", server.uri());
    let env: HashMap<&str, String> = HashMap::from([
        ("IDENTITY_ENDPOINT", endpoint),
        ("IDENTITY_HEADER", "h".to_string()),
        ("AZURE_CLIENT_ID", "user-assigned".to_string()),
    ]);

    let credential = credential_from_lookup(&http(), |key| env.get(key).cloned()).unwrap();
    assert_eq!(credential.get_token().await.unwrap(), "user-assigned-token");
}

#[test]
fn test_empty_environment_has_no_credential() {
    let result = credential_from_lookup(&http(), |_| None);
    assert!(result.is_err());
}
