use std::time::Duration;

use common::http_client::{RetryPolicy, RetryingHttpClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_retries: u32) -> RetryPolicy {
    // Real statuses, near-zero sleeps so tests stay quick.
    RetryPolicy {
        max_retries,
        base_interval: Duration::from_millis(1),
        interval_randomness: 0.0,
        backoff_factor: 1.0,
        retryable_statuses: vec![429, 500, 502, 503, 504],
    }
}

#[tokio::test]
async fn retries_retryable_status_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"message":"server error"}"#))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"RetryTown"}"#))
        .mount(&server)
        .await;

    let client =
        RetryingHttpClient::new(format!("{}/data", server.uri()), fast_policy(2)).unwrap();

    let response = client.get(&[("q", "something".to_string())]).await.unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.contains("RetryTown"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn returns_last_response_when_retries_exhaust() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client =
        RetryingHttpClient::new(format!("{}/data", server.uri()), fast_policy(1)).unwrap();

    // Exhausting retries on a retryable status is not an error: the final
    // response is handed back for the caller to interpret.
    let response = client.get(&[]).await.unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn zero_retry_policy_makes_a_single_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = RetryingHttpClient::new(server.uri(), RetryPolicy::none()).unwrap();

    let response = client.get(&[]).await.unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_retryable_status_returns_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"message":"city not found"}"#))
        .mount(&server)
        .await;

    let client = RetryingHttpClient::new(server.uri(), fast_policy(2)).unwrap();

    let response = client.get(&[]).await.unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.reason, "Not Found");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn query_parameters_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("zip", "02139,us"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = RetryingHttpClient::new(server.uri(), RetryPolicy::none()).unwrap();

    let response = client
        .get(&[
            ("zip", "02139,us".to_string()),
            ("units", "imperial".to_string()),
        ])
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}
