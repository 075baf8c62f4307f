//! HTTP client tests against a wiremock server.

use std::collections::HashMap;

use deploymark_core::{
    run_deployment, ClientCredentials, DeploymentRecord, IssueTracker, RefUpdate, Repository,
    RunContext, RunError, RunOutcome, Secret, Settings, SourceError, SourceHost, TrackerError,
};
use deploymark_http::{GitHubClient, HttpConnector, JiraClient};
use serde_json::{json, Value};
use wiremock::matchers::{
    body_json, body_partial_json, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const COMPARE: &str = "/repos/acme/shop/compare/production-deployment...main";
const TAG_REF: &str = "/repos/acme/shop/git/refs/tags/production-deployment";

fn github(server: &MockServer) -> GitHubClient {
    GitHubClient::new(
        &server.uri(),
        Repository::new("acme", "shop"),
        &Secret::new("ghs_token"),
    )
    .expect("github client")
}

fn compare_page(total: usize, range: std::ops::Range<usize>) -> Value {
    let commits: Vec<Value> = range
        .map(|i| {
            json!({
                "sha": format!("sha{i}"),
                "commit": { "message": format!("ABC-{i} change") }
            })
        })
        .collect();
    json!({ "total_commits": total, "commits": commits })
}

fn settings(server: &MockServer) -> Settings {
    Settings::new(
        &server.uri(),
        "Production",
        Some("production"),
        Some("main"),
        RunContext {
            repository: Repository::new("acme", "shop"),
            server_url: "https://github.com".to_string(),
            run_id: 31337,
            run_number: 9,
            workflow: "Deploy".to_string(),
        },
    )
    .expect("settings")
}

fn env() -> HashMap<String, String> {
    [
        ("GITHUB_TOKEN", "ghs_token"),
        ("JIRA_CLIENT_ID", "client-id"),
        ("JIRA_CLIENT_SECRET", "client-secret"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn connector(server: &MockServer) -> HttpConnector {
    HttpConnector::new(Repository::new("acme", "shop"))
        .with_github_api_url(&server.uri())
        .with_atlassian_api_url(&server.uri())
}

async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

#[tokio::test]
async fn compare_follows_pages_and_sends_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(COMPARE))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer ghs_token"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header_regex("user-agent", "^deploymark/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(compare_page(101, 0..100)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COMPARE))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(compare_page(101, 100..101)))
        .expect(1)
        .mount(&server)
        .await;

    let commits = github(&server)
        .compare_commits("production-deployment", "main")
        .await
        .expect("compare");

    assert_eq!(commits.len(), 101);
    assert_eq!(commits[100].message, "ABC-100 change");
}

#[tokio::test]
async fn compare_missing_tag_is_ref_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(COMPARE))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let err = github(&server)
        .compare_commits("production-deployment", "main")
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::RefNotFound { .. }));
}

#[tokio::test]
async fn compare_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(COMPARE))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"message": "Bad gateway"})))
        .mount(&server)
        .await;

    let err = github(&server)
        .compare_commits("production-deployment", "main")
        .await
        .unwrap_err();

    match err {
        SourceError::Status { status, body, .. } => {
            assert_eq!(status, 502);
            assert!(body.contains("Bad gateway"));
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn tag_ref_is_created_when_missing() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(TAG_REF))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "Reference does not exist"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/shop/git/refs"))
        .and(body_json(json!({
            "ref": "refs/tags/production-deployment",
            "sha": "tagobj1"
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"ref": "refs/tags/production-deployment"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let update = github(&server)
        .point_tag_ref("production-deployment", "tagobj1")
        .await
        .expect("point tag");

    assert_eq!(update, RefUpdate::Created);
}

#[tokio::test]
async fn tag_ref_is_force_moved_when_present() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(TAG_REF))
        .and(body_json(json!({"sha": "tagobj2", "force": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ref": "refs/tags/production-deployment"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let update = github(&server)
        .point_tag_ref("production-deployment", "tagobj2")
        .await
        .expect("point tag");

    assert_eq!(update, RefUpdate::Moved);
    assert_eq!(received_paths(&server).await.len(), 1);
}

#[tokio::test]
async fn tag_object_is_annotated_commit_tag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/shop/commits/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sha": "c0ffee"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/shop/git/tags"))
        .and(body_json(json!({
            "tag": "production-deployment",
            "message": "Deployment to Production",
            "object": "c0ffee",
            "type": "commit"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sha": "7a9"})))
        .expect(1)
        .mount(&server)
        .await;
    let client = github(&server);

    let sha = client.commit_sha("main").await.expect("commit sha");
    let tag_sha = client
        .create_tag_object("production-deployment", "Deployment to Production", &sha)
        .await
        .expect("tag object");

    assert_eq!(sha, "c0ffee");
    assert_eq!(tag_sha, "7a9");
}

#[tokio::test]
async fn tag_object_without_write_access_is_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/shop/git/tags"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let err = github(&server)
        .create_tag_object("production-deployment", "Deployment to Production", "c0ffee")
        .await
        .unwrap_err();

    assert!(
        matches!(err, SourceError::Status { status: 404, operation: "create tag object", .. }),
        "{err:?}"
    );
}

// ---------------------------------------------------------------------------
// Jira
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jira_calls_carry_credentials_and_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/_edge/tenant_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cloudId": "cloud-9"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({
            "audience": "api.atlassian.com",
            "grant_type": "client_credentials",
            "client_id": "client-id",
            "client_secret": "client-secret"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jira/deployments/0.1/cloud/cloud-9/bulk"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "acceptedDeployments": [],
            "rejectedDeployments": [{"errors": [{"message": "nope"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = JiraClient::new(&server.uri()).expect("jira client");
    let credentials = ClientCredentials {
        client_id: Secret::new("client-id"),
        client_secret: Secret::new("client-secret"),
    };

    let cloud_id = client.cloud_id(&server.uri()).await.expect("cloud id");
    let token = client.access_token(&credentials).await.expect("token");
    let record = DeploymentRecord::build(
        &settings(&server),
        deploymark_core::extract_issue_keys(["ABC-1"]),
        chrono::Utc::now(),
    );
    let response = client
        .submit_deployments(&cloud_id, &token, std::slice::from_ref(&record))
        .await
        .expect("submit");

    assert_eq!(cloud_id, "cloud-9");
    assert_eq!(token.expose(), "tok-1");
    assert_eq!(response.rejected_deployments[0].errors[0].message, "nope");

    let requests = server.received_requests().await.expect("recording enabled");
    let bulk = requests
        .iter()
        .find(|r| r.url.path().ends_with("/bulk"))
        .expect("bulk request");
    let body: Value = bulk.body_json().expect("json body");
    assert_eq!(body["deployments"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["deployments"][0]["issueKeys"][0], "ABC-1");
    assert_eq!(body["deployments"][0]["deploymentSequenceNumber"], 31337);
}

#[tokio::test]
async fn jira_token_rejection_is_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "access_denied"})))
        .mount(&server)
        .await;

    let client = JiraClient::new(&server.uri()).expect("jira client");
    let credentials = ClientCredentials {
        client_id: Secret::new("id"),
        client_secret: Secret::new("wrong"),
    };

    let err = client.access_token(&credentials).await.unwrap_err();

    assert!(matches!(err, TrackerError::Status { status: 401, .. }));
    assert!(!err.is_rejection());
}

// ---------------------------------------------------------------------------
// Whole run over HTTP
// ---------------------------------------------------------------------------

async fn mount_deployment(server: &MockServer, bulk_response: Value) {
    Mock::given(method("GET"))
        .and(path(COMPARE))
        .respond_with(ResponseTemplate::new(200).set_body_json(compare_page(2, 0..2)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_edge/tenant_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cloudId": "cloud-9"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jira/deployments/0.1/cloud/cloud-9/bulk"))
        .respond_with(ResponseTemplate::new(202).set_body_json(bulk_response))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/shop/commits/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sha": "headsha"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/shop/git/tags"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sha": "tagsha"})))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(TAG_REF))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_over_http() {
    let server = MockServer::start().await;
    mount_deployment(&server, json!({"acceptedDeployments": [{}]})).await;

    let outcome = run_deployment(&settings(&server), &env(), &connector(&server))
        .await
        .expect("run");

    match outcome {
        RunOutcome::Reported(report) => {
            assert_eq!(report.issue_keys.to_strings(), vec!["ABC-0", "ABC-1"]);
            assert_eq!(report.placement.commit_sha, "headsha");
            assert_eq!(report.placement.ref_update, RefUpdate::Moved);
        }
        other => panic!("expected Reported, got {other:?}"),
    }
    let calls = received_paths(&server).await;
    assert_eq!(calls.len(), 7, "{calls:#?}");
    assert!(calls[6].starts_with("PATCH "));
}

#[tokio::test]
async fn rejected_run_over_http_never_tags() {
    let server = MockServer::start().await;
    mount_deployment(
        &server,
        json!({"rejectedDeployments": [{"errors": [{"message": "a"}, {"message": "b"}]}]}),
    )
    .await;

    let err = run_deployment(&settings(&server), &env(), &connector(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Report(TrackerError::Rejected(ref m)) if m == "a, b"));
    assert!(!received_paths(&server)
        .await
        .iter()
        .any(|p| p.contains("/git/")));
}
