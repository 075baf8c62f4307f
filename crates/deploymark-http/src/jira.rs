//! Atlassian client: tenant lookup, OAuth token exchange, deployment bulk submit.

use async_trait::async_trait;
use deploymark_core::{
    ClientCredentials, ConnectError, DeploymentRecord, IssueTracker, Secret, SubmissionResponse,
    TrackerError, TrackerResult,
};
use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::{read_error_body, USER_AGENT};

pub const DEFAULT_ATLASSIAN_API_URL: &str = "https://api.atlassian.com";

/// OAuth audience for Atlassian cloud APIs. Independent of the API root, so
/// it stays fixed when the root is overridden.
const TOKEN_AUDIENCE: &str = "api.atlassian.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantInfo {
    cloud_id: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    audience: &'a str,
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct BulkRequest<'a> {
    deployments: &'a [DeploymentRecord],
}

pub struct JiraClient {
    http: reqwest::Client,
    api_url: String,
}

impl JiraClient {
    pub fn new(api_url: &str) -> Result<Self, ConnectError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConnectError::new("Jira", e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn tenant_info_url(instance_base_url: &str) -> String {
        format!("{}/_edge/tenant_info", instance_base_url.trim_end_matches('/'))
    }

    pub(crate) fn token_url(&self) -> String {
        format!("{}/oauth/token", self.api_url)
    }

    pub(crate) fn bulk_url(&self, cloud_id: &str) -> String {
        format!(
            "{}/jira/deployments/0.1/cloud/{}/bulk",
            self.api_url, cloud_id
        )
    }

    async fn check(response: Response, operation: &'static str) -> TrackerResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(TrackerError::Status {
            operation,
            status: status.as_u16(),
            body: read_error_body(response).await,
        })
    }
}

fn transport(err: reqwest::Error) -> TrackerError {
    TrackerError::Transport(err.to_string())
}

fn decode(err: reqwest::Error) -> TrackerError {
    TrackerError::Decode(err.to_string())
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn cloud_id(&self, instance_base_url: &str) -> TrackerResult<String> {
        let response = self
            .http
            .get(Self::tenant_info_url(instance_base_url))
            .send()
            .await
            .map_err(transport)?;
        let info: TenantInfo = Self::check(response, "tenant info")
            .await?
            .json()
            .await
            .map_err(decode)?;
        Ok(info.cloud_id)
    }

    async fn access_token(&self, credentials: &ClientCredentials) -> TrackerResult<Secret> {
        let response = self
            .http
            .post(self.token_url())
            .json(&TokenRequest {
                audience: TOKEN_AUDIENCE,
                grant_type: "client_credentials",
                client_id: credentials.client_id.expose(),
                client_secret: credentials.client_secret.expose(),
            })
            .send()
            .await
            .map_err(transport)?;
        let token: TokenResponse = Self::check(response, "token exchange")
            .await?
            .json()
            .await
            .map_err(decode)?;
        Ok(Secret::new(token.access_token))
    }

    async fn submit_deployments(
        &self,
        cloud_id: &str,
        token: &Secret,
        deployments: &[DeploymentRecord],
    ) -> TrackerResult<SubmissionResponse> {
        let response = self
            .http
            .post(self.bulk_url(cloud_id))
            .bearer_auth(token.expose())
            .json(&BulkRequest { deployments })
            .send()
            .await
            .map_err(transport)?;
        Self::check(response, "submit deployments")
            .await?
            .json()
            .await
            .map_err(decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = JiraClient::new("https://api.atlassian.com/").unwrap();
        assert_eq!(client.token_url(), "https://api.atlassian.com/oauth/token");
        assert_eq!(
            client.bulk_url("cloud-1"),
            "https://api.atlassian.com/jira/deployments/0.1/cloud/cloud-1/bulk"
        );
        assert_eq!(
            JiraClient::tenant_info_url("https://acme.atlassian.net/"),
            "https://acme.atlassian.net/_edge/tenant_info"
        );
    }

    #[test]
    fn test_token_request_shape() {
        let json = serde_json::to_value(TokenRequest {
            audience: TOKEN_AUDIENCE,
            grant_type: "client_credentials",
            client_id: "id",
            client_secret: "secret",
        })
        .unwrap();
        assert_eq!(json["audience"], "api.atlassian.com");
        assert_eq!(json["grant_type"], "client_credentials");
        assert_eq!(json["client_id"], "id");
    }

    #[test]
    fn test_tenant_info_decodes() {
        let info: TenantInfo = serde_json::from_str(r#"{"cloudId": "abc-123"}"#).unwrap();
        assert_eq!(info.cloud_id, "abc-123");
    }
}
