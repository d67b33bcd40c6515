use std::{env, time::Duration};

use log::error;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request to the identity service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

/// User record as the identity service reports it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Session issued on a successful password login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    #[serde(alias = "error_description", alias = "message")]
    msg: Option<String>,
}

/// Client for the external identity service all signup/login/session checks
/// are delegated to. Validated tokens are memoized briefly so page loads do
/// not hammer the provider.
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    token_cache: Cache<String, AuthUser>,
}

impl AuthClient {
    pub fn new() -> Self {
        let base_url = env::var("AUTH_BASE_URL").expect("AUTH_BASE_URL must be set");
        let api_key = env::var("AUTH_API_KEY").expect("AUTH_API_KEY must be set");

        Self::with_base(&base_url, &api_key)
    }

    pub fn with_base(base_url: &str, api_key: &str) -> Self {
        let token_cache = Cache::builder()
            .max_capacity(2048)
            .time_to_live(Duration::from_secs(60))
            .build();

        AuthClient {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            token_cache,
        }
    }

    /// Register a new user. The provider sends the verification mail.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let res = self
            .client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AuthError::Rejected(Self::rejection_message(res).await));
        }

        Ok(res.json().await?)
    }

    /// Exchange email + password for an access/refresh token pair.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let res = self
            .client
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AuthError::Rejected(Self::rejection_message(res).await));
        }

        Ok(res.json().await?)
    }

    /// Resolve an access token to its user, through the memo cache.
    pub async fn get_user(&self, access_token: &str) -> Option<AuthUser> {
        self.token_cache
            .optionally_get_with(access_token.to_string(), self.fetch_user(access_token))
            .await
    }

    async fn fetch_user(&self, access_token: &str) -> Option<AuthUser> {
        let res = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await;

        let res = match res {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to reach identity service: {}", e);
                return None;
            }
        };

        if !res.status().is_success() {
            return None;
        }

        match res.json::<AuthUser>().await {
            Ok(user) => Some(user),
            Err(e) => {
                error!("Failed to parse identity service response: {}", e);
                None
            }
        }
    }

    async fn rejection_message(res: reqwest::Response) -> String {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();

        serde_json::from_str::<AuthErrorBody>(&body)
            .ok()
            .and_then(|b| b.msg)
            .unwrap_or_else(|| format!("Identity service answered with status {}", status))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const USER_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    #[rocket::async_test]
    async fn sign_in_returns_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password")
                    .header("apikey", "service-key");
                then.status(200).json_body(json!({
                    "access_token": "token-1",
                    "refresh_token": "refresh-1",
                    "user": { "id": USER_ID, "email": "simo@example.com" }
                }));
            })
            .await;

        let client = AuthClient::with_base(&server.base_url(), "service-key");
        let session = client.sign_in("simo@example.com", "12345678").await.unwrap();

        assert_eq!(session.access_token, "token-1");
        assert_eq!(session.user.email, "simo@example.com");
        assert_eq!(session.user.id.to_string(), USER_ID);
    }

    #[rocket::async_test]
    async fn sign_in_surfaces_provider_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400)
                    .json_body(json!({ "msg": "Invalid login credentials" }));
            })
            .await;

        let client = AuthClient::with_base(&server.base_url(), "service-key");
        let err = client.sign_in("simo@example.com", "wrong").await.unwrap_err();

        match err {
            AuthError::Rejected(msg) => assert_eq!(msg, "Invalid login credentials"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[rocket::async_test]
    async fn token_lookup_is_memoized() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/auth/v1/user")
                    .header("authorization", "Bearer token-1");
                then.status(200)
                    .json_body(json!({ "id": USER_ID, "email": "simo@example.com" }));
            })
            .await;

        let client = AuthClient::with_base(&server.base_url(), "service-key");
        let first = client.get_user("token-1").await.unwrap();
        let second = client.get_user("token-1").await.unwrap();

        assert_eq!(first.id, second.id);
        mock.assert_hits_async(1).await;
    }

    #[rocket::async_test]
    async fn unknown_token_resolves_to_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/auth/v1/user");
                then.status(401).json_body(json!({ "msg": "invalid JWT" }));
            })
            .await;

        let client = AuthClient::with_base(&server.base_url(), "service-key");
        assert!(client.get_user("bogus").await.is_none());
    }
}
