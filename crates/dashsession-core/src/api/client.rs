//! HTTP client for the dashboard's authentication endpoints.
//!
//! `AuthApi` knows the wire formats of login, token validation and token
//! refresh, and sends authenticated calls on behalf of the session manager.
//! It never touches token storage.

use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::request::AuthenticatedRequest;
use super::ApiError;
use crate::auth::TokenPair;
use crate::config::Config;
use crate::error::{SessionError, SessionResult};

/// Outcome of probing the validation endpoint with an access token.
#[derive(Debug)]
pub enum Validation {
    Accepted,
    /// 401: the server does not accept the token
    Rejected,
    /// Any other status; says nothing definite about the token
    Inconclusive(StatusCode),
    /// No response at all
    Unreachable(reqwest::Error),
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: Client,
    config: Config,
}

impl AuthApi {
    pub fn new(config: Config) -> SessionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> SessionResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    pub async fn validate(&self, token: &str) -> Validation {
        let url = self.config.endpoint(&self.config.validate_path);
        let result = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => Validation::Accepted,
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => Validation::Rejected,
            Ok(response) => Validation::Inconclusive(response.status()),
            Err(e) => Validation::Unreachable(e),
        }
    }

    /// Exchange a refresh token for a new access token. Single attempt.
    pub async fn refresh(&self, refresh_token: &str) -> SessionResult<String> {
        let url = self.config.endpoint(&self.config.refresh_path);
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body: RefreshResponse = response.json().await.map_err(|e| {
            debug!(error = %e, "Refresh response body is not the expected JSON");
            SessionError::RefreshMalformed
        })?;

        body.access
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::RefreshMalformed)
    }

    /// Obtain a fresh token pair with email/password credentials.
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<TokenPair> {
        let url = self.config.endpoint(&self.config.login_path);
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let pair: TokenPair = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;

        if pair.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::InvalidResponse("login response missing access token".into()).into());
        }
        Ok(pair)
    }

    /// Send `request` with the session's token attached.
    pub async fn send(&self, request: &AuthenticatedRequest, token: &str) -> SessionResult<Response> {
        let url = self.config.endpoint(&request.url);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.merged_headers(token)?);
        if let Some(ref body) = request.body {
            builder = builder.body(serde_json::to_vec(body).map_err(|e| {
                SessionError::InvalidRequest(format!("body is not JSON: {}", e))
            })?);
        }

        debug!(method = %request.method, url = %url, "Sending authenticated request");
        Ok(builder.send().await?)
    }
}
