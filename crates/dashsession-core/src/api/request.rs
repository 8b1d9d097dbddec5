use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use crate::error::{SessionError, SessionResult};

/// Description of one outbound authenticated call.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against the configured base URL
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl AuthenticatedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from strings, e.g. as typed on a command line.
    pub fn try_header(self, name: &str, value: &str) -> SessionResult<Self> {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| SessionError::InvalidRequest(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| SessionError::InvalidRequest(format!("{}: {}", name, e)))?;
        Ok(self.header(name, value))
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> SessionResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| SessionError::InvalidRequest(format!("body is not JSON: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Headers to send: the caller's, a JSON content type unless the caller
    /// chose one, and the session's bearer token in the authorization slot.
    pub fn merged_headers(&self, token: &str) -> SessionResult<HeaderMap> {
        let mut headers = self.headers.clone();
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| SessionError::InvalidRequest("access token is not a valid header value".into()))?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }
}
