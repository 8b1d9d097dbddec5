//! Handlers for each subcommand.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use dashsession_core::{AuthenticatedRequest, SessionError, SessionManager, SessionState};
use reqwest::Method;
use tracing::debug;

use crate::cli::parse_header;

/// Printed after any error that ended (or never had) a session
pub const LOGIN_HINT: &str = "Run `dashsession login` to sign in again";

/// True when `err` means the user has to log in again.
pub fn needs_login(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SessionError>()
        .is_some_and(SessionError::is_auth_failure)
}

pub async fn login(manager: &SessionManager, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    manager.login(&email, &password).await?;
    println!("Logged in as {}", email);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn status_line(state: SessionState, has_refresh: bool) -> String {
    match state {
        SessionState::Authenticated => {
            let refresh = if has_refresh { "available" } else { "none" };
            format!("Authenticated (refresh token: {})", refresh)
        }
        SessionState::Refreshing => "Refreshing".to_string(),
        SessionState::Unauthenticated => "Not logged in".to_string(),
    }
}

pub fn status(manager: &SessionManager) {
    let has_refresh = manager.tokens().refresh_token.is_some();
    println!("{}", status_line(manager.current_state(), has_refresh));
}

pub async fn check(manager: &SessionManager) -> Result<()> {
    if manager.ensure_valid_token().await?.is_none() {
        return Err(SessionError::NoToken.into());
    }
    println!("Session is valid");
    Ok(())
}

pub async fn refresh(manager: &SessionManager) -> Result<()> {
    if manager.refresh_access_token().await?.is_none() {
        return Err(SessionError::NoToken.into());
    }
    println!("Access token refreshed");
    Ok(())
}

pub fn logout(manager: &SessionManager) -> Result<()> {
    manager.sign_out()?;
    println!("Logged out");
    Ok(())
}

fn build_request(
    method: &str,
    path: &str,
    data: Option<&str>,
    headers: &[String],
) -> Result<AuthenticatedRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))?;

    let mut request = AuthenticatedRequest::new(method, path);
    for raw in headers {
        let Some((name, value)) = parse_header(raw) else {
            bail!("Header must look like `Name: Value`, got {:?}", raw);
        };
        request = request.try_header(name, value)?;
    }
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("Request body is not valid JSON")?;
        request = request.json(&body)?;
    }
    Ok(request)
}

pub async fn call(
    manager: &SessionManager,
    method: &str,
    path: &str,
    data: Option<&str>,
    headers: &[String],
) -> Result<()> {
    let request = build_request(method, path, data, headers)?;
    let response = manager.authenticated_call(request).await?;
    let status = response.status();
    let body = response.text().await.context("Failed to read response body")?;
    debug!(status = %status, bytes = body.len(), "Response received");

    eprintln!("HTTP {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use dashsession_core::{AuthApi, Config, EventBus, MemoryStore, SessionEvent, TokenPair};

    fn manager(pair: TokenPair) -> (SessionManager, Arc<Mutex<Vec<SessionEvent>>>) {
        // Unroutable port; these tests never reach the network
        let api = AuthApi::new(Config::with_base_url("http://127.0.0.1:9")).unwrap();
        let manager = SessionManager::new(
            api,
            Arc::new(MemoryStore::with_pair(pair)),
            Arc::new(EventBus::new()),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager
            .events()
            .subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        (manager, seen)
    }

    #[test]
    fn test_status_line() {
        assert_eq!(
            status_line(SessionState::Authenticated, true),
            "Authenticated (refresh token: available)"
        );
        assert_eq!(
            status_line(SessionState::Authenticated, false),
            "Authenticated (refresh token: none)"
        );
        assert_eq!(status_line(SessionState::Refreshing, true), "Refreshing");
        assert_eq!(status_line(SessionState::Unauthenticated, false), "Not logged in");
    }

    #[test]
    fn test_build_request() {
        let request = build_request(
            "post",
            "/api/orders/",
            Some(r#"{"id":1}"#),
            &["X-Source: cli".to_string()],
        )
        .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "/api/orders/");
        assert_eq!(request.headers["x-source"], "cli");
        assert_eq!(request.body, Some(serde_json::json!({"id": 1})));
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        assert!(build_request("GET", "/x", None, &["no-colon".to_string()]).is_err());
        assert!(build_request("GET", "/x", Some("{not json"), &[]).is_err());
        assert!(build_request("GE T", "/x", None, &[]).is_err());
    }

    #[tokio::test]
    async fn test_check_without_session_needs_login() {
        let (manager, seen) = manager(TokenPair::default());
        let err = check(&manager).await.unwrap_err();

        assert!(needs_login(&err));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_logout_clears_and_broadcasts() {
        let (manager, seen) = manager(TokenPair::new("A1", Some("R1".to_string())));
        logout(&manager).unwrap();

        assert!(!manager.is_authenticated());
        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Logout]);
    }

    #[test]
    fn test_needs_login_classification() {
        assert!(needs_login(&SessionError::AuthExpired.into()));
        assert!(!needs_login(&SessionError::InvalidRequest("x".into()).into()));
        assert!(!needs_login(&anyhow::anyhow!("other")));
    }
}
