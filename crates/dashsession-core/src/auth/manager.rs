//! Token lifecycle: lazy validation, refresh, logout, and the authenticated
//! call entry point the rest of the client uses instead of raw requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::events::{EventBus, SessionEvent};
use super::store::SessionStore;
use super::tokens::{TokenPair, TokenSlot};
use crate::api::{AuthApi, AuthenticatedRequest, Validation};
use crate::error::{SessionError, SessionResult};

/// Coarse session state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No access token stored. Also the state after a logout.
    Unauthenticated,
    /// Access token stored; the server may still reject it.
    Authenticated,
    Refreshing,
}

/// Result of making sure a usable token exists.
#[derive(Debug)]
enum TokenStatus {
    Valid(String),
    /// No token; nothing has been broadcast yet
    Missing,
    /// Refresh failed and logout was already broadcast
    LoggedOut,
}

impl TokenStatus {
    fn into_token(self) -> Option<String> {
        match self {
            TokenStatus::Valid(token) => Some(token),
            TokenStatus::Missing | TokenStatus::LoggedOut => None,
        }
    }
}

/// Counts one refresh in flight for as long as it lives.
struct RefreshInFlight<'a>(&'a AtomicUsize);

impl<'a> RefreshInFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RefreshInFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SessionManager {
    api: AuthApi,
    store: Arc<dyn SessionStore>,
    events: Arc<EventBus>,
    /// Present when refreshes are serialised within the process
    refresh_gate: Option<Mutex<()>>,
    /// Refreshes currently running; several when single-flight is off
    refreshes_in_flight: AtomicUsize,
}

impl SessionManager {
    pub fn new(api: AuthApi, store: Arc<dyn SessionStore>, events: Arc<EventBus>) -> Self {
        let refresh_gate = api.config().single_flight_refresh.then(|| Mutex::new(()));
        Self {
            api,
            store,
            events,
            refresh_gate,
            refreshes_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// True iff an access token is stored. Does not ask the server.
    pub fn is_authenticated(&self) -> bool {
        self.store.get(TokenSlot::Access).is_some()
    }

    pub fn current_state(&self) -> SessionState {
        if self.refreshes_in_flight.load(Ordering::SeqCst) > 0 {
            SessionState::Refreshing
        } else if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn tokens(&self) -> TokenPair {
        self.store.pair()
    }

    /// Remove both tokens. Idempotent and silent: no event is broadcast.
    pub fn clear_tokens(&self) -> SessionResult<()> {
        self.store.clear()?;
        Ok(())
    }

    /// Start a session from a pair obtained by a login flow.
    pub fn sign_in(&self, pair: &TokenPair) -> SessionResult<()> {
        let Some(access) = pair.access_token.as_deref() else {
            return Err(SessionError::NoToken);
        };
        self.store.set(TokenSlot::Access, access)?;
        match pair.refresh_token.as_deref() {
            Some(refresh) => self.store.set(TokenSlot::Refresh, refresh)?,
            None => self.store.remove(TokenSlot::Refresh)?,
        }
        info!(has_refresh = pair.refresh_token.is_some(), "Session started");
        Ok(())
    }

    /// Log in with credentials and store the returned pair.
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<()> {
        let pair = self.api.login(email, password).await?;
        self.sign_in(&pair)
    }

    /// End the session on the user's request and tell listeners.
    pub fn sign_out(&self) -> SessionResult<()> {
        self.end_session()
    }

    fn end_session(&self) -> SessionResult<()> {
        let cleared = self.clear_tokens();
        self.events.emit(&SessionEvent::Logout);
        cleared
    }

    /// Return a token the server should accept, refreshing if it was rejected.
    ///
    /// If the validation endpoint cannot be reached the stored token is
    /// returned unchanged; connectivity problems never end a session.
    pub async fn ensure_valid_token(&self) -> SessionResult<Option<String>> {
        Ok(self.check_token().await?.into_token())
    }

    /// Trade the stored refresh token for a new access token.
    ///
    /// Any failure clears the session and broadcasts a logout. A missing
    /// refresh token clears the session without broadcasting.
    pub async fn refresh_access_token(&self) -> SessionResult<Option<String>> {
        let _gate = match self.refresh_gate {
            Some(ref gate) => Some(gate.lock().await),
            None => None,
        };
        Ok(self.refresh_with_stored_token().await?.into_token())
    }

    async fn check_token(&self) -> SessionResult<TokenStatus> {
        let Some(token) = self.store.get(TokenSlot::Access) else {
            debug!("No access token stored");
            return Ok(TokenStatus::Missing);
        };

        match self.api.validate(&token).await {
            Validation::Accepted => Ok(TokenStatus::Valid(token)),
            Validation::Rejected => {
                debug!("Access token rejected");
                self.recover_rejected(&token).await
            }
            Validation::Inconclusive(status) => {
                warn!(status = %status, "Token validation inconclusive, keeping token");
                Ok(TokenStatus::Valid(token))
            }
            Validation::Unreachable(e) => {
                warn!(error = %e, "Validation endpoint unreachable, keeping token");
                Ok(TokenStatus::Valid(token))
            }
        }
    }

    async fn recover_rejected(&self, rejected: &str) -> SessionResult<TokenStatus> {
        let _gate = match self.refresh_gate {
            Some(ref gate) => {
                let guard = gate.lock().await;
                // Someone else may have settled this while we waited
                match self.store.get(TokenSlot::Access) {
                    Some(current) if current != rejected => {
                        debug!("Using token refreshed by a concurrent caller");
                        return Ok(TokenStatus::Valid(current));
                    }
                    None => return Ok(TokenStatus::Missing),
                    Some(_) => {}
                }
                Some(guard)
            }
            None => None,
        };
        self.refresh_with_stored_token().await
    }

    async fn refresh_with_stored_token(&self) -> SessionResult<TokenStatus> {
        let Some(refresh_token) = self.store.get(TokenSlot::Refresh) else {
            info!("No refresh token available, clearing session");
            self.clear_tokens()?;
            return Ok(TokenStatus::Missing);
        };

        let _in_flight = RefreshInFlight::enter(&self.refreshes_in_flight);
        match self.api.refresh(&refresh_token).await {
            Ok(access) => {
                self.store.set(TokenSlot::Access, &access)?;
                info!("Access token refreshed");
                self.events.emit(&SessionEvent::TokenRefreshed {
                    token: access.clone(),
                });
                Ok(TokenStatus::Valid(access))
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.end_session()?;
                Ok(TokenStatus::LoggedOut)
            }
        }
    }

    /// Send `request` with the session's bearer token.
    ///
    /// Fails with [`SessionError::NoToken`] without contacting the target
    /// when no usable token exists, and with [`SessionError::AuthExpired`]
    /// when the target answers 401. Each failure broadcasts one logout.
    /// Every other response is returned as received.
    pub async fn authenticated_call(&self, request: AuthenticatedRequest) -> SessionResult<Response> {
        let token = match self.check_token().await? {
            TokenStatus::Valid(token) => token,
            TokenStatus::Missing => {
                self.events.emit(&SessionEvent::Logout);
                return Err(SessionError::NoToken);
            }
            TokenStatus::LoggedOut => return Err(SessionError::NoToken),
        };

        let response = self.api.send(&request, &token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(method = %request.method, url = %request.url, "Request rejected with 401, ending session");
            self.end_session()?;
            return Err(SessionError::AuthExpired);
        }
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> SessionResult<Response> {
        self.authenticated_call(AuthenticatedRequest::get(url)).await
    }

    pub async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> SessionResult<Response> {
        self.authenticated_call(AuthenticatedRequest::post(url).json(body)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;
    use crate::config::Config;

    fn manager(store: MemoryStore) -> SessionManager {
        // Unroutable port; these tests never reach the network
        let api = AuthApi::new(Config::with_base_url("http://127.0.0.1:9")).unwrap();
        SessionManager::new(api, Arc::new(store), Arc::new(EventBus::new()))
    }

    #[test]
    fn test_is_authenticated_tracks_access_slot() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("A1", None)));
        assert!(mgr.is_authenticated());
        assert_eq!(mgr.current_state(), SessionState::Authenticated);

        mgr.clear_tokens().unwrap();
        assert!(!mgr.is_authenticated());
        assert_eq!(mgr.current_state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_refresh_token_alone_is_not_authenticated() {
        let mgr = manager(MemoryStore::with_pair(TokenPair {
            access_token: None,
            refresh_token: Some("R1".to_string()),
        }));
        assert!(!mgr.is_authenticated());
    }

    #[test]
    fn test_clear_tokens_twice() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("A1", Some("R1".into()))));
        mgr.clear_tokens().unwrap();
        assert_eq!(mgr.tokens(), TokenPair::default());
        mgr.clear_tokens().unwrap();
        assert_eq!(mgr.tokens(), TokenPair::default());
    }

    #[test]
    fn test_clear_tokens_is_silent() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("A1", None)));
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let sink = count.clone();
        mgr.events().subscribe(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        mgr.clear_tokens().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sign_in_replaces_stale_refresh_token() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("OLD", Some("R0".into()))));
        mgr.sign_in(&TokenPair::new("A1", None)).unwrap();
        assert_eq!(mgr.tokens(), TokenPair::new("A1", None));

        let err = mgr.sign_in(&TokenPair::default()).unwrap_err();
        assert!(matches!(err, SessionError::NoToken));
    }

    #[test]
    fn test_sign_out_broadcasts_logout() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("A1", Some("R1".into()))));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        mgr.events().subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        mgr.sign_out().unwrap();
        assert!(!mgr.is_authenticated());
        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Logout]);
    }

    #[test]
    fn test_refreshing_until_last_refresh_ends() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("A1", Some("R1".into()))));
        let first = RefreshInFlight::enter(&mgr.refreshes_in_flight);
        let second = RefreshInFlight::enter(&mgr.refreshes_in_flight);
        assert_eq!(mgr.current_state(), SessionState::Refreshing);

        drop(first);
        assert_eq!(mgr.current_state(), SessionState::Refreshing);

        drop(second);
        assert_eq!(mgr.current_state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_no_token_short_circuits() {
        let mgr = manager(MemoryStore::new());
        assert_eq!(mgr.ensure_valid_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_clears_silently() {
        let mgr = manager(MemoryStore::with_pair(TokenPair::new("A1", None)));
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let sink = count.clone();
        mgr.events().subscribe(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(mgr.refresh_access_token().await.unwrap(), None);
        assert!(!mgr.is_authenticated());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
