use serde::{Deserialize, Serialize};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "authToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// One of the two slots the session owns in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSlot {
    Access,
    Refresh,
}

impl TokenSlot {
    pub const ALL: [TokenSlot; 2] = [TokenSlot::Access, TokenSlot::Refresh];

    pub fn key(self) -> &'static str {
        match self {
            TokenSlot::Access => ACCESS_TOKEN_KEY,
            TokenSlot::Refresh => REFRESH_TOKEN_KEY,
        }
    }
}

/// Access/refresh credentials as handed out by the login endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "access")]
    pub access_token: Option<String>,
    #[serde(rename = "refresh")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
        }
    }

    /// A pair without an access token is unauthenticated, whatever the refresh slot holds.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}
