//! Resolution of the caller's identity against the platform session endpoint.
//!
//! Resolution fails open: anything other than a well-formed principal with the
//! `authenticated` role yields [`Session::Anonymous`].

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Role the identity provider grants to every signed-in principal.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub user_details: String,
    #[serde(default)]
    pub identity_provider: String,
    #[serde(default)]
    pub user_roles: Vec<String>,
}

impl Identity {
    /// Name shown as the record author; falls back to the id.
    pub fn display_name(&self) -> &str {
        if self.user_details.is_empty() {
            &self.user_id
        } else {
            &self.user_details
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "identity", rename_all = "lowercase")]
pub enum Session {
    Anonymous,
    Authenticated(Identity),
}

impl Session {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Authenticated(identity) => Some(identity),
            Session::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }

    /// Classify a principal: it must carry a user id and the authenticated role.
    pub fn from_principal(principal: Option<Identity>) -> Self {
        match principal {
            Some(identity)
                if !identity.user_id.is_empty()
                    && identity.user_roles.iter().any(|r| r == AUTHENTICATED_ROLE) =>
            {
                Session::Authenticated(identity)
            }
            _ => Session::Anonymous,
        }
    }
}

#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve the session for a request carrying the given `Cookie` header.
    async fn resolve(&self, cookie: Option<&str>) -> Session;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    #[serde(default)]
    client_principal: Option<Identity>,
}

/// Asks the session endpoint (e.g. `/.auth/me`) who the caller is,
/// forwarding the caller's cookies.
pub struct HttpSessionResolver {
    client: Client,
    url: String,
}

impl HttpSessionResolver {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SessionResolver for HttpSessionResolver {
    async fn resolve(&self, cookie: Option<&str>) -> Session {
        let mut request = self.client.get(&self.url);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "Session endpoint unreachable");
                return Session::Anonymous;
            }
        };

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "Session endpoint rejected request");
            return Session::Anonymous;
        }

        match resp.json::<SessionBody>().await {
            Ok(body) => Session::from_principal(body.client_principal),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed session response");
                Session::Anonymous
            }
        }
    }
}

/// Always returns the same session. Used for local development and tests.
pub struct StaticSessionResolver {
    session: Session,
}

impl StaticSessionResolver {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn anonymous() -> Self {
        Self::new(Session::Anonymous)
    }

    pub fn user(user_id: &str, user_details: &str) -> Self {
        Self::new(Session::Authenticated(Identity {
            user_id: user_id.to_string(),
            user_details: user_details.to_string(),
            identity_provider: "dev".to_string(),
            user_roles: vec!["anonymous".to_string(), AUTHENTICATED_ROLE.to_string()],
        }))
    }
}

#[async_trait]
impl SessionResolver for StaticSessionResolver {
    async fn resolve(&self, _cookie: Option<&str>) -> Session {
        self.session.clone()
    }
}
