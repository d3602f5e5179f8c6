// Session lifecycle: login handshake and CSRF token issuance.
//
// A session becomes usable in three steps: a multipart login POST sets the
// auth cookies, a plain GET of the storage landing page finishes cookie
// setup, and the token endpoint hands out the token that signs every later
// call. The token, its timestamp and the canonical account email come from
// one response and are always stored together as a [`TokenGrant`].

use crate::config::{Credentials, Endpoints};
use crate::error::{CloudError, Result};
use crate::signer::{Encoding, Params, RequestSigner};
use crate::transport::{Method, Transport, WireRequest};
use log::{debug, info};
use serde::Deserialize;

/// Token material issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    /// Issuance time reported by the server; sent back as `_`.
    pub timestamp: u64,
    /// Canonical account email; may differ in case or domain from the login.
    pub email: String,
}

/// Authentication state shared by every signed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    authenticated: bool,
    grant: Option<TokenGrant>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    pub fn grant(&self) -> Option<&TokenGrant> {
        self.grant.as_ref()
    }

    /// Replace token, timestamp and email in one step.
    pub fn apply_grant(&mut self, grant: TokenGrant) {
        self.grant = Some(grant);
    }

    pub fn token(&self) -> Option<&str> {
        self.grant.as_ref().map(|g| g.token.as_str())
    }

    pub fn token_timestamp(&self) -> Option<u64> {
        self.grant.as_ref().map(|g| g.timestamp)
    }

    pub fn account_email(&self) -> Option<&str> {
        self.grant.as_ref().map(|g| g.email.as_str())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    email: String,
    time: u64,
    body: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

/// Run the full login handshake. Fails unless a token was obtained.
pub fn authenticate<T: Transport>(
    transport: &T,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<Session> {
    let mut session = login(transport, endpoints, credentials)?;
    let grant = fetch_token(transport, endpoints, &credentials.login).map_err(|err| match err {
        CloudError::Transport(_) | CloudError::Authentication(_) => err,
        other => CloudError::Authentication(other.to_string()),
    })?;
    info!("authenticated as {}", grant.email);
    session.apply_grant(grant);
    Ok(session)
}

/// Post the login form and load the landing page. The returned session is
/// authenticated but holds no token; the cookies stay in `transport`, so a
/// failed [`fetch_token`] can be retried without logging in again.
pub fn login<T: Transport>(
    transport: &T,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<Session> {
    let mut session = Session::default();

    // No token exists yet, so the login call goes out unsigned.
    let login = RequestSigner::new(&endpoints.api_base, &session).sign(
        Method::Post,
        &endpoints.auth_url,
        Params::new()
            .with("Login", &credentials.login)
            .with("Password", &credentials.password)
            .with("Domain", &credentials.domain),
        Encoding::Multipart,
        false,
    )?;
    debug!("POST {} (login {})", login.url, credentials.login);
    let response = transport.send(login)?;
    if !response.is_success() {
        return Err(CloudError::Authentication(format!(
            "login rejected with status {}",
            response.status
        )));
    }
    session.mark_authenticated();

    debug!("GET {}", endpoints.landing_url);
    let landing = transport.send(WireRequest::new(Method::Get, endpoints.landing_url.clone()))?;
    if !landing.is_success() {
        return Err(CloudError::Authentication(format!(
            "storage landing page answered status {}",
            landing.status
        )));
    }
    Ok(session)
}

/// Ask for a fresh token using the cookies already held by `transport`.
/// Needs no password, so it can be repeated when a token goes stale.
pub fn fetch_token<T: Transport>(
    transport: &T,
    endpoints: &Endpoints,
    login: &str,
) -> Result<TokenGrant> {
    let mut request = WireRequest::new(Method::Get, endpoints.token_url.clone());
    request.query = Params::new()
        .with("api", "v2")
        .with("email", login)
        .with("x-email", login)
        .into_pairs();

    debug!("GET {}", request.url);
    let response = transport.send(request)?;
    if !response.is_success() {
        return Err(CloudError::Authentication(format!(
            "token endpoint answered status {}",
            response.status
        )));
    }

    let parsed: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|e| CloudError::Protocol(format!("malformed token response: {}", e)))?;
    if parsed.body.token.is_empty() {
        return Err(CloudError::Protocol("token response carries an empty token".into()));
    }

    Ok(TokenGrant {
        token: parsed.body.token,
        timestamp: parsed.time,
        email: parsed.email,
    })
}
