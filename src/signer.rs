// Request signing.
//
// The service has no authorization header: every API call authenticates
// itself by carrying the session token and its issuance timestamp as
// ordinary parameters. GET calls carry them in the query string, POST calls
// in a form-encoded body, and the login call alone uses multipart.

use crate::error::{CloudError, Result};
use crate::session::Session;
use crate::transport::{Body, Method, WireRequest, WireResponse};
use serde_json::Value;

/// API version sent as `api` with every signed call.
pub const API_VERSION: u32 = 2;

/// Insertion-ordered parameter list. A `None` value keeps the key's slot
/// but is left out of the encoded request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, Option<String>)>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, Some(value.to_string()));
        self
    }

    /// Replace the value of an existing key in place, or append it.
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Lay `self` over `defaults`: default keys keep their position, values
    /// supplied here win.
    pub fn merged_over(self, mut defaults: Params) -> Params {
        for (key, value) in self.0 {
            defaults.set(key, value);
        }
        defaults
    }

    /// Pairs that go on the wire, skipping unset values.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

/// How the parameters of a call are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Query string for GET, form body for everything else.
    Standard,
    /// Name/contents parts; only the login form uses it.
    Multipart,
}

/// Prefix `path` with `api_base` unless it is already an absolute URL.
pub fn format_url(api_base: &str, path: &str) -> String {
    if path.contains("://") {
        path.to_string()
    } else {
        format!("{}{}", api_base, path)
    }
}

/// Builds wire requests from logical API calls using the current session.
pub struct RequestSigner<'a> {
    api_base: &'a str,
    session: &'a Session,
}

impl<'a> RequestSigner<'a> {
    pub fn new(api_base: &'a str, session: &'a Session) -> Self {
        RequestSigner { api_base, session }
    }

    /// The parameter set merged into every signed call.
    pub fn default_params(&self) -> Result<Params> {
        let grant = self.session.grant().ok_or_else(|| {
            CloudError::Authentication("no session token; authenticate first".into())
        })?;
        let mut params = Params::new();
        params.set("home", None);
        params.set("api", Some(API_VERSION.to_string()));
        params.set("email", Some(grant.email.clone()));
        params.set("x-email", Some(grant.email.clone()));
        params.set("token", Some(grant.token.clone()));
        params.set("_", Some(grant.timestamp.to_string()));
        Ok(params)
    }

    pub fn sign(
        &self,
        method: Method,
        path: &str,
        params: Params,
        encoding: Encoding,
        apply_defaults: bool,
    ) -> Result<WireRequest> {
        let payload = if apply_defaults {
            params.merged_over(self.default_params()?)
        } else {
            params
        };

        let mut request = WireRequest::new(method, format_url(self.api_base, path));
        match (encoding, method) {
            (Encoding::Multipart, _) => request.body = Body::Multipart(payload.into_pairs()),
            (Encoding::Standard, Method::Get) => request.query = payload.into_pairs(),
            (Encoding::Standard, _) => request.body = Body::Form(payload.into_pairs()),
        }
        Ok(request)
    }
}

/// Parse a whole response body as one JSON document.
pub fn decode_json(response: &WireResponse) -> Result<Value> {
    serde_json::from_slice(&response.body).map_err(|e| {
        CloudError::Protocol(format!(
            "expected JSON body (status {}): {}",
            response.status, e
        ))
    })
}
