// Configuration: account credentials and the set of hosts the client talks
// to. Hosts default to the service's fixed endpoints; the upload and
// download shards can be overridden from the environment.

use crate::error::{CloudError, Result};

pub const API_BASE: &str = "https://cloud.mail.ru/api/v2";
pub const AUTH_URL: &str = "https://auth.mail.ru/cgi-bin/auth";
pub const LANDING_URL: &str = "https://cloud.mail.ru";
pub const TOKEN_URL: &str = "https://cloud.mail.ru/api/v2/tokens/csrf";
pub const UPLOAD_URL: &str = "https://cld-upload9.cloud.mail.ru/upload-web/";
pub const DOWNLOAD_BASE: &str = "https://cloclo17.datacloudmail.ru/";

pub const DEFAULT_DOMAIN: &str = "mail.ru";

/// Login material supplied once when the client is built.
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub domain: String,
}

impl Credentials {
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Credentials {
            login: login.into(),
            password: password.into(),
            domain: domain.into(),
        }
    }
}

// Keep the password out of debug logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Hosts and entry points of the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub auth_url: String,
    pub landing_url: String,
    pub token_url: String,
    pub upload_url: String,
    /// Must end with `/`: `get{path}` and `weblink/...` are appended to it.
    pub download_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            api_base: API_BASE.into(),
            auth_url: AUTH_URL.into(),
            landing_url: LANDING_URL.into(),
            token_url: TOKEN_URL.into(),
            upload_url: UPLOAD_URL.into(),
            download_base: DOWNLOAD_BASE.into(),
        }
    }
}

/// Settings gathered from the environment. Login and password may be
/// missing; the interactive front end asks for them.
#[derive(Debug, Clone)]
pub struct Config {
    pub login: Option<String>,
    pub password: Option<String>,
    pub domain: String,
    pub endpoints: Endpoints,
}

impl Config {
    /// Read `CLOUDMAIL_LOGIN`, `CLOUDMAIL_PASSWORD`, `CLOUDMAIL_DOMAIN`,
    /// `CLOUDMAIL_UPLOAD_URL` and `CLOUDMAIL_DOWNLOAD_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut endpoints = Endpoints::default();
        if let Some(url) = non_empty("CLOUDMAIL_UPLOAD_URL") {
            endpoints.upload_url = url;
        }
        if let Some(url) = non_empty("CLOUDMAIL_DOWNLOAD_URL") {
            if !url.ends_with('/') {
                return Err(CloudError::Config(format!(
                    "CLOUDMAIL_DOWNLOAD_URL must end with '/': {}",
                    url
                )));
            }
            endpoints.download_base = url;
        }

        Ok(Config {
            login: non_empty("CLOUDMAIL_LOGIN"),
            password: non_empty("CLOUDMAIL_PASSWORD"),
            domain: non_empty("CLOUDMAIL_DOMAIN").unwrap_or_else(|| DEFAULT_DOMAIN.into()),
            endpoints,
        })
    }

    /// Credentials, if both login and password are known.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => {
                Some(Credentials::new(login, password, self.domain.clone()))
            }
            _ => None,
        }
    }
}
