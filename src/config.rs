//! Configuration, read from the environment at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderValue;
use openidconnect::url::Url;
use thiserror::Error;

use crate::token::{local, CookieKey};

const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_PORT: u16 = 8080;

const DEFAULT_COOKIE_NAME: &str = "_doorman_session";

const DEFAULT_CORS_ORIGIN: &str = "https://account.atlandrak.com";

const DEFAULT_ISSUER_URL: &str = "https://accounts.google.com";

/// Errors in the startup configuration. All of them are fatal.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub ip: IpAddr,
    pub port: u16,
    /// Base URL this service is reachable at; the OAuth callback lives under
    /// it.
    pub public_url: Url,
    /// The single origin allowed to call the API with credentials. Browsers
    /// are also sent here after a successful login.
    pub cors_origin: HeaderValue,
    pub cookie: CookieConfig,
    pub google: GoogleConfig,
}

#[derive(Clone, Debug)]
pub struct CookieConfig {
    pub name: String,
    /// Only send cookies over HTTPS. Enabled in production.
    pub secure: bool,
    pub key: CookieKey,
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub issuer_url: String,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let require = |var: &'static str| get(var).ok_or(Error::Missing(var));

        let google = GoogleConfig {
            client_id: require("GOOGLE_CLIENT_ID")?,
            client_secret: require("GOOGLE_CLIENT_SECRET")?,
            issuer_url: get("GOOGLE_ISSUER_URL").unwrap_or_else(|| DEFAULT_ISSUER_URL.to_string()),
        };

        let secret = require("SESSION_SECRET")?;
        let key = CookieKey::derive(secret.as_bytes()).map_err(|_| Error::Invalid {
            var: "SESSION_SECRET",
            reason: format!("must be at least {} bytes", local::MIN_SECRET_LEN),
        })?;

        let port = match get("PORT") {
            Some(port) => port.parse().map_err(|e| invalid("PORT", e))?,
            None => DEFAULT_PORT,
        };
        let ip = match get("HOST") {
            Some(ip) => ip.parse().map_err(|e| invalid("HOST", e))?,
            None => DEFAULT_ADDR,
        };

        let public_url = get("PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{port}"));
        let public_url = Url::parse(&public_url).map_err(|e| invalid("PUBLIC_URL", e))?;

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());
        Url::parse(&cors_origin).map_err(|e| invalid("CORS_ORIGIN", e))?;
        let cors_origin =
            HeaderValue::from_str(&cors_origin).map_err(|e| invalid("CORS_ORIGIN", e))?;

        Ok(Self {
            ip,
            port,
            public_url,
            cors_origin,
            cookie: CookieConfig {
                name: get("SESSION_COOKIE").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
                secure: get("APP_ENV").as_deref() == Some("production"),
                key,
            },
            google,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

fn invalid(var: &'static str, e: impl std::fmt::Display) -> Error {
    Error::Invalid {
        var,
        reason: e.to_string(),
    }
}
