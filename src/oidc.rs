//! The identity provider and the state carried through its login flow.

use std::fmt;

use crate::config::Config;
use crate::profile::Profile;
use crate::token::{Claims, ClaimsValidator, CookieKey};

use anyhow::Result;
use async_trait::async_trait;
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient, CoreIdTokenClaims, CoreProviderMetadata},
    reqwest::async_http_client,
    url::Url,
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::Duration;
use tokio::time::timeout;
use tracing::{error, warn};

/// Where the provider sends the browser back to.
pub const CALLBACK_PATH: &str = "/api/auth/google/callback";

/// Scopes requested from the provider.
pub const SCOPES: [&str; 2] = ["profile", "email"];

/// How long a user has to finish the consent screen.
pub const LOGIN_TTL: Duration = Duration::minutes(10);

/// How long startup waits on the issuer's discovery document.
pub const DISCOVERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

const LOGIN_PURPOSE: &[u8] = b"doorman-login";

/// Errors while setting up OIDC.
#[derive(Error, Clone, Debug)]
pub enum SetupError {
    #[error("invalid issuer url")]
    InvalidIssuer,
    #[error("invalid redirect url")]
    InvalidRedirect,
    #[error("error during OIDC discovery")]
    DiscoveryError,
}

/// Errors turning an authorization code into a profile.
#[derive(Error, Clone, Debug)]
pub enum ExchangeError {
    #[error("token exchange with the provider failed")]
    TokenExchange,
    #[error("provider response has no id token")]
    MissingIdToken,
    #[error("id token failed verification")]
    InvalidIdToken,
}

/// An OAuth2 identity provider.
///
/// Implementations own the whole handshake: building the consent URL,
/// exchanging the code, and verifying whatever comes back.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Build the consent screen URL along with the state that must come
    /// back with the callback.
    fn authorize(&self) -> (Url, PendingLogin);

    /// Exchange an authorization code for the user's profile.
    async fn exchange(&self, code: &str, pending: &PendingLogin) -> Result<Profile, ExchangeError>;
}

/// Google, through OpenID Connect discovery.
#[derive(Clone, Debug)]
pub struct GoogleProvider {
    client: CoreClient,
}

impl GoogleProvider {
    /// Discover the provider's endpoints and build a client for it. Gives up
    /// after [`DISCOVERY_TIMEOUT`].
    pub async fn discover(config: &Config) -> Result<Self, SetupError> {
        Self::discover_within(config, DISCOVERY_TIMEOUT).await
    }

    async fn discover_within(
        config: &Config,
        limit: std::time::Duration,
    ) -> Result<Self, SetupError> {
        let issuer_url = IssuerUrl::new(config.google.issuer_url.clone()).map_err(|e| {
            error!("error setting up issuer url: {}", e);
            SetupError::InvalidIssuer
        })?;

        let discovery = CoreProviderMetadata::discover_async(issuer_url, async_http_client);
        let provider_metadata = timeout(limit, discovery)
            .await
            .map_err(|_| {
                error!("OIDC discovery timed out after {:?}", limit);
                SetupError::DiscoveryError
            })?
            .map_err(|e| {
                error!("failed OIDC discovery: {}", e);
                SetupError::DiscoveryError
            })?;

        let redirect_url = config.public_url.join(CALLBACK_PATH).map_err(|e| {
            error!("invalid redirect url: {}", e);
            SetupError::InvalidRedirect
        })?;

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            ClientId::new(config.google.client_id.clone()),
            Some(ClientSecret::new(config.google.client_secret.clone())),
        )
        .set_redirect_uri(RedirectUrl::from_url(redirect_url));

        Ok(Self { client })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize(&self) -> (Url, PendingLogin) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        );
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        let (url, csrf, nonce) = request.set_pkce_challenge(pkce_challenge).url();

        let pending = PendingLogin::new(
            csrf.secret().clone(),
            nonce.secret().clone(),
            pkce_verifier.secret().clone(),
        );

        (url, pending)
    }

    async fn exchange(&self, code: &str, pending: &PendingLogin) -> Result<Profile, ExchangeError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                warn!("token exchange failed: {}", e);
                ExchangeError::TokenExchange
            })?;

        let id_token = response.id_token().ok_or_else(|| {
            warn!("token response did not include an id token");
            ExchangeError::MissingIdToken
        })?;

        let nonce = Nonce::new(pending.nonce.clone());
        let claims = id_token
            .claims(&self.client.id_token_verifier(), &nonce)
            .map_err(|e| {
                warn!("id token verification failed: {}", e);
                ExchangeError::InvalidIdToken
            })?;

        Ok(profile_from_claims(claims))
    }
}

fn profile_from_claims(claims: &CoreIdTokenClaims) -> Profile {
    let mut profile = Profile::new(claims.subject().as_str());
    profile.display_name = claims
        .name()
        .and_then(|name| name.get(None))
        .map(|name| name.as_str().to_owned());
    profile.email = claims.email().map(|email| email.as_str().to_owned());
    profile.avatar_url = claims
        .picture()
        .and_then(|picture| picture.get(None))
        .map(|picture| picture.as_str().to_owned());
    if let Some(verified) = claims.email_verified() {
        profile
            .extra
            .insert("emailVerified".to_string(), Value::Bool(verified));
    }

    let names = [
        (
            "givenName",
            claims
                .given_name()
                .and_then(|name| name.get(None))
                .map(|name| name.as_str()),
        ),
        (
            "familyName",
            claims
                .family_name()
                .and_then(|name| name.get(None))
                .map(|name| name.as_str()),
        ),
        ("locale", claims.locale().map(|locale| locale.as_str())),
    ];
    for (key, value) in names {
        if let Some(value) = value {
            profile
                .extra
                .insert(key.to_string(), Value::String(value.to_owned()));
        }
    }

    profile
}

/// What has to survive the trip to the consent screen and back: the CSRF
/// `state`, the ID token nonce and the PKCE verifier. Kept in a short-lived
/// sealed cookie.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingLogin {
    csrf: String,
    nonce: String,
    pkce_verifier: String,
}

impl PendingLogin {
    pub fn new(csrf: String, nonce: String, pkce_verifier: String) -> Self {
        Self {
            csrf,
            nonce,
            pkce_verifier,
        }
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn pkce_verifier(&self) -> &str {
        &self.pkce_verifier
    }

    /// Check the `state` parameter of a callback against this login.
    pub fn matches_state(&self, state: &str) -> bool {
        self.csrf.as_bytes().ct_eq(state.as_bytes()).into()
    }

    /// Seal this login into a cookie value.
    pub fn to_cookie(&self, key: &CookieKey) -> Result<String> {
        let claims = Claims::expiring_in(LOGIN_TTL)?
            .with_custom_claim("csrf", &self.csrf)?
            .with_custom_claim("nonce", &self.nonce)?
            .with_custom_claim("pkce", &self.pkce_verifier)?;

        Ok(key.seal(&claims, LOGIN_PURPOSE)?)
    }

    /// Restore a login from its cookie. Fails for tampered or expired
    /// cookies.
    pub fn from_cookie(cookie: &str, key: &CookieKey) -> Result<Self> {
        let claims = key.open(cookie, &ClaimsValidator::new(), LOGIN_PURPOSE)?;

        Ok(Self {
            csrf: claims.custom("csrf")?,
            nonce: claims.custom("nonce")?,
            pkce_verifier: claims.custom("pkce")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::testing;

    fn key() -> CookieKey {
        CookieKey::derive(b"an example session secret that is long enough").unwrap()
    }

    fn pending() -> PendingLogin {
        PendingLogin::new("csrf-token".into(), "nonce".into(), "verifier".into())
    }

    #[test]
    fn state_must_match_exactly() {
        let pending = pending();

        assert!(pending.matches_state("csrf-token"));
        assert!(!pending.matches_state("csrf-tokem"));
        assert!(!pending.matches_state("csrf"));
        assert!(!pending.matches_state(""));
    }

    #[test]
    fn cookie_restores_login() {
        let cookie = pending().to_cookie(&key()).expect("seal login");

        assert_eq!(PendingLogin::from_cookie(&cookie, &key()).unwrap(), pending());
    }

    #[test]
    fn session_cookie_is_not_a_login() {
        let claims = Claims::expiring_in(LOGIN_TTL)
            .and_then(|c| c.with_custom_claim("csrf", "x"))
            .unwrap();
        let cookie = key().seal(&claims, b"doorman-session").unwrap();

        assert!(PendingLogin::from_cookie(&cookie, &key()).is_err());
    }

    #[test]
    fn profile_keeps_google_claims() {
        let claims: CoreIdTokenClaims = serde_json::from_value(json!({
            "iss": "https://accounts.google.com",
            "aud": "client",
            "exp": 1_900_000_000,
            "iat": 1_800_000_000,
            "sub": "123",
            "name": "Ada Lovelace",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "locale": "en-GB",
            "email": "a@b.com",
            "email_verified": true,
            "picture": "https://example.com/ada.png",
        }))
        .expect("id token claims");

        let profile = serde_json::to_value(profile_from_claims(&claims)).unwrap();
        assert_eq!(
            profile,
            json!({
                "id": "123",
                "displayName": "Ada Lovelace",
                "email": "a@b.com",
                "avatarUrl": "https://example.com/ada.png",
                "emailVerified": true,
                "givenName": "Ada",
                "familyName": "Lovelace",
                "locale": "en-GB",
            })
        );
    }

    #[test]
    fn profile_omits_absent_claims() {
        let claims: CoreIdTokenClaims = serde_json::from_value(json!({
            "iss": "https://accounts.google.com",
            "aud": "client",
            "exp": 1_900_000_000,
            "iat": 1_800_000_000,
            "sub": "123",
        }))
        .expect("id token claims");

        let profile = serde_json::to_value(profile_from_claims(&claims)).unwrap();
        assert_eq!(profile, json!({ "id": "123" }));
    }

    #[tokio::test]
    async fn discovery_gives_up_on_silent_issuer() {
        // accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let issuer_url = format!("http://{addr}");
        let config = testing::config(&[("GOOGLE_ISSUER_URL", issuer_url.as_str())]);
        let started = Instant::now();
        let result =
            GoogleProvider::discover_within(&config, std::time::Duration::from_millis(200)).await;

        assert!(matches!(result, Err(SetupError::DiscoveryError)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        silent.abort();
    }
}
