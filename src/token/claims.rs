//! Paseto claims.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

/// Errors while interacting with claims.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("claim would be empty")]
    EmptyClaim,
    #[error("claim not present")]
    MissingClaim,
    #[error("claim in unexpected format")]
    InvalidClaimFormat,
    #[error("cannot set registered claim as custom")]
    RegisteredClaim,
    #[error("cannot serialize value as json")]
    SerializeError,
}

/// Registered claims doorman sets. These can only be modified through the
/// provided setters.
pub const REGISTERED_CLAIMS: [&str; 4] = ["exp", "nbf", "iat", "jti"];

/// A collection of claims for a Paseto.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Claims(HashMap<String, Value>);

impl Claims {
    /// Create a new set of claims valid from now until `lifetime` from now.
    ///
    /// # Examples
    ///
    /// ```
    /// # use doorman::token::claims::{Claims, Error};
    /// # use time::Duration;
    /// # fn try_main() -> Result<(), Error> {
    /// let claims = Claims::expiring_in(Duration::hours(24))?
    ///     .with_token_identifier("session")?
    ///     .with_custom_claim("csrf", "abc")?;
    ///
    /// assert_eq!(claims.token_identifier(), Some("session"));
    /// assert_eq!(claims.custom::<String>("csrf")?, "abc");
    /// assert!(claims.expiration().unwrap() > claims.issued_at().unwrap());
    /// #     Ok(())
    /// # }
    /// # fn main() { try_main().unwrap(); }
    /// ```
    pub fn expiring_in(lifetime: Duration) -> Result<Self, Error> {
        let iat = OffsetDateTime::now_utc();

        Self(HashMap::new())
            .with_expiration(&(iat + lifetime))?
            .with_not_before(&iat)?
            .with_issued_at(&iat)
    }

    /// Get the JSON value of a claim.
    ///
    /// Returns [`None`] if the claim is not set.
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// Deserialize a custom claim.
    ///
    /// # Errors
    ///
    /// Returns an error when the claim is not set or doesn't have the
    /// expected shape.
    pub fn custom<T: DeserializeOwned>(&self, claim: &str) -> Result<T, Error> {
        let value = self.get(claim).ok_or(Error::MissingClaim)?;

        serde_json::from_value(value.clone()).map_err(|_| Error::InvalidClaimFormat)
    }

    fn set_unchecked<V>(&mut self, claim: &str, value: V) -> Result<(), Error>
    where
        V: Serialize,
    {
        let value = serde_json::to_value(value).map_err(|_| Error::SerializeError)?;
        self.0.insert(claim.to_string(), value);

        Ok(())
    }

    /// Set a non-registered claim to a JSON-serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error when attempting to set a registered claim or when the
    /// provided value can't be serialized to JSON.
    pub fn with_custom_claim<V>(mut self, claim: &str, value: V) -> Result<Self, Error>
    where
        V: Serialize,
    {
        if REGISTERED_CLAIMS.contains(&claim) {
            Err(Error::RegisteredClaim)
        } else {
            self.set_unchecked(claim, value)?;

            Ok(self)
        }
    }
}

impl Claims {
    pub fn expiration(&self) -> Option<OffsetDateTime> {
        self.time_claim("exp")
    }

    pub fn not_before(&self) -> Option<OffsetDateTime> {
        self.time_claim("nbf")
    }

    pub fn issued_at(&self) -> Option<OffsetDateTime> {
        self.time_claim("iat")
    }

    /// Get the token identifier.
    ///
    /// Returns [`None`] if the token identifier is not set.
    pub fn token_identifier(&self) -> Option<&str> {
        self.get("jti").and_then(Value::as_str)
    }

    fn time_claim(&self, claim: &str) -> Option<OffsetDateTime> {
        self.get(claim)
            .and_then(Value::as_str)
            .and_then(|t| OffsetDateTime::parse(t, &Rfc3339).ok())
    }
}

impl Claims {
    pub fn with_expiration(mut self, exp: &OffsetDateTime) -> Result<Self, Error> {
        self.set_unchecked("exp", format_time(exp)?)?;

        Ok(self)
    }

    pub fn with_not_before(mut self, nbf: &OffsetDateTime) -> Result<Self, Error> {
        self.set_unchecked("nbf", format_time(nbf)?)?;

        Ok(self)
    }

    pub fn with_issued_at(mut self, iat: &OffsetDateTime) -> Result<Self, Error> {
        self.set_unchecked("iat", format_time(iat)?)?;

        Ok(self)
    }

    /// Set the token identifier.
    ///
    /// # Errors
    ///
    /// Will return an error if given an empty string.
    pub fn with_token_identifier(mut self, jti: &str) -> Result<Self, Error> {
        if jti.is_empty() {
            Err(Error::EmptyClaim)
        } else {
            self.set_unchecked("jti", jti)?;

            Ok(self)
        }
    }
}

fn format_time(time: &OffsetDateTime) -> Result<String, Error> {
    time.format(&Rfc3339).map_err(|_| Error::SerializeError)
}

type Rule = Box<dyn Fn(&Claims) -> bool + Send + Sync>;

/// A collection of rules to validate a set of claims against.
pub struct ClaimsValidator(Vec<Rule>);

impl ClaimsValidator {
    /// Create a claims validator. By default, the validator will check that
    /// "Not Before" is set and before the current time, "Issued At" is set
    /// and before the current time, and "Expiration" is set and after the
    /// current time.
    pub fn new() -> Self {
        Self::empty().with_rule(default_rule)
    }

    /// Create a claims validator without the default validation rules.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Add a new rule to a claims validator.
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Claims) -> bool + Send + Sync + 'static,
    {
        self.0.push(Box::new(rule));

        self
    }

    /// Validate a set of claims with a claims validator.
    pub fn validate(&self, claims: &Claims) -> bool {
        self.0.iter().all(|rule| rule(claims))
    }
}

impl Default for ClaimsValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn default_rule(claims: &Claims) -> bool {
    match (claims.expiration(), claims.not_before(), claims.issued_at()) {
        (Some(exp), Some(nbf), Some(iat)) => {
            let now = OffsetDateTime::now_utc();

            exp >= now && nbf <= now && iat <= now
        }
        _ => false,
    }
}
