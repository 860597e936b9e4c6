//! Paseto version 4 local tokens, used as cookie values.

use crate::token::claims::{Claims, ClaimsValidator};
use crate::token::pre_auth_encode;

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use blake2::{
    digest::{
        consts::{U32, U56},
        Mac,
    },
    Blake2b, Blake2bMac,
};
use chacha20::{
    cipher::{KeyIvInit, StreamCipher},
    XChaCha20,
};
use getrandom::getrandom;
use thiserror::Error;
use zeroize::Zeroize;

const LOCAL_HEADER: &str = "v4.local.";

const DOMAIN_ENCRYPT: &[u8] = b"paseto-encryption-key";
const DOMAIN_AUTH: &[u8] = b"paseto-auth-key-for-aead";
const DOMAIN_COOKIE_KEY: &[u8] = b"doorman-cookie-key";

/// Shortest session secret accepted by [`CookieKey::derive`].
pub const MIN_SECRET_LEN: usize = 32;

/// Errors while sealing or opening cookie tokens.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("secret is too short")]
    WeakSecret,
    #[error("unable to encode claims as json")]
    EncodeError,
    #[error("failed to get randomness for nonce")]
    RngError,
    #[error("supplied token has invalid header")]
    InvalidHeader,
    #[error("unable to decode token message")]
    InvalidMessage,
    #[error("unable to decode token footer")]
    InvalidFooter,
    #[error("failed to authenticate ciphertext")]
    AuthFailure,
    #[error("unable to decode claims as json")]
    DecodeError,
    #[error("token claims failed validation")]
    BadClaims,
}

/// The symmetric key cookie values are sealed with.
#[derive(Clone)]
pub struct CookieKey([u8; 32]);

impl CookieKey {
    /// Derive a cookie key from the configured session secret.
    ///
    /// # Errors
    ///
    /// Secrets shorter than [`MIN_SECRET_LEN`] bytes are rejected.
    pub fn derive(secret: &[u8]) -> Result<Self, Error> {
        use blake2::Digest;

        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::WeakSecret);
        }

        let digest = Blake2b::<U32>::new_with_prefix(DOMAIN_COOKIE_KEY)
            .chain_update(secret)
            .finalize();

        Ok(Self(digest.into()))
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self(key)
    }

    fn encrypt_message(
        &self,
        message: &[u8],
        nonce: &[u8],
        footer: Option<&[u8]>,
        implicit: Option<&[u8]>,
    ) -> String {
        let (key, n2, auth_key) = split_key(&self.0, nonce);

        let mut c = message.to_vec();
        XChaCha20::new(&key.into(), &n2.into()).apply_keystream(&mut c);

        let mac = authenticate(
            &auth_key,
            nonce,
            &c,
            footer.unwrap_or(&[]),
            implicit.unwrap_or(&[]),
        )
        .finalize()
        .into_bytes();

        let mut token = LOCAL_HEADER.to_string();
        token += &URL_SAFE_NO_PAD.encode([nonce, &c, &mac].concat());
        if let Some(footer) = footer {
            token += ".";
            token += &URL_SAFE_NO_PAD.encode(footer);
        }

        token
    }

    /// Seal a set of claims into a token string. The purpose is bound as
    /// the implicit assertion, so a token sealed for one purpose will not
    /// open for another.
    ///
    /// # Errors
    ///
    /// Fails when the claims can't be encoded as JSON or the system has no
    /// randomness for the nonce.
    pub fn seal(&self, claims: &Claims, purpose: &[u8]) -> Result<String, Error> {
        let message = serde_json::to_vec(&claims).map_err(|_| Error::EncodeError)?;

        let mut nonce = [0; 32];
        getrandom(&mut nonce).map_err(|_| Error::RngError)?;

        Ok(self.encrypt_message(&message, &nonce, None, Some(purpose)))
    }

    fn decrypt_message(
        &self,
        token: &[u8],
        implicit: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Option<Vec<u8>>), Error> {
        let mut body = token
            .strip_prefix(LOCAL_HEADER.as_bytes())
            .ok_or(Error::InvalidHeader)?
            .split(|b| *b == b'.');

        let message = match body.next().map(|msg| URL_SAFE_NO_PAD.decode(msg)) {
            Some(Ok(d)) if d.len() >= 64 => d,
            _ => return Err(Error::InvalidMessage),
        };
        let footer = body
            .next()
            .map(|msg| URL_SAFE_NO_PAD.decode(msg))
            .transpose()
            .map_err(|_| Error::InvalidFooter)?;

        let (nonce, remaining) = message.split_at(32);
        let (c, mac) = remaining.split_at(remaining.len() - 32);

        let (key, n2, auth_key) = split_key(&self.0, nonce);

        let expected = authenticate(
            &auth_key,
            nonce,
            c,
            footer.as_deref().unwrap_or(&[]),
            implicit.unwrap_or(&[]),
        );

        // verify_slice compares in constant time
        expected
            .verify_slice(mac)
            .map_err(|_| Error::AuthFailure)?;

        let mut p = c.to_vec();
        XChaCha20::new(&key.into(), &n2.into()).apply_keystream(&mut p);

        Ok((p, footer))
    }

    /// Open a token sealed for `purpose`, checking its claims against a
    /// validator.
    ///
    /// # Errors
    ///
    /// Fails when the token is malformed, was not sealed with this key and
    /// purpose, or its claims don't pass validation.
    pub fn open(
        &self,
        token: &str,
        validator: &ClaimsValidator,
        purpose: &[u8],
    ) -> Result<Claims, Error> {
        let (message, _) = self.decrypt_message(token.as_bytes(), Some(purpose))?;

        let claims = serde_json::from_slice(&message).map_err(|_| Error::DecodeError)?;

        if validator.validate(&claims) {
            Ok(claims)
        } else {
            Err(Error::BadClaims)
        }
    }
}

impl fmt::Debug for CookieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CookieKey(..)")
    }
}

impl Drop for CookieKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn authenticate(
    auth_key: &[u8; 32],
    nonce: &[u8],
    ciphertext: &[u8],
    footer: &[u8],
    implicit: &[u8],
) -> Blake2bMac<U32> {
    // unwrapping is safe here since the key is always 32 bytes
    Blake2bMac::<U32>::new_from_slice(auth_key)
        .unwrap()
        .chain_update(pre_auth_encode(&[
            LOCAL_HEADER.as_bytes(),
            nonce,
            ciphertext,
            footer,
            implicit,
        ]))
}

fn split_key(base_key: &[u8; 32], split_nonce: &[u8]) -> ([u8; 32], [u8; 24], [u8; 32]) {
    // unwraps are safe here since the key is always 32 bytes and the hasher
    // guarantees output size
    let enc_hash = Blake2bMac::<U56>::new_from_slice(base_key)
        .unwrap()
        .chain_update([DOMAIN_ENCRYPT, split_nonce].concat())
        .finalize()
        .into_bytes();
    let (key, nonce) = enc_hash.split_at(32);

    let auth_key = Blake2bMac::<U32>::new_from_slice(base_key)
        .unwrap()
        .chain_update([DOMAIN_AUTH, split_nonce].concat())
        .finalize()
        .into_bytes();

    (
        key.try_into().unwrap(),
        nonce.try_into().unwrap(),
        auth_key.into(),
    )
}
