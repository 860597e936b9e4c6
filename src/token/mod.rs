//! Sealed cookie payloads.
//!
//! Everything doorman hands to the browser (the session cookie and the
//! pending-login cookie) is a set of [`Claims`] encrypted and authenticated
//! as a Paseto v4.local token under a key derived from the session secret.

pub mod claims;
pub mod local;

pub use claims::{Claims, ClaimsValidator};
pub use local::CookieKey;

/// Paseto pre-authentication encoding.
///
/// Each piece is prefixed with its length as a little-endian u64 with the
/// most significant bit cleared, and the whole is prefixed with the count.
pub(crate) fn pre_auth_encode(pieces: &[&[u8]]) -> Vec<u8> {
    let mut out = le64(pieces.len() as u64).to_vec();
    for piece in pieces {
        out.extend_from_slice(&le64(piece.len() as u64));
        out.extend_from_slice(piece);
    }

    out
}

fn le64(n: u64) -> [u8; 8] {
    (n & (u64::MAX >> 1)).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pae_empty() {
        assert_eq!(pre_auth_encode(&[]), [0; 8]);
        assert_eq!(
            pre_auth_encode(&[b""]),
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn pae_pieces() {
        let encoded = pre_auth_encode(&[b"Paragon"]);
        assert_eq!(&encoded[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&encoded[8..16], &[7, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&encoded[16..], b"Paragon");
    }
}
