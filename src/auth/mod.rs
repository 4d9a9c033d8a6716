//! Access-token issuance for the GLM API.
//!
//! The service authenticates requests with a short-lived signed token
//! built from an `"<id>.<secret>"` key pair. The token is the compact
//! three-segment form, HMAC-SHA256 signed, and carries a nonstandard
//! `sign_type` header field the service checks for; no JWT library
//! exposes extra header fields, so the segments are assembled here.

use std::error::Error;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

/// How long an issued token stays valid, per the service contract.
const TOKEN_TTL_SECS: i64 = 600;

#[derive(Debug)]
pub enum TokenError {
    /// The raw key did not split into exactly `"<id>.<secret>"`.
    InvalidKeyFormat,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidKeyFormat => {
                write!(f, "API key must have the form \"<id>.<secret>\"")
            }
        }
    }
}

impl Error for TokenError {}

#[derive(Serialize)]
struct TokenHeader<'a> {
    alg: &'a str,
    sign_type: &'a str,
    typ: &'a str,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    api_key: &'a str,
    exp: i64,
    timestamp: i64,
}

/// Issues signed access tokens for one API key pair.
///
/// The issued string goes into the `Authorization` header as-is, without
/// a `Bearer ` prefix.
pub struct TokenIssuer {
    id: String,
    secret: String,
}

impl TokenIssuer {
    /// Parse a raw `"<id>.<secret>"` key. Both halves must be non-empty
    /// and the secret must not itself contain a dot.
    pub fn new(raw_key: &str) -> Result<Self, TokenError> {
        match raw_key.split_once('.') {
            Some((id, secret))
                if !id.is_empty() && !secret.is_empty() && !secret.contains('.') =>
            {
                Ok(Self {
                    id: id.to_string(),
                    secret: secret.to_string(),
                })
            }
            _ => Err(TokenError::InvalidKeyFormat),
        }
    }

    /// Issue a token valid for the next ten minutes.
    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    fn issue_at(&self, issued: DateTime<Utc>) -> String {
        let header = TokenHeader {
            alg: "HS256",
            sign_type: "SIGN",
            typ: "JWT",
        };
        let claims = TokenClaims {
            api_key: &self.id,
            exp: (issued + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
            timestamp: issued.timestamp_millis(),
        };

        let header_json = serde_json::to_vec(&header).expect("token header serializes");
        let claims_json = serde_json::to_vec(&claims).expect("token claims serialize");
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = sign(self.secret.as_bytes(), signing_input.as_bytes());
        format!("{signing_input}.{signature}")
    }
}

fn sign(secret: &[u8], input: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(input);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}
