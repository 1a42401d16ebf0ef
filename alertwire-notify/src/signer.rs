//! Timestamped request signing for the signed voice channel.
//!
//! The URL signature and the `Authorization` header are both derived from
//! one [`SignatureTimestamp`]. It is sampled once per attempt and passed to
//! both computations, so they can never disagree.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Local, TimeZone};
use md5::{Digest, Md5};
use std::fmt;

use crate::secret::Secret;

/// Fixed-width timestamp layout, `yyyyMMddHHmmss`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A timestamp captured once and reused for every signed component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTimestamp(String);

impl SignatureTimestamp {
    /// Sample the local clock.
    pub fn now() -> Self {
        Self::at(&Local::now())
    }

    /// Format a given instant.
    pub fn at<Tz>(instant: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self(instant.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Use a preformatted value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The formatted timestamp.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignatureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signature material for one request.
#[derive(Debug, Clone)]
pub struct SignedCredentials {
    /// Timestamp both values were derived from.
    pub timestamp: SignatureTimestamp,
    /// Uppercase hex MD5 for the `sig` query parameter.
    pub signature: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
}

/// Signs requests with an account id and account token.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    account_sid: String,
    account_token: Secret,
}

impl RequestSigner {
    /// Create a signer.
    pub fn new(account_sid: impl Into<String>, account_token: Secret) -> Self {
        Self {
            account_sid: account_sid.into(),
            account_token,
        }
    }

    /// Account id.
    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }

    /// `HEX_UPPER(MD5(account_sid + account_token + timestamp))`.
    pub fn signature(&self, timestamp: &SignatureTimestamp) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.account_sid.as_bytes());
        hasher.update(self.account_token.expose().as_bytes());
        hasher.update(timestamp.as_str().as_bytes());
        hex::encode_upper(hasher.finalize())
    }

    /// `BASE64(account_sid + ":" + timestamp)`.
    pub fn authorization(&self, timestamp: &SignatureTimestamp) -> String {
        STANDARD.encode(format!("{}:{}", self.account_sid, timestamp.as_str()))
    }

    /// Derive both values from `timestamp`.
    pub fn sign(&self, timestamp: SignatureTimestamp) -> SignedCredentials {
        SignedCredentials {
            signature: self.signature(&timestamp),
            authorization: self.authorization(&timestamp),
            timestamp,
        }
    }

    /// Sample the clock once and sign.
    pub fn sign_now(&self) -> SignedCredentials {
        self.sign(SignatureTimestamp::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_fixed_vector() {
        let signer = RequestSigner::new("S", Secret::from("T"));
        let signed = signer.sign(SignatureTimestamp::new("20230101000000"));

        assert_eq!(signed.signature, "385DB24165028D9608ABE18E9C1B81C6");
        assert_eq!(signed.authorization, "UzoyMDIzMDEwMTAwMDAwMA==");
        assert_eq!(signed.timestamp.as_str(), "20230101000000");
    }

    #[test]
    fn test_second_vector() {
        let signer = RequestSigner::new("AC", Secret::from("token"));
        let timestamp = SignatureTimestamp::new("20240315120000");
        assert_eq!(
            signer.signature(&timestamp),
            "70B1CADB7E781DE20B1EAAEBA5B31CAF"
        );
        assert_eq!(signer.authorization(&timestamp), "QUM6MjAyNDAzMTUxMjAwMDA=");
    }

    #[test]
    fn test_timestamp_format() {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap()
            .and_utc();
        assert_eq!(SignatureTimestamp::at(&instant).as_str(), "20240305070809");
    }

    #[test]
    fn test_sign_now_shares_timestamp() {
        let signer = RequestSigner::new("acct", Secret::from("tok"));
        let signed = signer.sign_now();

        assert_eq!(signed.timestamp.as_str().len(), 14);
        assert_eq!(signed.signature, signer.signature(&signed.timestamp));

        let decoded = STANDARD.decode(&signed.authorization).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            format!("acct:{}", signed.timestamp)
        );
    }

    #[test]
    fn test_signature_is_uppercase_hex() {
        let signer = RequestSigner::new("acct", Secret::from("tok"));
        let sig = signer.signature(&SignatureTimestamp::at(&Utc::now()));
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
