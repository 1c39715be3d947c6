//! Anti-automation request signature
//!
//! Emohaa rejects calls that do not carry a fresh `X-Xss-*` triple: a random
//! nonce, the current epoch milliseconds, and the MD5 of both joined by `-_-`.

use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub const XSS_ID_HEADER: &str = "x-xss-id";
pub const XSS_TS_HEADER: &str = "x-xss-ts";
pub const XSS_REAL_HEADER: &str = "x-xss-real";

/// One signature triple. Never reuse across upstream calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XssSignature {
    /// Random decimal string
    pub nonce_id: String,
    /// Epoch milliseconds
    pub timestamp: String,
    /// Lowercase hex MD5 of `{timestamp}-_-{nonce_id}`
    pub signature: String,
}

impl XssSignature {
    /// Generate a fresh signature for the current instant
    pub fn generate() -> Self {
        let nonce_id = rand::random::<f64>().to_string();
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        Self::from_parts(nonce_id, timestamp)
    }

    /// Build a signature from a known nonce and timestamp
    pub fn from_parts(nonce_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        let nonce_id = nonce_id.into();
        let timestamp = timestamp.into();
        let signature = sign(&timestamp, &nonce_id);

        Self {
            nonce_id,
            timestamp,
            signature,
        }
    }

    /// Insert the three `X-Xss-*` headers
    pub fn apply(&self, headers: &mut HeaderMap) {
        // Decimal digits, dots and hex are always valid header values
        for (name, value) in [
            (XSS_ID_HEADER, &self.nonce_id),
            (XSS_TS_HEADER, &self.timestamp),
            (XSS_REAL_HEADER, &self.signature),
        ] {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
    }

    /// Query parameters mirroring the headers on the chat call
    pub fn query_pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("xts", self.timestamp.as_str()),
            ("xid", self.nonce_id.as_str()),
            ("xreal", self.signature.as_str()),
        ]
    }
}

/// MD5 hex digest of `{timestamp}-_-{nonce_id}`
pub fn sign(timestamp: &str, nonce_id: &str) -> String {
    let digest = Md5::digest(format!("{}-_-{}", timestamp, nonce_id).as_bytes());
    hex::encode(digest)
}
