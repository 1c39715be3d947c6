//! Credential selection
//!
//! Callers may pass several Emohaa tokens joined by commas in one bearer
//! header; each request picks one of them at random.

use rand::rng;
use rand::seq::IndexedRandom;

/// Split an `Authorization` value into candidate credentials.
///
/// A leading `Bearer` scheme is stripped, even with nothing after it; blank
/// entries are dropped.
pub fn split_credentials(authorization: &str) -> Vec<String> {
    let raw = authorization.trim();
    let raw = match raw.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
        _ => raw,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pick one candidate uniformly at random
pub fn select_credential(candidates: &[String]) -> Option<&str> {
    candidates.choose(&mut rng()).map(String::as_str)
}
