//! Emohaa upstream module
//!
//! Everything that talks to the Emohaa service: disguise headers, request
//! signatures, the HTTP client and ephemeral session management.

pub mod client;
pub mod error;
pub mod headers;
pub mod session;
pub mod signature;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

pub use client::EmohaaClient;
pub use error::{TurnError, UpstreamError};
pub use session::{Session, SessionManager};
pub use signature::XssSignature;

/// Raw body of the upstream chat response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// The three upstream calls a turn is built from.
///
/// [`EmohaaClient`] is the production implementation; tests substitute
/// scripted ones to exercise retry and teardown behaviour.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Create a throwaway conversation and return its id
    async fn create_session(&self, credential: &str) -> Result<String, UpstreamError>;

    /// Delete a conversation created by [`UpstreamApi::create_session`]
    async fn delete_session(&self, session_id: &str, credential: &str)
        -> Result<(), UpstreamError>;

    /// Send the prompt and return the SSE response body
    async fn open_chat(
        &self,
        session_id: &str,
        prompt: &str,
        credential: &str,
    ) -> Result<ByteStream, UpstreamError>;
}
