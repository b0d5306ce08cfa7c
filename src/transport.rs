//! Transport abstraction for the game channel.
//!
//! The [`Transport`] trait is a push-only text message stream from the server
//! to one client. Clients never write to the channel; every client action is
//! a one-shot request through [`Backend`](crate::api::Backend).
//!
//! Opening a channel is the job of a [`Connector`]. Sessions are given a
//! connector instead of a connected transport so they decide when the
//! channel opens (after the identity is known) and for which role.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use aicebreaker_client::error::AicebreakerError;
//! use aicebreaker_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn recv(&mut self) -> Option<Result<String, AicebreakerError>> {
//!         // Receive the next text message.
//!         // Return None when the connection is closed cleanly.
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), AicebreakerError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::AicebreakerError;

/// A push-only text message stream from the server.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe: it is polled inside
/// `tokio::select!`, and a cancelled call must not lose a message.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Receive the next text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, AicebreakerError>>;

    /// Close the connection.
    ///
    /// Must be idempotent: the transport loop calls it on every exit path,
    /// including after the server already closed the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources must be
    /// released anyway.
    async fn close(&mut self) -> Result<(), AicebreakerError>;
}

/// Opens transports for channel URLs.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Open a channel to `url`.
    ///
    /// # Errors
    ///
    /// Any error means the channel is not open. Sessions absorb it and stay
    /// disconnected.
    async fn connect(&self, url: &str) -> Result<Self::Transport, AicebreakerError>;
}
