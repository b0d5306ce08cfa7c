//! Player identity and channel scoping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Path segment of the master's channel endpoint.
pub const MANAGER_CHANNEL: &str = "manager";

/// Opaque per-session token issued by the backend.
///
/// The backend calls it a wallet address; the client never inspects it. It
/// scopes the player's channel (`/ws/{identity}`) and every submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a token issued by the backend.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the game a channel belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRole {
    /// A player channel, scoped by the player's identity.
    Player(Identity),
    /// The shared master connection.
    Manager,
}

impl ChannelRole {
    /// The last path segment of the channel endpoint for this role.
    pub fn channel_segment(&self) -> &str {
        match self {
            Self::Player(identity) => identity.as_str(),
            Self::Manager => MANAGER_CHANNEL,
        }
    }

    /// Whether this is the master's channel.
    pub fn is_manager(&self) -> bool {
        matches!(self, Self::Manager)
    }
}

/// Progress of the one-shot identity request made when a player mounts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    /// The request has not completed yet.
    #[default]
    Loading,
    /// The backend issued an identity.
    Ready(Identity),
    /// The request failed. There is no retry; the session stays without a
    /// channel.
    Failed,
}

impl IdentityState {
    /// The issued identity, once the request has succeeded.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Ready(identity) => Some(identity),
            Self::Loading | Self::Failed => None,
        }
    }

    /// Whether the identity request is still outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}
