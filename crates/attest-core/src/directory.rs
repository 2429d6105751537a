//! Identity and session directory seam.
//!
//! The directory resolves display names and stored key material. All key
//! lookups are optional: missing material degrades QR verification to
//! emoji-only, it is never an error.

/// Read-only identity descriptor for the party being verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Stable user id.
    pub user_id: String,
    /// Human-readable display name, when the directory knows one.
    pub display_name: Option<String>,
}

impl Member {
    /// Member known only by user id.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), display_name: None }
    }

    /// Member with a display name.
    pub fn named(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), display_name: Some(display_name.into()) }
    }

    /// Name to show in the UI; falls back to the user id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// Directory of identity key material for the local session and peers.
pub trait IdentityDirectory: Send + Sync {
    /// User id of the local session (the QR keyholder).
    fn user_id(&self) -> String;

    /// Device id of the local session.
    fn device_id(&self) -> String;

    /// Public key of the local device, if one is stored.
    fn device_key(&self) -> Option<String>;

    /// Id of the local user's cross-signing key, if published.
    fn cross_signing_id(&self) -> Option<String>;

    /// Id of `user_id`'s master cross-signing key, if stored.
    fn master_key(&self, user_id: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_name_falls_back_to_user_id() {
        assert_eq!(Member::new("alice").name(), "alice");
        assert_eq!(Member::named("alice", "Alice").name(), "Alice");
    }
}
