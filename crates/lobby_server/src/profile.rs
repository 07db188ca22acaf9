//! Display-profile collaborator interface.
//!
//! The profile service is an external collaborator: the core consults it to
//! refresh a joining user's display data (avatar reference in particular)
//! but never blocks a join on it. A fetch failure degrades gracefully to the
//! caller-supplied identity data already in hand.

use async_trait::async_trait;

/// Display data for a user as served by the profile collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayProfile {
    pub username: String,
    pub profile_picture: Option<String>,
}

/// Reasons a profile fetch can fail.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile service unavailable: {0}")]
    Unavailable(String),

    #[error("No profile for user {0}")]
    NotFound(String),
}

/// Fetches display profiles for identities, typically over the network.
///
/// Implementations may suspend; the coordinator awaits this *before* taking
/// the lobby lock and re-validates all join preconditions afterwards.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Fetches the current display profile for `identity_id`.
    async fn fetch_display_profile(&self, identity_id: &str) -> Result<DisplayProfile, ProfileError>;
}

/// Default provider for deployments without a profile service.
///
/// Always reports the profile as unavailable, so joins proceed with the
/// identity data the client supplied.
#[derive(Debug, Default, Clone)]
pub struct NoProfileProvider;

#[async_trait]
impl ProfileProvider for NoProfileProvider {
    async fn fetch_display_profile(&self, _identity_id: &str) -> Result<DisplayProfile, ProfileError> {
        Err(ProfileError::Unavailable("no profile service configured".to_string()))
    }
}
