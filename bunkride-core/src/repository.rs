use async_trait::async_trait;
use uuid::Uuid;

use crate::error::WorkflowResult;
use crate::profile::{NewProfile, Profile, ProfileUpdate};

/// Repository trait for profile data access.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Persist a new, unverified profile. `password_hash` is already an
    /// Argon2id PHC string; `verification_token` is handed to the mailer.
    async fn create_profile(
        &self,
        profile: &NewProfile,
        password_hash: &str,
        verification_token: Uuid,
    ) -> WorkflowResult<Profile>;

    async fn find_by_id(&self, id: Uuid) -> WorkflowResult<Option<Profile>>;

    async fn find_by_email(&self, email: &str) -> WorkflowResult<Option<Profile>>;

    /// Returns the stored password hash for login verification.
    async fn password_hash(&self, email: &str) -> WorkflowResult<Option<String>>;

    /// Owner-only field edits; immutable fields are not part of the update.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> WorkflowResult<Profile>;

    /// Consume a verification token, marking the profile verified.
    /// Returns the verified profile, or None if the token is unknown.
    async fn verify_email(&self, token: Uuid) -> WorkflowResult<Option<Profile>>;
}
