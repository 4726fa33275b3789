//! Image registry traits.

use async_trait::async_trait;

use crate::error::CommandError;

/// Login details for a registry.
#[derive(Clone)]
pub struct RegistryCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Local image store able to tag and push to a remote registry.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn login(&self, credentials: &RegistryCredentials) -> Result<(), CommandError>;

    async fn tag(&self, source: &str, target: &str) -> Result<(), CommandError>;

    async fn push(&self, reference: &str) -> Result<(), CommandError>;
}

/// Issues short-lived registry passwords from provider credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn registry_password(&self, region: &str) -> Result<String, CommandError>;
}
