//! Service layer for builder registration, administration and
//! authentication.
//!
//! Provides [`BuilderRegistryService`] which registers builders, edits their
//! profile, regenerates tokens, deletes builders and resolves bearer tokens
//! back to builders.

use crate::builder::{
    domain::{Builder, BuilderDomainError, BuilderId, BuilderName, BuilderToken, TrustLevel},
    ports::{BuilderRepository, BuilderRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Request payload for registering a new builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBuilderRequest {
    name: String,
    trust_level: Option<TrustLevel>,
}

impl RegisterBuilderRequest {
    /// Creates a request for a builder with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trust_level: None,
        }
    }

    /// Overrides the default trust level.
    #[must_use]
    pub const fn with_trust_level(mut self, trust_level: TrustLevel) -> Self {
        self.trust_level = Some(trust_level);
        self
    }
}

/// Request payload for editing a builder profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBuilderRequest {
    id: BuilderId,
    name: Option<String>,
    trust_level: Option<TrustLevel>,
}

impl UpdateBuilderRequest {
    /// Creates an empty edit for the given builder.
    #[must_use]
    pub const fn new(id: BuilderId) -> Self {
        Self {
            id,
            name: None,
            trust_level: None,
        }
    }

    /// Sets a new display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a new trust level.
    #[must_use]
    pub const fn with_trust_level(mut self, trust_level: TrustLevel) -> Self {
        self.trust_level = Some(trust_level);
        self
    }
}

/// A builder together with the plaintext token the operator must hand over.
#[derive(Debug, Clone)]
pub struct RegisteredBuilder {
    /// The stored builder.
    pub builder: Builder,
    /// Plaintext token; only its digest is stored.
    pub token: BuilderToken,
}

/// Service-level errors for builder registry operations.
#[derive(Debug, Error)]
pub enum BuilderRegistryServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] BuilderDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] BuilderRepositoryError),
}

/// Result type for builder registry service operations.
pub type BuilderRegistryServiceResult<T> = Result<T, BuilderRegistryServiceError>;

/// Builder registration and authentication service.
#[derive(Clone)]
pub struct BuilderRegistryService<R, C>
where
    R: BuilderRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> BuilderRegistryService<R, C>
where
    R: BuilderRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new builder registry service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Registers a new builder and returns its one-time plaintext token.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRegistryServiceError`] when the name is invalid or
    /// already taken, or when persistence fails.
    pub async fn register(
        &self,
        request: RegisterBuilderRequest,
    ) -> BuilderRegistryServiceResult<RegisteredBuilder> {
        let RegisterBuilderRequest { name, trust_level } = request;
        let builder_name = BuilderName::new(name)?;
        let token = BuilderToken::generate();

        let mut builder = Builder::new(builder_name, &token, &*self.clock);
        if let Some(level) = trust_level {
            builder.set_trust_level(level, &*self.clock);
        }
        self.repository.register(&builder).await?;

        info!(builder_id = %builder.id(), name = %builder.name(), "builder registered");
        Ok(RegisteredBuilder { builder, token })
    }

    /// Applies a profile edit.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRepositoryError::NotFound`] (wrapped) when the
    /// builder does not exist, or a domain error when the new name is
    /// invalid.
    pub async fn update(
        &self,
        request: UpdateBuilderRequest,
    ) -> BuilderRegistryServiceResult<Builder> {
        let UpdateBuilderRequest {
            id,
            name,
            trust_level,
        } = request;
        let mut builder = self.load(id).await?;

        if let Some(raw_name) = name {
            builder.rename(BuilderName::new(raw_name)?, &*self.clock);
        }
        if let Some(level) = trust_level {
            builder.set_trust_level(level, &*self.clock);
        }

        self.repository.update_profile(&builder).await?;
        Ok(builder)
    }

    /// Issues a new token for a builder, invalidating the old one.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRegistryServiceError::Repository`] when the builder
    /// is missing or persistence fails.
    pub async fn regenerate_token(
        &self,
        id: BuilderId,
    ) -> BuilderRegistryServiceResult<RegisteredBuilder> {
        let mut builder = self.load(id).await?;
        let token = BuilderToken::generate();
        builder.rotate_token(&token, &*self.clock);
        self.repository.update_profile(&builder).await?;

        info!(builder_id = %id, "builder token regenerated");
        Ok(RegisteredBuilder { builder, token })
    }

    /// Resolves a plaintext bearer token to its builder.
    ///
    /// Returns `Ok(None)` for unknown tokens.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRegistryServiceError::Repository`] when persistence
    /// lookup fails.
    pub async fn authenticate(&self, raw_token: &str) -> BuilderRegistryServiceResult<Option<Builder>> {
        let digest = BuilderToken::from_raw(raw_token).digest();
        Ok(self.repository.find_by_token(&digest).await?)
    }

    /// Finds a builder by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRegistryServiceError::Repository`] when persistence
    /// lookup fails.
    pub async fn find_by_id(&self, id: BuilderId) -> BuilderRegistryServiceResult<Option<Builder>> {
        Ok(self.repository.find_builder(id).await?)
    }

    /// Finds a builder by unique name.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRegistryServiceError::Domain`] when the name string
    /// fails validation, or [`BuilderRegistryServiceError::Repository`] when
    /// persistence lookup fails.
    pub async fn find_by_name(&self, name: &str) -> BuilderRegistryServiceResult<Option<Builder>> {
        let builder_name = BuilderName::new(name)?;
        Ok(self.repository.find_by_name(&builder_name).await?)
    }

    /// Returns every registered builder, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRegistryServiceError::Repository`] when persistence
    /// lookup fails.
    pub async fn list_all(&self) -> BuilderRegistryServiceResult<Vec<Builder>> {
        Ok(self.repository.list_builders().await?)
    }

    /// Deletes an idle builder and its capability entries.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRepositoryError::Busy`] (wrapped) while the builder
    /// holds a task, or [`BuilderRepositoryError::NotFound`] when it does not
    /// exist.
    pub async fn delete(&self, id: BuilderId) -> BuilderRegistryServiceResult<()> {
        self.repository.delete_builder(id).await?;
        info!(builder_id = %id, "builder deleted");
        Ok(())
    }

    async fn load(&self, id: BuilderId) -> BuilderRegistryServiceResult<Builder> {
        self.repository
            .find_builder(id)
            .await?
            .ok_or(BuilderRegistryServiceError::Repository(
                BuilderRepositoryError::NotFound(id),
            ))
    }
}
