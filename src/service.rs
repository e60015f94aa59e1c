//! The provider service trait: the seam the host framework attaches to.
//!
//! The host process speaks the plugin wire protocol, computes plans, and
//! persists state; none of that lives here. What the provider owns is the
//! schema description and the Create/Read/Exists/Update/Delete semantics
//! per resource type, expressed by this trait and implemented by
//! [`crate::provider::ZabbixProvider`].
//!
//! State travels as `serde_json::Value`: the framework hands the declared
//! state in, the provider hands the refreshed state back with every
//! computed field (ids above all) filled from the server's answers.

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::validation;

/// Trait that the provider implementation fulfills for the host framework.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Validate a resource's declared configuration against its schema.
    ///
    /// The default implementation checks types, required attributes, and
    /// range constraints.
    fn validate_resource_config(
        &self,
        resource_type: &str,
        config: &serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let resource_schema = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validation::validate(resource_schema, config))
    }

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(
        &self,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Create a new resource, returning the refreshed state.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Read the current state of a resource.
    ///
    /// An object deleted out-of-band surfaces as
    /// [`ProviderError::NotFound`], which the framework should treat as
    /// absence (see [`ProviderService::exists`]), not as a failure.
    async fn read(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Check whether a resource still exists on the server.
    async fn exists(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<bool, ProviderError>;

    /// Update an existing resource, returning the refreshed state.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: serde_json::Value,
        planned_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management from a bare id,
    /// returning a state seed suitable for a subsequent [`read`].
    ///
    /// [`read`]: ProviderService::read
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;
}
