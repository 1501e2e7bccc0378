// crates/tenant-gate-core/src/runtime/scoped_registry.rs
// ============================================================================
// Module: Scoped Registry Store
// Description: Tenant-confining decorator for the named-singleton family.
// Purpose: Enforce name-prefix isolation on every registry store operation.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`ScopedRegistryStore`] wraps any [`ModelRegistryStore`] so that every
//! operation is confined to one tenant. Registered models and prompts are
//! globally unique by name, so tenancy is encoded as a `"<tenant>::"` prefix
//! on the stored name: added on every write path, stripped from every
//! returned entity, and never visible to the caller. Creates additionally
//! record the reserved tenant tag so searches can inject a conjunctive
//! tenant predicate instead of filtering client-side.
//!
//! Model versions carry no tag of their own; version search rewrites
//! caller-authored `name = '...'` clauses to the stored form, then retains
//! only versions whose parent name carries this tenant's prefix before
//! stripping. A foreign name passed to any by-name operation resolves to a
//! key that cannot exist under this tenant's prefix, so it reports plain
//! absence rather than confirming what other tenants store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::entities::ModelVersion;
use crate::core::entities::Page;
use crate::core::entities::Prompt;
use crate::core::entities::RegisteredModel;
use crate::core::entities::Tag;
use crate::core::entities::Webhook;
use crate::core::naming::NameTransformer;
use crate::core::naming::TENANT_TAG_KEY;
use crate::core::naming::append_tenant_filter;
use crate::core::naming::inject_tenant_tag;
use crate::core::naming::is_reserved_tag_key;
use crate::core::naming::rewrite_name_equality;
use crate::core::naming::strip_tenant_tag;
use crate::core::tenant::TenantContext;
use crate::interfaces::ModelRegistryStore;
use crate::interfaces::RegistryCapabilities;
use crate::interfaces::SearchQuery;
use crate::interfaces::StoreError;
use crate::interfaces::StoreResult;

// ============================================================================
// SECTION: Scoped Registry Store
// ============================================================================

/// Tenant-confining wrapper around a model registry store.
///
/// # Invariants
/// - Capabilities are resolved from the wrapped store once at construction.
/// - Stored names always carry the tenant prefix; names returned to the
///   caller never do.
#[derive(Clone)]
pub struct ScopedRegistryStore {
    /// Wrapped store receiving confined operations.
    inner: Arc<dyn ModelRegistryStore + Send + Sync>,
    /// Active tenant context for every operation on this wrapper.
    context: TenantContext,
    /// Prefix mapping for this tenant.
    transformer: NameTransformer,
    /// Backend surfaces resolved at construction.
    capabilities: RegistryCapabilities,
}

impl ScopedRegistryStore {
    /// Wraps a registry store for the given tenant context.
    #[must_use]
    pub fn from_store(
        store: impl ModelRegistryStore + Send + Sync + 'static,
        context: TenantContext,
    ) -> Self {
        Self::new(Arc::new(store), context)
    }

    /// Wraps an existing shared registry store for the given tenant context.
    #[must_use]
    pub fn new(store: Arc<dyn ModelRegistryStore + Send + Sync>, context: TenantContext) -> Self {
        let capabilities = store.capabilities();
        let transformer = NameTransformer::new(&context.tenant);
        Self {
            inner: store,
            context,
            transformer,
            capabilities,
        }
    }

    /// Returns the tenant context this wrapper is confined to.
    #[must_use]
    pub const fn context(&self) -> &TenantContext {
        &self.context
    }

    /// Returns a registered model with stored names mapped to visible form.
    fn strip_model(&self, mut model: RegisteredModel) -> RegisteredModel {
        let visible = self.transformer.from_internal(&model.name).to_string();
        model.name = visible;
        model.latest_versions =
            model.latest_versions.into_iter().map(|version| self.strip_version(version)).collect();
        model
    }

    /// Returns a model version with its stored name mapped to visible form.
    fn strip_version(&self, mut version: ModelVersion) -> ModelVersion {
        let visible = self.transformer.from_internal(&version.name).to_string();
        version.name = visible;
        version
    }

    /// Returns a prompt with its stored name mapped to visible form.
    fn strip_prompt(&self, mut prompt: Prompt) -> Prompt {
        let visible = self.transformer.from_internal(&prompt.name).to_string();
        prompt.name = visible;
        prompt
    }

    /// Rejects writes addressing the reserved tenant tag key.
    fn reject_reserved_key(key: &str) -> StoreResult<()> {
        if is_reserved_tag_key(key) {
            return Err(StoreError::InvalidParameter(format!(
                "tag key {TENANT_TAG_KEY} is reserved"
            )));
        }
        Ok(())
    }
}

impl ModelRegistryStore for ScopedRegistryStore {
    fn capabilities(&self) -> RegistryCapabilities {
        self.capabilities
    }

    fn create_registered_model(
        &self,
        name: &str,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<RegisteredModel> {
        let internal = self.transformer.to_internal(name);
        let scoped_tags = inject_tenant_tag(tags, &self.context.tenant);
        let model = self.inner.create_registered_model(&internal, &scoped_tags, description)?;
        Ok(self.strip_model(model))
    }

    fn get_registered_model(&self, name: &str) -> StoreResult<RegisteredModel> {
        let internal = self.transformer.to_internal(name);
        let model = self.inner.get_registered_model(&internal)?;
        Ok(self.strip_model(model))
    }

    fn rename_registered_model(&self, name: &str, new_name: &str) -> StoreResult<RegisteredModel> {
        let internal = self.transformer.to_internal(name);
        let internal_new = self.transformer.to_internal(new_name);
        let model = self.inner.rename_registered_model(&internal, &internal_new)?;
        Ok(self.strip_model(model))
    }

    fn update_registered_model(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<RegisteredModel> {
        let internal = self.transformer.to_internal(name);
        let model = self.inner.update_registered_model(&internal, description)?;
        Ok(self.strip_model(model))
    }

    fn delete_registered_model(&self, name: &str) -> StoreResult<()> {
        let internal = self.transformer.to_internal(name);
        self.inner.delete_registered_model(&internal)
    }

    fn get_latest_versions(&self, name: &str, stages: &[String]) -> StoreResult<Vec<ModelVersion>> {
        let internal = self.transformer.to_internal(name);
        let versions = self.inner.get_latest_versions(&internal, stages)?;
        Ok(versions.into_iter().map(|version| self.strip_version(version)).collect())
    }

    fn search_registered_models(&self, query: &SearchQuery) -> StoreResult<Page<RegisteredModel>> {
        let rewritten = query
            .filter
            .as_deref()
            .map(|filter| rewrite_name_equality(filter, &self.transformer));
        let scoped = SearchQuery {
            filter: Some(append_tenant_filter(rewritten.as_deref(), &self.context.tenant)),
            ..query.clone()
        };
        let page = self.inner.search_registered_models(&scoped)?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .filter(|model| self.transformer.owns(&model.name))
                .map(|model| self.strip_model(model))
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    fn set_registered_model_tag(&self, name: &str, tag: &Tag) -> StoreResult<()> {
        Self::reject_reserved_key(&tag.key)?;
        let internal = self.transformer.to_internal(name);
        self.inner.set_registered_model_tag(&internal, tag)
    }

    fn delete_registered_model_tag(&self, name: &str, key: &str) -> StoreResult<()> {
        Self::reject_reserved_key(key)?;
        let internal = self.transformer.to_internal(name);
        self.inner.delete_registered_model_tag(&internal, key)
    }

    fn create_model_version(
        &self,
        name: &str,
        source: Option<&str>,
        run_id: Option<&str>,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<ModelVersion> {
        let internal = self.transformer.to_internal(name);
        let scoped_tags = strip_tenant_tag(tags);
        let version =
            self.inner.create_model_version(&internal, source, run_id, &scoped_tags, description)?;
        Ok(self.strip_version(version))
    }

    fn get_model_version(&self, name: &str, version: i64) -> StoreResult<ModelVersion> {
        let internal = self.transformer.to_internal(name);
        let entry = self.inner.get_model_version(&internal, version)?;
        Ok(self.strip_version(entry))
    }

    fn update_model_version(
        &self,
        name: &str,
        version: i64,
        description: Option<&str>,
    ) -> StoreResult<ModelVersion> {
        let internal = self.transformer.to_internal(name);
        let entry = self.inner.update_model_version(&internal, version, description)?;
        Ok(self.strip_version(entry))
    }

    fn transition_model_version_stage(
        &self,
        name: &str,
        version: i64,
        stage: &str,
        archive_existing: bool,
    ) -> StoreResult<ModelVersion> {
        let internal = self.transformer.to_internal(name);
        let entry =
            self.inner.transition_model_version_stage(&internal, version, stage, archive_existing)?;
        Ok(self.strip_version(entry))
    }

    fn delete_model_version(&self, name: &str, version: i64) -> StoreResult<()> {
        let internal = self.transformer.to_internal(name);
        self.inner.delete_model_version(&internal, version)
    }

    fn get_model_version_download_uri(&self, name: &str, version: i64) -> StoreResult<String> {
        let internal = self.transformer.to_internal(name);
        self.inner.get_model_version_download_uri(&internal, version)
    }

    fn search_model_versions(&self, query: &SearchQuery) -> StoreResult<Page<ModelVersion>> {
        let scoped = SearchQuery {
            filter: query
                .filter
                .as_deref()
                .map(|filter| rewrite_name_equality(filter, &self.transformer)),
            ..query.clone()
        };
        let page = self.inner.search_model_versions(&scoped)?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .filter(|version| self.transformer.owns(&version.name))
                .map(|version| self.strip_version(version))
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    fn set_model_version_tag(&self, name: &str, version: i64, tag: &Tag) -> StoreResult<()> {
        Self::reject_reserved_key(&tag.key)?;
        let internal = self.transformer.to_internal(name);
        self.inner.set_model_version_tag(&internal, version, tag)
    }

    fn delete_model_version_tag(&self, name: &str, version: i64, key: &str) -> StoreResult<()> {
        Self::reject_reserved_key(key)?;
        let internal = self.transformer.to_internal(name);
        self.inner.delete_model_version_tag(&internal, version, key)
    }

    fn set_registered_model_alias(&self, name: &str, alias: &str, version: i64) -> StoreResult<()> {
        let internal = self.transformer.to_internal(name);
        self.inner.set_registered_model_alias(&internal, alias, version)
    }

    fn delete_registered_model_alias(&self, name: &str, alias: &str) -> StoreResult<()> {
        let internal = self.transformer.to_internal(name);
        self.inner.delete_registered_model_alias(&internal, alias)
    }

    fn get_model_version_by_alias(&self, name: &str, alias: &str) -> StoreResult<ModelVersion> {
        let internal = self.transformer.to_internal(name);
        let entry = self.inner.get_model_version_by_alias(&internal, alias)?;
        Ok(self.strip_version(entry))
    }

    fn create_prompt(
        &self,
        name: &str,
        template: Option<&str>,
        tags: &[Tag],
        description: Option<&str>,
    ) -> StoreResult<Prompt> {
        let internal = self.transformer.to_internal(name);
        let scoped_tags = inject_tenant_tag(tags, &self.context.tenant);
        let prompt = self.inner.create_prompt(&internal, template, &scoped_tags, description)?;
        Ok(self.strip_prompt(prompt))
    }

    fn get_prompt(&self, name: &str) -> StoreResult<Prompt> {
        let internal = self.transformer.to_internal(name);
        let prompt = self.inner.get_prompt(&internal)?;
        Ok(self.strip_prompt(prompt))
    }

    fn delete_prompt(&self, name: &str) -> StoreResult<()> {
        let internal = self.transformer.to_internal(name);
        self.inner.delete_prompt(&internal)
    }

    fn search_prompts(&self, query: &SearchQuery) -> StoreResult<Page<Prompt>> {
        let rewritten = query
            .filter
            .as_deref()
            .map(|filter| rewrite_name_equality(filter, &self.transformer));
        let scoped = SearchQuery {
            filter: Some(append_tenant_filter(rewritten.as_deref(), &self.context.tenant)),
            ..query.clone()
        };
        let page = self.inner.search_prompts(&scoped)?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .filter(|prompt| self.transformer.owns(&prompt.name))
                .map(|prompt| self.strip_prompt(prompt))
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    fn list_webhooks(&self) -> StoreResult<Vec<Webhook>> {
        if !self.capabilities.webhooks {
            return Ok(Vec::new());
        }
        self.inner.list_webhooks()
    }
}
