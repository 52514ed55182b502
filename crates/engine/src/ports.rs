use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bridge_common::error::BridgeResult;

use crate::models::{
    BusinessPartner, ChangelogPage, EntityKind, Relation, ResolvedPage, UpsertResult,
};

/// Paged read of the upstream changelog.
#[async_trait]
pub trait ChangelogSource: Send + Sync {
    /// Entries modified at or after `from_time`, optionally restricted to one
    /// kind. `page_cursor` is `None` for the first page.
    async fn list_changelog(
        &self,
        from_time: DateTime<Utc>,
        kind: Option<EntityKind>,
        page_cursor: Option<&str>,
    ) -> BridgeResult<ChangelogPage>;
}

/// Batched lookup of full upstream entities by external id.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    async fn resolve_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[String],
        page_cursor: Option<&str>,
    ) -> BridgeResult<ResolvedPage>;
}

/// Downstream partner store.
#[async_trait]
pub trait PartnerSink: Send + Sync {
    /// Upsert keyed by external id.
    async fn upsert_business_partners(
        &self,
        partners: &[BusinessPartner],
    ) -> BridgeResult<UpsertResult>;

    /// Stored partners of `kind` including their relations.
    async fn get_business_partners_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[String],
    ) -> BridgeResult<Vec<BusinessPartner>>;

    async fn upsert_relations(&self, relations: &[Relation]) -> BridgeResult<UpsertResult>;

    async fn delete_relations(&self, relations: &[Relation]) -> BridgeResult<()>;
}

#[async_trait]
impl<T: ChangelogSource + ?Sized> ChangelogSource for Arc<T> {
    async fn list_changelog(
        &self,
        from_time: DateTime<Utc>,
        kind: Option<EntityKind>,
        page_cursor: Option<&str>,
    ) -> BridgeResult<ChangelogPage> {
        (**self).list_changelog(from_time, kind, page_cursor).await
    }
}

#[async_trait]
impl<T: EntityResolver + ?Sized> EntityResolver for Arc<T> {
    async fn resolve_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[String],
        page_cursor: Option<&str>,
    ) -> BridgeResult<ResolvedPage> {
        (**self)
            .resolve_by_external_ids(kind, external_ids, page_cursor)
            .await
    }
}

#[async_trait]
impl<T: PartnerSink + ?Sized> PartnerSink for Arc<T> {
    async fn upsert_business_partners(
        &self,
        partners: &[BusinessPartner],
    ) -> BridgeResult<UpsertResult> {
        (**self).upsert_business_partners(partners).await
    }

    async fn get_business_partners_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[String],
    ) -> BridgeResult<Vec<BusinessPartner>> {
        (**self)
            .get_business_partners_by_external_ids(kind, external_ids)
            .await
    }

    async fn upsert_relations(&self, relations: &[Relation]) -> BridgeResult<UpsertResult> {
        (**self).upsert_relations(relations).await
    }

    async fn delete_relations(&self, relations: &[Relation]) -> BridgeResult<()> {
        (**self).delete_relations(relations).await
    }
}
