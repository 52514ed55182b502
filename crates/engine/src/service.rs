//! Changelog import: reads what changed upstream since the last successful
//! run, resolves the full entities, writes them downstream and keeps their
//! parent relations in step.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use bridge_common::error::{BridgeError, BridgeResult};
use bridge_db::sync::models::{BridgeSyncType, SyncRecord, SyncRecordSnapshot};
use bridge_db::sync::repositories::SyncRecordRepository;

use crate::mapping::PartnerMapper;
use crate::models::{BpnResponse, BusinessPartner, ChangelogEntry, EntityKind};
use crate::pager::ChangelogPager;
use crate::ports::{ChangelogSource, EntityResolver, PartnerSink};
use crate::progress::ProgressTracker;
use crate::relations::RelationReconciler;
use crate::resume::ResumeToken;
use crate::scope::SyncScope;
use crate::timeout::{bounded, Side};

/// Entry points shared by the HTTP trigger and the scheduler.
#[async_trait]
pub trait SyncRunner: Send + Sync {
    async fn status(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecordSnapshot>;

    /// Claims the sync record. Fails with `SyncConflict` while another run
    /// holds it.
    async fn start(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord>;

    /// Executes a run whose record is already RUNNING. Failures of the run
    /// itself are stored on the record; `Err` means the bookkeeping failed.
    async fn run_started(&self, record: SyncRecord) -> BridgeResult<SyncRecordSnapshot>;

    async fn run_once(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecordSnapshot> {
        let record = self.start(sync_type).await?;
        self.run_started(record).await
    }
}

#[derive(Debug, Clone)]
pub struct ChangelogServiceConfig {
    /// Upper bound for every single call to the Gate or the SaaS.
    pub call_timeout: Duration,
}

impl Default for ChangelogServiceConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(300),
        }
    }
}

pub struct ChangelogService<R, C, E, S> {
    records: R,
    changelog: C,
    resolver: E,
    sink: S,
    mapper: PartnerMapper,
    config: ChangelogServiceConfig,
}

impl<R, C, E, S> ChangelogService<R, C, E, S>
where
    R: SyncRecordRepository,
    C: ChangelogSource,
    E: EntityResolver,
    S: PartnerSink,
{
    pub fn new(records: R, changelog: C, resolver: E, sink: S, mapper: PartnerMapper) -> Self {
        Self {
            records,
            changelog,
            resolver,
            sink,
            mapper,
            config: ChangelogServiceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ChangelogServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    fn scope_of(sync_type: BridgeSyncType) -> BridgeResult<SyncScope> {
        SyncScope::for_sync_type(sync_type).ok_or_else(|| {
            BridgeError::Validation(format!("{sync_type} is not driven by the changelog import"))
        })
    }

    /// Returns the number of entities written downstream.
    async fn import(
        &self,
        record: &SyncRecord,
        scope: SyncScope,
        token: &mut ResumeToken,
    ) -> BridgeResult<u64> {
        let entries = ChangelogPager::new(&self.changelog, record.from_time, scope.kind_filter())
            .with_call_timeout(self.config.call_timeout)
            .collect_all()
            .await?;
        let changed = group_changelog(entries, scope);

        let mut progress = ProgressTracker::new();
        for (kind, ids) in &changed {
            if !token.is_completed(*kind) {
                progress.estimate(*kind, ids.len() as u64);
            }
        }

        for (kind, ids) in &changed {
            if token.is_completed(*kind) {
                tracing::info!(kind = %kind, "kind already imported by the failed run, skipping");
                continue;
            }
            self.import_kind(record.sync_type, *kind, ids, token, &mut progress)
                .await?;
            token.complete(*kind);
        }

        Ok(progress.imported())
    }

    async fn import_kind(
        &self,
        sync_type: BridgeSyncType,
        kind: EntityKind,
        ids: &[String],
        token: &mut ResumeToken,
        progress: &mut ProgressTracker,
    ) -> BridgeResult<()> {
        let timeout = self.config.call_timeout;
        let reconciler = RelationReconciler::new(&self.sink).with_call_timeout(timeout);
        let mut cursor = token.start_after(kind).map(str::to_string);
        let resumed_after = cursor.clone();
        let mut written: HashSet<String> = HashSet::new();

        loop {
            let page = bounded(
                timeout,
                Side::Upstream,
                "resolve entities",
                self.resolver
                    .resolve_by_external_ids(kind, ids, cursor.as_deref()),
            )
            .await?;
            progress.set_total(kind, page.total_count);

            let batch: Vec<BpnResponse> = page
                .items
                .into_iter()
                .filter(|entity| {
                    if entity.kind() != kind {
                        tracing::warn!(
                            expected = %kind,
                            actual = %entity.kind(),
                            external_id = %entity.external_id(),
                            "resolver returned an entity of another kind, skipping"
                        );
                        return false;
                    }
                    written.insert(entity.external_id().to_string())
                })
                .collect();

            if !batch.is_empty() {
                let partners: Vec<BusinessPartner> = batch
                    .iter()
                    .map(|entity| self.mapper.to_business_partner(entity))
                    .collect();
                let result = bounded(
                    timeout,
                    Side::Downstream,
                    "upsert business partners",
                    self.sink.upsert_business_partners(&partners),
                )
                .await?;
                if !result.is_complete() {
                    return Err(BridgeError::PartialUpsertFailure {
                        failed: result.failed(),
                        details: result.describe_failures(),
                    });
                }
                reconciler.reconcile(kind, &batch).await?;
                progress.advance(batch.len());
            }

            let fraction = progress.fraction();
            self.records
                .set_progress(sync_type, progress.count(), fraction)
                .await?;
            tracing::debug!(
                kind = %kind,
                written = batch.len(),
                count = progress.count(),
                progress = fraction,
                "imported resolver page"
            );

            match page.next_page_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(BridgeError::UpstreamUnavailable(format!(
                        "resolver cursor did not advance past {next}"
                    )));
                }
                Some(next) => {
                    token.page_done(kind, Some(next.clone()));
                    cursor = Some(next);
                }
                None => break,
            }
        }

        for id in unresolved_ids(ids, &written, resumed_after.as_deref()) {
            tracing::warn!(
                kind = %kind,
                external_id = %id,
                "changelog entry did not resolve to an entity, skipping"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<R, C, E, S> SyncRunner for ChangelogService<R, C, E, S>
where
    R: SyncRecordRepository,
    C: ChangelogSource,
    E: EntityResolver,
    S: PartnerSink,
{
    async fn status(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecordSnapshot> {
        Ok(self.records.get_or_create(sync_type).await?.snapshot())
    }

    async fn start(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        Self::scope_of(sync_type)?;
        self.records.start(sync_type).await
    }

    async fn run_started(&self, record: SyncRecord) -> BridgeResult<SyncRecordSnapshot> {
        let sync_type = record.sync_type;
        let scope = Self::scope_of(sync_type)?;
        let mut token = record
            .error_save
            .as_deref()
            .and_then(ResumeToken::parse)
            .unwrap_or_default();

        tracing::info!(
            sync_type = %sync_type,
            from_time = %record.from_time,
            resuming = token.encode().is_some(),
            "changelog import started"
        );

        match self.import(&record, scope, &mut token).await {
            Ok(imported) => {
                let done = self.records.set_success(sync_type).await?;
                tracing::info!(sync_type = %sync_type, imported, "changelog import completed");
                Ok(done.snapshot())
            }
            Err(e) => {
                let msg = e.to_string();
                tracing::error!(sync_type = %sync_type, error = %msg, "changelog import failed");
                let failed = self
                    .records
                    .set_error(sync_type, &msg, token.encode().as_deref())
                    .await?;
                Ok(failed.snapshot())
            }
        }
    }
}

/// Requested ids that no page read in this run returned. The resolver pages
/// in external id order, so a run resumed after `resumed_after` only read
/// the ids that sort past it.
fn unresolved_ids<'a>(
    ids: &'a [String],
    written: &HashSet<String>,
    resumed_after: Option<&str>,
) -> Vec<&'a str> {
    ids.iter()
        .map(String::as_str)
        .filter(|id| resumed_after.map_or(true, |after| *id > after))
        .filter(|id| !written.contains(*id))
        .collect()
}

/// Changed ids per kind in processing order, deduplicated and restricted to
/// the kinds of `scope`.
fn group_changelog(
    entries: Vec<ChangelogEntry>,
    scope: SyncScope,
) -> Vec<(EntityKind, Vec<String>)> {
    let mut by_kind: HashMap<EntityKind, Vec<String>> = HashMap::new();
    let mut seen: HashSet<(EntityKind, String)> = HashSet::new();

    for entry in entries {
        let kind = entry.business_partner_type;
        if !scope.covers(kind) {
            continue;
        }
        if seen.insert((kind, entry.external_id.clone())) {
            by_kind.entry(kind).or_default().push(entry.external_id);
        }
    }

    scope
        .kinds()
        .into_iter()
        .filter_map(|kind| by_kind.remove(&kind).map(|ids| (kind, ids)))
        .collect()
}
