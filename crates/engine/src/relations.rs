use std::collections::HashSet;
use std::time::Duration;

use bridge_common::error::{BridgeError, BridgeResult};

use crate::models::{BpnResponse, BusinessPartner, EntityKind, Relation, RelationType};
use crate::ports::PartnerSink;
use crate::timeout::{bounded, Side};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Edges written and removed for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileSummary {
    pub deleted: usize,
    pub created: usize,
}

/// Parent edges implied by an entity's upstream pointers. Legal entities
/// have no parent.
pub fn desired_parent_relations(entity: &BpnResponse) -> Vec<Relation> {
    match entity {
        BpnResponse::LegalEntity(_) => Vec::new(),
        BpnResponse::Site(site) => site
            .legal_entity_external_id
            .iter()
            .map(|le| Relation::parent(le.clone(), site.external_id.clone()))
            .collect(),
        BpnResponse::Address(address) => address
            .legal_entity_external_id
            .iter()
            .chain(address.site_external_id.iter())
            .map(|parent| Relation::parent(parent.clone(), address.external_id.clone()))
            .collect(),
    }
}

/// Stored PARENT edges that point at one of `children`, keeping the data
/// sources the SaaS reported for both nodes.
pub fn existing_parent_relations(
    partners: &[BusinessPartner],
    children: &HashSet<&str>,
) -> Vec<Relation> {
    let parent_key = RelationType::Parent.technical_key();
    partners
        .iter()
        .filter(|p| children.contains(p.external_id.as_str()))
        .flat_map(|p| {
            p.relations.iter().filter(move |r| {
                r.relation_type.technical_key == parent_key && r.end_node == p.external_id
            })
        })
        .map(|r| {
            Relation::parent(r.start_node.clone(), r.end_node.clone()).with_data_sources(
                r.start_node_data_source.clone(),
                r.end_node_data_source.clone(),
            )
        })
        .collect()
}

/// Brings the downstream PARENT edges of a batch of children in line with
/// their upstream pointers: all current edges are deleted, then the desired
/// ones are written.
pub struct RelationReconciler<'a, S: ?Sized> {
    sink: &'a S,
    call_timeout: Duration,
}

impl<'a, S> RelationReconciler<'a, S>
where
    S: PartnerSink + ?Sized,
{
    pub fn new(sink: &'a S) -> Self {
        Self {
            sink,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub async fn reconcile(
        &self,
        kind: EntityKind,
        entities: &[BpnResponse],
    ) -> BridgeResult<ReconcileSummary> {
        match kind {
            EntityKind::LegalEntity => return Ok(ReconcileSummary::default()),
            EntityKind::Site | EntityKind::Address => {}
        }

        let children: Vec<String> = entities
            .iter()
            .filter(|e| e.kind() == kind)
            .map(|e| e.external_id().to_string())
            .collect();
        if children.is_empty() {
            return Ok(ReconcileSummary::default());
        }
        let child_set: HashSet<&str> = children.iter().map(String::as_str).collect();

        let mut desired: Vec<Relation> = Vec::new();
        let mut seen = HashSet::new();
        for relation in entities
            .iter()
            .filter(|e| e.kind() == kind)
            .flat_map(desired_parent_relations)
        {
            if seen.insert(relation.clone()) {
                desired.push(relation);
            }
        }

        let stored = bounded(
            self.call_timeout,
            Side::Downstream,
            "fetch business partners",
            self.sink.get_business_partners_by_external_ids(kind, &children),
        )
        .await
        .map_err(|e| reconciliation_failure("fetch current relations", e))?;
        let stale = existing_parent_relations(&stored, &child_set);

        if !stale.is_empty() {
            bounded(
                self.call_timeout,
                Side::Downstream,
                "delete relations",
                self.sink.delete_relations(&stale),
            )
            .await
            .map_err(|e| reconciliation_failure("delete relations", e))?;
        }

        if !desired.is_empty() {
            let result = bounded(
                self.call_timeout,
                Side::Downstream,
                "upsert relations",
                self.sink.upsert_relations(&desired),
            )
            .await
            .map_err(|e| reconciliation_failure("upsert relations", e))?;
            if !result.is_complete() {
                return Err(BridgeError::RelationReconciliationFailure(format!(
                    "{} relation(s) rejected: {}",
                    result.failed(),
                    result.describe_failures()
                )));
            }
        }

        tracing::debug!(
            kind = %kind,
            children = children.len(),
            deleted = stale.len(),
            created = desired.len(),
            "reconciled parent relations"
        );

        Ok(ReconcileSummary {
            deleted: stale.len(),
            created: desired.len(),
        })
    }
}

fn reconciliation_failure(step: &str, err: BridgeError) -> BridgeError {
    BridgeError::RelationReconciliationFailure(format!("{step}: {err}"))
}
