use bridge_db::sync::models::BridgeSyncType;

use crate::models::EntityKind;

/// Entity kinds a sync type covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    AllKinds,
    Kind(EntityKind),
}

impl SyncScope {
    /// `None` for sync types the changelog import does not drive.
    pub fn for_sync_type(sync_type: BridgeSyncType) -> Option<Self> {
        match sync_type {
            BridgeSyncType::ChangelogImport => Some(Self::AllKinds),
            BridgeSyncType::ChangelogImportAddress => Some(Self::Kind(EntityKind::Address)),
            BridgeSyncType::ChangelogImportSite => Some(Self::Kind(EntityKind::Site)),
            BridgeSyncType::ChangelogImportLegalEntity => {
                Some(Self::Kind(EntityKind::LegalEntity))
            }
            BridgeSyncType::SaasImport => None,
        }
    }

    /// Filter passed to the changelog source.
    pub fn kind_filter(&self) -> Option<EntityKind> {
        match self {
            Self::AllKinds => None,
            Self::Kind(kind) => Some(*kind),
        }
    }

    /// Kinds in processing order.
    pub fn kinds(&self) -> Vec<EntityKind> {
        match self {
            Self::AllKinds => EntityKind::PROCESSING_ORDER.to_vec(),
            Self::Kind(kind) => vec![*kind],
        }
    }

    pub fn covers(&self, kind: EntityKind) -> bool {
        match self {
            Self::AllKinds => true,
            Self::Kind(k) => *k == kind,
        }
    }
}
