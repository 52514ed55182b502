use serde::{Deserialize, Serialize};

use crate::models::EntityKind;

/// Position a failed run reached, stored in the sync record's `errorSave`.
///
/// Kinds in `completed_kinds` were fully written downstream. `kind` and
/// `start_after` name the resolver page the next attempt continues from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeToken {
    #[serde(default)]
    pub completed_kinds: Vec<EntityKind>,
    #[serde(default)]
    pub kind: Option<EntityKind>,
    #[serde(default)]
    pub start_after: Option<String>,
}

impl ResumeToken {
    /// Unreadable tokens are dropped and the run starts over.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable resume token");
                None
            }
        }
    }

    /// `None` when there is nothing to skip on the next attempt.
    pub fn encode(&self) -> Option<String> {
        if self.completed_kinds.is_empty() && self.start_after.is_none() {
            return None;
        }
        serde_json::to_string(self).ok()
    }

    pub fn is_completed(&self, kind: EntityKind) -> bool {
        self.completed_kinds.contains(&kind)
    }

    pub fn start_after(&self, kind: EntityKind) -> Option<&str> {
        match self.kind {
            Some(k) if k == kind => self.start_after.as_deref(),
            _ => None,
        }
    }

    /// Records that every page of `kind` before `next` has been written.
    pub fn page_done(&mut self, kind: EntityKind, next: Option<String>) {
        self.kind = Some(kind);
        self.start_after = next;
    }

    pub fn complete(&mut self, kind: EntityKind) {
        if !self.is_completed(kind) {
            self.completed_kinds.push(kind);
        }
        self.kind = None;
        self.start_after = None;
    }
}
