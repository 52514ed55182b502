use std::time::Duration;

use chrono::{DateTime, Utc};

use bridge_common::error::{BridgeError, BridgeResult};

use crate::models::{ChangelogEntry, EntityKind};
use crate::ports::ChangelogSource;
use crate::timeout::{bounded, Side};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
enum Position {
    Start,
    At(String),
    Exhausted,
}

/// Walks the changelog page by page. Nothing is fetched until `next_page`
/// is called, and `restart` rewinds to the first page.
pub struct ChangelogPager<'a, C: ?Sized> {
    source: &'a C,
    from_time: DateTime<Utc>,
    kind: Option<EntityKind>,
    position: Position,
    pages_read: usize,
    call_timeout: Duration,
}

impl<'a, C> ChangelogPager<'a, C>
where
    C: ChangelogSource + ?Sized,
{
    pub fn new(source: &'a C, from_time: DateTime<Utc>, kind: Option<EntityKind>) -> Self {
        Self {
            source,
            from_time,
            kind,
            position: Position::Start,
            pages_read: 0,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    pub fn restart(&mut self) {
        self.position = Position::Start;
        self.pages_read = 0;
    }

    /// `Ok(None)` once the last page has been returned.
    pub async fn next_page(&mut self) -> BridgeResult<Option<Vec<ChangelogEntry>>> {
        let cursor = match &self.position {
            Position::Exhausted => return Ok(None),
            Position::Start => None,
            Position::At(cursor) => Some(cursor.clone()),
        };

        let page = bounded(
            self.call_timeout,
            Side::Upstream,
            "list changelog",
            self.source
                .list_changelog(self.from_time, self.kind, cursor.as_deref()),
        )
        .await?;
        self.pages_read += 1;

        self.position = match page.next_cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(BridgeError::UpstreamUnavailable(format!(
                    "changelog cursor did not advance past {next}"
                )));
            }
            Some(next) => Position::At(next),
            None => Position::Exhausted,
        };

        Ok(Some(page.entries))
    }

    /// Drains the remaining pages into one list.
    pub async fn collect_all(&mut self) -> BridgeResult<Vec<ChangelogEntry>> {
        let mut entries = Vec::new();
        while let Some(page) = self.next_page().await? {
            entries.extend(page);
        }
        Ok(entries)
    }
}
