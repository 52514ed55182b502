use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;

use bridge_common::error::{BridgeError, BridgeResult};
use bridge_engine::models::{
    AddressRecord, BpnResponse, ChangelogPage, EntityKind, LegalEntityRecord, ResolvedPage,
    SiteRecord,
};
use bridge_engine::ports::{ChangelogSource, EntityResolver};

use super::models::{ChangelogPageResponse, SearchPageResponse};
use crate::http::{json_with_retry, HttpClientError};

const CHANGELOG_PATH: &str = "/api/catena/business-partners/changelog";

#[derive(Debug, Clone)]
pub struct GateClientConfig {
    pub base_url: String,
    pub changelog_page_size: u32,
    pub resolver_page_size: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl GateClientConfig {
    /// Load Gate config from environment. Returns `None` if `GATE_BASE_URL`
    /// is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("GATE_BASE_URL").ok()?;
        let changelog_page_size = std::env::var("GATE_CHANGELOG_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let resolver_page_size = std::env::var("GATE_RESOLVER_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let max_retries = std::env::var("GATE_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let timeout_secs = std::env::var("GATE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            changelog_page_size,
            resolver_page_size,
            max_retries,
            timeout_secs,
        })
    }
}

fn search_path(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Address => "/api/catena/addresses/search",
        EntityKind::Site => "/api/catena/sites/search",
        EntityKind::LegalEntity => "/api/catena/legal-entities/search",
    }
}

fn unavailable(e: HttpClientError) -> BridgeError {
    BridgeError::UpstreamUnavailable(e.to_string())
}

/// Client for the Gate changelog and entity search endpoints.
#[derive(Clone)]
pub struct GateClient {
    client: Client,
    config: GateClientConfig,
}

impl GateClient {
    pub fn new(config: GateClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub async fn fetch_changelog_page(
        &self,
        from_time: DateTime<Utc>,
        kind: Option<EntityKind>,
        page: u32,
    ) -> Result<ChangelogPageResponse, HttpClientError> {
        let url = format!("{}{}", self.config.base_url, CHANGELOG_PATH);
        let mut query = vec![
            (
                "fromTime",
                from_time.to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
            ("page", page.to_string()),
            ("size", self.config.changelog_page_size.to_string()),
        ];
        if let Some(kind) = kind {
            query.push(("lsaType", kind.as_str().to_string()));
        }

        json_with_retry(self.config.max_retries, || {
            self.client.get(&url).query(&query)
        })
        .await
    }

    pub async fn search<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        external_ids: &[String],
        start_after: Option<&str>,
    ) -> Result<SearchPageResponse<T>, HttpClientError> {
        let url = format!("{}{}", self.config.base_url, search_path(kind));
        let mut query = vec![("limit", self.config.resolver_page_size.to_string())];
        if let Some(after) = start_after {
            query.push(("startAfter", after.to_string()));
        }

        json_with_retry(self.config.max_retries, || {
            self.client.post(&url).query(&query).json(external_ids)
        })
        .await
    }
}

#[async_trait]
impl ChangelogSource for GateClient {
    async fn list_changelog(
        &self,
        from_time: DateTime<Utc>,
        kind: Option<EntityKind>,
        page_cursor: Option<&str>,
    ) -> BridgeResult<ChangelogPage> {
        let page = match page_cursor {
            Some(cursor) => cursor.parse::<u32>().map_err(|_| {
                BridgeError::Validation(format!("invalid changelog page cursor: {cursor}"))
            })?,
            None => 0,
        };

        let response = self
            .fetch_changelog_page(from_time, kind, page)
            .await
            .map_err(unavailable)?;
        tracing::debug!(
            page,
            total_pages = response.total_pages,
            entries = response.content.len(),
            "fetched gate changelog page"
        );

        Ok(ChangelogPage {
            next_cursor: response.next_page().map(|p| p.to_string()),
            entries: response.content,
        })
    }
}

fn into_resolved<T>(
    page: SearchPageResponse<T>,
    wrap: impl Fn(T) -> BpnResponse,
) -> ResolvedPage {
    ResolvedPage {
        items: page.content.into_iter().map(wrap).collect(),
        next_page_cursor: page.next_start_after,
        total_count: page.total,
    }
}

#[async_trait]
impl EntityResolver for GateClient {
    async fn resolve_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[String],
        page_cursor: Option<&str>,
    ) -> BridgeResult<ResolvedPage> {
        if external_ids.is_empty() {
            return Ok(ResolvedPage::default());
        }

        let resolved = match kind {
            EntityKind::Address => self
                .search::<AddressRecord>(kind, external_ids, page_cursor)
                .await
                .map(|page| into_resolved(page, BpnResponse::Address)),
            EntityKind::Site => self
                .search::<SiteRecord>(kind, external_ids, page_cursor)
                .await
                .map(|page| into_resolved(page, BpnResponse::Site)),
            EntityKind::LegalEntity => self
                .search::<LegalEntityRecord>(kind, external_ids, page_cursor)
                .await
                .map(|page| into_resolved(page, BpnResponse::LegalEntity)),
        }
        .map_err(unavailable)?;

        Ok(resolved)
    }
}
