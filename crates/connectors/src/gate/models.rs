use serde::Deserialize;

use bridge_engine::models::ChangelogEntry;

/// Page-number paginated changelog response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogPageResponse {
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub content_size: u32,
    #[serde(default)]
    pub content: Vec<ChangelogEntry>,
}

impl ChangelogPageResponse {
    /// Number of the following page, if any.
    pub fn next_page(&self) -> Option<u32> {
        let next = self.page + 1;
        (next < self.total_pages).then_some(next)
    }
}

/// Cursor paginated search response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPageResponse<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub next_start_after: Option<String>,
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_engine::models::{AddressRecord, EntityKind};

    #[test]
    fn next_page_stops_at_total_pages() {
        let json = serde_json::json!({
            "totalElements": 3,
            "totalPages": 2,
            "page": 0,
            "contentSize": 2,
            "content": [
                {"externalId": "A1", "businessPartnerType": "ADDRESS", "modifiedAt": "2024-01-01T00:00:00Z"},
                {"externalId": "S1", "businessPartnerType": "SITE", "modifiedAt": "2024-01-01T00:00:00Z"}
            ]
        });
        let mut page: ChangelogPageResponse = serde_json::from_value(json).unwrap();
        assert_eq!(page.next_page(), Some(1));
        assert_eq!(page.content[1].business_partner_type, EntityKind::Site);

        page.page = 1;
        assert_eq!(page.next_page(), None);
    }

    #[test]
    fn empty_changelog_has_no_next_page() {
        let page: ChangelogPageResponse = serde_json::from_value(serde_json::json!({
            "totalElements": 0,
            "totalPages": 0,
            "page": 0,
            "contentSize": 0,
            "content": []
        }))
        .unwrap();
        assert_eq!(page.next_page(), None);
    }

    #[test]
    fn search_page_parses_typed_content() {
        let json = serde_json::json!({
            "total": 1,
            "nextStartAfter": null,
            "content": [{
                "externalId": "A1",
                "legalEntityExternalId": "LE1",
                "address": {"country": "DE", "city": "Berlin"}
            }]
        });
        let page: SearchPageResponse<AddressRecord> = serde_json::from_value(json).unwrap();
        assert_eq!(page.total, 1);
        assert!(page.next_start_after.is_none());
        assert_eq!(page.content[0].legal_entity_external_id.as_deref(), Some("LE1"));
    }
}
