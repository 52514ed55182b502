use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Business-partner kinds published by the Gate changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    LegalEntity,
    Site,
    Address,
}

impl EntityKind {
    /// Processing order for a full changelog run: parents before children.
    pub const PROCESSING_ORDER: [EntityKind; 3] =
        [Self::LegalEntity, Self::Site, Self::Address];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegalEntity => "LEGAL_ENTITY",
            Self::Site => "SITE",
            Self::Address => "ADDRESS",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::PROCESSING_ORDER
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown business partner type: {value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    pub external_id: String,
    pub business_partner_type: EntityKind,
    pub modified_at: DateTime<Utc>,
}

/// One page of changelog entries plus the cursor of the following page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangelogPage {
    pub entries: Vec<ChangelogEntry>,
    pub next_cursor: Option<String>,
}

// ── Upstream entities ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressData {
    #[serde(default)]
    pub name: Option<String>,
    pub country: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub external_id: String,
    #[serde(default)]
    pub legal_entity_external_id: Option<String>,
    #[serde(default)]
    pub site_external_id: Option<String>,
    pub address: AddressData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteData {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub external_id: String,
    #[serde(default)]
    pub legal_entity_external_id: Option<String>,
    pub site: SiteData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierData {
    #[serde(rename = "type")]
    pub identifier_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalEntityData {
    pub legal_name: String,
    #[serde(default)]
    pub legal_short_name: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<IdentifierData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalEntityRecord {
    pub external_id: String,
    pub legal_entity: LegalEntityData,
}

/// A resolved upstream entity. Every consumer matches all three variants.
#[derive(Debug, Clone, PartialEq)]
pub enum BpnResponse {
    Address(AddressRecord),
    Site(SiteRecord),
    LegalEntity(LegalEntityRecord),
}

impl BpnResponse {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Address(_) => EntityKind::Address,
            Self::Site(_) => EntityKind::Site,
            Self::LegalEntity(_) => EntityKind::LegalEntity,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            Self::Address(a) => &a.external_id,
            Self::Site(s) => &s.external_id,
            Self::LegalEntity(le) => &le.external_id,
        }
    }
}

/// One resolver page. `total_count` is the number of entities the resolver
/// will return across all pages for the requested ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPage {
    pub items: Vec<BpnResponse>,
    pub next_page_cursor: Option<String>,
    pub total_count: u64,
}

// ── Downstream records ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeKey {
    pub technical_key: String,
}

impl TypeKey {
    pub fn new(technical_key: impl Into<String>) -> Self {
        Self {
            technical_key: technical_key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerName {
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub name_type: Option<TypeKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerIdentifier {
    #[serde(rename = "type")]
    pub identifier_type: TypeKey,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryCode {
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thoroughfare {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<CountryCode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localities: Vec<TextValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_codes: Vec<TextValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thoroughfares: Vec<Thoroughfare>,
}

/// Relation as embedded in a downstream business partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRelation {
    pub start_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node_data_source: Option<String>,
    pub end_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_node_data_source: Option<String>,
    #[serde(rename = "type")]
    pub relation_type: TypeKey,
}

/// Downstream business partner as stored by the SaaS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPartner {
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeKey>,
    #[serde(default)]
    pub names: Vec<PartnerName>,
    #[serde(default)]
    pub identifiers: Vec<PartnerIdentifier>,
    #[serde(default)]
    pub addresses: Vec<PartnerAddress>,
    #[serde(default)]
    pub relations: Vec<PartnerRelation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    Parent,
}

impl RelationType {
    pub fn technical_key(&self) -> &'static str {
        match self {
            Self::Parent => "PARENT",
        }
    }
}

/// Directed relation between two downstream partners, identified by their
/// external ids. For `Parent`, `start` is the parent and `end` the child.
///
/// A node without a data source lives in the bridge's own data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    pub start_external_id: String,
    pub start_data_source: Option<String>,
    pub end_external_id: String,
    pub end_data_source: Option<String>,
    pub relation_type: RelationType,
}

impl Relation {
    pub fn parent(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            start_external_id: parent.into(),
            start_data_source: None,
            end_external_id: child.into(),
            end_data_source: None,
            relation_type: RelationType::Parent,
        }
    }

    pub fn with_data_sources(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_data_source = start;
        self.end_data_source = end;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertFailure {
    pub external_id: Option<String>,
    pub message: String,
}

/// Result of a downstream batch write. The write is only complete when
/// `number_of_failed` is zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertResult {
    pub failures: Vec<UpsertFailure>,
    pub number_of_failed: usize,
}

impl UpsertResult {
    pub fn is_complete(&self) -> bool {
        self.number_of_failed == 0 && self.failures.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.number_of_failed.max(self.failures.len())
    }

    pub fn describe_failures(&self) -> String {
        self.failures
            .iter()
            .map(|f| match &f.external_id {
                Some(id) => format!("{id}: {}", f.message),
                None => f.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
