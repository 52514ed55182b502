use serde::{Deserialize, Serialize};

use bridge_engine::models::{
    BusinessPartner, PartnerRelation, Relation, TypeKey, UpsertFailure, UpsertResult,
};

pub const UPSERT_BY_EXTERNAL_ID: &str = "UPSERT_BY_EXTERNAL_ID";
pub const API_ERROR_ON_FAILURES: &str = "API_ERROR_ON_FAILURES";
pub const FETCH_RELATIONS: &str = "FETCH_RELATIONS";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest<'a> {
    pub storage: &'a str,
    pub business_partners: &'a [BusinessPartner],
    pub features_on: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Response of the partner and relation upsert endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    #[serde(default)]
    pub failures: Vec<FailureResponse>,
    #[serde(default)]
    pub number_of_failed: usize,
}

impl From<UpsertResponse> for UpsertResult {
    fn from(response: UpsertResponse) -> Self {
        UpsertResult {
            failures: response
                .failures
                .into_iter()
                .map(|f| UpsertFailure {
                    external_id: f.external_id,
                    message: f.message,
                })
                .collect(),
            number_of_failed: response.number_of_failed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessPartnersResponse {
    #[serde(default)]
    pub values: Vec<BusinessPartner>,
}

#[derive(Debug, Serialize)]
pub struct RelationsRequest {
    pub relations: Vec<PartnerRelation>,
}

/// Wire form of `relation`. Nodes without their own data source are placed
/// in `data_source`.
pub fn to_partner_relation(relation: &Relation, data_source: &str) -> PartnerRelation {
    let node_source = |own: &Option<String>| {
        own.clone().or_else(|| Some(data_source.to_string()))
    };
    PartnerRelation {
        start_node: relation.start_external_id.clone(),
        start_node_data_source: node_source(&relation.start_data_source),
        end_node: relation.end_external_id.clone(),
        end_node_data_source: node_source(&relation.end_data_source),
        relation_type: TypeKey::new(relation.relation_type.technical_key()),
    }
}
