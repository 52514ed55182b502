use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use bridge_common::error::{BridgeError, BridgeResult};
use bridge_engine::mapping::PartnerTypeKeys;
use bridge_engine::models::{BusinessPartner, EntityKind, Relation, UpsertResult};
use bridge_engine::ports::PartnerSink;

use super::models::{
    to_partner_relation, BusinessPartnersResponse, RelationsRequest, UpsertRequest,
    UpsertResponse, API_ERROR_ON_FAILURES, FETCH_RELATIONS, UPSERT_BY_EXTERNAL_ID,
};
use crate::http::{execute_with_retry, json_with_retry, HttpClientError};

const BUSINESS_PARTNER_PATH: &str = "/businesspartners";
const RELATIONS_PATH: &str = "/relations";
const DELETE_RELATIONS_PATH: &str = "/relations/delete";
const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Clone)]
pub struct SaasClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub data_source: String,
    pub legal_entity_type: String,
    pub site_type: String,
    pub address_type: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl SaasClientConfig {
    /// Load SaaS config from environment.
    ///
    /// Returns `Ok(None)` if `SAAS_BASE_URL` is not set. Returns `Err` if it is
    /// set but the API key or data source is missing.
    pub fn from_env() -> Result<Option<Self>, String> {
        let base_url = match std::env::var("SAAS_BASE_URL").ok() {
            Some(v) => v,
            None => return Ok(None),
        };
        let api_key = std::env::var("SAAS_API_KEY")
            .map_err(|_| "SAAS_API_KEY is required when SAAS_BASE_URL is set".to_string())?;
        let data_source = std::env::var("SAAS_DATASOURCE")
            .map_err(|_| "SAAS_DATASOURCE is required when SAAS_BASE_URL is set".to_string())?;

        let defaults = PartnerTypeKeys::default();
        let legal_entity_type =
            std::env::var("SAAS_LEGAL_ENTITY_TYPE").unwrap_or(defaults.legal_entity);
        let site_type = std::env::var("SAAS_SITE_TYPE").unwrap_or(defaults.site);
        let address_type = std::env::var("SAAS_ADDRESS_TYPE").unwrap_or(defaults.address);
        let max_retries = std::env::var("SAAS_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let timeout_secs = std::env::var("SAAS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            data_source,
            legal_entity_type,
            site_type,
            address_type,
            max_retries,
            timeout_secs,
        }))
    }

    pub fn type_keys(&self) -> PartnerTypeKeys {
        PartnerTypeKeys {
            legal_entity: self.legal_entity_type.clone(),
            site: self.site_type.clone(),
            address: self.address_type.clone(),
        }
    }
}

fn unavailable(e: HttpClientError) -> BridgeError {
    BridgeError::DownstreamUnavailable(e.to_string())
}

/// Client for the SaaS business partner and relation endpoints.
#[derive(Clone)]
pub struct SaasClient {
    client: Client,
    config: SaasClientConfig,
}

impl SaasClient {
    pub fn new(config: SaasClientConfig) -> Result<Self, reqwest::Error> {
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

    pub fn config(&self) -> &SaasClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, &self.config.api_key)
    }

    fn wire_relations(&self, relations: &[Relation]) -> RelationsRequest {
        RelationsRequest {
            relations: relations
                .iter()
                .map(|r| to_partner_relation(r, &self.config.data_source))
                .collect(),
        }
    }
}

#[async_trait]
impl PartnerSink for SaasClient {
    async fn upsert_business_partners(
        &self,
        partners: &[BusinessPartner],
    ) -> BridgeResult<UpsertResult> {
        if partners.is_empty() {
            return Ok(UpsertResult::default());
        }

        let url = self.url(BUSINESS_PARTNER_PATH);
        let request = UpsertRequest {
            storage: &self.config.data_source,
            business_partners: partners,
            features_on: vec![UPSERT_BY_EXTERNAL_ID, API_ERROR_ON_FAILURES],
        };

        let response: UpsertResponse = json_with_retry(self.config.max_retries, || {
            self.authorized(self.client.put(&url)).json(&request)
        })
        .await
        .map_err(unavailable)?;

        tracing::debug!(
            sent = partners.len(),
            failed = response.number_of_failed,
            "upserted business partners"
        );
        Ok(response.into())
    }

    async fn get_business_partners_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[String],
    ) -> BridgeResult<Vec<BusinessPartner>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(BUSINESS_PARTNER_PATH);
        let type_keys = self.config.type_keys();
        let query = [
            ("dataSource", self.config.data_source.clone()),
            ("typeTechnicalKeys", type_keys.for_kind(kind).to_string()),
            ("externalId", external_ids.join(",")),
            ("limit", external_ids.len().to_string()),
            ("featuresOn", FETCH_RELATIONS.to_string()),
        ];

        let response: BusinessPartnersResponse =
            json_with_retry(self.config.max_retries, || {
                self.authorized(self.client.get(&url)).query(&query)
            })
            .await
            .map_err(unavailable)?;
        Ok(response.values)
    }

    async fn upsert_relations(&self, relations: &[Relation]) -> BridgeResult<UpsertResult> {
        if relations.is_empty() {
            return Ok(UpsertResult::default());
        }

        let url = self.url(RELATIONS_PATH);
        let request = self.wire_relations(relations);
        let response: UpsertResponse = json_with_retry(self.config.max_retries, || {
            self.authorized(self.client.put(&url)).json(&request)
        })
        .await
        .map_err(unavailable)?;
        Ok(response.into())
    }

    async fn delete_relations(&self, relations: &[Relation]) -> BridgeResult<()> {
        if relations.is_empty() {
            return Ok(());
        }

        let url = self.url(DELETE_RELATIONS_PATH);
        let request = self.wire_relations(relations);
        execute_with_retry(self.config.max_retries, || {
            self.authorized(self.client.post(&url)).json(&request)
        })
        .await
        .map_err(unavailable)?;

        tracing::debug!(deleted = relations.len(), "deleted relations");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_engine::models::{BpnResponse, SiteData, SiteRecord, TypeKey};
    use bridge_engine::RelationReconciler;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn test_config() -> SaasClientConfig {
        SaasClientConfig {
            base_url: "http://localhost".to_string(),
            api_key: "secret".to_string(),
            data_source: "catenax-gate".to_string(),
            legal_entity_type: "LEGAL_ENTITY".to_string(),
            site_type: "ORGANIZATIONAL_UNIT".to_string(),
            address_type: "BP_ADDRESS".to_string(),
            max_retries: 1,
            timeout_secs: 5,
        }
    }

    fn client(server: &MockServer) -> SaasClient {
        SaasClient::new(test_config())
            .unwrap()
            .with_base_url(&server.uri())
    }

    fn partner(id: &str) -> BusinessPartner {
        BusinessPartner {
            external_id: id.to_string(),
            data_source: Some("catenax-gate".to_string()),
            types: vec![TypeKey::new("BP_ADDRESS")],
            names: vec![],
            identifiers: vec![],
            addresses: vec![],
            relations: vec![],
        }
    }

    #[tokio::test]
    async fn upsert_sends_storage_features_and_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(BUSINESS_PARTNER_PATH))
            .and(header(API_KEY_HEADER, "secret"))
            .and(body_partial_json(serde_json::json!({
                "storage": "catenax-gate",
                "featuresOn": ["UPSERT_BY_EXTERNAL_ID", "API_ERROR_ON_FAILURES"],
                "businessPartners": [{"externalId": "A1"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"failures": [], "numberOfFailed": 0})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .upsert_business_partners(&[partner("A1")])
            .await
            .unwrap();
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn upsert_reports_per_record_failures() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(BUSINESS_PARTNER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "failures": [{"externalId": "A2", "message": "invalid country"}],
                "numberOfFailed": 1
            })))
            .mount(&server)
            .await;

        let result = client(&server)
            .upsert_business_partners(&[partner("A1"), partner("A2")])
            .await
            .unwrap();
        assert_eq!(result.failed(), 1);
        assert_eq!(result.failures[0].external_id.as_deref(), Some("A2"));
    }

    #[tokio::test]
    async fn lookup_joins_ids_and_fetches_relations() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(BUSINESS_PARTNER_PATH))
            .and(query_param("dataSource", "catenax-gate"))
            .and(query_param("typeTechnicalKeys", "ORGANIZATIONAL_UNIT"))
            .and(query_param("externalId", "S1,S2"))
            .and(query_param("featuresOn", "FETCH_RELATIONS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{
                    "externalId": "S1",
                    "relations": [{
                        "startNode": "LE1",
                        "endNode": "S1",
                        "type": {"technicalKey": "PARENT"}
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let ids = vec!["S1".to_string(), "S2".to_string()];
        let partners = client(&server)
            .get_business_partners_by_external_ids(EntityKind::Site, &ids)
            .await
            .unwrap();
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].relations[0].start_node, "LE1");
    }

    #[tokio::test]
    async fn empty_inputs_skip_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client
            .get_business_partners_by_external_ids(EntityKind::Address, &[])
            .await
            .unwrap()
            .is_empty());
        assert!(client.upsert_relations(&[]).await.unwrap().is_complete());
        client.delete_relations(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn relations_are_written_and_deleted_as_parent_edges() {
        let server = MockServer::start().await;
        let edge = serde_json::json!({"relations": [{
            "startNode": "LE1",
            "startNodeDataSource": "catenax-gate",
            "endNode": "A1",
            "endNodeDataSource": "catenax-gate",
            "type": {"technicalKey": "PARENT"}
        }]});

        Mock::given(method("PUT"))
            .and(path(RELATIONS_PATH))
            .and(body_partial_json(edge.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DELETE_RELATIONS_PATH))
            .and(body_partial_json(edge))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let relations = [Relation::parent("LE1", "A1")];
        assert!(client.upsert_relations(&relations).await.unwrap().is_complete());
        client.delete_relations(&relations).await.unwrap();
    }

    #[tokio::test]
    async fn stale_edge_from_another_data_source_is_deleted_where_it_lives() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(BUSINESS_PARTNER_PATH))
            .and(query_param("externalId", "S1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{
                    "externalId": "S1",
                    "relations": [{
                        "startNode": "LE0",
                        "startNodeDataSource": "legacy-ds",
                        "endNode": "S1",
                        "endNodeDataSource": "catenax-gate",
                        "type": {"technicalKey": "PARENT"}
                    }]
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DELETE_RELATIONS_PATH))
            .and(body_partial_json(serde_json::json!({"relations": [{
                "startNode": "LE0",
                "startNodeDataSource": "legacy-ds",
                "endNode": "S1",
                "endNodeDataSource": "catenax-gate",
                "type": {"technicalKey": "PARENT"}
            }]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(RELATIONS_PATH))
            .and(body_partial_json(serde_json::json!({"relations": [{
                "startNode": "LE1",
                "startNodeDataSource": "catenax-gate",
                "endNode": "S1",
                "endNodeDataSource": "catenax-gate",
                "type": {"technicalKey": "PARENT"}
            }]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let site = BpnResponse::Site(SiteRecord {
            external_id: "S1".to_string(),
            legal_entity_external_id: Some("LE1".to_string()),
            site: SiteData {
                name: "Plant 1".to_string(),
            },
        });
        let client = client(&server);
        let summary = RelationReconciler::new(&client)
            .reconcile(EntityKind::Site, &[site])
            .await
            .unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.created, 1);
    }

    #[tokio::test]
    async fn server_errors_map_to_downstream_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(BUSINESS_PARTNER_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server)
            .upsert_business_partners(&[partner("A1")])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::DownstreamUnavailable(_)));
    }

    #[test]
    fn from_env_fails_fast_without_api_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("SAAS_API_KEY");
        std::env::remove_var("SAAS_DATASOURCE");
        std::env::remove_var("SAAS_BASE_URL");
        assert!(SaasClientConfig::from_env().unwrap().is_none());

        std::env::set_var("SAAS_BASE_URL", "http://saas.local");
        assert!(SaasClientConfig::from_env().is_err());

        std::env::set_var("SAAS_API_KEY", "k");
        std::env::set_var("SAAS_DATASOURCE", "gate");
        std::env::set_var("SAAS_SITE_TYPE", "PLANT");
        let config = SaasClientConfig::from_env().unwrap().unwrap();
        assert_eq!(config.type_keys().site, "PLANT");
        assert_eq!(config.type_keys().address, "BP_ADDRESS");

        for key in ["SAAS_BASE_URL", "SAAS_API_KEY", "SAAS_DATASOURCE", "SAAS_SITE_TYPE"] {
            std::env::remove_var(key);
        }
    }
}
