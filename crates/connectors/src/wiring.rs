use std::time::Duration;

use bridge_common::error::{BridgeError, BridgeResult};
use bridge_db::sync::repositories::SyncRecordRepository;
use bridge_engine::{ChangelogService, ChangelogServiceConfig, PartnerMapper};

use crate::gate::client::{GateClient, GateClientConfig};
use crate::saas::client::{SaasClient, SaasClientConfig};

/// Changelog import reading from the Gate and writing to the SaaS.
pub type GateToSaasService<R> = ChangelogService<R, GateClient, GateClient, SaasClient>;

/// Builds both HTTP clients from the environment. Both sides are required.
pub fn clients_from_env() -> BridgeResult<(GateClient, SaasClient)> {
    let gate_config = GateClientConfig::from_env()
        .ok_or_else(|| BridgeError::Config("GATE_BASE_URL is required but not set".to_string()))?;
    let saas_config = SaasClientConfig::from_env()
        .map_err(BridgeError::Config)?
        .ok_or_else(|| BridgeError::Config("SAAS_BASE_URL is required but not set".to_string()))?;

    let gate = GateClient::new(gate_config)
        .map_err(|e| BridgeError::Config(format!("failed to build gate client: {e}")))?;
    let saas = SaasClient::new(saas_config)
        .map_err(|e| BridgeError::Config(format!("failed to build saas client: {e}")))?;
    Ok((gate, saas))
}

pub fn changelog_service<R: SyncRecordRepository>(
    records: R,
    gate: GateClient,
    saas: SaasClient,
    call_timeout: Duration,
) -> GateToSaasService<R> {
    let mapper = PartnerMapper::new(saas.config().data_source.clone(), saas.config().type_keys());
    ChangelogService::new(records, gate.clone(), gate, saas, mapper)
        .with_config(ChangelogServiceConfig { call_timeout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_db::sync::memory::MemorySyncRecordRepository;
    use bridge_db::sync::models::{BridgeSyncType, SyncStatus};
    use bridge_engine::service::SyncRunner;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate(server: &MockServer) -> GateClient {
        GateClient::new(GateClientConfig {
            base_url: String::new(),
            changelog_page_size: 100,
            resolver_page_size: 50,
            max_retries: 0,
            timeout_secs: 5,
        })
        .unwrap()
        .with_base_url(&server.uri())
    }

    fn saas(server: &MockServer) -> SaasClient {
        SaasClient::new(SaasClientConfig {
            base_url: String::new(),
            api_key: "secret".to_string(),
            data_source: "catenax-gate".to_string(),
            legal_entity_type: "LEGAL_ENTITY".to_string(),
            site_type: "ORGANIZATIONAL_UNIT".to_string(),
            address_type: "BP_ADDRESS".to_string(),
            max_retries: 0,
            timeout_secs: 5,
        })
        .unwrap()
        .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn site_flows_from_gate_to_saas_with_its_parent_edge() {
        let gate_server = MockServer::start().await;
        let saas_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/catena/business-partners/changelog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalElements": 1,
                "totalPages": 1,
                "page": 0,
                "contentSize": 1,
                "content": [{
                    "externalId": "S1",
                    "businessPartnerType": "SITE",
                    "modifiedAt": "2024-03-01T10:00:00Z"
                }]
            })))
            .mount(&gate_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/catena/sites/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 1,
                "nextStartAfter": null,
                "content": [{
                    "externalId": "S1",
                    "legalEntityExternalId": "LE1",
                    "site": {"name": "Plant North"}
                }]
            })))
            .mount(&gate_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/businesspartners"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"failures": [], "numberOfFailed": 0})),
            )
            .expect(1)
            .mount(&saas_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/businesspartners"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"values": []})),
            )
            .mount(&saas_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/relations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&saas_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/relations/delete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&saas_server)
            .await;

        let service = changelog_service(
            MemorySyncRecordRepository::new(),
            gate(&gate_server),
            saas(&saas_server),
            Duration::from_secs(10),
        );
        let snapshot = service.run_once(BridgeSyncType::ChangelogImport).await.unwrap();

        assert_eq!(snapshot.status, SyncStatus::Success);
        assert_eq!(snapshot.count, 1);
    }
}
