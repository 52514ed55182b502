use crate::models::{
    AddressRecord, BpnResponse, BusinessPartner, CountryCode, EntityKind, LegalEntityRecord,
    PartnerAddress, PartnerIdentifier, PartnerName, SiteRecord, TextValue, Thoroughfare, TypeKey,
};

/// Downstream type keys per entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerTypeKeys {
    pub legal_entity: String,
    pub site: String,
    pub address: String,
}

impl Default for PartnerTypeKeys {
    fn default() -> Self {
        Self {
            legal_entity: "LEGAL_ENTITY".to_string(),
            site: "ORGANIZATIONAL_UNIT".to_string(),
            address: "BP_ADDRESS".to_string(),
        }
    }
}

impl PartnerTypeKeys {
    pub fn for_kind(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::LegalEntity => &self.legal_entity,
            EntityKind::Site => &self.site,
            EntityKind::Address => &self.address,
        }
    }
}

const LOCAL_NAME_KEY: &str = "LOCAL";
const SHORT_NAME_KEY: &str = "SHORT";

/// Converts resolved upstream entities into downstream business partners.
/// Relations are left empty; they are written separately.
#[derive(Debug, Clone)]
pub struct PartnerMapper {
    data_source: String,
    type_keys: PartnerTypeKeys,
}

impl PartnerMapper {
    pub fn new(data_source: impl Into<String>, type_keys: PartnerTypeKeys) -> Self {
        Self {
            data_source: data_source.into(),
            type_keys,
        }
    }

    pub fn to_business_partner(&self, entity: &BpnResponse) -> BusinessPartner {
        let mut partner = BusinessPartner {
            external_id: entity.external_id().to_string(),
            data_source: Some(self.data_source.clone()),
            types: vec![TypeKey::new(self.type_keys.for_kind(entity.kind()))],
            names: Vec::new(),
            identifiers: Vec::new(),
            addresses: Vec::new(),
            relations: Vec::new(),
        };
        match entity {
            BpnResponse::LegalEntity(le) => fill_legal_entity(&mut partner, le),
            BpnResponse::Site(site) => fill_site(&mut partner, site),
            BpnResponse::Address(address) => fill_address(&mut partner, address),
        }
        partner
    }
}

fn fill_legal_entity(partner: &mut BusinessPartner, record: &LegalEntityRecord) {
    let le = &record.legal_entity;
    partner.names.push(PartnerName {
        value: le.legal_name.clone(),
        name_type: Some(TypeKey::new(LOCAL_NAME_KEY)),
    });
    if let Some(short) = &le.legal_short_name {
        partner.names.push(PartnerName {
            value: short.clone(),
            name_type: Some(TypeKey::new(SHORT_NAME_KEY)),
        });
    }
    partner.identifiers = le
        .identifiers
        .iter()
        .map(|id| PartnerIdentifier {
            identifier_type: TypeKey::new(&id.identifier_type),
            value: id.value.clone(),
        })
        .collect();
}

fn fill_site(partner: &mut BusinessPartner, record: &SiteRecord) {
    partner.names.push(PartnerName {
        value: record.site.name.clone(),
        name_type: Some(TypeKey::new(LOCAL_NAME_KEY)),
    });
}

fn fill_address(partner: &mut BusinessPartner, record: &AddressRecord) {
    let data = &record.address;
    if let Some(name) = &data.name {
        partner.names.push(PartnerName {
            value: name.clone(),
            name_type: Some(TypeKey::new(LOCAL_NAME_KEY)),
        });
    }
    partner.addresses.push(PartnerAddress {
        country: Some(CountryCode {
            short_name: data.country.clone(),
        }),
        localities: data
            .city
            .iter()
            .map(|city| TextValue {
                value: city.clone(),
            })
            .collect(),
        post_codes: data
            .postal_code
            .iter()
            .map(|code| TextValue {
                value: code.clone(),
            })
            .collect(),
        thoroughfares: data
            .street
            .iter()
            .map(|street| Thoroughfare {
                value: street.clone(),
                number: data.house_number.clone(),
            })
            .collect(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddressData, IdentifierData, LegalEntityData, SiteData};

    fn mapper() -> PartnerMapper {
        PartnerMapper::new("catenax-gate", PartnerTypeKeys::default())
    }

    #[test]
    fn legal_entity_carries_names_and_identifiers() {
        let entity = BpnResponse::LegalEntity(LegalEntityRecord {
            external_id: "LE1".to_string(),
            legal_entity: LegalEntityData {
                legal_name: "Acme GmbH".to_string(),
                legal_short_name: Some("Acme".to_string()),
                identifiers: vec![IdentifierData {
                    identifier_type: "EU_VAT_ID_DE".to_string(),
                    value: "DE123".to_string(),
                }],
            },
        });

        let partner = mapper().to_business_partner(&entity);
        assert_eq!(partner.external_id, "LE1");
        assert_eq!(partner.data_source.as_deref(), Some("catenax-gate"));
        assert_eq!(partner.types, vec![TypeKey::new("LEGAL_ENTITY")]);
        assert_eq!(partner.names.len(), 2);
        assert_eq!(partner.identifiers[0].identifier_type.technical_key, "EU_VAT_ID_DE");
        assert!(partner.relations.is_empty());
    }

    #[test]
    fn site_uses_configured_type_key() {
        let keys = PartnerTypeKeys {
            site: "PLANT".to_string(),
            ..PartnerTypeKeys::default()
        };
        let entity = BpnResponse::Site(SiteRecord {
            external_id: "S1".to_string(),
            legal_entity_external_id: Some("LE1".to_string()),
            site: SiteData {
                name: "Plant North".to_string(),
            },
        });

        let partner = PartnerMapper::new("gate", keys).to_business_partner(&entity);
        assert_eq!(partner.types[0].technical_key, "PLANT");
        assert_eq!(partner.names[0].value, "Plant North");
    }

    #[test]
    fn address_maps_postal_fields() {
        let entity = BpnResponse::Address(AddressRecord {
            external_id: "A1".to_string(),
            legal_entity_external_id: None,
            site_external_id: None,
            address: AddressData {
                name: None,
                country: "DE".to_string(),
                city: Some("Berlin".to_string()),
                postal_code: Some("10115".to_string()),
                street: Some("Invalidenstr.".to_string()),
                house_number: Some("1".to_string()),
            },
        });

        let partner = mapper().to_business_partner(&entity);
        assert_eq!(partner.types[0].technical_key, "BP_ADDRESS");
        assert!(partner.names.is_empty());
        let address = &partner.addresses[0];
        assert_eq!(address.country.as_ref().unwrap().short_name, "DE");
        assert_eq!(address.localities[0].value, "Berlin");
        assert_eq!(address.post_codes[0].value, "10115");
        assert_eq!(address.thoroughfares[0].number.as_deref(), Some("1"));
    }
}
