#![allow(dead_code)]

use std::collections::HashMap;

use anoncreds_bls::{
    cred_def::{
        CredentialDefinition, CredentialDefinitionConfig, CredentialDefinitionPrivate,
        CredentialKeyCorrectnessProof,
    },
    create_credential, create_credential_definition, create_credential_offer,
    create_credential_request, create_revocation_registry_def, create_revocation_status_list,
    create_schema,
    credential::{Credential, CredentialRevocationConfig, LinkSecret},
    identifiers::{CredentialDefinitionId, IssuerId, SchemaId},
    pres_request::PresentationRequest,
    process_credential,
    rev_reg::{
        RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate, RevocationStatusList,
    },
    schema::Schema,
    tails::TailsFileWriter,
    CredentialValues,
};

pub const ISSUER: &str = "did:web:xyz";

pub struct Issuer {
    pub schema: Schema,
    pub schema_id: SchemaId,
    pub cred_def: CredentialDefinition,
    pub cred_def_id: CredentialDefinitionId,
    pub private: CredentialDefinitionPrivate,
    pub proof: CredentialKeyCorrectnessProof,
}

pub struct Registry {
    pub def: RevocationRegistryDefinition,
    pub private: RevocationRegistryDefinitionPrivate,
    pub list: RevocationStatusList,
}

impl Issuer {
    pub fn new(schema_name: &str, attrs: &[&str], support_revocation: bool) -> Self {
        let issuer_id = IssuerId::new(ISSUER).unwrap();
        let schema = create_schema(schema_name, "1.0", issuer_id.clone(), attrs).unwrap();
        let (cred_def, private, proof) = create_credential_definition(
            &schema,
            issuer_id,
            "default",
            "BBS",
            CredentialDefinitionConfig::new(support_revocation),
        )
        .unwrap();
        Issuer {
            schema_id: schema.id().unwrap(),
            cred_def_id: cred_def.id().unwrap(),
            schema,
            cred_def,
            private,
            proof,
        }
    }

    pub fn registry(&self, dir: &tempfile::TempDir, max_cred_num: u32, timestamp: u64) -> Registry {
        let mut writer = TailsFileWriter::new(Some(dir.path().to_path_buf()));
        let (def, private) = create_revocation_registry_def(
            &self.cred_def,
            self.cred_def.issuer_id.clone(),
            "registry",
            "CL_ACCUM",
            max_cred_num,
            &mut writer,
        )
        .unwrap();
        let list = create_revocation_status_list(
            &def.id().unwrap(),
            &def,
            def.issuer_id.clone(),
            Some(timestamp),
            true,
        )
        .unwrap();
        Registry { def, private, list }
    }

    /// Run the offer, request, issue and process exchange.
    pub fn issue(
        &self,
        link_secret: &LinkSecret,
        values: CredentialValues,
        registry: Option<(&mut Registry, Option<u32>)>,
    ) -> anoncreds_bls::Result<Credential> {
        let offer =
            create_credential_offer(self.schema_id.clone(), self.cred_def_id.clone(), &self.proof)?;
        let (request, metadata) = create_credential_request(
            Some("entropy"),
            None,
            &self.cred_def,
            link_secret,
            "default",
            &offer,
        )?;
        let (credential, rev_reg_def) = match registry {
            None => {
                let (credential, _) = create_credential(
                    &self.cred_def,
                    &self.private,
                    &offer,
                    &request,
                    values,
                    None,
                    None,
                    None,
                )?;
                (credential, None)
            }
            Some((registry, registry_idx)) => {
                let (credential, list) = create_credential(
                    &self.cred_def,
                    &self.private,
                    &offer,
                    &request,
                    values,
                    Some(registry.def.id()?),
                    Some(&registry.list),
                    Some(CredentialRevocationConfig {
                        reg_def: &registry.def,
                        reg_def_private: &registry.private,
                        registry_idx,
                    }),
                )?;
                if let Some(list) = list {
                    registry.list = list;
                }
                (credential, Some(registry.def.clone()))
            }
        };
        process_credential(
            &credential,
            &metadata,
            link_secret,
            &self.cred_def,
            rev_reg_def.as_ref(),
        )
    }

    pub fn schemas(&self) -> HashMap<SchemaId, Schema> {
        HashMap::from([(self.schema_id.clone(), self.schema.clone())])
    }

    pub fn cred_defs(&self) -> HashMap<CredentialDefinitionId, CredentialDefinition> {
        HashMap::from([(self.cred_def_id.clone(), self.cred_def.clone())])
    }
}

pub fn values(name: &str, age: &str) -> CredentialValues {
    let mut values = CredentialValues::new();
    values.add_raw("name", name).add_raw("age", age);
    values
}

/// Parse a request, filling in a fresh nonce.
pub fn request(mut json: serde_json::Value) -> PresentationRequest {
    json["nonce"] = serde_json::Value::String(anoncreds_bls::generate_nonce().to_string());
    json["name"] = "proof".into();
    json["version"] = "1.0".into();
    serde_json::from_value(json).unwrap()
}
