mod common;

use anoncreds_bls::{
    create_link_secret, create_or_update_revocation_state,
    cred_def::CredentialDefinition,
    credential::Credential,
    rev_reg::{RevocationRegistryDefinition, RevocationStatusList},
    schema::Schema,
    Json,
};
use common::{values, Issuer};

fn round_trip<T: Json + PartialEq + std::fmt::Debug>(value: &T) -> serde_json::Value {
    let json = value.to_json().unwrap();
    assert_eq!(&T::from_json(&json).unwrap(), value);
    serde_json::from_str(&json).unwrap()
}

#[test]
fn ledger_objects() {
    let dir = tempfile::tempdir().unwrap();
    let issuer = Issuer::new("person", &["name", "age"], true);
    let mut registry = issuer.registry(&dir, 4, 7);
    let credential = issuer
        .issue(
            &create_link_secret(),
            values("Moussa", "28"),
            Some((&mut registry, None)),
        )
        .unwrap();

    let schema = round_trip::<Schema>(&issuer.schema);
    assert_eq!(schema["issuerId"], common::ISSUER);
    assert_eq!(schema["attrNames"], serde_json::json!(["age", "name"]));

    let cred_def = round_trip::<CredentialDefinition>(&issuer.cred_def);
    assert_eq!(cred_def["type"], "BBS");
    assert_eq!(cred_def["schemaId"], issuer.schema_id.as_str());

    let def = round_trip::<RevocationRegistryDefinition>(&registry.def);
    assert_eq!(def["revocDefType"], "CL_ACCUM");
    assert_eq!(def["value"]["maxCredNum"], 4);

    let list = round_trip::<RevocationStatusList>(&registry.list);
    assert_eq!(list["revocationList"], serde_json::json!([0, 0, 0, 0]));
    assert_eq!(list["timestamp"], 7);

    let credential_json = round_trip::<Credential>(&credential);
    assert_eq!(credential_json["values"]["name"]["raw"], "Moussa");
    assert_eq!(credential_json["values"]["age"]["encoded"], "28");
    assert_eq!(credential_json["signature"]["revRegIndex"], 0);

    let state = create_or_update_revocation_state(
        &registry.def,
        &registry.list,
        0,
        &registry.def.value.tails_location,
        None,
        None,
    )
    .unwrap();
    round_trip(&state);

    assert!(Schema::from_json("{\"name\": 1}").is_err());
}
