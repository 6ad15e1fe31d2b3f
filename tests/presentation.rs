mod common;

use std::collections::HashMap;

use anoncreds_bls::{
    create_link_secret, create_presentation,
    credential::Credential,
    pres_request::PresentationRequest,
    presentation::Presentation,
    prover::{CredentialProve, PresentCredential},
    verify_presentation, ErrorKind, Json, Result,
};
use common::{request, values, Issuer};
use serde_json::json;

fn prove(entry_idx: usize, referent: &str, is_predicate: bool, reveal: bool) -> CredentialProve {
    CredentialProve {
        entry_idx,
        referent: referent.to_string(),
        is_predicate,
        reveal,
    }
}

fn present(credential: &Credential) -> PresentCredential<'_> {
    PresentCredential {
        credential,
        timestamp: None,
        rev_state: None,
    }
}

fn verify(issuer: &Issuer, presentation: &Presentation, req: &PresentationRequest) -> Result<bool> {
    verify_presentation(
        presentation,
        req,
        &issuer.schemas(),
        &issuer.cred_defs(),
        None,
        None,
        None,
    )
}

#[test]
fn reveal_and_predicate() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();

    let req = request(json!({
        "requested_attributes": {
            "attr1_referent": {"name": "name", "restrictions": {"issuer_id": common::ISSUER}}
        },
        "requested_predicates": {
            "predicate1_referent": {"name": "age", "p_type": ">=", "p_value": 18}
        }
    }));
    let presentation = create_presentation(
        &req,
        &[present(&credential)],
        &[
            prove(0, "attr1_referent", false, true),
            prove(0, "predicate1_referent", true, false),
        ],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap();

    let revealed = &presentation.requested_proof.revealed_attrs["attr1_referent"];
    assert_eq!(revealed.raw, "Moussa");
    assert_eq!(revealed.sub_proof_index, 0);
    assert!(presentation.proof.proofs[0].revealed_attrs.get("age").is_none());
    assert!(verify(&issuer, &presentation, &req).unwrap());

    let parsed = Presentation::from_json(&presentation.to_json().unwrap()).unwrap();
    assert!(verify(&issuer, &parsed, &req).unwrap());
}

#[test]
fn every_attribute_revealed() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();

    let req = request(json!({
        "requested_attributes": {
            "name": {"name": "name"},
            "age": {"name": "age"}
        }
    }));
    let presentation = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "name", false, true), prove(0, "age", false, true)],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap();

    let revealed = &presentation.requested_proof.revealed_attrs;
    assert_eq!(revealed["name"].raw, "Moussa");
    assert_eq!(revealed["age"].raw, "28");
    assert_eq!(revealed["age"].encoded, "28");
    assert!(verify(&issuer, &presentation, &req).unwrap());
}

#[test]
fn unsatisfied_predicate_is_refused() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "16"), None)
        .unwrap();
    let req = request(json!({
        "requested_predicates": {
            "adult": {"name": "age", "p_type": ">=", "p_value": 18}
        }
    }));
    let err = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "adult", true, false)],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn missing_referent() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();
    let req = request(json!({
        "requested_attributes": {"name": {"name": "name"}},
        "requested_predicates": {"adult": {"name": "age", "p_type": ">=", "p_value": 18}}
    }));

    let err = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "name", false, true)],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingReferent);

    let mut presentation = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "name", false, true), prove(0, "adult", true, false)],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap();
    presentation.requested_proof.predicates.remove("adult");
    let err = verify(&issuer, &presentation, &req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingReferent);
}

#[test]
fn tampered_values_are_rejected() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();
    let req = request(json!({"requested_attributes": {"name": {"name": "name"}}}));
    let presentation = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "name", false, true)],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap();
    assert!(verify(&issuer, &presentation, &req).unwrap());

    // Raw value that does not match its encoding.
    let mut tampered = presentation.clone();
    tampered
        .requested_proof
        .revealed_attrs
        .get_mut("name")
        .unwrap()
        .raw = "Alice".into();
    assert!(!verify(&issuer, &tampered, &req).unwrap());

    // Consistent raw and encoded values that were never signed.
    let mut tampered = presentation.clone();
    let forged = anoncreds_bls::attributes::encode_credential_attribute("Alice");
    let revealed = tampered.requested_proof.revealed_attrs.get_mut("name").unwrap();
    revealed.raw = "Alice".into();
    revealed.encoded = forged.clone();
    assert!(!verify(&issuer, &tampered, &req).unwrap());
    tampered.proof.proofs[0]
        .revealed_attrs
        .insert("name".into(), forged);
    assert!(!verify(&issuer, &tampered, &req).unwrap());

    // Proof answering a different request.
    let other = request(json!({"requested_attributes": {"name": {"name": "name"}}}));
    assert!(!verify(&issuer, &presentation, &other).unwrap());
}

#[test]
fn restrictions_and_self_attested() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();
    let build = |restriction: serde_json::Value| {
        let req = request(json!({
            "requested_attributes": {
                "name": {"name": "name", "restrictions": restriction},
                "phone": {"name": "phone"}
            }
        }));
        let presentation = create_presentation(
            &req,
            &[present(&credential)],
            &[prove(0, "name", false, true)],
            &HashMap::from([("phone".to_string(), "555-0100".to_string())]),
            &link_secret,
            &issuer.schemas(),
            &issuer.cred_defs(),
        )
        .unwrap();
        (req, presentation)
    };

    let (req, presentation) = build(json!({"schema_name": "person", "attr::name::value": "Moussa"}));
    assert_eq!(
        presentation.requested_proof.self_attested_attrs["phone"],
        "555-0100"
    );
    assert!(verify(&issuer, &presentation, &req).unwrap());

    let (req, presentation) = build(json!([{"issuer_id": "did:web:abc"}, {"schema_name": "other"}]));
    assert!(!verify(&issuer, &presentation, &req).unwrap());

    // A verifier cannot accept a self-attested value for a restricted referent.
    let (mut req, presentation) = build(json!({}));
    req.requested_attributes.get_mut("phone").unwrap().restrictions =
        Some(serde_json::from_value(json!({"issuer_id": common::ISSUER})).unwrap());
    assert!(!verify(&issuer, &presentation, &req).unwrap());

    // Nor may a holder self-attest one.
    let err = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "name", false, true)],
        &HashMap::from([("phone".to_string(), "555-0100".to_string())]),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn attribute_groups_across_credentials() {
    let person = Issuer::new("person", &["name", "age"], false);
    let employer = Issuer::new("employee", &["name", "role", "salary"], false);
    let link_secret = create_link_secret();
    let id_card = person
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();
    let mut employee_values = anoncreds_bls::CredentialValues::new();
    employee_values
        .add_raw("name", "Moussa")
        .add_raw("role", "engineer")
        .add_raw("salary", "5000");
    let badge = employer.issue(&link_secret, employee_values, None).unwrap();

    let req = request(json!({
        "requested_attributes": {
            "identity": {"names": ["name", "age"]},
            "role": {"name": "role", "restrictions": {"schema_name": "employee"}},
            "hidden_name": {"name": "name"}
        },
        "requested_predicates": {
            "pay": {"name": "salary", "p_type": "<", "p_value": 10000}
        }
    }));
    let mut schemas = person.schemas();
    schemas.extend(employer.schemas());
    let mut cred_defs = person.cred_defs();
    cred_defs.extend(employer.cred_defs());
    let presentation = create_presentation(
        &req,
        &[present(&id_card), present(&badge)],
        &[
            prove(1, "role", false, true),
            prove(1, "hidden_name", false, false),
            prove(0, "identity", false, false),
            prove(1, "pay", true, false),
        ],
        &HashMap::new(),
        &link_secret,
        &schemas,
        &cred_defs,
    )
    .unwrap();

    let requested = &presentation.requested_proof;
    assert_eq!(requested.revealed_attr_groups["identity"].sub_proof_index, 0);
    assert_eq!(requested.revealed_attr_groups["identity"].values["age"].raw, "28");
    assert_eq!(requested.unrevealed_attrs["hidden_name"].sub_proof_index, 1);
    assert_eq!(requested.predicates["pay"].sub_proof_index, 1);
    assert_eq!(presentation.identifiers[1].cred_def_id, employer.cred_def_id);
    assert!(
        verify_presentation(&presentation, &req, &schemas, &cred_defs, None, None, None).unwrap()
    );

    let err = verify_presentation(
        &presentation,
        &req,
        &person.schemas(),
        &cred_defs,
        None,
        None,
        None,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn different_link_secrets_cannot_be_combined() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let credential = issuer
        .issue(&create_link_secret(), values("Moussa", "28"), None)
        .unwrap();
    let req = request(json!({"requested_attributes": {"name": {"name": "name"}}}));
    let presentation = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "name", false, true)],
        &HashMap::new(),
        &create_link_secret(),
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap();
    assert!(!verify(&issuer, &presentation, &req).unwrap());
}

#[test]
fn prover_argument_errors() {
    let issuer = Issuer::new("person", &["name", "age"], false);
    let link_secret = create_link_secret();
    let credential = issuer
        .issue(&link_secret, values("Moussa", "28"), None)
        .unwrap();
    let req = request(json!({
        "requested_attributes": {"name": {"name": "name"}, "age": {"name": "age"}},
        "requested_predicates": {"adult": {"name": "age", "p_type": ">=", "p_value": 18}}
    }));
    let attempt = |proves: &[CredentialProve]| {
        create_presentation(
            &req,
            &[present(&credential)],
            proves,
            &HashMap::new(),
            &link_secret,
            &issuer.schemas(),
            &issuer.cred_defs(),
        )
        .unwrap_err()
        .kind()
    };

    assert_eq!(
        attempt(&[
            prove(0, "name", false, true),
            prove(0, "name", false, true),
            prove(0, "age", false, false),
            prove(0, "adult", true, false),
        ]),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        attempt(&[
            prove(3, "name", false, true),
            prove(0, "age", false, false),
            prove(0, "adult", true, false),
        ]),
        ErrorKind::InvalidArgument
    );
    // Revealing an attribute that a predicate is proven over.
    assert_eq!(
        attempt(&[
            prove(0, "name", false, true),
            prove(0, "age", false, true),
            prove(0, "adult", true, false),
        ]),
        ErrorKind::InvalidArgument
    );

    let req = request(json!({"requested_attributes": {"salary": {"name": "salary"}}}));
    let err = create_presentation(
        &req,
        &[present(&credential)],
        &[prove(0, "salary", false, true)],
        &HashMap::new(),
        &link_secret,
        &issuer.schemas(),
        &issuer.cred_defs(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AttributeMismatch);
}
