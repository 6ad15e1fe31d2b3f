use std::collections::HashMap;

use anoncreds_bls::{
    cred_def::CredentialDefinitionConfig,
    create_credential, create_credential_definition, create_credential_offer,
    create_credential_request, create_link_secret, create_presentation, create_schema,
    generate_nonce,
    identifiers::IssuerId,
    pres_request::PresentationRequest,
    process_credential,
    prover::{CredentialProve, PresentCredential},
    verify_presentation, Attributes, Json,
};
use anyhow::{ensure, Result};
use tracing_subscriber::EnvFilter;

#[derive(Attributes, Clone, Debug)]
struct Employee {
    name: String,
    #[anoncreds(name = "birth_year")]
    born: i32,
    role: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let issuer_id = IssuerId::new("did:web:employer.example")?;
    let attr_names = Employee::attribute_names().iter().cloned().collect::<Vec<_>>();
    let schema = create_schema("employee", "1.0", issuer_id.clone(), &attr_names)?;
    let schema_id = schema.id()?;
    let (cred_def, cred_def_private, key_proof) = create_credential_definition(
        &schema,
        issuer_id,
        "default",
        "BBS",
        CredentialDefinitionConfig::default(),
    )?;
    let cred_def_id = cred_def.id()?;
    println!("Published credential definition {cred_def_id}");

    // Holder requests a credential bound to their link secret.
    let link_secret = create_link_secret();
    let offer = create_credential_offer(schema_id.clone(), cred_def_id.clone(), &key_proof)?;
    let (request, metadata) = create_credential_request(
        Some("holder-entropy"),
        None,
        &cred_def,
        &link_secret,
        "main",
        &offer,
    )?;

    let employee = Employee {
        name: "Moussa".to_string(),
        born: 1994,
        role: "engineer".to_string(),
    };
    let (credential, _) = create_credential(
        &cred_def,
        &cred_def_private,
        &offer,
        &request,
        employee.credential_values(),
        None,
        None,
        None,
    )?;
    let credential = process_credential(&credential, &metadata, &link_secret, &cred_def, None)?;
    println!("Issued a credential with attributes: {employee:?}");

    let pres_req = PresentationRequest::from_json(&format!(
        r#"{{
            "nonce": "{}",
            "name": "hiring",
            "version": "1.0",
            "requested_attributes": {{
                "role": {{"name": "role", "restrictions": {{"cred_def_id": "{cred_def_id}"}}}}
            }},
            "requested_predicates": {{
                "born_before": {{"name": "birth_year", "p_type": "<", "p_value": 2000}}
            }}
        }}"#,
        generate_nonce()
    ))?;
    let schemas = HashMap::from([(schema_id, schema)]);
    let cred_defs = HashMap::from([(cred_def_id, cred_def)]);
    let presentation = create_presentation(
        &pres_req,
        &[PresentCredential {
            credential: &credential,
            timestamp: None,
            rev_state: None,
        }],
        &[
            CredentialProve {
                entry_idx: 0,
                referent: "role".to_string(),
                is_predicate: false,
                reveal: true,
            },
            CredentialProve {
                entry_idx: 0,
                referent: "born_before".to_string(),
                is_predicate: true,
                reveal: false,
            },
        ],
        &HashMap::new(),
        &link_secret,
        &schemas,
        &cred_defs,
    )?;
    println!(
        "Created a presentation revealing role = {}",
        presentation.requested_proof.revealed_attrs["role"].raw
    );

    let valid = verify_presentation(
        &presentation,
        &pres_req,
        &schemas,
        &cred_defs,
        None,
        None,
        None,
    )?;
    ensure!(valid, "presentation did not verify");
    println!("Verifier accepted the presentation");

    Ok(())
}
